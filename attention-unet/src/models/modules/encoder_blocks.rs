//! # Encoder Blocks
//!
//! One encoder stage: a [`ConvBlock`] whose output is kept for the skip
//! connection, followed by max pooling. The pyramid variant first fuses a
//! resampled copy of the raw network input into the running features.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        PaddingConfig2d, Relu,
    },
    prelude::*,
};

use super::{ConvBlock, ConvBlockConfig};
use crate::config::Normalization;

/// Configuration for the [`EncoderBlock`] module.
#[derive(Config, Debug)]
pub struct EncoderBlockConfig {
    /// Number of input channels of the running features.
    in_channels: usize,
    /// Number of output channels.
    out_channels: usize,
    /// Pooling factors per axis.
    #[config(default = "[2, 2]")]
    pool: [usize; 2],
    /// Channels of the raw input to fuse, if this is a pyramid stage.
    #[config(default = "None")]
    pyramid_channels: Option<usize>,
    /// Normalization inside the convolution block.
    #[config(default = "Normalization::None")]
    normalization: Normalization,
    /// Spatial dropout rate inside the convolution block.
    #[config(default = "None")]
    dropout: Option<f64>,
}

impl EncoderBlockConfig {
    /// Initializes a new `EncoderBlock` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> EncoderBlock<B> {
        let pyramid_conv = self.pyramid_channels.map(|channels| {
            Conv2dConfig::new([channels, self.out_channels], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device)
        });
        let block_in = if pyramid_conv.is_some() {
            self.in_channels + self.out_channels
        } else {
            self.in_channels
        };

        EncoderBlock {
            pyramid_conv,
            relu: Relu::new(),
            conv_block: ConvBlockConfig::new(block_in, self.out_channels)
                .with_normalization(self.normalization.clone())
                .with_dropout(self.dropout)
                .init(device),
            pool: MaxPool2dConfig::new(self.pool)
                .with_strides(self.pool)
                .init(),
        }
    }
}

/// A single encoder stage.
#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pyramid_conv: Option<Conv2d<B>>,
    relu: Relu,
    conv_block: ConvBlock<B>,
    pool: MaxPool2d,
}

impl<B: Backend> EncoderBlock<B> {
    /// Whether the stage fuses a pyramid copy of the input.
    pub const fn is_pyramid(&self) -> bool {
        self.pyramid_conv.is_some()
    }

    /// Runs the stage.
    ///
    /// `pyramid_input` is the network input resampled to this stage's
    /// resolution. It is required by pyramid stages and ignored otherwise.
    ///
    /// # Returns
    ///
    /// `(downsampled, skip)`, where `skip` is the feature map before pooling.
    pub fn forward(
        &self,
        x: Tensor<B, 4>,
        pyramid_input: Option<Tensor<B, 4>>,
    ) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let x = match (&self.pyramid_conv, pyramid_input) {
            (Some(conv), Some(input)) => {
                let pyramid = self.relu.forward(conv.forward(input));
                Tensor::cat(vec![pyramid, x], 1)
            }
            _ => x,
        };

        let skip = self.conv_block.forward(x);
        let x = self.pool.forward(skip.clone());

        (x, skip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::ndarray::NdArray, tensor::Distribution};

    type TestBackend = NdArray;

    #[test]
    fn plain_stage_halves_resolution() {
        let device = Default::default();
        let block = EncoderBlockConfig::new(3, 8).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::random([1, 3, 16, 12], Distribution::Default, &device);

        let (down, skip) = block.forward(x, None);

        assert!(!block.is_pyramid());
        assert_eq!(skip.dims(), [1, 8, 16, 12]);
        assert_eq!(down.dims(), [1, 8, 8, 6]);
    }

    #[test]
    fn held_axis_keeps_its_extent() {
        let device = Default::default();
        let block = EncoderBlockConfig::new(1, 4)
            .with_pool([1, 2])
            .init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::random([1, 1, 3, 10], Distribution::Default, &device);

        let (down, _) = block.forward(x, None);

        assert_eq!(down.dims(), [1, 4, 3, 5]);
    }

    #[test]
    fn pyramid_stage_fuses_raw_input() {
        let device = Default::default();
        let block = EncoderBlockConfig::new(8, 16)
            .with_pyramid_channels(Some(3))
            .with_normalization(Normalization::Batch)
            .init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 4>::random([2, 8, 8, 8], Distribution::Default, &device);
        let raw = Tensor::<TestBackend, 4>::random([2, 3, 8, 8], Distribution::Default, &device);

        let (down, skip) = block.forward(x, Some(raw));

        assert!(block.is_pyramid());
        assert_eq!(skip.dims(), [2, 16, 8, 8]);
        assert_eq!(down.dims(), [2, 16, 4, 4]);
    }
}
