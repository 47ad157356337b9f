//! # Convolution Block
//!
//! The unit every encoder and decoder stage is made of: two rounds of
//! 3x3 same-padded convolution, optional normalization, ReLU and optional
//! spatial dropout.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d, Relu,
    },
    prelude::*,
};
use burn_extra_ops::{SpatialDropout, SpatialDropoutConfig};

use super::NormLayer;
use crate::config::Normalization;

/// Configuration for the [`ConvBlock`] module.
#[derive(Config, Debug)]
pub struct ConvBlockConfig {
    /// Number of input channels.
    in_channels: usize,
    /// Number of output channels of both convolutions.
    out_channels: usize,
    /// Normalization after each convolution.
    #[config(default = "Normalization::None")]
    normalization: Normalization,
    /// Spatial dropout rate after each activation.
    #[config(default = "None")]
    dropout: Option<f64>,
}

impl ConvBlockConfig {
    /// Initializes a new `ConvBlock` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ConvBlock<B> {
        let conv1 = Conv2dConfig::new([self.in_channels, self.out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let conv2 = Conv2dConfig::new([self.out_channels, self.out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);

        ConvBlock {
            conv1,
            norm1: NormLayer::new(&self.normalization, self.out_channels, device),
            conv2,
            norm2: NormLayer::new(&self.normalization, self.out_channels, device),
            relu: Relu::new(),
            dropout: self
                .dropout
                .filter(|rate| *rate > 0.0)
                .map(|rate| SpatialDropoutConfig::new(rate).init()),
        }
    }
}

/// Two stacked convolution, normalization, activation units.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv1: Conv2d<B>,
    norm1: NormLayer<B>,
    conv2: Conv2d<B>,
    norm2: NormLayer<B>,
    relu: Relu,
    dropout: Option<SpatialDropout>,
}

impl<B: Backend> ConvBlock<B> {
    /// # Shapes
    /// - input: `[batch_size, in_channels, height, width]`
    /// - output: `[batch_size, out_channels, height, width]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.unit(&self.conv1, &self.norm1, x);
        self.unit(&self.conv2, &self.norm2, x)
    }

    fn unit(&self, conv: &Conv2d<B>, norm: &NormLayer<B>, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = conv.forward(x);
        let x = norm.forward(x);
        let x = self.relu.forward(x);
        match &self.dropout {
            Some(dropout) => dropout.forward(x),
            None => x,
        }
    }
}
