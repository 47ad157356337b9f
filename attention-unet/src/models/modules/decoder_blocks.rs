//! # Decoder Blocks
//!
//! One decoder stage: a transposed convolution brings the coarse tensor to the
//! skip tensor's resolution, an [`AttentionGate`] filters the skip features,
//! and a [`ConvBlock`] refines their concatenation.

use burn::{
    nn::{
        conv::{ConvTranspose2d, ConvTranspose2dConfig},
        Relu,
    },
    prelude::*,
};

use super::{
    AttentionGate, AttentionGateConfig, ConvBlock, ConvBlockConfig, NormLayer, PositionAttention,
    PositionAttentionConfig,
};
use crate::config::{GatingStrategy, Normalization};
use crate::models::plan::UpsampleGeometry;

/// Configuration for the [`DecoderBlock`] module.
#[derive(Config, Debug)]
pub struct DecoderBlockConfig {
    /// Channels of the coarse input.
    in_channels: usize,
    /// Channels of the skip tensor.
    skip_channels: usize,
    /// Number of output channels.
    out_channels: usize,
    /// Upsampling stride per axis.
    #[config(default = "[2, 2]")]
    stride: [usize; 2],
    /// Transposed convolution padding per axis.
    #[config(default = "[1, 1]")]
    padding: [usize; 2],
    /// Transposed convolution output padding per axis.
    #[config(default = "[1, 1]")]
    padding_out: [usize; 2],
    /// Resolution matching strategy of the attention gate.
    #[config(default = "GatingStrategy::Direct")]
    gating: GatingStrategy,
    /// Normalization after the upsampling and inside the convolution block.
    #[config(default = "Normalization::None")]
    normalization: Normalization,
    /// Normalization inside the attention gate.
    #[config(default = "Normalization::Batch")]
    gate_normalization: Normalization,
    /// Spatial dropout rate inside the convolution block.
    #[config(default = "None")]
    dropout: Option<f64>,
    /// Also concatenate position self-attention over the gated skip features.
    #[config(default = "false")]
    self_attention: bool,
}

impl DecoderBlockConfig {
    /// Uses the transposed-convolution geometry of a planned level.
    #[must_use]
    pub fn with_geometry(self, geometry: UpsampleGeometry) -> Self {
        self.with_stride(geometry.stride)
            .with_padding(geometry.padding)
            .with_padding_out(geometry.padding_out)
    }

    /// Initializes a new `DecoderBlock` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> DecoderBlock<B> {
        let upsample = ConvTranspose2dConfig::new([self.in_channels, self.out_channels], [3, 3])
            .with_stride(self.stride)
            .with_padding(self.padding)
            .with_padding_out(self.padding_out)
            .init(device);

        // The direct gate sees the upsampled tensor, the downsampled gate the coarse input.
        let gate_channels = match self.gating {
            GatingStrategy::Direct => self.out_channels,
            GatingStrategy::Downsampled => self.in_channels,
        };
        let attention = AttentionGateConfig::new(
            gate_channels,
            self.skip_channels,
            (self.out_channels / 2).max(1),
        )
        .with_strategy(self.gating.clone())
        .with_pool(self.stride)
        .with_normalization(self.gate_normalization.clone())
        .init(device);

        let self_attention = self
            .self_attention
            .then(|| PositionAttentionConfig::new(self.skip_channels).init(device));

        let concat_channels = if self_attention.is_some() {
            self.out_channels + 2 * self.skip_channels
        } else {
            self.out_channels + self.skip_channels
        };

        DecoderBlock {
            upsample,
            norm: NormLayer::new(&self.normalization, self.out_channels, device),
            relu: Relu::new(),
            attention,
            self_attention,
            conv_block: ConvBlockConfig::new(concat_channels, self.out_channels)
                .with_normalization(self.normalization.clone())
                .with_dropout(self.dropout)
                .init(device),
        }
    }
}

/// A single decoder stage with an attention-gated skip connection.
#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    upsample: ConvTranspose2d<B>,
    norm: NormLayer<B>,
    relu: Relu,
    attention: AttentionGate<B>,
    self_attention: Option<PositionAttention<B>>,
    conv_block: ConvBlock<B>,
}

impl<B: Backend> DecoderBlock<B> {
    /// # Shapes
    /// - x: `[batch_size, in_channels, h, w]`
    /// - skip: `[batch_size, skip_channels, H, W]`, the level `x` was pooled from
    /// - output: `[batch_size, out_channels, H, W]`
    pub fn forward(&self, x: Tensor<B, 4>, skip: Tensor<B, 4>) -> Tensor<B, 4> {
        let coarse = x;
        let x = self.upsample.forward(coarse.clone());
        let x = self.relu.forward(self.norm.forward(x));

        let gate = match self.attention.strategy() {
            GatingStrategy::Direct => x.clone(),
            GatingStrategy::Downsampled => coarse,
        };
        let attention = self.attention.forward(gate, skip);

        let features = match &self.self_attention {
            Some(pam) => {
                let refined = pam.forward(attention.clone());
                vec![x, attention, refined]
            }
            None => vec![x, attention],
        };

        self.conv_block.forward(Tensor::cat(features, 1))
    }
}
