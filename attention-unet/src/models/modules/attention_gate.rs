//! # Attention Gate
//!
//! Additive attention gate between a decoder stage and its skip connection.
//! The coarse decoder signal `g` decides, per spatial location, how much of the
//! encoder's skip features `x` are passed on:
//!
//! ```text
//! psi = sigmoid(norm(conv_1x1(relu(cat[norm(conv_1x1(g)), norm(conv_1x1(x))]))))
//! out = x * psi
//! ```
//!
//! `psi` has a single channel and is broadcast across the channels of `x`.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Relu,
    },
    prelude::*,
    tensor::{
        activation::sigmoid,
        module::interpolate,
        ops::{InterpolateMode, InterpolateOptions},
    },
};
use burn_extra_ops::Identity;

use super::NormLayer;
use crate::config::{GatingStrategy, Normalization};

/// Brings the skip tensor to the gating signal's resolution.
#[derive(Module, Clone, Debug)]
enum SkipResampler {
    Identity(Identity),
    MaxPool(MaxPool2d),
}

/// Configuration for the [`AttentionGate`] module.
#[derive(Config, Debug)]
pub struct AttentionGateConfig {
    /// Channels of the gating signal `g`.
    gate_channels: usize,
    /// Channels of the skip tensor `x`.
    skip_channels: usize,
    /// Channels both inputs are projected to.
    inter_channels: usize,
    /// How `x` is matched to `g`.
    #[config(default = "GatingStrategy::Direct")]
    strategy: GatingStrategy,
    /// Pooling factors between `x` and `g` for [`GatingStrategy::Downsampled`].
    #[config(default = "[2, 2]")]
    pool: [usize; 2],
    /// Normalization after each projection.
    #[config(default = "Normalization::Batch")]
    normalization: Normalization,
}

impl AttentionGateConfig {
    /// Initializes a new `AttentionGate` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> AttentionGate<B> {
        let projection = |in_channels: usize, out_channels: usize| {
            Conv2dConfig::new([in_channels, out_channels], [1, 1]).init(device)
        };

        let resample = match self.strategy {
            GatingStrategy::Direct => SkipResampler::Identity(Identity::new()),
            GatingStrategy::Downsampled => SkipResampler::MaxPool(
                MaxPool2dConfig::new(self.pool)
                    .with_strides(self.pool)
                    .init(),
            ),
        };

        AttentionGate {
            resample,
            w_g: projection(self.gate_channels, self.inter_channels),
            bn_g: NormLayer::new(&self.normalization, self.inter_channels, device),
            w_x: projection(self.skip_channels, self.inter_channels),
            bn_x: NormLayer::new(&self.normalization, self.inter_channels, device),
            relu: Relu::new(),
            psi: projection(self.inter_channels * 2, 1),
            bn_psi: NormLayer::new(&self.normalization, 1, device),
        }
    }
}

/// Spatial attention gate over a skip connection.
#[derive(Module, Debug)]
pub struct AttentionGate<B: Backend> {
    resample: SkipResampler,
    w_g: Conv2d<B>,
    bn_g: NormLayer<B>,
    w_x: Conv2d<B>,
    bn_x: NormLayer<B>,
    relu: Relu,
    psi: Conv2d<B>,
    bn_psi: NormLayer<B>,
}

impl<B: Backend> AttentionGate<B> {
    /// The resolution matching strategy this gate was built with.
    pub fn strategy(&self) -> GatingStrategy {
        match self.resample {
            SkipResampler::Identity(_) => GatingStrategy::Direct,
            SkipResampler::MaxPool(_) => GatingStrategy::Downsampled,
        }
    }

    /// Gates `x` with `g`.
    ///
    /// # Shapes
    /// - g: `[batch_size, gate_channels, h_g, w_g]`
    /// - x: `[batch_size, skip_channels, h, w]`, where `(h, w) == (h_g, w_g)` for
    ///   the direct strategy and pools down to `(h_g, w_g)` otherwise
    /// - output: `[batch_size, skip_channels, h, w]`
    pub fn forward(&self, g: Tensor<B, 4>, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let coefficients = self.coefficients(g, x.clone());
        x * coefficients
    }

    /// The attention coefficients in `[0, 1]` at the resolution of `x`.
    ///
    /// # Shapes
    /// - output: `[batch_size, 1, h, w]`
    pub fn coefficients(&self, g: Tensor<B, 4>, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, _, height, width] = x.dims();
        let x = match &self.resample {
            SkipResampler::Identity(identity) => identity.forward(x),
            SkipResampler::MaxPool(pool) => pool.forward(x),
        };

        let g1 = self.bn_g.forward(self.w_g.forward(g));
        let x1 = self.bn_x.forward(self.w_x.forward(x));

        let psi = self.relu.forward(Tensor::cat(vec![g1, x1], 1));
        let psi = sigmoid(self.bn_psi.forward(self.psi.forward(psi)));

        let [_, _, psi_height, psi_width] = psi.dims();
        if [psi_height, psi_width] == [height, width] {
            psi
        } else {
            interpolate(
                psi,
                [height, width],
                InterpolateOptions::new(InterpolateMode::Bilinear),
            )
        }
    }
}
