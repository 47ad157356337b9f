//! # Position Attention Module (PAM)
//!
//! Global self-attention over the spatial positions of a feature map
//! (Fu et al., "Dual Attention Network", 2019). For `N = H * W` positions with
//! query `q_i`, key `k_j` and value `v_j` projections:
//!
//! ```text
//! A[i, j] = softmax_j(<q_i, k_j>)          A: [N, N]
//! o_i     = sum_j A[i, j] * v_j            o: [N, C]
//! out     = gamma * o + x
//! ```
//!
//! `gamma` starts at zero so that a freshly built module is an identity.

use burn::{
    module::Param,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Initializer,
    },
    prelude::*,
    tensor::activation::softmax,
};

/// Configuration for the [`PositionAttention`] module.
#[derive(Config, Debug)]
pub struct PositionAttentionConfig {
    /// Number of input (and output) channels.
    channels: usize,
    /// Channel reduction of the query and key projections.
    #[config(default = "8")]
    reduction: usize,
}

impl PositionAttentionConfig {
    /// Initializes a new `PositionAttention` module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> PositionAttention<B> {
        let reduced = (self.channels / self.reduction).max(1);
        let projection = |out_channels: usize| {
            Conv2dConfig::new([self.channels, out_channels], [1, 1])
                .with_bias(false)
                .init(device)
        };

        PositionAttention {
            query: projection(reduced),
            key: projection(reduced),
            value: projection(self.channels),
            gamma: Initializer::Zeros.init([1], device),
        }
    }
}

/// Position self-attention with a learned residual scale.
#[derive(Module, Debug)]
pub struct PositionAttention<B: Backend> {
    query: Conv2d<B>,
    key: Conv2d<B>,
    value: Conv2d<B>,
    gamma: Param<Tensor<B, 1>>,
}

impl<B: Backend> PositionAttention<B> {
    /// # Shapes
    /// - input: `[batch_size, channels, height, width]`
    /// - output: `[batch_size, channels, height, width]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch_size, channels, height, width] = x.dims();
        let positions = height * width;

        let affinity = self.affinity(x.clone());
        let value = self
            .value
            .forward(x.clone())
            .reshape([batch_size, channels, positions])
            .swap_dims(1, 2);

        let attended = affinity
            .matmul(value)
            .swap_dims(1, 2)
            .reshape([batch_size, channels, height, width]);

        attended * self.gamma.val().reshape([1, 1, 1, 1]) + x
    }

    /// Row-normalized affinity between every pair of positions.
    ///
    /// # Shapes
    /// - input: `[batch_size, channels, height, width]`
    /// - output: `[batch_size, height * width, height * width]`
    pub fn affinity(&self, x: Tensor<B, 4>) -> Tensor<B, 3> {
        let [batch_size, _, height, width] = x.dims();
        let positions = height * width;

        let query = self.query.forward(x.clone());
        let [_, reduced, _, _] = query.dims();
        let query = query
            .reshape([batch_size, reduced, positions])
            .swap_dims(1, 2);
        let key = self
            .key
            .forward(x)
            .reshape([batch_size, reduced, positions]);

        softmax(query.matmul(key), 2)
    }
}
