use burn::{
    nn::{BatchNorm, BatchNormConfig},
    prelude::*,
};
use burn_extra_ops::{BatchRenorm, BatchRenormConfig, Identity};

use crate::config::Normalization;

/// An enum to wrap the normalization layers (BatchNorm, BatchRenorm or Identity).
#[derive(Module, Debug)]
pub enum NormLayer<B: Backend> {
    BatchNorm(BatchNorm<B, 2>),
    BatchRenorm(BatchRenorm<B>),
    Identity(Identity),
}

impl<B: Backend> NormLayer<B> {
    /// Create a new normalization layer over `channels` features.
    pub fn new(normalization: &Normalization, channels: usize, device: &Device<B>) -> Self {
        match normalization {
            Normalization::None => Self::Identity(Identity::new()),
            Normalization::Batch => Self::BatchNorm(BatchNormConfig::new(channels).init(device)),
            Normalization::BatchRenorm => {
                Self::BatchRenorm(BatchRenormConfig::new(channels).init(device))
            }
        }
    }

    /// Forward pass through the normalization layer.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::BatchNorm(bn) => bn.forward(x),
            Self::BatchRenorm(brn) => brn.forward(x),
            Self::Identity(identity) => identity.forward(x),
        }
    }
}
