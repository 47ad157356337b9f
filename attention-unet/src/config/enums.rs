//! Enumeration types for the attention U-Net configuration.

use burn::prelude::*;

/// How an attention gate brings the skip tensor and the gating signal to a
/// common resolution.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum GatingStrategy {
    /// The gating signal is the upsampled decoder tensor and already shares
    /// the skip tensor's resolution.
    Direct,
    /// The gating signal is the coarse decoder input, one level below the skip
    /// tensor. The skip tensor is max-pooled to match it and the attention
    /// coefficients are resized back before gating (Oktay et al., 2018).
    Downsampled,
}

/// Normalization applied after a convolution.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum Normalization {
    /// No normalization.
    None,
    /// Batch normalization.
    Batch,
    /// Batch renormalization, for small batches.
    BatchRenorm,
}

impl Normalization {
    /// Picks the normalization for an `enabled` flag and the renorm mode.
    #[must_use]
    pub const fn from_flags(enabled: bool, renorm: bool) -> Self {
        match (enabled, renorm) {
            (false, _) => Self::None,
            (true, false) => Self::Batch,
            (true, true) => Self::BatchRenorm,
        }
    }
}
