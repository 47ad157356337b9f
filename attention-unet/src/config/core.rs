//! Core configuration structure for the attention U-Net.
//!
//! The configuration is an immutable record: every architectural choice is set
//! before the network is built and nothing is mutated afterwards.

use crate::error::{AttentionUNetError, AttentionUNetResult};
use burn::prelude::*;

use super::enums::*;

/// Main configuration for the attention U-Net.
///
/// Shapes use the channels-last vocabulary `[height, width, channels]`; the
/// built model consumes burn's `[batch, channels, height, width]` layout.
#[derive(Config, Debug)]
pub struct AttentionUNetConfig {
    /// Input shape, `[H, W, C]` or `[H, W, D, C]`. The network is 2D only, so a
    /// depth axis is accepted only when `D == 1`.
    pub input_shape: Vec<usize>,
    /// Number of segmentation classes. Must be greater than one.
    pub num_classes: usize,
    /// Channel count per resolution level, finest to coarsest. The last entry
    /// is the bottleneck.
    #[config(default = "vec![8, 16, 32, 64]")]
    pub channel_schedule: Vec<usize>,
    /// Emit one classification head per decoder resolution.
    #[config(default = "false")]
    pub deep_supervision: bool,
    /// Inject an average-pooled copy of the input at every encoder stage.
    #[config(default = "false")]
    pub input_pyramid: bool,
    /// Use batch renormalization instead of batch normalization.
    #[config(default = "false")]
    pub use_batch_renorm: bool,
    /// Normalize inside encoder convolution blocks.
    #[config(default = "true")]
    pub encoder_normalize: bool,
    /// Normalize inside decoder blocks.
    #[config(default = "true")]
    pub decoder_normalize: bool,
    /// Spatial dropout rate in encoder convolution blocks.
    #[config(default = "None")]
    pub encoder_dropout: Option<f64>,
    /// Spatial dropout rate in decoder convolution blocks.
    #[config(default = "None")]
    pub decoder_dropout: Option<f64>,
    /// Resolution matching strategy of the attention gates.
    #[config(default = "GatingStrategy::Direct")]
    pub gating: GatingStrategy,
    /// Refine gated skip features with position self-attention.
    #[config(default = "false")]
    pub self_attention: bool,
}

/// A validated 2D input shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputShape {
    /// Height in pixels.
    pub height: usize,
    /// Width in pixels.
    pub width: usize,
    /// Number of input channels.
    pub channels: usize,
}

impl InputShape {
    /// Spatial extent as `[height, width]`.
    #[must_use]
    pub const fn spatial(&self) -> [usize; 2] {
        [self.height, self.width]
    }
}

impl AttentionUNetConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Err(AttentionUNetError::InvalidConfiguration)` if any validation rule is violated.
    pub fn validate(&self) -> AttentionUNetResult<()> {
        self.resolved_input_shape()?;

        // 1. Segmentation needs at least two classes for the softmax heads
        if self.num_classes <= 1 {
            return Err(AttentionUNetError::invalid_configuration(format!(
                "Segmentation classes must be > 1, got {}",
                self.num_classes
            )));
        }

        // 2. At least one encoder level plus the bottleneck
        if self.channel_schedule.len() < 2 {
            return Err(AttentionUNetError::invalid_configuration(format!(
                "Channel schedule needs at least 2 levels, got {}",
                self.channel_schedule.len()
            )));
        }
        if self.channel_schedule.contains(&0) {
            return Err(AttentionUNetError::invalid_configuration(format!(
                "Channel schedule entries must be positive, got {:?}",
                self.channel_schedule
            )));
        }

        // 3. Dropout rates
        for (name, rate) in [
            ("encoder", self.encoder_dropout),
            ("decoder", self.decoder_dropout),
        ] {
            if let Some(rate) = rate {
                if !(0.0..1.0).contains(&rate) {
                    return Err(AttentionUNetError::invalid_configuration(format!(
                        "The {name} dropout rate must be in [0, 1), got {rate}"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Resolve `input_shape` to a 2D shape.
    ///
    /// # Errors
    ///
    /// Returns `Err(AttentionUNetError::InvalidConfiguration)` if the rank is not
    /// 3 or 4, if a depth axis other than 1 is given, or if any extent is zero.
    pub fn resolved_input_shape(&self) -> AttentionUNetResult<InputShape> {
        let shape = match self.input_shape.as_slice() {
            &[height, width, channels] => InputShape {
                height,
                width,
                channels,
            },
            &[height, width, 1, channels] => InputShape {
                height,
                width,
                channels,
            },
            &[_, _, depth, _] => {
                return Err(AttentionUNetError::invalid_configuration(format!(
                    "Only 2D inputs are supported, got a depth axis of {depth}"
                )));
            }
            other => {
                return Err(AttentionUNetError::invalid_configuration(format!(
                    "Input shape must have 3 or 4 dimensions, got {}",
                    other.len()
                )));
            }
        };

        if shape.height == 0 || shape.width == 0 || shape.channels == 0 {
            return Err(AttentionUNetError::invalid_configuration(format!(
                "Input shape extents must be positive, got {:?}",
                self.input_shape
            )));
        }

        Ok(shape)
    }

    /// Number of resolution levels, bottleneck included.
    #[must_use]
    pub fn levels(&self) -> usize {
        self.channel_schedule.len()
    }

    /// Bottleneck channel count.
    #[must_use]
    pub fn bottleneck_channels(&self) -> usize {
        self.channel_schedule.last().copied().unwrap_or_default()
    }

    /// Decoder channel counts, coarse to fine: the reversed schedule without
    /// the bottleneck.
    #[must_use]
    pub fn decoder_channels(&self) -> Vec<usize> {
        self.channel_schedule.iter().rev().skip(1).copied().collect()
    }

    /// Normalization used inside encoder convolution blocks.
    #[must_use]
    pub const fn encoder_normalization(&self) -> Normalization {
        Normalization::from_flags(self.encoder_normalize, self.use_batch_renorm)
    }

    /// Normalization used inside decoder blocks.
    #[must_use]
    pub const fn decoder_normalization(&self) -> Normalization {
        Normalization::from_flags(self.decoder_normalize, self.use_batch_renorm)
    }

    /// Normalization inside attention gates, which always normalize.
    #[must_use]
    pub const fn gate_normalization(&self) -> Normalization {
        Normalization::from_flags(true, self.use_batch_renorm)
    }
}
