//! # Spatial Dropout
//!
//! Channel-wise dropout for feature maps. Instead of zeroing individual
//! activations, whole channels are dropped so that every spatial position of a
//! dropped channel is zero. Neighbouring activations in convolutional feature
//! maps are strongly correlated, so element-wise dropout barely regularizes them.

use burn::{
    module::{Content, DisplaySettings, ModuleDisplay},
    prelude::*,
    tensor::Distribution,
};

/// Configuration for the [`SpatialDropout`] module.
#[derive(Config, Debug)]
pub struct SpatialDropoutConfig {
    /// The probability of dropping a channel.
    pub prob: f64,
}

impl SpatialDropoutConfig {
    /// Initializes a new [`SpatialDropout`] module.
    pub fn init(&self) -> SpatialDropout {
        assert!(
            (0.0..1.0).contains(&self.prob),
            "Dropout probability must be in [0, 1), got {}",
            self.prob
        );
        SpatialDropout { prob: self.prob }
    }
}

/// Spatial (channel-wise) dropout module.
///
/// Like burn's `Dropout`, the module is only active on autodiff backends.
#[derive(Module, Clone, Debug)]
#[module(custom_display)]
pub struct SpatialDropout {
    /// The probability of dropping a channel.
    pub prob: f64,
}

impl ModuleDisplay for SpatialDropout {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content.add("prob", &self.prob).optional()
    }
}

impl SpatialDropout {
    /// Applies spatial dropout to the input tensor.
    ///
    /// The mask is drawn per `(batch, channel)` pair and broadcast over height
    /// and width. Kept channels are scaled by `1 / (1 - prob)`.
    ///
    /// # Shapes
    /// - input: `[batch_size, channels, height, width]`
    /// - output: `[batch_size, channels, height, width]`
    pub fn forward<B: Backend>(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        if !B::ad_enabled() || self.prob == 0.0 {
            return input;
        }
        let keep_prob = 1.0 - self.prob;
        let [batch_size, channels, _, _] = input.dims();

        let mask = Tensor::<B, 4>::random(
            [batch_size, channels, 1, 1],
            Distribution::Bernoulli(keep_prob),
            &input.device(),
        );

        input * mask / keep_prob
    }
}
