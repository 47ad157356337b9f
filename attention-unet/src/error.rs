use thiserror::Error;

/// The error type for `attention-unet` operations.
///
/// Configuration problems are reported when a model is built; tensor shape
/// problems when a model or an evaluation routine receives inconsistent input.
#[derive(Error, Debug)]
pub enum AttentionUNetError {
    /// Error for when an invalid model configuration is provided.
    /// This can happen if configuration parameters are logically inconsistent.
    #[error("Invalid model configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// Error for when an input tensor has an invalid shape.
    #[error("Invalid input tensor shape: expected {expected}, got {actual}")]
    InvalidTensorShape {
        /// The expected tensor shape.
        expected: String,
        /// The actual tensor shape.
        actual: String,
    },

    /// Error for when scoring or aggregating segmentations fails.
    #[error("Evaluation error: {message}")]
    Evaluation {
        /// The error message.
        message: String,
    },
}

impl AttentionUNetError {
    pub(crate) fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}

/// A specialized `Result` type for `attention-unet` operations.
pub type AttentionUNetResult<T> = Result<T, AttentionUNetError>;
