//! Additional layers for the Burn deep learning framework
//!
//! This crate provides layers that Keras-style segmentation networks rely on but
//! that are not available in the core Burn framework.

mod batch_renorm;
mod identity;
mod spatial_dropout;

// Convenient re-exports
pub use batch_renorm::{BatchRenorm, BatchRenormConfig};
pub use identity::Identity;
pub use spatial_dropout::{SpatialDropout, SpatialDropoutConfig};
