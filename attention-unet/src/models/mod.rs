//! # Model Architectures
//!
//! - `attention_unet`: the full network and its output containers.
//! - `modules`: building blocks such as the attention gate, the position
//!   attention module and the encoder and decoder stages.
//! - `plan`: static planning of per-level spatial sizes.

pub mod attention_unet;
pub mod modules;
pub mod plan;

pub use attention_unet::{AttentionUNet, AttentionUNetRecord, SegmentationOutput, SkipConnections};
pub use modules::*;
pub use plan::{LevelPlan, NetworkPlan, UpsampleGeometry};
