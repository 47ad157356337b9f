//! # Attention U-Net
//!
//! A configurable 2D U-Net for semantic segmentation whose skip connections are
//! filtered by additive attention gates, built on [burn](https://burn.dev).
//!
//! ```text
//! AttentionUNetConfig --init--> AttentionUNet --forward--> SegmentationOutput
//! ```
//!
//! The `evaluation` module scores predicted segmentations against references
//! with per-class Dice and aggregates the scores per histologic subtype and
//! grade over a cohort.

mod config;
mod error;
pub mod evaluation;
mod models;

#[cfg(test)]
mod tests;

pub use config::*;
pub use error::{AttentionUNetError, AttentionUNetResult};
pub use models::{
    AttentionGate, AttentionGateConfig, AttentionUNet, AttentionUNetRecord, ConvBlock,
    ConvBlockConfig, DecoderBlock, DecoderBlockConfig, EncoderBlock, EncoderBlockConfig,
    LevelPlan, NetworkPlan, NormLayer, PositionAttention, PositionAttentionConfig,
    SegmentationOutput, SkipConnections, UpsampleGeometry,
};
