//! Configuration module for the attention U-Net.
//!
//! - `core`: the network configuration and its validation
//! - `enums`: enumeration types used in configurations

pub mod core;
pub mod enums;

pub use core::{AttentionUNetConfig, InputShape};
pub use enums::{GatingStrategy, Normalization};
