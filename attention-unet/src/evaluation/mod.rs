//! # Evaluation
//!
//! Scoring of predicted tissue segmentations against their references and
//! aggregation of the scores over a cohort.
//!
//! - `dice`: one-hot encoding, cropping and per-class Dice on label maps.
//! - `cohort`: grouping of per-case scores by histologic subtype and grade.
//!
//! Producing the predictions (patching, inference, stitching) happens outside
//! this crate; the functions here start from integer label maps.

mod cohort;
mod dice;

pub use cohort::*;
pub use dice::*;
