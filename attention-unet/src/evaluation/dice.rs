//! Per-class Dice on one-hot segmentations.
//!
//! For a class channel with prediction `p` and reference `g`:
//!
//! ```text
//! dice = 2 * sum(p * g) / (sum(p * p) + sum(g * g))
//! ```
//!
//! A class absent from both maps has an empty union and scores `1.0`.

use burn::{prelude::*, tensor::ElementConversion};
use serde::{Deserialize, Serialize};

use crate::error::{AttentionUNetError, AttentionUNetResult};

/// Number of label values in a tissue segmentation, background included.
pub const TISSUE_LABELS: usize = 4;

/// Foreground tissue classes scored per case. Label `0` is background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TissueClass {
    /// Invasive carcinoma, label `1`.
    Invasive,
    /// Benign epithelium, label `2`.
    Benign,
    /// Carcinoma in situ, label `3`.
    InSitu,
}

impl TissueClass {
    /// All scored classes in label order.
    pub const ALL: [Self; 3] = [Self::Invasive, Self::Benign, Self::InSitu];

    /// The label value of the class in a segmentation map.
    pub const fn label(self) -> usize {
        match self {
            Self::Invasive => 1,
            Self::Benign => 2,
            Self::InSitu => 3,
        }
    }

    /// Human readable class name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Invasive => "invasive",
            Self::Benign => "benign",
            Self::InSitu => "in situ",
        }
    }
}

/// Dice score of one class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassDice {
    /// The score in `[0, 1]`.
    pub score: f64,
    /// Whether the class was absent from both maps.
    pub empty: bool,
}

/// One-hot encodes an integer label map.
///
/// Labels outside `0..num_classes` get an all-zero encoding.
///
/// # Shapes
/// - labels: `[height, width]`
/// - output: `[num_classes, height, width]`
pub fn one_hot<B: Backend>(labels: Tensor<B, 2, Int>, num_classes: usize) -> Tensor<B, 3> {
    let channels = (0..num_classes)
        .map(|class| labels.clone().equal_elem(class as i64).float())
        .collect();
    Tensor::stack(channels, 0)
}

/// Trims a (padded) label map to `height x width`, keeping the top-left corner.
///
/// # Errors
///
/// Returns `Err(AttentionUNetError::InvalidTensorShape)` if the map is smaller
/// than the requested size.
pub fn crop_to<B: Backend>(
    labels: Tensor<B, 2, Int>,
    height: usize,
    width: usize,
) -> AttentionUNetResult<Tensor<B, 2, Int>> {
    let [map_height, map_width] = labels.dims();
    if map_height < height || map_width < width {
        return Err(AttentionUNetError::InvalidTensorShape {
            expected: format!("at least [{height}, {width}]"),
            actual: format!("[{map_height}, {map_width}]"),
        });
    }
    Ok(labels.slice([0..height, 0..width]))
}

/// Dice score of `class` between two one-hot maps.
///
/// # Shapes
/// - truth: `[num_classes, height, width]`
/// - pred: `[num_classes, height, width]`
///
/// # Errors
///
/// Returns `Err(AttentionUNetError::InvalidTensorShape)` if the maps differ in
/// shape and `Err(AttentionUNetError::Evaluation)` if `class` is out of range.
pub fn class_dice<B: Backend>(
    truth: Tensor<B, 3>,
    pred: Tensor<B, 3>,
    class: usize,
) -> AttentionUNetResult<ClassDice> {
    if truth.dims() != pred.dims() {
        return Err(AttentionUNetError::InvalidTensorShape {
            expected: format!("{:?}", truth.dims()),
            actual: format!("{:?}", pred.dims()),
        });
    }
    let [num_classes, _, _] = truth.dims();
    if class >= num_classes {
        return Err(AttentionUNetError::Evaluation {
            message: format!("class {class} out of range for {num_classes} classes"),
        });
    }

    let truth = truth.narrow(0, class, 1);
    let pred = pred.narrow(0, class, 1);

    let intersection: f64 = (pred.clone() * truth.clone()).sum().into_scalar().elem();
    let union: f64 = (pred.clone() * pred).sum().into_scalar().elem::<f64>()
        + (truth.clone() * truth).sum().into_scalar().elem::<f64>();

    if union == 0.0 {
        Ok(ClassDice {
            score: 1.0,
            empty: true,
        })
    } else {
        Ok(ClassDice {
            score: 2.0 * intersection / union,
            empty: false,
        })
    }
}

/// Dice scores of the three tissue classes for one case, in
/// [`TissueClass::ALL`] order.
///
/// The prediction may be larger than the reference (stitched patches are
/// padded) and is cropped to the reference size first.
///
/// # Shapes
/// - truth: `[height, width]` with labels in `0..TISSUE_LABELS`
/// - pred: `[height', width']` with `height' >= height` and `width' >= width`
///
/// # Errors
///
/// Returns `Err(AttentionUNetError::InvalidTensorShape)` if the prediction is
/// smaller than the reference.
pub fn case_dice<B: Backend>(
    truth: Tensor<B, 2, Int>,
    pred: Tensor<B, 2, Int>,
) -> AttentionUNetResult<[f64; 3]> {
    let [height, width] = truth.dims();
    let pred = crop_to(pred, height, width)?;

    let truth = one_hot(truth, TISSUE_LABELS);
    let pred = one_hot(pred, TISSUE_LABELS);

    let mut scores = [0.0; 3];
    for (score, class) in scores.iter_mut().zip(TissueClass::ALL) {
        *score = class_dice(truth.clone(), pred.clone(), class.label())?.score;
    }
    Ok(scores)
}
