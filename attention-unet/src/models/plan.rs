//! # Shape Planning
//!
//! The network's spatial bookkeeping is static: once the input size is known,
//! the size of every level, the pooling factors between levels and the
//! transposed-convolution geometry that undoes them are fixed. They are computed
//! here, before any layer is allocated, so that every encoder pool has a decoder
//! upsample that reproduces the skip tensor's size exactly.

/// Spatial sizes at or below this extent are not pooled by plain encoder stages.
pub const PLAIN_POOL_THRESHOLD: usize = 3;
/// Spatial sizes at or below this extent are not pooled by pyramid-fused stages.
pub const PYRAMID_POOL_THRESHOLD: usize = 4;

/// Per-axis pooling factors: 2, or 1 for axes already at or below `threshold`.
#[must_use]
pub fn pool_factors(spatial: [usize; 2], threshold: usize) -> [usize; 2] {
    spatial.map(|extent| if extent <= threshold { 1 } else { 2 })
}

/// Transposed-convolution geometry of one decoder upsample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsampleGeometry {
    pub stride: [usize; 2],
    pub padding: [usize; 2],
    pub padding_out: [usize; 2],
}

impl UpsampleGeometry {
    /// Geometry of a 3x3 transposed convolution mapping a level pooled by
    /// `factors` back to `target`.
    ///
    /// With kernel 3 the output extent is
    /// `(in - 1) * stride - 2 * padding + padding_out + 3`:
    /// - factor 1: stride 1, padding 1 keeps the extent;
    /// - factor 2, even target: padding 1, output padding 1 gives `2 * in`;
    /// - factor 2, odd target: padding 0 gives `2 * in + 1`.
    #[must_use]
    pub fn for_level(factors: [usize; 2], target: [usize; 2]) -> Self {
        let mut geometry = Self {
            stride: [1, 1],
            padding: [1, 1],
            padding_out: [0, 0],
        };
        for axis in 0..2 {
            if factors[axis] == 2 {
                geometry.stride[axis] = 2;
                if target[axis] % 2 == 0 {
                    geometry.padding_out[axis] = 1;
                } else {
                    geometry.padding[axis] = 0;
                }
            }
        }
        geometry
    }

    /// Output extent produced from an input extent.
    #[must_use]
    pub fn output_size(&self, input: [usize; 2]) -> [usize; 2] {
        let mut output = [0; 2];
        for axis in 0..2 {
            output[axis] = (input[axis] - 1) * self.stride[axis] + self.padding_out[axis] + 3
                - 2 * self.padding[axis];
        }
        output
    }
}

/// Shape bookkeeping of one encoder level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelPlan {
    /// Spatial size of the level's feature maps (and of its skip tensor).
    pub size: [usize; 2],
    /// Pooling factors leaving the level.
    pub factors: [usize; 2],
    /// Whether the level fuses a pyramid copy of the input.
    pub pyramid: bool,
}

impl LevelPlan {
    /// Spatial size after pooling.
    #[must_use]
    pub fn pooled_size(&self) -> [usize; 2] {
        [
            self.size[0] / self.factors[0],
            self.size[1] / self.factors[1],
        ]
    }

    /// Geometry of the decoder upsample returning to this level.
    #[must_use]
    pub fn upsample(&self) -> UpsampleGeometry {
        UpsampleGeometry::for_level(self.factors, self.size)
    }
}

/// Static shape plan of a whole network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPlan {
    /// Input channels.
    pub input_channels: usize,
    /// Output classes.
    pub num_classes: usize,
    /// One entry per encoder (non-bottleneck) level, finest first.
    pub levels: Vec<LevelPlan>,
    /// Spatial size at the bottleneck.
    pub bottleneck_size: [usize; 2],
}

impl NetworkPlan {
    /// Plans `encoder_levels` encoder stages for an input of size `spatial`.
    ///
    /// Level 0 always uses the plain threshold; later levels use the pyramid
    /// threshold when `input_pyramid` is set.
    #[must_use]
    pub fn new(
        spatial: [usize; 2],
        input_channels: usize,
        num_classes: usize,
        encoder_levels: usize,
        input_pyramid: bool,
    ) -> Self {
        let mut levels = Vec::with_capacity(encoder_levels);
        let mut size = spatial;
        for level in 0..encoder_levels {
            let pyramid = input_pyramid && level > 0;
            let threshold = if pyramid {
                PYRAMID_POOL_THRESHOLD
            } else {
                PLAIN_POOL_THRESHOLD
            };
            let plan = LevelPlan {
                size,
                factors: pool_factors(size, threshold),
                pyramid,
            };
            size = plan.pooled_size();
            levels.push(plan);
        }

        Self {
            input_channels,
            num_classes,
            levels,
            bottleneck_size: size,
        }
    }

    /// Spatial sizes of the decoder outputs in decoding order (coarse to fine).
    #[must_use]
    pub fn decoder_sizes(&self) -> Vec<[usize; 2]> {
        self.levels.iter().rev().map(|level| level.size).collect()
    }
}
