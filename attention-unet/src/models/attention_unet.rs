//! # Attention U-Net
//!
//! The network builder. `AttentionUNetConfig::init` validates the
//! configuration, plans the spatial size of every level and allocates the
//! stages; `AttentionUNet::forward` runs
//!
//! ```text
//! input -> encoder x (L-1) -> bottleneck -> decoder x (L-1) -> softmax head(s)
//! ```
//!
//! where `L` is the length of the channel schedule. Skip connections flow from
//! every encoder stage to the decoder stage of the same resolution.

use burn::{
    module::Ignored,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AvgPool2d, AvgPool2dConfig},
    },
    prelude::*,
    tensor::activation::softmax,
};

use super::{
    plan::NetworkPlan, ConvBlock, ConvBlockConfig, DecoderBlock, DecoderBlockConfig, EncoderBlock,
    EncoderBlockConfig,
};
use crate::{
    config::AttentionUNetConfig,
    error::{AttentionUNetError, AttentionUNetResult},
};

/// Skip-connection tensors ordered deepest first.
///
/// Index 0 is the bottleneck feature map; index `i + 1` is the skip tensor of
/// decoder stage `i`, so increasing indices are shallower, higher-resolution
/// feature maps. The encoder builds the list by prepending.
#[derive(Debug, Clone)]
pub struct SkipConnections<B: Backend> {
    features: Vec<Tensor<B, 4>>,
}

impl<B: Backend> SkipConnections<B> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            features: Vec::with_capacity(capacity),
        }
    }

    /// Inserts a deeper feature map in front of all present ones.
    fn prepend(&mut self, feature: Tensor<B, 4>) {
        self.features.insert(0, feature);
    }

    /// Number of stored feature maps.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether no feature map is stored.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// The bottleneck feature map.
    pub fn bottleneck(&self) -> Option<&Tensor<B, 4>> {
        self.features.first()
    }

    /// The feature map at `index`, 0 being the bottleneck.
    pub fn get(&self, index: usize) -> Option<&Tensor<B, 4>> {
        self.features.get(index)
    }

    /// Iterates deepest first.
    pub fn iter(&self) -> impl Iterator<Item = &Tensor<B, 4>> {
        self.features.iter()
    }

    fn into_inner(self) -> Vec<Tensor<B, 4>> {
        self.features
    }
}

/// Output of an [`AttentionUNet`] forward pass.
///
/// Every tensor holds per-pixel class probabilities of shape
/// `[batch_size, num_classes, height, width]`.
#[derive(Debug, Clone)]
pub enum SegmentationOutput<B: Backend> {
    /// The single full-resolution prediction.
    Single(Tensor<B, 4>),
    /// One prediction per decoder resolution, finest first.
    DeepSupervision(Vec<Tensor<B, 4>>),
}

impl<B: Backend> SegmentationOutput<B> {
    /// Number of output tensors.
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::DeepSupervision(outputs) => outputs.len(),
        }
    }

    /// Whether there is no output tensor.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The full-resolution prediction.
    pub fn finest(&self) -> Option<&Tensor<B, 4>> {
        match self {
            Self::Single(output) => Some(output),
            Self::DeepSupervision(outputs) => outputs.first(),
        }
    }

    /// All predictions, finest first.
    pub fn into_vec(self) -> Vec<Tensor<B, 4>> {
        match self {
            Self::Single(output) => vec![output],
            Self::DeepSupervision(outputs) => outputs,
        }
    }
}

impl AttentionUNetConfig {
    /// Initializes an `AttentionUNet` model with this configuration.
    ///
    /// # Arguments
    ///
    /// * `device` - The device to create the model on.
    ///
    /// # Errors
    ///
    /// Returns `Err(AttentionUNetError::InvalidConfiguration)` if the
    /// configuration is invalid.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> AttentionUNetResult<AttentionUNet<B>> {
        self.validate()?;
        let input = self.resolved_input_shape()?;
        let schedule = &self.channel_schedule;
        let encoder_levels = schedule.len() - 1;

        let plan = NetworkPlan::new(
            input.spatial(),
            input.channels,
            self.num_classes,
            encoder_levels,
            self.input_pyramid,
        );
        tracing::debug!(
            levels = schedule.len(),
            bottleneck = ?plan.bottleneck_size,
            pyramid = self.input_pyramid,
            deep_supervision = self.deep_supervision,
            "planned attention U-Net"
        );

        let encoders = plan
            .levels
            .iter()
            .enumerate()
            .map(|(level, level_plan)| {
                let in_channels = if level == 0 {
                    input.channels
                } else {
                    schedule[level - 1]
                };
                EncoderBlockConfig::new(in_channels, schedule[level])
                    .with_pool(level_plan.factors)
                    .with_pyramid_channels(level_plan.pyramid.then_some(input.channels))
                    .with_normalization(self.encoder_normalization())
                    .with_dropout(self.encoder_dropout)
                    .init(device)
            })
            .collect();

        // Copy `k + 1` is copy `k` pooled by level `k`'s factors; the deepest
        // encoder level needs no pool after it.
        let pyramid_pools = if self.input_pyramid {
            plan.levels[..encoder_levels - 1]
                .iter()
                .map(|level_plan| {
                    AvgPool2dConfig::new(level_plan.factors)
                        .with_strides(level_plan.factors)
                        .init()
                })
                .collect()
        } else {
            Vec::new()
        };

        let bottleneck =
            ConvBlockConfig::new(schedule[encoder_levels - 1], schedule[encoder_levels])
                .with_normalization(self.encoder_normalization())
                .with_dropout(self.encoder_dropout)
                .init(device);

        // Decoder stage i returns to encoder level `encoder_levels - 1 - i`.
        let decoders = (0..encoder_levels)
            .map(|stage| {
                let level = encoder_levels - 1 - stage;
                DecoderBlockConfig::new(schedule[level + 1], schedule[level], schedule[level])
                    .with_geometry(plan.levels[level].upsample())
                    .with_gating(self.gating.clone())
                    .with_normalization(self.decoder_normalization())
                    .with_gate_normalization(self.gate_normalization())
                    .with_dropout(self.decoder_dropout)
                    .with_self_attention(self.self_attention)
                    .init(device)
            })
            .collect();

        let head =
            |channels: usize| Conv2dConfig::new([channels, self.num_classes], [1, 1]).init(device);
        let heads = if self.deep_supervision {
            self.decoder_channels().into_iter().map(head).collect()
        } else {
            vec![head(schedule[0])]
        };

        Ok(AttentionUNet {
            encoders,
            pyramid_pools,
            bottleneck,
            decoders,
            heads,
            input_pyramid: self.input_pyramid,
            deep_supervision: self.deep_supervision,
            plan: Ignored(plan),
        })
    }
}

/// The attention-gated U-Net.
#[derive(Module, Debug)]
pub struct AttentionUNet<B: Backend> {
    /// Encoder stages, finest first.
    encoders: Vec<EncoderBlock<B>>,
    /// Average pools between consecutive pyramid copies.
    pyramid_pools: Vec<AvgPool2d>,
    /// The convolution block at the bottleneck.
    bottleneck: ConvBlock<B>,
    /// Decoder stages, coarsest first.
    decoders: Vec<DecoderBlock<B>>,
    /// Classification heads in decoding order: one per decoder stage under
    /// deep supervision, otherwise a single head.
    heads: Vec<Conv2d<B>>,
    input_pyramid: bool,
    deep_supervision: bool,
    plan: Ignored<NetworkPlan>,
}

impl<B: Backend> AttentionUNet<B> {
    /// The static shape plan the model was built with.
    pub fn plan(&self) -> &NetworkPlan {
        &self.plan
    }

    /// Expected input shape `[channels, height, width]` (without the batch axis).
    pub fn input_shape(&self) -> [usize; 3] {
        let [height, width] = self.plan.levels[0].size;
        [self.plan.input_channels, height, width]
    }

    /// Output shapes `[num_classes, height, width]`, in the order of
    /// [`SegmentationOutput::into_vec`].
    pub fn output_shapes(&self) -> Vec<[usize; 3]> {
        let sizes = self.plan.decoder_sizes();
        let sizes = if self.deep_supervision {
            sizes.into_iter().rev().collect()
        } else {
            sizes.last().copied().into_iter().collect::<Vec<_>>()
        };
        sizes
            .into_iter()
            .map(|[height, width]| [self.plan.num_classes, height, width])
            .collect()
    }

    /// Builds the input pyramid, indexed by encoder level: copy 0 is `x`
    /// itself and copy `k` has the resolution of level `k`.
    ///
    /// Returns an empty list when the model was built without pyramid input.
    pub fn input_pyramid(&self, x: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        if !self.input_pyramid {
            return Vec::new();
        }

        let mut copies = Vec::with_capacity(self.pyramid_pools.len() + 1);
        let mut current = x;
        for pool in &self.pyramid_pools {
            let pooled = pool.forward(current.clone());
            copies.push(current);
            current = pooled;
        }
        copies.push(current);
        copies
    }

    /// Runs the encoder and the bottleneck.
    ///
    /// # Shapes
    /// - x: `[batch_size, channels, height, width]`
    ///
    /// # Returns
    ///
    /// One skip tensor per resolution level, bottleneck first.
    ///
    /// # Errors
    ///
    /// Returns `Err(AttentionUNetError::InvalidTensorShape)` if `x` does not
    /// match the configured input shape.
    pub fn forward_encoder(&self, x: Tensor<B, 4>) -> AttentionUNetResult<SkipConnections<B>> {
        self.check_input(&x)?;

        let pyramid = self.input_pyramid(x.clone());
        let mut skips = SkipConnections::with_capacity(self.encoders.len() + 1);

        let mut x = x;
        for (level, encoder) in self.encoders.iter().enumerate() {
            let pyramid_input = if encoder.is_pyramid() {
                pyramid.get(level).cloned()
            } else {
                None
            };
            let (down, skip) = encoder.forward(x, pyramid_input);
            skips.prepend(skip);
            x = down;
        }

        skips.prepend(self.bottleneck.forward(x));

        Ok(skips)
    }

    /// Performs the forward pass.
    ///
    /// # Shapes
    /// - x: `[batch_size, channels, height, width]`
    ///
    /// # Errors
    ///
    /// Returns `Err(AttentionUNetError::InvalidTensorShape)` if `x` does not
    /// match the configured input shape.
    pub fn forward(&self, x: Tensor<B, 4>) -> AttentionUNetResult<SegmentationOutput<B>> {
        let mut skips = self.forward_encoder(x)?.into_inner().into_iter();
        let mut x = skips.next().ok_or_else(|| AttentionUNetError::InvalidTensorShape {
            expected: "a bottleneck feature map".to_string(),
            actual: "no encoder output".to_string(),
        })?;

        let mut decoded = Vec::with_capacity(self.decoders.len());
        for (decoder, skip) in self.decoders.iter().zip(skips) {
            x = decoder.forward(x, skip);
            decoded.push(x.clone());
        }

        // Deep supervision classifies every decoder output, otherwise only the last.
        let features = if self.deep_supervision {
            decoded
        } else {
            vec![x]
        };
        let mut outputs: Vec<_> = self
            .heads
            .iter()
            .zip(features)
            .map(|(head, features)| softmax(head.forward(features), 1))
            .collect();
        outputs.reverse();

        if self.deep_supervision {
            Ok(SegmentationOutput::DeepSupervision(outputs))
        } else {
            outputs
                .pop()
                .map(SegmentationOutput::Single)
                .ok_or_else(|| AttentionUNetError::InvalidTensorShape {
                    expected: "one classification head".to_string(),
                    actual: "no head".to_string(),
                })
        }
    }

    fn check_input(&self, x: &Tensor<B, 4>) -> AttentionUNetResult<()> {
        let [_, channels, height, width] = x.dims();
        let expected = self.input_shape();
        if [channels, height, width] != expected {
            return Err(AttentionUNetError::InvalidTensorShape {
                expected: format!("[batch, {}, {}, {}]", expected[0], expected[1], expected[2]),
                actual: format!("{:?}", x.dims()),
            });
        }
        Ok(())
    }
}
