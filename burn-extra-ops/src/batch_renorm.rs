//! # Batch Renormalization
//!
//! Batch renormalization (Ioffe, 2017) keeps training-time activations close to
//! the ones produced with the moving statistics used at inference. The batch
//! normalized activations are corrected by
//!
//! ```text
//! r = clamp(sigma_B / sigma, 1 / r_max, r_max)
//! d = clamp((mu_B - mu) / sigma, -d_max, d_max)
//! y = gamma * ((x - mu_B) / sigma_B * r + d) + beta
//! ```
//!
//! where `r` and `d` are treated as constants for the gradient. With small
//! batches the per-batch statistics are noisy; the correction bounds how far
//! they can pull the output away from the running estimates.

use burn::{
    module::{Param, RunningState},
    nn::Initializer,
    prelude::*,
};

/// Configuration for the [`BatchRenorm`] module.
#[derive(Config, Debug)]
pub struct BatchRenormConfig {
    /// The number of features (channels).
    pub num_features: usize,
    /// A value required for numerical stability.
    #[config(default = 1e-3)]
    pub epsilon: f64,
    /// Momentum used to update the running statistics.
    #[config(default = 0.1)]
    pub momentum: f64,
    /// Upper bound of the `r` correction (lower bound is its inverse).
    #[config(default = 3.0)]
    pub r_max: f64,
    /// Bound of the `d` correction.
    #[config(default = 5.0)]
    pub d_max: f64,
}

impl BatchRenormConfig {
    /// Initializes a new [`BatchRenorm`] module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> BatchRenorm<B> {
        assert!(
            self.r_max >= 1.0,
            "r_max must be >= 1, got {}",
            self.r_max
        );
        assert!(self.d_max >= 0.0, "d_max must be >= 0, got {}", self.d_max);

        let gamma = Initializer::Ones.init([self.num_features], device);
        let beta = Initializer::Zeros.init([self.num_features], device);

        let running_mean = Tensor::zeros([self.num_features], device);
        let running_var = Tensor::ones([self.num_features], device);

        BatchRenorm {
            gamma,
            beta,
            running_mean: RunningState::new(running_mean),
            running_var: RunningState::new(running_var),
            momentum: self.momentum,
            epsilon: self.epsilon,
            r_max: self.r_max,
            d_max: self.d_max,
        }
    }
}

/// Batch renormalization over the channel axis of `[batch, channels, height, width]` tensors.
#[derive(Module, Debug)]
pub struct BatchRenorm<B: Backend> {
    /// Scale.
    pub gamma: Param<Tensor<B, 1>>,
    /// Shift.
    pub beta: Param<Tensor<B, 1>>,
    /// Moving mean.
    pub running_mean: RunningState<Tensor<B, 1>>,
    /// Moving variance.
    pub running_var: RunningState<Tensor<B, 1>>,
    momentum: f64,
    epsilon: f64,
    r_max: f64,
    d_max: f64,
}

impl<B: Backend> BatchRenorm<B> {
    /// Applies batch renormalization.
    ///
    /// Batch statistics (with the renorm correction) are used on autodiff
    /// backends, the running statistics otherwise.
    ///
    /// # Shapes
    /// - input: `[batch_size, channels, height, width]`
    /// - output: `[batch_size, channels, height, width]`
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        if B::ad_enabled() {
            self.forward_train(input)
        } else {
            self.forward_inference(input)
        }
    }

    fn forward_inference(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let [_, channels, _, _] = input.dims();
        let mean = self.running_mean.value().reshape([1, channels, 1, 1]);
        let std = self
            .running_var
            .value()
            .add_scalar(self.epsilon)
            .sqrt()
            .reshape([1, channels, 1, 1]);

        self.scale_and_shift((input - mean) / std, channels)
    }

    fn forward_train(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch_size, channels, height, width] = input.dims();

        let flat = input
            .clone()
            .swap_dims(0, 1)
            .reshape([channels, batch_size * height * width]);
        let batch_mean = flat.clone().mean_dim(1).reshape([channels]);
        let batch_var = (flat - batch_mean.clone().reshape([channels, 1]))
            .powf_scalar(2.0)
            .mean_dim(1)
            .reshape([channels]);
        let batch_std = batch_var.clone().add_scalar(self.epsilon).sqrt();

        let running_mean = self.running_mean.value_sync();
        let running_var = self.running_var.value_sync();
        let running_std = running_var.clone().add_scalar(self.epsilon).sqrt();

        let r = (batch_std.clone() / running_std.clone())
            .clamp(1.0 / self.r_max, self.r_max)
            .detach();
        let d = ((batch_mean.clone() - running_mean.clone()) / running_std)
            .clamp(-self.d_max, self.d_max)
            .detach();

        let normalized = (input - batch_mean.clone().reshape([1, channels, 1, 1]))
            / batch_std.reshape([1, channels, 1, 1]);
        let normalized = normalized * r.reshape([1, channels, 1, 1]) + d.reshape([1, channels, 1, 1]);

        let momentum = self.momentum;
        let running_mean =
            running_mean.mul_scalar(1.0 - momentum) + batch_mean.detach().mul_scalar(momentum);
        let running_var =
            running_var.mul_scalar(1.0 - momentum) + batch_var.detach().mul_scalar(momentum);
        self.running_mean.update(running_mean.detach());
        self.running_var.update(running_var.detach());

        self.scale_and_shift(normalized, channels)
    }

    fn scale_and_shift(&self, normalized: Tensor<B, 4>, channels: usize) -> Tensor<B, 4> {
        let gamma = self.gamma.val().reshape([1, channels, 1, 1]);
        let beta = self.beta.val().reshape([1, channels, 1, 1]);

        normalized * gamma + beta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{ndarray::NdArray, Autodiff},
        tensor::{Distribution, Tolerance},
    };

    type InferenceBackend = NdArray;
    type TrainingBackend = Autodiff<NdArray>;

    #[test]
    fn inference_uses_running_statistics() {
        let device = Default::default();
        let norm = BatchRenormConfig::new(3)
            .with_epsilon(0.0)
            .init::<InferenceBackend>(&device);
        let x = Tensor::<InferenceBackend, 4>::random(
            [2, 3, 4, 4],
            Distribution::Normal(0.0, 1.0),
            &device,
        );

        // Fresh running statistics are mean 0 and variance 1.
        let output = norm.forward(x.clone());

        output
            .into_data()
            .assert_approx_eq::<f32>(&x.into_data(), Tolerance::default());
    }

    #[test]
    fn training_shift_matches_batch_mean_at_init() {
        let device = Default::default();
        let norm = BatchRenormConfig::new(2)
            .with_epsilon(0.0)
            .init::<TrainingBackend>(&device);
        let x = Tensor::<TrainingBackend, 4>::random(
            [4, 2, 3, 3],
            Distribution::Normal(0.5, 0.2),
            &device,
        );
        let input_mean = x.clone().swap_dims(0, 1).reshape([2, 36]).mean_dim(1);

        let output = norm.forward(x);
        let output_mean = output.swap_dims(0, 1).reshape([2, 36]).mean_dim(1);

        // Running statistics start at (0, 1), so the renorm shift `d` is the
        // batch mean itself while the normalized term averages to zero.
        let max_gap = (output_mean - input_mean).abs().max().into_scalar();
        assert!(max_gap < 1e-4);
    }

    #[test]
    fn training_updates_running_statistics() {
        let device = Default::default();
        let norm = BatchRenormConfig::new(1)
            .with_momentum(0.5)
            .init::<TrainingBackend>(&device);
        let x = Tensor::<TrainingBackend, 4>::full([2, 1, 2, 2], 4.0, &device);

        let _ = norm.forward(x);

        let running_mean = norm.running_mean.value().into_scalar();
        let running_var = norm.running_var.value().into_scalar();
        assert!((running_mean - 2.0).abs() < 1e-5);
        assert!((running_var - 0.5).abs() < 1e-5);
    }

    #[test]
    #[should_panic(expected = "r_max must be >= 1")]
    fn rejects_r_max_below_one() {
        let device = Default::default();
        let _ = BatchRenormConfig::new(1)
            .with_r_max(0.5)
            .init::<InferenceBackend>(&device);
    }
}
