//! Backend selection by cargo feature.
//!
//! `cuda` wins over `wgpu`; without either the CPU `ndarray` backend is used.

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "cuda")] {
        /// Backend the tools run on.
        pub type SelectedBackend = burn::backend::Cuda;
        /// Name of [`SelectedBackend`] for log messages.
        pub const BACKEND_NAME: &str = "CUDA (NVIDIA GPU)";
    } else if #[cfg(feature = "wgpu")] {
        /// Backend the tools run on.
        pub type SelectedBackend = burn::backend::Wgpu;
        /// Name of [`SelectedBackend`] for log messages.
        pub const BACKEND_NAME: &str = "WGPU (GPU)";
    } else {
        /// Backend the tools run on.
        pub type SelectedBackend = burn::backend::NdArray;
        /// Name of [`SelectedBackend`] for log messages.
        pub const BACKEND_NAME: &str = "NdArray (CPU)";
    }
}

/// Device type of [`SelectedBackend`].
pub type SelectedDevice = burn::tensor::Device<SelectedBackend>;

/// The default device of the selected backend.
pub fn create_device() -> SelectedDevice {
    SelectedDevice::default()
}
