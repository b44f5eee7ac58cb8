//! Backend type aliases and device management
//!
//! This module provides convenient type aliases for the Burn backends used in
//! training and inference, as well as helper functions for device management.
//!
//! # Backend Selection
//!
//! - **TrainingBackend**: Autodiff-enabled NdArray backend for training (CPU)
//! - **InferenceBackend**: Plain NdArray backend for inference (CPU)
//!
//! The Q-networks are small (a 12x12 grid or 13 features in, 4 actions out), so
//! the CPU NdArray backend is enough for both.
//!
//! # Example
//!
//! ```rust
//! use snake_dqn::rl::{MlpQNetworkConfig, TrainingBackend, default_device};
//!
//! let device = default_device();
//! let network = MlpQNetworkConfig::new(13).init::<TrainingBackend>(&device);
//! ```

use burn::backend::{
    Autodiff,
    ndarray::{NdArray, NdArrayDevice},
};

/// Backend type for training (with autodiff)
///
/// The online Q-network lives here. The target network lives on its inner
/// backend and never records gradients.
pub type TrainingBackend = Autodiff<NdArray<f32>>;

/// Backend type for inference (without autodiff)
///
/// Used by the viewer and the evaluator, which only run forward passes.
pub type InferenceBackend = NdArray<f32>;

/// Get the default device for computation
///
/// The NdArray CPU device.
pub fn default_device() -> NdArrayDevice {
    NdArrayDevice::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    use burn::tensor::Tensor;

    #[test]
    fn test_default_device_is_stable() {
        assert_eq!(default_device(), default_device());
    }

    #[test]
    fn test_inner_backend_matches_inference_backend() {
        let device = default_device();
        let tensor = Tensor::<TrainingBackend, 1>::from_floats([1.0, 2.0], &device);
        let inner: Tensor<InferenceBackend, 1> = tensor.inner();
        assert_eq!(inner.into_data().iter::<f32>().collect::<Vec<_>>(), vec![1.0, 2.0]);
    }
}
