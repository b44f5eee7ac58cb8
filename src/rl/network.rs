//! Q-networks for the Snake DQN agent
//!
//! Two architectures map a flat observation batch `[batch, obs_dim]` to one Q
//! value per action `[batch, num_actions]`:
//!
//! ```text
//! ConvQNetwork (grid observations)
//!   reshape [batch, 4, H, W]
//!   ↓ Conv2d(4→64, k=3, p=1) + ReLU
//!   ↓ Conv2d(64→1, k=1) + ReLU
//!   ↓ Flatten: [batch, H*W]
//!   ↓ Linear(H*W → 64) + ReLU
//!   ↓ Linear(64 → 4)
//!
//! MlpQNetwork (feature observations)
//!   ↓ Linear(13 → 128) + ReLU
//!   ↓ Linear(128 → 128) + ReLU
//!   ↓ Linear(128 → 4)
//! ```
//!
//! Outputs are raw Q values with no final activation.
//!
//! # Example
//!
//! ```rust
//! use snake_dqn::rl::{ConvQNetworkConfig, QFunction};
//! use burn::backend::ndarray::NdArrayDevice;
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//!
//! type Backend = NdArray<f32>;
//!
//! let device = NdArrayDevice::default();
//! let network = ConvQNetworkConfig::new(12, 12).init::<Backend>(&device);
//!
//! let observations = Tensor::zeros([8, 4 * 12 * 12], &device);
//! assert_eq!(network.q_values(observations).dims(), [8, 4]);
//! ```

use burn::{
    module::{Module, Param},
    nn::{
        Linear, LinearConfig, PaddingConfig2d,
        conv::{Conv2d, Conv2dConfig},
    },
    tensor::{Tensor, activation::relu, backend::Backend},
};
use serde::{Deserialize, Serialize};

use super::observation::{FEATURE_DIM, GRID_CHANNELS, ObservationKind};

/// A network that scores every discrete action for a batch of observations
pub trait QFunction<B: Backend>: Module<B> {
    /// `[batch, obs_dim]` → `[batch, num_actions]`
    fn q_values(&self, observations: Tensor<B, 2>) -> Tensor<B, 2>;

    /// θ' ← τθ + (1 − τ)θ', where `self` is θ' and `source` is θ
    fn soft_update(self, source: &Self, tau: f32) -> Self;
}

/// Configuration for [`ConvQNetwork`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvQNetworkConfig {
    pub grid_width: usize,
    pub grid_height: usize,
    pub num_actions: usize,
    /// Channels of the 3x3 convolution (default: 64)
    pub conv_channels: usize,
    /// Width of the dense layer after flattening (default: 64)
    pub hidden_dim: usize,
}

impl ConvQNetworkConfig {
    pub fn new(grid_width: usize, grid_height: usize) -> Self {
        Self {
            grid_width,
            grid_height,
            num_actions: 4,
            conv_channels: 64,
            hidden_dim: 64,
        }
    }

    pub fn with_hidden_dim(mut self, hidden_dim: usize) -> Self {
        self.hidden_dim = hidden_dim;
        self
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvQNetwork<B> {
        ConvQNetwork {
            conv1: Conv2dConfig::new([GRID_CHANNELS, self.conv_channels], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device),
            conv2: Conv2dConfig::new([self.conv_channels, 1], [1, 1]).init(device),
            fc1: LinearConfig::new(self.grid_width * self.grid_height, self.hidden_dim)
                .init(device),
            fc2: LinearConfig::new(self.hidden_dim, self.num_actions).init(device),
            grid_width: self.grid_width,
            grid_height: self.grid_height,
        }
    }
}

/// Convolutional Q-network over 4-channel grid observations
#[derive(Module, Debug)]
pub struct ConvQNetwork<B: Backend> {
    conv1: Conv2d<B>,
    /// 1x1 convolution collapsing to a single plane
    conv2: Conv2d<B>,
    fc1: Linear<B>,
    fc2: Linear<B>,
    grid_width: usize,
    grid_height: usize,
}

impl<B: Backend> ConvQNetwork<B> {
    /// Forward pass on observations already shaped `[batch, 4, H, W]`
    pub fn forward(&self, observation: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = relu(self.conv1.forward(observation));
        let x = relu(self.conv2.forward(x));

        let [batch_size, channels, height, width] = x.dims();
        let x = x.reshape([batch_size, channels * height * width]);

        let x = relu(self.fc1.forward(x));
        self.fc2.forward(x)
    }
}

impl<B: Backend> QFunction<B> for ConvQNetwork<B> {
    fn q_values(&self, observations: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch_size, _] = observations.dims();
        let grid = observations.reshape([
            batch_size,
            GRID_CHANNELS,
            self.grid_height,
            self.grid_width,
        ]);
        self.forward(grid)
    }

    fn soft_update(mut self, source: &Self, tau: f32) -> Self {
        self.conv1 = soft_update_conv2d(self.conv1, &source.conv1, tau);
        self.conv2 = soft_update_conv2d(self.conv2, &source.conv2, tau);
        self.fc1 = soft_update_linear(self.fc1, &source.fc1, tau);
        self.fc2 = soft_update_linear(self.fc2, &source.fc2, tau);
        self
    }
}

/// Configuration for [`MlpQNetwork`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpQNetworkConfig {
    pub input_dim: usize,
    pub num_actions: usize,
    /// Width of both hidden layers (default: 128)
    pub hidden_dim: usize,
}

impl MlpQNetworkConfig {
    pub fn new(input_dim: usize) -> Self {
        Self {
            input_dim,
            num_actions: 4,
            hidden_dim: 128,
        }
    }

    pub fn with_hidden_dim(mut self, hidden_dim: usize) -> Self {
        self.hidden_dim = hidden_dim;
        self
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> MlpQNetwork<B> {
        MlpQNetwork {
            fc1: LinearConfig::new(self.input_dim, self.hidden_dim).init(device),
            fc2: LinearConfig::new(self.hidden_dim, self.hidden_dim).init(device),
            fc3: LinearConfig::new(self.hidden_dim, self.num_actions).init(device),
        }
    }
}

/// Fully connected Q-network over feature observations
#[derive(Module, Debug)]
pub struct MlpQNetwork<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
}

impl<B: Backend> QFunction<B> for MlpQNetwork<B> {
    fn q_values(&self, observations: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = relu(self.fc1.forward(observations));
        let x = relu(self.fc2.forward(x));
        self.fc3.forward(x)
    }

    fn soft_update(mut self, source: &Self, tau: f32) -> Self {
        self.fc1 = soft_update_linear(self.fc1, &source.fc1, tau);
        self.fc2 = soft_update_linear(self.fc2, &source.fc2, tau);
        self.fc3 = soft_update_linear(self.fc3, &source.fc3, tau);
        self
    }
}

/// Which network a model uses, stored alongside saved weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NetworkArchitecture {
    Conv(ConvQNetworkConfig),
    Mlp(MlpQNetworkConfig),
}

impl NetworkArchitecture {
    /// The architecture matching an observation encoding
    ///
    /// `hidden_dim` overrides the default layer width when set.
    pub fn for_observation(
        kind: ObservationKind,
        grid_width: usize,
        grid_height: usize,
        num_actions: usize,
        hidden_dim: Option<usize>,
    ) -> Self {
        match kind {
            ObservationKind::Grid => {
                let mut config = ConvQNetworkConfig::new(grid_width, grid_height);
                config.num_actions = num_actions;
                if let Some(hidden_dim) = hidden_dim {
                    config = config.with_hidden_dim(hidden_dim);
                }
                NetworkArchitecture::Conv(config)
            }
            ObservationKind::Features => {
                let mut config = MlpQNetworkConfig::new(FEATURE_DIM);
                config.num_actions = num_actions;
                if let Some(hidden_dim) = hidden_dim {
                    config = config.with_hidden_dim(hidden_dim);
                }
                NetworkArchitecture::Mlp(config)
            }
        }
    }

    pub fn num_actions(&self) -> usize {
        match self {
            NetworkArchitecture::Conv(config) => config.num_actions,
            NetworkArchitecture::Mlp(config) => config.num_actions,
        }
    }

    pub fn hidden_dim(&self) -> usize {
        match self {
            NetworkArchitecture::Conv(config) => config.hidden_dim,
            NetworkArchitecture::Mlp(config) => config.hidden_dim,
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> QNetwork<B> {
        match self {
            NetworkArchitecture::Conv(config) => QNetwork::Conv(config.init(device)),
            NetworkArchitecture::Mlp(config) => QNetwork::Mlp(config.init(device)),
        }
    }
}

/// A loaded network of either architecture, used for inference
#[derive(Debug, Clone)]
pub enum QNetwork<B: Backend> {
    Conv(ConvQNetwork<B>),
    Mlp(MlpQNetwork<B>),
}

impl<B: Backend> QNetwork<B> {
    pub fn q_values(&self, observations: Tensor<B, 2>) -> Tensor<B, 2> {
        match self {
            QNetwork::Conv(network) => network.q_values(observations),
            QNetwork::Mlp(network) => network.q_values(observations),
        }
    }

    /// Best action for a single observation
    pub fn greedy_action(&self, observation: &[f32], device: &B::Device) -> usize {
        let input = Tensor::<B, 1>::from_floats(observation, device).unsqueeze::<2>();
        argmax_rows(self.q_values(input))
            .first()
            .copied()
            .unwrap_or(0)
    }
}

/// Index of the largest value in every row of a `[rows, cols]` tensor
///
/// Ties resolve to the lowest index.
pub fn argmax_rows<B: Backend>(values: Tensor<B, 2>) -> Vec<usize> {
    let [_, cols] = values.dims();
    let data: Vec<f32> = values.into_data().iter::<f32>().collect();

    data.chunks(cols.max(1))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (idx, &value)| {
                    if value > best.1 { (idx, value) } else { best }
                })
                .0
        })
        .collect()
}

fn blend<B: Backend, const D: usize>(
    target: Param<Tensor<B, D>>,
    source: &Param<Tensor<B, D>>,
    tau: f32,
) -> Param<Tensor<B, D>> {
    let mixed = source.val().mul_scalar(tau) + target.val().mul_scalar(1.0 - tau);
    Param::from_tensor(mixed)
}

fn blend_bias<B: Backend>(
    target: Option<Param<Tensor<B, 1>>>,
    source: &Option<Param<Tensor<B, 1>>>,
    tau: f32,
) -> Option<Param<Tensor<B, 1>>> {
    match (target, source) {
        (Some(target), Some(source)) => Some(blend(target, source, tau)),
        (target, _) => target,
    }
}

pub(crate) fn soft_update_linear<B: Backend>(
    mut target: Linear<B>,
    source: &Linear<B>,
    tau: f32,
) -> Linear<B> {
    target.weight = blend(target.weight, &source.weight, tau);
    target.bias = blend_bias(target.bias, &source.bias, tau);
    target
}

pub(crate) fn soft_update_conv2d<B: Backend>(
    mut target: Conv2d<B>,
    source: &Conv2d<B>,
    tau: f32,
) -> Conv2d<B> {
    target.weight = blend(target.weight, &source.weight, tau);
    target.bias = blend_bias(target.bias, &source.bias, tau);
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::tensor::{Distribution, TensorData};

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    fn to_vec(tensor: Tensor<TestBackend, 2>) -> Vec<f32> {
        tensor.into_data().iter::<f32>().collect()
    }

    fn assert_close(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-5, "{x} != {y}");
        }
    }

    #[test]
    fn test_conv_q_values_shape() {
        let device = NdArrayDevice::default();
        let network = ConvQNetworkConfig::new(12, 12).init::<TestBackend>(&device);

        for batch_size in [1, 4, 32] {
            let observations = Tensor::zeros([batch_size, 4 * 12 * 12], &device);
            assert_eq!(network.q_values(observations).dims(), [batch_size, 4]);
        }
    }

    #[test]
    fn test_conv_non_square_grid() {
        let device = NdArrayDevice::default();
        let network = ConvQNetworkConfig::new(8, 5).init::<TestBackend>(&device);
        let observations = Tensor::ones([2, 4 * 8 * 5], &device);
        assert_eq!(network.q_values(observations).dims(), [2, 4]);
    }

    #[test]
    fn test_mlp_q_values_shape() {
        let device = NdArrayDevice::default();
        let network = MlpQNetworkConfig::new(FEATURE_DIM).init::<TestBackend>(&device);
        let observations = Tensor::zeros([16, FEATURE_DIM], &device);
        assert_eq!(network.q_values(observations).dims(), [16, 4]);
    }

    #[test]
    fn test_gradient_flow() {
        let device = NdArrayDevice::default();
        let network = ConvQNetworkConfig::new(6, 6).init::<TestAutodiffBackend>(&device);

        let observations = Tensor::ones([1, 4 * 6 * 6], &device).require_grad();
        let loss = network.q_values(observations.clone()).sum();
        let gradients = loss.backward();

        assert!(
            observations.grad(&gradients).is_some(),
            "Gradients should flow back to the observation"
        );
    }

    #[test]
    fn test_soft_update_tau_one_copies_source() {
        let device = NdArrayDevice::default();
        let source = ConvQNetworkConfig::new(6, 6).init::<TestBackend>(&device);
        let target = ConvQNetworkConfig::new(6, 6).init::<TestBackend>(&device);

        let observations =
            Tensor::<TestBackend, 2>::random([3, 4 * 6 * 6], Distribution::Default, &device);
        let expected = to_vec(source.q_values(observations.clone()));
        assert_ne!(expected, to_vec(target.q_values(observations.clone())));

        let target = target.soft_update(&source, 1.0);
        assert_close(&to_vec(target.q_values(observations)), &expected);
    }

    #[test]
    fn test_soft_update_blends_weights() {
        let device = NdArrayDevice::default();
        let source = LinearConfig::new(2, 2).init::<TestBackend>(&device);
        let target = LinearConfig::new(2, 2).init::<TestBackend>(&device);

        let source_w: Vec<f32> = source.weight.val().into_data().iter::<f32>().collect();
        let target_w: Vec<f32> = target.weight.val().into_data().iter::<f32>().collect();

        let blended = soft_update_linear(target, &source, 0.25);
        let blended_w: Vec<f32> = blended.weight.val().into_data().iter::<f32>().collect();

        let expected: Vec<f32> = source_w
            .iter()
            .zip(&target_w)
            .map(|(s, t)| 0.25 * s + 0.75 * t)
            .collect();
        assert_close(&blended_w, &expected);
    }

    #[test]
    fn test_mlp_soft_update_tau_zero_keeps_target() {
        let device = NdArrayDevice::default();
        let source = MlpQNetworkConfig::new(FEATURE_DIM).init::<TestBackend>(&device);
        let target = MlpQNetworkConfig::new(FEATURE_DIM).init::<TestBackend>(&device);

        let observations = Tensor::<TestBackend, 2>::ones([2, FEATURE_DIM], &device);
        let before = to_vec(target.q_values(observations.clone()));
        let target = target.soft_update(&source, 0.0);
        assert_close(&to_vec(target.q_values(observations)), &before);
    }

    #[test]
    fn test_argmax_rows() {
        let device = NdArrayDevice::default();
        let values = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![0.1f32, 0.9, -1.0, 0.3, 5.0, 2.0, 2.0, 2.0], [2, 4]),
            &device,
        );
        assert_eq!(argmax_rows(values), vec![1, 0]);
    }

    #[test]
    fn test_architecture_for_observation() {
        let grid = NetworkArchitecture::for_observation(ObservationKind::Grid, 12, 12, 4, None);
        assert_eq!(grid, NetworkArchitecture::Conv(ConvQNetworkConfig::new(12, 12)));

        let features =
            NetworkArchitecture::for_observation(ObservationKind::Features, 20, 20, 4, Some(64));
        match features {
            NetworkArchitecture::Mlp(config) => {
                assert_eq!(config.input_dim, FEATURE_DIM);
                assert_eq!(config.hidden_dim, 64);
            }
            other => panic!("expected an MLP, got {other:?}"),
        }
    }

    #[test]
    fn test_architecture_json() {
        let arch = NetworkArchitecture::Mlp(MlpQNetworkConfig::new(FEATURE_DIM));
        let json = serde_json::to_string(&arch).unwrap();
        assert!(json.contains(r#""kind":"mlp""#));
        let parsed: NetworkArchitecture = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, arch);
    }

    #[test]
    fn test_qnetwork_greedy_action_in_range() {
        let device = NdArrayDevice::default();
        let network = NetworkArchitecture::for_observation(ObservationKind::Grid, 6, 6, 4, None)
            .init::<TestBackend>(&device);

        let action = network.greedy_action(&vec![0.5; 4 * 6 * 6], &device);
        assert!(action < 4);
    }
}
