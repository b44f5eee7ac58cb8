//! Deep Q-learning for the Snake game
//!
//! Provides:
//! - Named environment registry (`SnakeDir-v0`, `Snake-Vanilla`)
//! - Grid and feature observations over flat `f32` vectors
//! - Convolutional and MLP Q-networks on Burn
//! - Replay buffer, ε-greedy exploration and the DQN agent
//! - Model persistence with training metadata

pub mod backend;
pub mod buffer;
pub mod config;
pub mod dqn;
pub mod environment;
pub mod exploration;
pub mod network;
pub mod observation;
pub mod persistence;
pub mod registry;

pub use backend::{InferenceBackend, TrainingBackend, default_device};
pub use buffer::{Batch, ReplayBuffer, Transition};
pub use config::{ConfigError, DqnConfig, ExplorationConfig, TargetUpdate};
pub use dqn::DqnAgent;
pub use environment::{SnakeEnv, StepInfo, StepOutcome};
pub use exploration::EpsilonGreedy;
pub use network::{
    ConvQNetwork, ConvQNetworkConfig, MlpQNetwork, MlpQNetworkConfig, NetworkArchitecture,
    QFunction, QNetwork, argmax_rows,
};
pub use observation::{FEATURE_DIM, GRID_CHANNELS, ObservationKind};
pub use persistence::{ModelMetadata, load_metadata, load_network, load_weights, save_model};
pub use registry::{EnvConfig, EnvError, EnvRegistry, EnvSpec, SNAKE_DIR_V0, SNAKE_VANILLA};
