//! DQN hyperparameter configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A hyperparameter outside its valid range
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("{0} must be at least 1")]
    Zero(&'static str),
    #[error("{0}")]
    Inconsistent(String),
}

impl ConfigError {
    pub(crate) fn out_of_range(
        field: &'static str,
        expected: &'static str,
        value: impl ToString,
    ) -> Self {
        Self::OutOfRange {
            field,
            expected,
            value: value.to_string(),
        }
    }
}

/// How the target network follows the online network
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetUpdate {
    /// Copy the online weights every `every` env steps
    Hard { every: usize },
    /// Every `every` env steps blend θ' ← τθ + (1 − τ)θ'
    Soft { every: usize, tau: f32 },
}

impl TargetUpdate {
    pub fn every(&self) -> usize {
        match *self {
            TargetUpdate::Hard { every } | TargetUpdate::Soft { every, .. } => every,
        }
    }
}

/// Epsilon-greedy schedule
///
/// ε starts at `start` and is multiplied by `decay` at the beginning of every
/// episode, never dropping below `min`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExplorationConfig {
    pub start: f32,
    pub decay: f32,
    pub min: f32,
}

impl ExplorationConfig {
    /// A schedule that never changes ε
    pub fn constant(epsilon: f32) -> Self {
        Self {
            start: epsilon,
            decay: 1.0,
            min: epsilon,
        }
    }
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            start: 0.99,
            decay: 0.9999,
            min: 0.1,
        }
    }
}

/// Configuration for the DQN agent
///
/// Defaults follow the directed-Snake experiment. [`DqnConfig::vanilla`] gives
/// the settings of the feature-based experiment.
///
/// # Example
///
/// ```rust
/// use snake_dqn::rl::DqnConfig;
///
/// let config = DqnConfig {
///     learning_rate: 5e-4,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DqnConfig {
    /// Learning rate for the Adam optimizer
    ///
    /// Default: 1e-3
    pub learning_rate: f64,

    /// Discount factor for future rewards
    ///
    /// Default: 0.99
    pub gamma: f32,

    /// Transitions per gradient step
    ///
    /// Default: 32
    pub batch_size: usize,

    /// Replay buffer capacity; the oldest transition is evicted when full
    ///
    /// Default: 100_000
    pub buffer_capacity: usize,

    /// Transitions stored before learning starts
    ///
    /// Default: 100
    pub min_experiences: usize,

    /// Learn every `train_frequency` env steps
    ///
    /// Default: 1
    pub train_frequency: usize,

    /// Target network synchronisation
    ///
    /// Default: hard copy every 25 env steps
    pub target_update: TargetUpdate,

    pub exploration: ExplorationConfig,

    /// Clip the global gradient norm when set
    ///
    /// Default: None
    #[serde(default)]
    pub max_grad_norm: Option<f32>,
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self::directed()
    }
}

impl DqnConfig {
    /// Grid observations, conv network, hard target copies
    pub fn directed() -> Self {
        Self {
            learning_rate: 1e-3,
            gamma: 0.99,
            batch_size: 32,
            buffer_capacity: 100_000,
            min_experiences: 100,
            train_frequency: 1,
            target_update: TargetUpdate::Hard { every: 25 },
            exploration: ExplorationConfig::default(),
            max_grad_norm: None,
        }
    }

    /// Feature observations, MLP, soft target updates with constant ε
    pub fn vanilla() -> Self {
        Self {
            learning_rate: 1e-4,
            gamma: 0.99,
            batch_size: 64,
            buffer_capacity: 1_000,
            min_experiences: 64,
            train_frequency: 5,
            target_update: TargetUpdate::Soft { every: 5, tau: 0.5 },
            exploration: ExplorationConfig::constant(0.1),
            max_grad_norm: None,
        }
    }

    /// Check that all hyperparameters are in valid ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.learning_rate > 0.0) {
            return Err(ConfigError::out_of_range(
                "learning_rate",
                "positive",
                self.learning_rate,
            ));
        }

        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(ConfigError::out_of_range("gamma", "in [0, 1]", self.gamma));
        }

        if self.batch_size == 0 {
            return Err(ConfigError::Zero("batch_size"));
        }
        if self.buffer_capacity == 0 {
            return Err(ConfigError::Zero("buffer_capacity"));
        }
        if self.train_frequency == 0 {
            return Err(ConfigError::Zero("train_frequency"));
        }

        if self.min_experiences > self.buffer_capacity {
            return Err(ConfigError::Inconsistent(format!(
                "min_experiences ({}) cannot exceed buffer_capacity ({})",
                self.min_experiences, self.buffer_capacity
            )));
        }

        match self.target_update {
            TargetUpdate::Hard { every: 0 } | TargetUpdate::Soft { every: 0, .. } => {
                return Err(ConfigError::Zero("target_update.every"));
            }
            TargetUpdate::Soft { tau, .. } if !(tau > 0.0 && tau <= 1.0) => {
                return Err(ConfigError::out_of_range("target_update.tau", "in (0, 1]", tau));
            }
            _ => {}
        }

        let exploration = &self.exploration;
        if !(0.0..=1.0).contains(&exploration.start) {
            return Err(ConfigError::out_of_range(
                "exploration.start",
                "in [0, 1]",
                exploration.start,
            ));
        }
        if !(0.0..=1.0).contains(&exploration.min) {
            return Err(ConfigError::out_of_range(
                "exploration.min",
                "in [0, 1]",
                exploration.min,
            ));
        }
        if !(exploration.decay > 0.0 && exploration.decay <= 1.0) {
            return Err(ConfigError::out_of_range(
                "exploration.decay",
                "in (0, 1]",
                exploration.decay,
            ));
        }

        if let Some(norm) = self.max_grad_norm {
            if !(norm > 0.0) {
                return Err(ConfigError::out_of_range("max_grad_norm", "positive", norm));
            }
        }

        Ok(())
    }
}
