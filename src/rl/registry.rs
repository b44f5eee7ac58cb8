//! Named environment registry
//!
//! Environments are looked up by id (`"SnakeDir-v0"`, `"Snake-Vanilla"`) and
//! built with per-experiment overrides, so training configs only carry the id
//! and a small [`EnvConfig`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::environment::SnakeEnv;
use super::observation::ObservationKind;
use crate::game::GameConfig;

/// Directed Snake: grid observations, 12x12 board
pub const SNAKE_DIR_V0: &str = "SnakeDir-v0";

/// Vanilla Snake: feature observations, 20x20 board, length-1 snake
pub const SNAKE_VANILLA: &str = "Snake-Vanilla";

const MIN_GRID_SIZE: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    #[error("environment `{0}` is already registered")]
    AlreadyRegistered(String),
    #[error("no environment registered under `{id}` (known: {known})")]
    UnknownEnv { id: String, known: String },
    #[error("invalid config for `{id}`: {reason}")]
    InvalidConfig { id: String, reason: String },
}

/// Blueprint an id resolves to
#[derive(Debug, Clone, PartialEq)]
pub struct EnvSpec {
    pub id: String,
    pub observation: ObservationKind,
    pub game: GameConfig,
}

impl EnvSpec {
    pub fn new(id: impl Into<String>, observation: ObservationKind, game: GameConfig) -> Self {
        Self {
            id: id.into(),
            observation,
            game,
        }
    }
}

/// Per-experiment overrides applied on top of an [`EnvSpec`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Board size as `(width, height)`
    #[serde(default)]
    pub grid_size: Option<(usize, usize)>,
    #[serde(default)]
    pub snake_length: Option<usize>,
    /// Seed for food placement
    #[serde(default)]
    pub seed: Option<u64>,
}

impl EnvConfig {
    pub fn with_grid_size(mut self, width: usize, height: usize) -> Self {
        self.grid_size = Some((width, height));
        self
    }

    pub fn with_snake_length(mut self, length: usize) -> Self {
        self.snake_length = Some(length);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[derive(Debug, Clone)]
pub struct EnvRegistry {
    specs: BTreeMap<String, EnvSpec>,
}

impl EnvRegistry {
    /// A registry with nothing registered
    pub fn empty() -> Self {
        Self {
            specs: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, spec: EnvSpec) -> Result<(), EnvError> {
        if self.specs.contains_key(&spec.id) {
            return Err(EnvError::AlreadyRegistered(spec.id));
        }
        self.specs.insert(spec.id.clone(), spec);
        Ok(())
    }

    pub fn spec(&self, id: &str) -> Result<&EnvSpec, EnvError> {
        self.specs.get(id).ok_or_else(|| EnvError::UnknownEnv {
            id: id.to_string(),
            known: self.ids().join(", "),
        })
    }

    pub fn ids(&self) -> Vec<&str> {
        self.specs.keys().map(String::as_str).collect()
    }

    /// Resolve the game config `id` would run with under `config`
    pub fn resolve(&self, id: &str, config: &EnvConfig) -> Result<(ObservationKind, GameConfig), EnvError> {
        let spec = self.spec(id)?;
        let mut game = spec.game.clone();

        if let Some((width, height)) = config.grid_size {
            game.grid_width = width;
            game.grid_height = height;
        }
        if let Some(length) = config.snake_length {
            game.initial_snake_length = length;
        }

        let invalid = |reason: String| EnvError::InvalidConfig {
            id: id.to_string(),
            reason,
        };

        if game.grid_width < MIN_GRID_SIZE || game.grid_height < MIN_GRID_SIZE {
            return Err(invalid(format!(
                "grid must be at least {MIN_GRID_SIZE}x{MIN_GRID_SIZE}, got {}x{}",
                game.grid_width, game.grid_height
            )));
        }
        if game.initial_snake_length == 0 {
            return Err(invalid("snake_length must be at least 1".to_string()));
        }
        // The snake spawns at the centre heading right, trailing to the left
        if game.initial_snake_length > game.grid_width / 2 {
            return Err(invalid(format!(
                "snake_length {} does not fit a grid of width {}",
                game.initial_snake_length, game.grid_width
            )));
        }

        Ok((spec.observation, game))
    }

    /// Build an environment registered under `id`
    pub fn make(&self, id: &str, config: &EnvConfig) -> Result<SnakeEnv, EnvError> {
        let (observation, game) = self.resolve(id, config)?;
        let env = match config.seed {
            Some(seed) => SnakeEnv::with_seed(id, game, observation, seed),
            None => SnakeEnv::new(id, game, observation),
        };
        Ok(env)
    }
}

impl Default for EnvRegistry {
    /// Registry holding the built-in Snake variants
    fn default() -> Self {
        let mut specs = BTreeMap::new();
        for spec in [
            EnvSpec::new(
                SNAKE_DIR_V0,
                ObservationKind::Grid,
                GameConfig::new(12, 12),
            ),
            EnvSpec::new(
                SNAKE_VANILLA,
                ObservationKind::Features,
                GameConfig::new(20, 20).with_snake_length(1),
            ),
        ] {
            specs.insert(spec.id.clone(), spec);
        }
        Self { specs }
    }
}
