//! Snake rules
//!
//! Pure game logic with no I/O, tensors or rendering. The RL environment and the
//! terminal viewer both drive the same [`GameEngine`].

pub mod action;
pub mod config;
pub mod engine;
pub mod state;

pub use action::{Action, Direction};
pub use config::GameConfig;
pub use engine::{GameEngine, StepInfo, StepResult};
pub use state::{CollisionType, GameState, Position, Snake};
