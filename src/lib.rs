//! Snake DQN - Deep Q-learning agents for the Snake game
//!
//! This library provides:
//! - Core game logic (game module)
//! - Environments, Q-networks and the DQN agent (rl module)
//! - Training statistics and TensorBoard scalars (metrics module)
//! - TUI rendering for watching trained agents (render module)
//! - Execution modes: train, evaluate, visualize (modes module)

pub mod game;
pub mod metrics;
pub mod modes;
pub mod render;
pub mod rl;
