use serde::{Deserialize, Serialize};

/// Configuration for the game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Width of the game grid
    pub grid_width: usize,
    /// Height of the game grid
    pub grid_height: usize,
    /// Initial length of the snake
    pub initial_snake_length: usize,

    /// Reward for eating food
    pub food_reward: f32,
    /// Reward added on every live step (negative values encourage short paths)
    pub step_penalty: f32,
    /// Reward for dying
    pub death_penalty: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            grid_width: 20,
            grid_height: 20,
            initial_snake_length: 3,
            food_reward: 10.0,
            step_penalty: -0.01,
            death_penalty: -10.0,
        }
    }
}

impl GameConfig {
    /// Create a new configuration with custom grid size
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            grid_width: width,
            grid_height: height,
            ..Default::default()
        }
    }

    /// Create a small grid for testing
    pub fn small() -> Self {
        Self::new(10, 10)
    }

    /// Create a large grid
    pub fn large() -> Self {
        Self::new(30, 30)
    }

    /// Override the initial snake length
    pub fn with_snake_length(mut self, length: usize) -> Self {
        self.initial_snake_length = length;
        self
    }

    /// Number of cells on the board
    pub fn cell_count(&self) -> usize {
        self.grid_width * self.grid_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GameConfig::default();
        assert_eq!(config.grid_width, 20);
        assert_eq!(config.grid_height, 20);
        assert_eq!(config.initial_snake_length, 3);
    }

    #[test]
    fn test_custom_config() {
        let config = GameConfig::new(15, 12).with_snake_length(1);
        assert_eq!(config.grid_width, 15);
        assert_eq!(config.grid_height, 12);
        assert_eq!(config.initial_snake_length, 1);
        assert_eq!(config.cell_count(), 180);
    }
}
