use super::observation::ObservationKind;
use crate::game::{Action, Direction, GameConfig, GameEngine, GameState};

/// Extra information returned with every step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepInfo {
    /// Food eaten in the current episode
    pub score: u32,
    /// Best score seen by this environment across episodes
    pub high_score: u32,
    /// Whether food was eaten on this step
    pub ate_food: bool,
}

/// Result of [`SnakeEnv::step`]
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub observation: Vec<f32>,
    pub reward: f32,
    pub terminated: bool,
    pub info: StepInfo,
}

/// Snake environment for reinforcement learning
///
/// Wraps the game engine with a discrete action space of four headings
/// (index order follows [`Direction::ALL`]) and flat `f32` observations.
/// Environments are usually built through [`super::EnvRegistry::make`].
#[derive(Debug)]
pub struct SnakeEnv {
    id: String,
    engine: GameEngine,
    state: GameState,
    observation: ObservationKind,
    high_score: u32,
}

impl SnakeEnv {
    pub fn new(id: impl Into<String>, config: GameConfig, observation: ObservationKind) -> Self {
        Self::from_engine(id, GameEngine::new(config), observation)
    }

    pub fn with_seed(
        id: impl Into<String>,
        config: GameConfig,
        observation: ObservationKind,
        seed: u64,
    ) -> Self {
        Self::from_engine(id, GameEngine::with_seed(config, seed), observation)
    }

    fn from_engine(id: impl Into<String>, mut engine: GameEngine, observation: ObservationKind) -> Self {
        let state = engine.reset();
        Self {
            id: id.into(),
            engine,
            state,
            observation,
            high_score: 0,
        }
    }

    /// Start a new episode and return its first observation
    pub fn reset(&mut self) -> Vec<f32> {
        self.state = self.engine.reset();
        self.observe()
    }

    /// Advance the game by one discrete action
    ///
    /// Indices outside `0..4` keep the current heading.
    pub fn step(&mut self, action_idx: usize) -> StepOutcome {
        let result = self
            .engine
            .step(&mut self.state, Action::from_index(action_idx));

        self.high_score = self.high_score.max(self.state.score);

        StepOutcome {
            observation: self.observe(),
            reward: result.reward,
            terminated: result.terminated,
            info: StepInfo {
                score: self.state.score,
                high_score: self.high_score,
                ate_food: result.info.ate_food,
            },
        }
    }

    /// Observation of the current state without stepping
    pub fn observe(&self) -> Vec<f32> {
        self.observation.encode(&self.state)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn num_actions(&self) -> usize {
        Direction::ALL.len()
    }

    pub fn observation_kind(&self) -> ObservationKind {
        self.observation
    }

    pub fn observation_dim(&self) -> usize {
        let config = self.engine.config();
        self.observation.dim(config.grid_width, config.grid_height)
    }

    pub fn game_config(&self) -> &GameConfig {
        self.engine.config()
    }

    pub fn score(&self) -> u32 {
        self.state.score
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    /// Current game state (for rendering and tests)
    pub fn state(&self) -> &GameState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Position;

    fn grid_env() -> SnakeEnv {
        SnakeEnv::with_seed("test", GameConfig::small(), ObservationKind::Grid, 3)
    }

    #[test]
    fn test_environment_creation() {
        let env = grid_env();
        assert!(env.state().is_alive);
        assert_eq!(env.score(), 0);
        assert_eq!(env.num_actions(), 4);
        assert_eq!(env.observation_dim(), 4 * 10 * 10);
    }

    #[test]
    fn test_debug_output_names_env() {
        let env = grid_env();
        let debug = format!("{:?}", env);
        assert!(debug.contains("SnakeEnv"));
        assert!(debug.contains("\"test\""));
    }

    #[test]
    fn test_reset_returns_valid_observation() {
        let mut env = grid_env();
        let obs = env.reset();
        assert_eq!(obs.len(), env.observation_dim());
    }

    #[test]
    fn test_feature_environment_dim() {
        let mut env = SnakeEnv::new("f", GameConfig::small(), ObservationKind::Features);
        assert_eq!(env.reset().len(), 13);
        assert_eq!(env.observation_dim(), 13);
    }

    #[test]
    fn test_step_keeps_heading_for_invalid_index() {
        let mut env = grid_env();
        let heading = env.state().snake.direction;

        let outcome = env.step(42);

        assert!(!outcome.terminated);
        assert!(outcome.reward <= 0.0);
        assert_eq!(env.state().snake.direction, heading);
        assert_eq!(env.state().steps, 1);
    }

    #[test]
    fn test_terminal_state_handling() {
        let mut env = grid_env();
        env.state_mut().snake.direction = Direction::Left;
        env.state_mut().snake.body[0] = Position::new(0, 5);

        // Index 2 is Left, straight into the wall
        let outcome = env.step(2);

        assert!(outcome.terminated);
        assert!(!env.state().is_alive);
    }

    #[test]
    fn test_food_updates_score_and_high_score() {
        let mut env = grid_env();
        let head = env.state().snake.head();
        let direction = env.state().snake.direction;
        env.state_mut().food = head.moved_in_direction(direction);

        let outcome = env.step(direction.index());

        assert!(outcome.reward > 0.0);
        assert!(outcome.info.ate_food);
        assert_eq!(outcome.info.score, 1);
        assert_eq!(outcome.info.high_score, 1);

        // The high score survives a reset, the score does not
        env.reset();
        assert_eq!(env.score(), 0);
        assert_eq!(env.high_score(), 1);
    }

    #[test]
    fn test_observation_changes_after_step() {
        let mut env = grid_env();
        let before = env.observe();
        env.step(4);
        assert_ne!(before, env.observe());
    }

    #[test]
    fn test_episodes_terminate() {
        let mut env = grid_env();

        for _ in 0..2 {
            env.reset();
            let mut steps = 0;
            let mut done = false;

            // Heading right forever hits the wall
            while !done && steps < 100 {
                done = env.step(3).terminated;
                steps += 1;
            }

            assert!(done);
        }
    }
}
