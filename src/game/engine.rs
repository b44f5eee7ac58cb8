use super::{
    action::{Action, Direction},
    config::GameConfig,
    state::{CollisionType, GameState, Position, Snake},
};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Information about a step
#[derive(Debug, Clone, PartialEq)]
pub struct StepInfo {
    /// Whether the snake ate food this step
    pub ate_food: bool,
    /// Type of collision if one occurred
    pub collision_type: Option<CollisionType>,
    /// Whether the snake now covers every cell (the game is won)
    pub board_full: bool,
}

/// Result of a game step
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Reward for this step (for RL training)
    pub reward: f32,
    /// Whether the game has terminated
    pub terminated: bool,
    /// Additional information about the step
    pub info: StepInfo,
}

/// The game engine that handles all game logic
#[derive(Debug)]
pub struct GameEngine {
    config: GameConfig,
    rng: StdRng,
}

impl GameEngine {
    /// Create a new game engine with the given configuration
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a game engine whose food placement is reproducible
    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Reset the game to initial state
    pub fn reset(&mut self) -> GameState {
        let center_x = (self.config.grid_width / 2) as i32;
        let center_y = (self.config.grid_height / 2) as i32;

        let snake = Snake::new(
            Position::new(center_x, center_y),
            Direction::Right,
            self.config.initial_snake_length,
        );

        // A fresh snake never covers the whole board for valid configs
        let food = self
            .spawn_food_avoid_snake(&snake)
            .unwrap_or(Position::new(0, 0));

        GameState::new(snake, food, self.config.grid_width, self.config.grid_height)
    }

    /// Execute one step of the game
    pub fn step(&mut self, state: &mut GameState, action: Action) -> StepResult {
        if !state.is_alive {
            return StepResult {
                reward: 0.0,
                terminated: true,
                info: StepInfo {
                    ate_food: false,
                    collision_type: None,
                    board_full: false,
                },
            };
        }

        // Update direction based on action (prevent 180° turns)
        if let Action::Move(new_direction) = action {
            if !state.snake.direction.is_opposite(new_direction) {
                state.snake.direction = new_direction;
            }
        }

        let new_head = state.snake.head().moved_in_direction(state.snake.direction);

        if let Some(collision_type) = self.check_collision(state, new_head) {
            state.is_alive = false;
            state.steps += 1;

            return StepResult {
                reward: self.config.death_penalty,
                terminated: true,
                info: StepInfo {
                    ate_food: false,
                    collision_type: Some(collision_type),
                    board_full: false,
                },
            };
        }

        let ate_food = new_head == state.food;
        state.snake.move_snake(ate_food);

        let mut reward = self.config.step_penalty;
        let mut board_full = false;

        if ate_food {
            state.score += 1;
            reward += self.config.food_reward;
            match self.spawn_food_avoid_snake(&state.snake) {
                Some(food) => state.food = food,
                None => {
                    board_full = true;
                    state.is_alive = false;
                }
            }
        }

        state.steps += 1;

        StepResult {
            reward,
            terminated: board_full,
            info: StepInfo {
                ate_food,
                collision_type: None,
                board_full,
            },
        }
    }

    /// Check if the new head position causes a collision
    fn check_collision(&self, state: &GameState, pos: Position) -> Option<CollisionType> {
        if !state.is_in_bounds(pos) {
            return Some(CollisionType::Wall);
        }

        // The tail vacates its cell on this move unless the snake grows, but
        // moving into it is still treated as a collision.
        if state.snake.collides_with_body(pos) {
            return Some(CollisionType::SelfCollision);
        }

        None
    }

    /// Spawn food at a random empty cell, or `None` when the snake fills the board
    fn spawn_food_avoid_snake(&mut self, snake: &Snake) -> Option<Position> {
        let free: Vec<Position> = (0..self.config.grid_height)
            .flat_map(|y| {
                (0..self.config.grid_width).map(move |x| Position::new(x as i32, y as i32))
            })
            .filter(|pos| !snake.body.contains(pos))
            .collect();

        if free.is_empty() {
            return None;
        }

        Some(free[self.rng.gen_range(0..free.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset() {
        let mut engine = GameEngine::new(GameConfig::default());
        let state = engine.reset();

        assert!(state.is_alive);
        assert_eq!(state.score, 0);
        assert_eq!(state.steps, 0);
        assert_eq!(state.snake.len(), 3);
        assert!(!state.is_occupied_by_snake(state.food));
    }

    #[test]
    fn test_seeded_engines_place_food_identically() {
        let mut a = GameEngine::with_seed(GameConfig::small(), 7);
        let mut b = GameEngine::with_seed(GameConfig::small(), 7);

        for _ in 0..5 {
            assert_eq!(a.reset().food, b.reset().food);
        }
    }

    #[test]
    fn test_basic_movement() {
        let mut engine = GameEngine::new(GameConfig::small());
        let mut state = engine.reset();
        let initial_head = state.snake.head();

        let result = engine.step(&mut state, Action::Continue);

        assert!(!result.terminated);
        assert!(!result.info.ate_food);
        assert_eq!(state.steps, 1);
        assert_ne!(state.snake.head(), initial_head);
    }

    #[test]
    fn test_food_consumption() {
        let mut engine = GameEngine::new(GameConfig::small());
        let mut state = engine.reset();

        let head = state.snake.head();
        state.food = head.moved_in_direction(state.snake.direction);
        let initial_length = state.snake.len();

        let result = engine.step(&mut state, Action::Continue);

        assert!(result.info.ate_food);
        assert_eq!(state.score, 1);
        assert_eq!(state.snake.len(), initial_length + 1);
        assert!(result.reward > 0.0);
    }

    #[test]
    fn test_wall_collision() {
        let config = GameConfig::small();
        let death_penalty = config.death_penalty;
        let mut engine = GameEngine::new(config);
        let mut state = GameState::new(
            Snake::new(Position::new(0, 5), Direction::Left, 3),
            Position::new(5, 5),
            10,
            10,
        );

        let result = engine.step(&mut state, Action::Continue);

        assert!(result.terminated);
        assert!(!state.is_alive);
        assert_eq!(result.reward, death_penalty);
        assert_eq!(result.info.collision_type, Some(CollisionType::Wall));
    }

    #[test]
    fn test_self_collision() {
        let mut engine = GameEngine::new(GameConfig::small());

        // Body: (5,5), (4,5), (3,5), (2,5)
        let snake = Snake::new(Position::new(5, 5), Direction::Right, 4);
        let mut state = GameState::new(snake, Position::new(8, 8), 10, 10);

        engine.step(&mut state, Action::Continue);
        engine.step(&mut state, Action::Move(Direction::Down));
        engine.step(&mut state, Action::Move(Direction::Left));
        let result = engine.step(&mut state, Action::Move(Direction::Up));

        assert!(result.terminated);
        assert_eq!(
            result.info.collision_type,
            Some(CollisionType::SelfCollision)
        );
    }

    #[test]
    fn test_prevent_180_degree_turn() {
        let mut engine = GameEngine::new(GameConfig::small());
        let mut state = engine.reset();
        state.snake.direction = Direction::Right;

        engine.step(&mut state, Action::Move(Direction::Left));

        assert_eq!(state.snake.direction, Direction::Right);
    }

    #[test]
    fn test_terminated_game_no_update() {
        let mut engine = GameEngine::new(GameConfig::small());
        let mut state = engine.reset();
        state.is_alive = false;
        let steps_before = state.steps;

        let result = engine.step(&mut state, Action::Continue);

        assert!(result.terminated);
        assert_eq!(result.reward, 0.0);
        assert_eq!(state.steps, steps_before);
    }

    #[test]
    fn test_filling_the_board_ends_the_game() {
        // 2x1 board: snake of length 1 at (0,0), food at (1,0)
        let config = GameConfig::new(2, 1).with_snake_length(1);
        let mut engine = GameEngine::with_seed(config, 1);
        let mut state = GameState::new(
            Snake::new(Position::new(0, 0), Direction::Right, 1),
            Position::new(1, 0),
            2,
            1,
        );

        let result = engine.step(&mut state, Action::Continue);

        assert!(result.terminated);
        assert!(result.info.ate_food);
        assert!(result.info.board_full);
        assert!(result.reward > 0.0);
        assert!(!state.is_alive);
        assert_eq!(state.score, 1);
    }
}
