use serde::{Deserialize, Serialize};

use crate::game::{Direction, GameState};

/// Number of planes in a grid observation
pub const GRID_CHANNELS: usize = 4;

/// Length of a feature observation
pub const FEATURE_DIM: usize = 13;

/// How a [`GameState`] is turned into network input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObservationKind {
    /// 4-channel occupancy planes, `[4, height, width]` flattened channel-first
    Grid,
    /// Compact hand-crafted feature vector of length [`FEATURE_DIM`]
    Features,
}

impl ObservationKind {
    /// Flattened observation length for a board of the given size
    pub fn dim(&self, grid_width: usize, grid_height: usize) -> usize {
        match self {
            ObservationKind::Grid => GRID_CHANNELS * grid_width * grid_height,
            ObservationKind::Features => FEATURE_DIM,
        }
    }

    pub fn encode(&self, state: &GameState) -> Vec<f32> {
        match self {
            ObservationKind::Grid => encode_grid(state),
            ObservationKind::Features => encode_features(state),
        }
    }
}

/// Encode the board as four stacked planes
///
/// Channels:
/// - 0: Snake head (1.0 at head position)
/// - 1: Snake body (1.0 at body positions, excluding head)
/// - 2: Food location
/// - 3: Border cells
pub fn encode_grid(state: &GameState) -> Vec<f32> {
    let plane = state.grid_width * state.grid_height;
    let mut data = vec![0.0; GRID_CHANNELS * plane];

    let head = state.snake.head();
    if state.is_in_bounds(head) {
        data[state.cell_index(head)] = 1.0;
    }

    for &pos in state.snake.body_segments() {
        if state.is_in_bounds(pos) {
            data[plane + state.cell_index(pos)] = 1.0;
        }
    }

    if state.is_in_bounds(state.food) {
        data[2 * plane + state.cell_index(state.food)] = 1.0;
    }

    let walls = &mut data[3 * plane..];
    let (width, height) = (state.grid_width, state.grid_height);
    for x in 0..width {
        walls[x] = 1.0;
        walls[(height - 1) * width + x] = 1.0;
    }
    for y in 0..height {
        walls[y * width] = 1.0;
        walls[y * width + (width - 1)] = 1.0;
    }

    data
}

/// Encode the state as a 13-element feature vector
///
/// Layout: head position (2), heading one-hot (4), length (1), food offset (2),
/// danger per direction (4). Positions and offsets are divided by the grid size.
pub fn encode_features(state: &GameState) -> Vec<f32> {
    let width = state.grid_width as f32;
    let height = state.grid_height as f32;
    let head = state.snake.head();

    let mut obs = Vec::with_capacity(FEATURE_DIM);

    obs.push(head.x as f32 / width);
    obs.push(head.y as f32 / height);

    for direction in Direction::ALL {
        obs.push(if state.snake.direction == direction { 1.0 } else { 0.0 });
    }

    obs.push(state.snake.len() as f32 / (width * height));

    let (dx, dy) = head.offset_to(state.food);
    obs.push(dx as f32 / width);
    obs.push(dy as f32 / height);

    for direction in Direction::ALL {
        obs.push(if state.is_danger(direction) { 1.0 } else { 0.0 });
    }

    obs
}
