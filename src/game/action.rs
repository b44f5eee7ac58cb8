use serde::{Deserialize, Serialize};

/// Direction the snake can move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// All directions in discrete action order (index 0..=3)
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Returns true if turning from self to other would be a 180-degree turn
    pub fn is_opposite(&self, other: Direction) -> bool {
        matches!(
            (self, other),
            (Direction::Up, Direction::Down)
                | (Direction::Down, Direction::Up)
                | (Direction::Left, Direction::Right)
                | (Direction::Right, Direction::Left)
        )
    }

    /// Returns the delta (dx, dy) for moving in this direction
    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// Position of this direction in [`Direction::ALL`]
    pub fn index(&self) -> usize {
        match self {
            Direction::Up => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Right => 3,
        }
    }
}

/// Action that can be taken in the game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Move in a specific direction
    Move(Direction),
    /// Continue in current direction
    Continue,
}

impl Action {
    /// Map a discrete action index onto a game action.
    ///
    /// Indices outside `0..4` fall back to [`Action::Continue`].
    pub fn from_index(idx: usize) -> Self {
        Direction::ALL
            .get(idx)
            .copied()
            .map(Action::Move)
            .unwrap_or(Action::Continue)
    }
}

impl From<Direction> for Action {
    fn from(direction: Direction) -> Self {
        Action::Move(direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_directions() {
        assert!(Direction::Up.is_opposite(Direction::Down));
        assert!(Direction::Down.is_opposite(Direction::Up));
        assert!(Direction::Left.is_opposite(Direction::Right));
        assert!(Direction::Right.is_opposite(Direction::Left));

        assert!(!Direction::Up.is_opposite(Direction::Left));
        assert!(!Direction::Up.is_opposite(Direction::Right));
    }

    #[test]
    fn test_direction_delta() {
        assert_eq!(Direction::Up.delta(), (0, -1));
        assert_eq!(Direction::Down.delta(), (0, 1));
        assert_eq!(Direction::Left.delta(), (-1, 0));
        assert_eq!(Direction::Right.delta(), (1, 0));
    }

    #[test]
    fn test_index_round_trips_through_all() {
        for (i, direction) in Direction::ALL.iter().enumerate() {
            assert_eq!(direction.index(), i);
        }
    }

    #[test]
    fn test_action_from_index() {
        assert_eq!(Action::from_index(0), Action::Move(Direction::Up));
        assert_eq!(Action::from_index(1), Action::Move(Direction::Down));
        assert_eq!(Action::from_index(2), Action::Move(Direction::Left));
        assert_eq!(Action::from_index(3), Action::Move(Direction::Right));
        assert_eq!(Action::from_index(4), Action::Continue);
        assert_eq!(Action::from_index(999), Action::Continue);
    }
}
