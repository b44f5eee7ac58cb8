use super::action::Direction;

/// A cell on the game grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn moved_by(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn moved_in_direction(&self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        self.moved_by(dx, dy)
    }

    /// Offset `(dx, dy)` from `self` to `other`
    pub fn offset_to(&self, other: Position) -> (i32, i32) {
        (other.x - self.x, other.y - self.y)
    }
}

/// The snake, head first
#[derive(Debug, Clone, PartialEq)]
pub struct Snake {
    /// Body segments, with head at index 0
    pub body: Vec<Position>,
    /// Current direction of movement
    pub direction: Direction,
}

impl Snake {
    /// Create a snake whose body trails behind `head`, opposite to `direction`
    pub fn new(head: Position, direction: Direction, length: usize) -> Self {
        let (dx, dy) = direction.delta();
        let body = (0..length.max(1) as i32)
            .map(|i| head.moved_by(-dx * i, -dy * i))
            .collect();

        Self { body, direction }
    }

    pub fn head(&self) -> Position {
        self.body[0]
    }

    /// Body segments excluding the head
    pub fn body_segments(&self) -> &[Position] {
        &self.body[1..]
    }

    /// Check if position collides with snake body (excluding head)
    pub fn collides_with_body(&self, pos: Position) -> bool {
        self.body_segments().contains(&pos)
    }

    /// Advance one cell in the current direction, keeping the tail when growing
    pub fn move_snake(&mut self, should_grow: bool) {
        let new_head = self.head().moved_in_direction(self.direction);
        self.body.insert(0, new_head);

        if !should_grow {
            self.body.pop();
        }
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Type of collision that occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionType {
    Wall,
    SelfCollision,
}

/// Complete game state
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    pub snake: Snake,
    pub food: Position,
    pub grid_width: usize,
    pub grid_height: usize,
    pub score: u32,
    pub steps: u32,
    pub is_alive: bool,
}

impl GameState {
    pub fn new(snake: Snake, food: Position, grid_width: usize, grid_height: usize) -> Self {
        Self {
            snake,
            food,
            grid_width,
            grid_height,
            score: 0,
            steps: 0,
            is_alive: true,
        }
    }

    pub fn is_in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0
            && pos.x < self.grid_width as i32
            && pos.y >= 0
            && pos.y < self.grid_height as i32
    }

    pub fn is_occupied_by_snake(&self, pos: Position) -> bool {
        self.snake.body.contains(&pos)
    }

    /// Whether the head moving one cell towards `direction` would end the game
    pub fn is_danger(&self, direction: Direction) -> bool {
        let next = self.snake.head().moved_in_direction(direction);
        !self.is_in_bounds(next) || self.snake.collides_with_body(next)
    }

    /// Row-major index of an in-bounds position
    pub fn cell_index(&self, pos: Position) -> usize {
        pos.y as usize * self.grid_width + pos.x as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_movement() {
        let pos = Position::new(5, 5);
        assert_eq!(pos.moved_by(1, 0), Position::new(6, 5));
        assert_eq!(pos.moved_in_direction(Direction::Up), Position::new(5, 4));
        assert_eq!(pos.offset_to(Position::new(2, 9)), (-3, 4));
    }

    #[test]
    fn test_snake_creation() {
        let snake = Snake::new(Position::new(5, 5), Direction::Right, 3);
        assert_eq!(
            snake.body,
            vec![Position::new(5, 5), Position::new(4, 5), Position::new(3, 5)]
        );

        let single = Snake::new(Position::new(2, 2), Direction::Up, 1);
        assert_eq!(single.len(), 1);
        assert!(single.body_segments().is_empty());
    }

    #[test]
    fn test_snake_movement() {
        let mut snake = Snake::new(Position::new(5, 5), Direction::Right, 3);

        snake.move_snake(false);
        assert_eq!(snake.len(), 3);
        assert_eq!(snake.head(), Position::new(6, 5));

        snake.move_snake(true);
        assert_eq!(snake.len(), 4);
        assert_eq!(snake.head(), Position::new(7, 5));
    }

    #[test]
    fn test_collision_detection() {
        let snake = Snake::new(Position::new(5, 5), Direction::Right, 3);
        assert!(!snake.collides_with_body(Position::new(5, 5)));
        assert!(snake.collides_with_body(Position::new(4, 5)));
        assert!(!snake.collides_with_body(Position::new(10, 10)));
    }

    #[test]
    fn test_danger_detection() {
        let state = GameState::new(
            Snake::new(Position::new(0, 5), Direction::Right, 3),
            Position::new(9, 9),
            10,
            10,
        );

        // Body trails off-grid to the left; the wall is there too
        assert!(state.is_danger(Direction::Left));
        assert!(!state.is_danger(Direction::Right));
        assert!(!state.is_danger(Direction::Up));
        assert!(!state.is_danger(Direction::Down));
    }

    #[test]
    fn test_bounds_and_index() {
        let state = GameState::new(
            Snake::new(Position::new(5, 5), Direction::Right, 3),
            Position::new(10, 10),
            20,
            15,
        );

        assert!(state.is_in_bounds(Position::new(19, 14)));
        assert!(!state.is_in_bounds(Position::new(-1, 0)));
        assert!(!state.is_in_bounds(Position::new(0, 15)));
        assert_eq!(state.cell_index(Position::new(3, 2)), 43);
    }
}
