use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
};

use crate::game::{GameState, Position};
use crate::metrics::GameMetrics;

/// Viewer state shown around the board
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchOverlay<'a> {
    pub env_id: &'a str,
    pub episode: u32,
    pub speed: &'a str,
    pub paused: bool,
}

pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(
        &self,
        frame: &mut Frame,
        state: &GameState,
        metrics: &GameMetrics,
        overlay: &WatchOverlay,
    ) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4), // Header
                Constraint::Min(0),    // Game area
                Constraint::Length(3), // Footer
            ])
            .split(frame.area());

        frame.render_widget(self.render_stats(state, metrics, overlay), chunks[0]);

        // Center the game grid horizontally
        let game_area = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(10),
                Constraint::Percentage(80),
                Constraint::Percentage(10),
            ])
            .split(chunks[1])[1];

        if state.is_alive {
            frame.render_widget(self.render_grid(state, overlay), game_area);
        } else {
            frame.render_widget(self.render_game_over(state), game_area);
        }

        frame.render_widget(self.render_controls(), chunks[2]);
    }

    fn render_grid(&self, state: &GameState, overlay: &WatchOverlay) -> Paragraph<'_> {
        let mut lines = Vec::new();

        for y in 0..state.grid_height {
            let mut spans = Vec::new();

            for x in 0..state.grid_width {
                let pos = Position::new(x as i32, y as i32);

                let cell = if pos == state.snake.head() {
                    Span::styled(
                        "■ ",
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    )
                } else if state.snake.body_segments().contains(&pos) {
                    Span::styled("□ ", Style::default().fg(Color::Green))
                } else if pos == state.food {
                    Span::styled(
                        "O ",
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    )
                } else {
                    Span::styled(". ", Style::default().fg(Color::DarkGray))
                };

                spans.push(cell);
            }

            lines.push(Line::from(spans));
        }

        let border_color = if overlay.paused {
            Color::Yellow
        } else {
            Color::White
        };

        Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Double)
                    .border_style(Style::default().fg(border_color))
                    .title(format!(" {} ", overlay.env_id)),
            )
            .alignment(Alignment::Center)
    }

    fn render_stats(
        &self,
        state: &GameState,
        metrics: &GameMetrics,
        overlay: &WatchOverlay,
    ) -> Paragraph<'_> {
        let label = Style::default().fg(Color::Yellow);
        let value = Style::default().fg(Color::White);

        let mut status = vec![
            Span::styled("Episode: ", label),
            Span::styled(overlay.episode.to_string(), value),
            Span::raw("    "),
            Span::styled("Speed: ", label),
            Span::styled(overlay.speed.to_string(), value),
        ];
        if overlay.paused {
            status.push(Span::raw("    "));
            status.push(Span::styled(
                "PAUSED",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ));
        }

        let text = vec![
            Line::from(vec![
                Span::styled("Score: ", label),
                Span::styled(
                    state.score.to_string(),
                    value.add_modifier(Modifier::BOLD),
                ),
                Span::raw("    "),
                Span::styled("High Score: ", label),
                Span::styled(metrics.high_score.max(state.score).to_string(), value),
                Span::raw("    "),
                Span::styled("Steps: ", label),
                Span::styled(state.steps.to_string(), value),
                Span::raw("    "),
                Span::styled("Time: ", label),
                Span::styled(metrics.format_time(), value),
            ]),
            Line::from(status),
            Line::from(vec![
                Span::styled("Avg Score: ", label),
                Span::styled(format!("{:.2}", metrics.mean_score()), value),
            ]),
        ];

        Paragraph::new(text).alignment(Alignment::Center)
    }

    fn render_game_over(&self, state: &GameState) -> Paragraph<'_> {
        let text = vec![
            Line::from(""),
            Line::from(vec![Span::styled(
                "GAME OVER",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )]),
            Line::from(""),
            Line::from(vec![
                Span::styled("Final Score: ", Style::default().fg(Color::Yellow)),
                Span::styled(
                    state.score.to_string(),
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(""),
            Line::from(vec![Span::styled(
                "Next episode starting...",
                Style::default().fg(Color::Gray),
            )]),
        ];

        Paragraph::new(text).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        )
    }

    fn render_controls(&self) -> Paragraph<'_> {
        let text = vec![Line::from(vec![
            Span::styled("Space", Style::default().fg(Color::Cyan)),
            Span::raw(" pause | "),
            Span::styled("R", Style::default().fg(Color::Green)),
            Span::raw(" reset | "),
            Span::styled("1-4", Style::default().fg(Color::Cyan)),
            Span::raw(" speed | "),
            Span::styled("Q", Style::default().fg(Color::Red)),
            Span::raw(" to quit"),
        ])];

        Paragraph::new(text).alignment(Alignment::Center)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameConfig, GameEngine};
    use ratatui::{Terminal, backend::TestBackend};

    fn draw(state: &GameState, overlay: &WatchOverlay) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        let metrics = GameMetrics::new();
        terminal
            .draw(|frame| Renderer::new().render(frame, state, &metrics, overlay))
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn overlay(paused: bool) -> WatchOverlay<'static> {
        WatchOverlay {
            env_id: "Snake-Vanilla",
            episode: 3,
            speed: "Fast",
            paused,
        }
    }

    #[test]
    fn test_overlay_is_drawn() {
        let state = GameEngine::with_seed(GameConfig::small(), 1).reset();
        let screen = draw(&state, &overlay(false));

        assert!(screen.contains("Episode: 3"));
        assert!(screen.contains("Speed: Fast"));
        assert!(screen.contains("Snake-Vanilla"));
        assert!(!screen.contains("PAUSED"));
    }

    #[test]
    fn test_paused_and_game_over() {
        let mut state = GameEngine::with_seed(GameConfig::small(), 1).reset();
        assert!(draw(&state, &overlay(true)).contains("PAUSED"));

        state.is_alive = false;
        assert!(draw(&state, &overlay(false)).contains("GAME OVER"));
    }
}
