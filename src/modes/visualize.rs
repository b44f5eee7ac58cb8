//! Visualization mode for watching trained agents
//!
//! This module implements a TUI-based visualization mode that loads a trained
//! DQN model and displays it playing Snake greedily. Users can control playback
//! speed, pause, and reset episodes.
//!
//! # Controls
//!
//! - Space: Pause/unpause
//! - R: Reset episode
//! - 1-4: Speed control (1=slow, 2=normal, 3=fast, 4=very fast)
//! - Q/Esc: Quit
//!
//! # Example
//!
//! ```rust,ignore
//! use snake_dqn::modes::VisualizeMode;
//! use snake_dqn::rl::{default_device, InferenceBackend};
//! use std::path::Path;
//!
//! let mut visualize_mode = VisualizeMode::<InferenceBackend>::new(
//!     Path::new("Models/ffdqn_1500episodes"),
//!     None,
//!     default_device(),
//! )?;
//! visualize_mode.run().await?;
//! ```

use anyhow::{Context, Result};
use burn::tensor::backend::Backend;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{
    io::{Stderr, stderr},
    path::Path,
    time::Duration,
};
use tokio::time::{Interval, interval};

use crate::metrics::GameMetrics;
use crate::render::{Renderer, WatchOverlay};
use crate::rl::{EnvRegistry, ModelMetadata, QNetwork, SnakeEnv, load_network};

/// Visualization speed settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizationSpeed {
    /// Slow: 2 Hz (500ms per step)
    Slow,
    /// Normal: 8 Hz (125ms per step)
    Normal,
    /// Fast: 20 Hz (50ms per step)
    Fast,
    /// Very Fast: 60 Hz (16ms per step)
    VeryFast,
}

impl VisualizationSpeed {
    fn tick_interval(&self) -> Duration {
        match self {
            Self::Slow => Duration::from_millis(500),
            Self::Normal => Duration::from_millis(125),
            Self::Fast => Duration::from_millis(50),
            Self::VeryFast => Duration::from_millis(16),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Slow => "Slow",
            Self::Normal => "Normal",
            Self::Fast => "Fast",
            Self::VeryFast => "Very Fast",
        }
    }

    /// Speed bound to a number key
    fn from_key(key: char) -> Option<Self> {
        match key {
            '1' => Some(Self::Slow),
            '2' => Some(Self::Normal),
            '3' => Some(Self::Fast),
            '4' => Some(Self::VeryFast),
            _ => None,
        }
    }
}

/// Visualization mode for watching trained agents
pub struct VisualizeMode<B: Backend> {
    /// Trained Q-network
    network: QNetwork<B>,

    /// Environment rebuilt from the model's metadata
    env: SnakeEnv,

    renderer: Renderer,

    metrics: GameMetrics,

    metadata: ModelMetadata,

    device: B::Device,

    /// Current observation fed to the network
    observation: Vec<f32>,

    should_quit: bool,

    paused: bool,

    speed: VisualizationSpeed,
}

impl<B: Backend> VisualizeMode<B> {
    /// Create a new visualization mode
    ///
    /// Loads a trained model and rebuilds the environment it was trained on.
    /// `seed` overrides the environment seed stored with the model.
    pub fn new(model_path: &Path, seed: Option<u64>, device: B::Device) -> Result<Self> {
        let (network, metadata) = load_network::<B>(model_path, &device)
            .with_context(|| format!("Failed to load model from {:?}", model_path))?;

        let mut env_config = metadata.env_config.clone();
        if seed.is_some() {
            env_config.seed = seed;
        }
        let mut env = EnvRegistry::default()
            .make(&metadata.env_id, &env_config)
            .with_context(|| format!("Failed to rebuild environment {}", metadata.env_id))?;

        println!("{}", "=".repeat(60));
        println!("Loaded Model Information");
        println!("{}", "=".repeat(60));
        println!("Model path: {:?}", model_path);
        println!("Environment: {}", metadata.env_id);
        println!("Episodes trained: {}", metadata.episodes_trained);
        println!("Training steps: {}", metadata.training_steps);
        let game = env.game_config();
        println!("Grid size: {}x{}", game.grid_width, game.grid_height);
        println!("Version: {}", metadata.version);
        println!("{}", "=".repeat(60));
        println!();
        println!("Starting visualization...");
        println!();

        let observation = env.reset();
        let mut metrics = GameMetrics::new();
        metrics.on_game_start();

        Ok(Self {
            network,
            env,
            renderer: Renderer::new(),
            metrics,
            metadata,
            device,
            observation,
            should_quit: false,
            paused: false,
            speed: VisualizationSpeed::Normal,
        })
    }

    /// Run the visualization loop
    ///
    /// Sets up the terminal, runs the main visualization loop, and cleans up
    /// on exit.
    pub async fn run(&mut self) -> Result<()> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stderr = stderr();
        execute!(stderr, EnterAlternateScreen).context("Failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stderr);
        let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;
        terminal.hide_cursor().context("Failed to hide cursor")?;
        terminal.clear().context("Failed to clear terminal")?;

        let result = self.run_visualization_loop(&mut terminal).await;

        self.cleanup_terminal(&mut terminal)?;

        result
    }

    async fn run_visualization_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stderr>>,
    ) -> Result<()> {
        let mut event_stream = EventStream::new();

        // Game ticks based on speed
        let mut tick_timer = interval(self.speed.tick_interval());

        // Render at 30 FPS
        let mut render_timer = interval(Duration::from_millis(33));

        loop {
            tokio::select! {
                maybe_event = event_stream.next() => {
                    if let Some(Ok(event)) = maybe_event {
                        self.handle_event(event, &mut tick_timer);
                    }
                }

                _ = tick_timer.tick() => {
                    if !self.paused {
                        self.tick();
                    }
                }

                _ = render_timer.tick() => {
                    self.metrics.update();
                    terminal.draw(|frame| {
                        self.render_frame(frame);
                    }).context("Failed to draw frame")?;
                }

                _ = tokio::signal::ctrl_c() => {
                    self.should_quit = true;
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    /// Advance the game by one tick
    ///
    /// A finished game is shown for one tick before the next episode starts.
    fn tick(&mut self) {
        if self.env.state().is_alive {
            self.step_agent();
        } else {
            self.start_episode();
        }
    }

    /// Take the greedy action for the current observation
    fn step_agent(&mut self) {
        let action = self.network.greedy_action(&self.observation, &self.device);
        let outcome = self.env.step(action);
        self.observation = outcome.observation;

        if outcome.terminated {
            self.metrics.on_game_over(outcome.info.score);
        }
    }

    fn start_episode(&mut self) {
        self.observation = self.env.reset();
        self.metrics.on_game_start();
    }

    fn handle_event(&mut self, event: Event, tick_timer: &mut Interval) {
        let Event::Key(key) = event else {
            return;
        };
        if key.kind != KeyEventKind::Press {
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char(' ') => {
                self.paused = !self.paused;
            }
            KeyCode::Char('r') => {
                // An abandoned game still counts as played
                if self.env.state().is_alive {
                    self.metrics.on_game_over(self.env.score());
                }
                self.start_episode();
            }
            KeyCode::Char(c) => {
                if let Some(speed) = VisualizationSpeed::from_key(c) {
                    self.change_speed(speed, tick_timer);
                }
            }
            _ => {}
        }
    }

    fn change_speed(&mut self, new_speed: VisualizationSpeed, tick_timer: &mut Interval) {
        self.speed = new_speed;
        *tick_timer = interval(self.speed.tick_interval());
    }

    fn overlay(&self) -> WatchOverlay<'_> {
        WatchOverlay {
            env_id: &self.metadata.env_id,
            episode: self.metrics.current_episode(),
            speed: self.speed.as_str(),
            paused: self.paused,
        }
    }

    fn render_frame(&self, frame: &mut ratatui::Frame) {
        self.renderer
            .render(frame, self.env.state(), &self.metrics, &self.overlay());
    }

    fn cleanup_terminal(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stderr>>,
    ) -> Result<()> {
        disable_raw_mode().context("Failed to disable raw mode")?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)
            .context("Failed to leave alternate screen")?;
        terminal.show_cursor().context("Failed to show cursor")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::{
        DqnAgent, DqnConfig, EnvConfig, InferenceBackend, MlpQNetworkConfig, NetworkArchitecture,
        TrainingBackend, default_device, save_model, SNAKE_VANILLA,
    };
    use crossterm::event::{KeyEvent, KeyModifiers};
    use tempfile::TempDir;

    fn saved_model(dir: &TempDir) -> std::path::PathBuf {
        let device = default_device();
        let config = MlpQNetworkConfig::new(crate::rl::FEATURE_DIM).with_hidden_dim(8);
        let agent = DqnAgent::<TrainingBackend, _>::new(
            config.init::<TrainingBackend>(&device),
            DqnConfig::vanilla(),
            4,
            device,
        )
        .unwrap();

        let path = dir.path().join("watch_model");
        let env_config = EnvConfig::default()
            .with_grid_size(8, 8)
            .with_snake_length(1);
        save_model(
            &agent,
            &NetworkArchitecture::Mlp(config),
            SNAKE_VANILLA,
            &env_config,
            &path,
        )
        .unwrap();
        path
    }

    fn press(c: char) -> Event {
        Event::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
    }

    #[test]
    fn test_visualization_speed() {
        assert_eq!(VisualizationSpeed::Slow.tick_interval(), Duration::from_millis(500));
        assert_eq!(VisualizationSpeed::Normal.tick_interval(), Duration::from_millis(125));
        assert_eq!(VisualizationSpeed::Fast.tick_interval(), Duration::from_millis(50));
        assert_eq!(VisualizationSpeed::VeryFast.tick_interval(), Duration::from_millis(16));
        assert_eq!(VisualizationSpeed::from_key('3'), Some(VisualizationSpeed::Fast));
        assert_eq!(VisualizationSpeed::from_key('5'), None);
    }

    #[test]
    fn test_visualize_mode_creation() {
        let dir = TempDir::new().unwrap();
        let path = saved_model(&dir);

        let mode = VisualizeMode::<InferenceBackend>::new(&path, Some(1), default_device()).unwrap();

        assert_eq!(mode.metrics.games_played, 0);
        assert!(!mode.paused);
        assert_eq!(mode.speed, VisualizationSpeed::Normal);
        assert_eq!(mode.env.game_config().grid_width, 8);
        assert_eq!(mode.observation.len(), crate::rl::FEATURE_DIM);
    }

    #[test]
    fn test_missing_model_fails() {
        let dir = TempDir::new().unwrap();
        let result =
            VisualizeMode::<InferenceBackend>::new(&dir.path().join("none"), None, default_device());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_controls() {
        let dir = TempDir::new().unwrap();
        let path = saved_model(&dir);
        let mut mode = VisualizeMode::<InferenceBackend>::new(&path, Some(1), default_device()).unwrap();
        let mut timer = interval(Duration::from_millis(125));

        mode.handle_event(press(' '), &mut timer);
        assert!(mode.paused);
        mode.handle_event(press(' '), &mut timer);
        assert!(!mode.paused);

        mode.handle_event(press('4'), &mut timer);
        assert_eq!(mode.speed, VisualizationSpeed::VeryFast);

        mode.handle_event(press('r'), &mut timer);
        assert_eq!(mode.metrics.games_played, 1);
        assert_eq!(mode.env.state().steps, 0);

        mode.handle_event(press('q'), &mut timer);
        assert!(mode.should_quit);
    }

    #[test]
    fn test_ticks_play_until_game_over() {
        let dir = TempDir::new().unwrap();
        let path = saved_model(&dir);
        let mut mode = VisualizeMode::<InferenceBackend>::new(&path, Some(1), default_device()).unwrap();

        // A greedy policy either dies or keeps moving, so cap the ticks
        for _ in 0..500 {
            mode.tick();
            if !mode.env.state().is_alive {
                break;
            }
        }

        if !mode.env.state().is_alive {
            assert_eq!(mode.metrics.games_played, 1);
            mode.tick();
            assert!(mode.env.state().is_alive);
            assert_eq!(mode.metrics.current_episode(), 2);
        } else {
            assert!(mode.env.state().steps > 0);
        }
    }
}
