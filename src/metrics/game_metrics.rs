use std::time::{Duration, Instant};

/// Episode bookkeeping for the watch viewer
pub struct GameMetrics {
    pub start_time: Instant,
    pub elapsed_time: Duration,
    pub high_score: u32,
    pub games_played: u32,
    pub last_score: Option<u32>,
    total_score: u64,
}

impl GameMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            elapsed_time: Duration::ZERO,
            high_score: 0,
            games_played: 0,
            last_score: None,
            total_score: 0,
        }
    }

    pub fn update(&mut self) {
        self.elapsed_time = self.start_time.elapsed();
    }

    pub fn on_game_start(&mut self) {
        self.start_time = Instant::now();
        self.elapsed_time = Duration::ZERO;
    }

    pub fn on_game_over(&mut self, final_score: u32) {
        self.games_played += 1;
        self.high_score = self.high_score.max(final_score);
        self.last_score = Some(final_score);
        self.total_score += u64::from(final_score);
    }

    /// 1-based number of the episode being played
    pub fn current_episode(&self) -> u32 {
        self.games_played + 1
    }

    pub fn mean_score(&self) -> f32 {
        if self.games_played == 0 {
            0.0
        } else {
            self.total_score as f32 / self.games_played as f32
        }
    }

    pub fn format_time(&self) -> String {
        let total_secs = self.elapsed_time.as_secs();
        format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
    }
}

impl Default for GameMetrics {
    fn default() -> Self {
        Self::new()
    }
}
