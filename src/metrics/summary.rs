//! TensorBoard scalar logging
//!
//! Each training run writes one event file into its log directory. Scalars are
//! keyed by episode index.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tensorboard_rs::summary_writer::SummaryWriter;

use super::training_stats::{EpisodeSummary, TrainingStats};

pub const TAG_EPISODE_REWARD: &str = "episode reward";
pub const TAG_RUNNING_AVG_REWARD: &str = "running avg reward(100)";
pub const TAG_AVERAGE_LOSS: &str = "average loss";
pub const TAG_AVERAGE_ITERATIONS: &str = "average iterations";
pub const TAG_SCORE: &str = "Score";
pub const TAG_HIGH_SCORE: &str = "High-Score";
pub const TAG_EPSILON: &str = "epsilon";

/// Writes per-episode training scalars as TensorBoard events
pub struct SummaryLogger {
    writer: SummaryWriter,
    logdir: PathBuf,
}

impl SummaryLogger {
    pub fn new<P: AsRef<Path>>(logdir: P) -> Result<Self> {
        let logdir = logdir.as_ref().to_path_buf();
        std::fs::create_dir_all(&logdir)
            .with_context(|| format!("Failed to create log directory: {:?}", logdir))?;

        Ok(Self {
            writer: SummaryWriter::new(&logdir),
            logdir,
        })
    }

    pub fn logdir(&self) -> &Path {
        &self.logdir
    }

    /// Write the scalars for one finished episode
    ///
    /// `stats` must already include `summary`.
    pub fn log_episode(&mut self, summary: &EpisodeSummary, stats: &TrainingStats) {
        let step = summary.episode;
        self.writer
            .add_scalar(TAG_EPISODE_REWARD, summary.reward, step);
        self.writer
            .add_scalar(TAG_RUNNING_AVG_REWARD, stats.running_avg_reward(), step);
        self.writer
            .add_scalar(TAG_AVERAGE_LOSS, summary.mean_loss.unwrap_or(0.0), step);
        self.writer
            .add_scalar(TAG_AVERAGE_ITERATIONS, summary.iterations as f32, step);
        self.writer.add_scalar(TAG_SCORE, summary.score as f32, step);
        self.writer
            .add_scalar(TAG_HIGH_SCORE, summary.high_score as f32, step);
        self.writer.add_scalar(TAG_EPSILON, summary.epsilon, step);
    }

    pub fn flush(&mut self) {
        self.writer.flush();
    }
}
