//! Training statistics tracking for DQN
//!
//! Tracks per-episode reward, iteration count, score and mean loss, plus the
//! rolling averages printed to the console and written as scalars.

use std::collections::VecDeque;

/// Window of the running average reward
pub const RUNNING_AVERAGE_WINDOW: usize = 100;

/// What one training episode produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeSummary {
    /// 0-based episode index within the run
    pub episode: usize,
    /// Sum of the raw environment rewards
    pub reward: f32,
    /// Environment steps taken
    pub iterations: usize,
    /// Food eaten
    pub score: u32,
    /// Best score of the environment so far
    pub high_score: u32,
    /// Mean loss over the gradient steps of this episode, if any were taken
    pub mean_loss: Option<f32>,
    /// ε the episode was played with
    pub epsilon: f32,
}

/// Running mean of the losses returned during one episode
#[derive(Debug, Clone, Copy, Default)]
pub struct LossAccumulator {
    sum: f32,
    count: usize,
}

impl LossAccumulator {
    pub fn push(&mut self, loss: f32) {
        self.sum += loss;
        self.count += 1;
    }

    /// `None` when no gradient step was taken
    pub fn mean(&self) -> Option<f32> {
        (self.count > 0).then(|| self.sum / self.count as f32)
    }
}

/// Training statistics tracker with rolling averages
///
/// # Example
///
/// ```rust
/// use snake_dqn::metrics::{EpisodeSummary, TrainingStats};
///
/// let mut stats = TrainingStats::new(100);
/// stats.record_episode(&EpisodeSummary {
///     episode: 0,
///     reward: 9.5,
///     iterations: 42,
///     score: 1,
///     high_score: 1,
///     mean_loss: Some(0.25),
///     epsilon: 0.99,
/// });
///
/// assert_eq!(stats.total_episodes(), 1);
/// println!("{}", stats.format_summary());
/// ```
#[derive(Debug, Clone)]
pub struct TrainingStats {
    episode_rewards: VecDeque<f32>,
    episode_iterations: VecDeque<usize>,
    episode_scores: VecDeque<u32>,
    /// Mean loss of recent episodes that trained at all
    episode_losses: VecDeque<f32>,
    last: Option<EpisodeSummary>,
    high_score: u32,
    total_episodes: usize,
    total_steps: usize,
    window_size: usize,
}

impl TrainingStats {
    /// Create a tracker keeping the last `window_size` episodes
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            episode_rewards: VecDeque::with_capacity(window_size),
            episode_iterations: VecDeque::with_capacity(window_size),
            episode_scores: VecDeque::with_capacity(window_size),
            episode_losses: VecDeque::with_capacity(window_size),
            last: None,
            high_score: 0,
            total_episodes: 0,
            total_steps: 0,
            window_size,
        }
    }

    pub fn record_episode(&mut self, summary: &EpisodeSummary) {
        Self::push_deque(&mut self.episode_rewards, summary.reward, self.window_size);
        Self::push_deque(
            &mut self.episode_iterations,
            summary.iterations,
            self.window_size,
        );
        Self::push_deque(&mut self.episode_scores, summary.score, self.window_size);
        if let Some(loss) = summary.mean_loss {
            Self::push_deque(&mut self.episode_losses, loss, self.window_size);
        }

        self.high_score = self.high_score.max(summary.high_score).max(summary.score);
        self.total_episodes += 1;
        self.total_steps += summary.iterations;
        self.last = Some(*summary);
    }

    /// Mean reward over the rolling window
    pub fn running_avg_reward(&self) -> f32 {
        Self::mean(self.episode_rewards.iter().copied())
    }

    pub fn mean_iterations(&self) -> f32 {
        Self::mean(self.episode_iterations.iter().map(|&n| n as f32))
    }

    pub fn mean_score(&self) -> f32 {
        Self::mean(self.episode_scores.iter().map(|&s| s as f32))
    }

    pub fn mean_loss(&self) -> f32 {
        Self::mean(self.episode_losses.iter().copied())
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    pub fn last_episode(&self) -> Option<&EpisodeSummary> {
        self.last.as_ref()
    }

    pub fn total_episodes(&self) -> usize {
        self.total_episodes
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// One-line progress report
    pub fn format_summary(&self) -> String {
        let (episode, reward, epsilon, loss) = match &self.last {
            Some(last) => (
                last.episode,
                last.reward,
                last.epsilon,
                last.mean_loss.unwrap_or(0.0),
            ),
            None => (0, 0.0, 0.0, 0.0),
        };

        format!(
            "Episode: {} | Reward: {:.2} | Eps: {:.4} | Avg Reward ({}): {:.2} | Avg Iterations: {:.1} | Avg Score: {:.2} | High Score: {} | Loss: {:.4}",
            episode,
            reward,
            epsilon,
            self.window_size,
            self.running_avg_reward(),
            self.mean_iterations(),
            self.mean_score(),
            self.high_score,
            loss,
        )
    }

    fn mean(values: impl ExactSizeIterator<Item = f32>) -> f32 {
        let len = values.len();
        if len == 0 {
            0.0
        } else {
            values.sum::<f32>() / len as f32
        }
    }

    fn push_deque<T>(deque: &mut VecDeque<T>, value: T, window_size: usize) {
        if deque.len() >= window_size {
            deque.pop_front();
        }
        deque.push_back(value);
    }
}

impl Default for TrainingStats {
    fn default() -> Self {
        Self::new(RUNNING_AVERAGE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(episode: usize, reward: f32, iterations: usize, score: u32) -> EpisodeSummary {
        EpisodeSummary {
            episode,
            reward,
            iterations,
            score,
            high_score: score,
            mean_loss: Some(reward / 10.0),
            epsilon: 0.5,
        }
    }

    #[test]
    fn test_new() {
        let stats = TrainingStats::default();
        assert_eq!(stats.window_size(), 100);
        assert_eq!(stats.total_episodes(), 0);
        assert!(stats.last_episode().is_none());
    }

    #[test]
    fn test_record_episode() {
        let mut stats = TrainingStats::new(100);
        stats.record_episode(&summary(0, 10.0, 50, 3));

        assert_eq!(stats.total_episodes(), 1);
        assert_eq!(stats.total_steps(), 50);
        assert!((stats.running_avg_reward() - 10.0).abs() < 1e-5);
        assert!((stats.mean_iterations() - 50.0).abs() < 1e-5);
        assert!((stats.mean_score() - 3.0).abs() < 1e-5);
        assert!((stats.mean_loss() - 1.0).abs() < 1e-5);
        assert_eq!(stats.high_score(), 3);
    }

    #[test]
    fn test_rolling_average() {
        let mut stats = TrainingStats::new(3);

        stats.record_episode(&summary(0, 1.0, 10, 1));
        stats.record_episode(&summary(1, 2.0, 20, 2));
        stats.record_episode(&summary(2, 3.0, 30, 3));
        assert!((stats.running_avg_reward() - 2.0).abs() < 1e-5);

        // The first episode drops out of the window
        stats.record_episode(&summary(3, 4.0, 40, 0));
        assert_eq!(stats.total_episodes(), 4);
        assert!((stats.running_avg_reward() - 3.0).abs() < 1e-5);
        assert_eq!(stats.total_steps(), 100);
        assert_eq!(stats.high_score(), 3);
    }

    #[test]
    fn test_episodes_without_training_skip_loss() {
        let mut stats = TrainingStats::new(10);
        let mut no_loss = summary(0, -10.0, 5, 0);
        no_loss.mean_loss = None;

        stats.record_episode(&no_loss);
        assert_eq!(stats.mean_loss(), 0.0);

        stats.record_episode(&summary(1, 20.0, 5, 1));
        assert!((stats.mean_loss() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_loss_accumulator() {
        let mut losses = LossAccumulator::default();
        assert_eq!(losses.mean(), None);

        losses.push(1.0);
        losses.push(3.0);
        assert_eq!(losses.mean(), Some(2.0));
    }

    #[test]
    fn test_format_summary() {
        let mut stats = TrainingStats::new(100);
        stats.record_episode(&summary(7, 15.5, 150, 5));

        let line = stats.format_summary();
        assert!(line.contains("Episode: 7"));
        assert!(line.contains("Reward: 15.50"));
        assert!(line.contains("Eps: 0.5000"));
        assert!(line.contains("Avg Reward (100): 15.50"));
        assert!(line.contains("Avg Iterations: 150.0"));
        assert!(line.contains("High Score: 5"));
        assert!(line.contains("Loss: 1.5500"));
    }

    #[test]
    fn test_empty_stats() {
        let stats = TrainingStats::new(100);
        assert_eq!(stats.running_avg_reward(), 0.0);
        assert_eq!(stats.mean_iterations(), 0.0);
        assert_eq!(stats.mean_score(), 0.0);
        assert_eq!(stats.mean_loss(), 0.0);
    }
}
