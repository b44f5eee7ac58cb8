//! Greedy evaluation of a trained policy
//!
//! Plays whole episodes with ε = 0 and reports steps, reward and score per
//! episode. Episodes that never terminate are cut at `max_steps`, since a
//! greedy policy can circle forever without eating.

use anyhow::{Context, Result};
use burn::tensor::backend::Backend;
use std::path::Path;

use crate::rl::{EnvRegistry, QNetwork, SnakeEnv, load_network};

/// Outcome of one greedy episode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeResult {
    pub steps: usize,
    pub reward: f32,
    pub score: u32,
    /// Whether the game ended on its own rather than at the step cap
    pub terminated: bool,
}

/// Per-episode results plus their means
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvaluationReport {
    pub episodes: Vec<EpisodeResult>,
}

impl EvaluationReport {
    pub fn mean_steps(&self) -> f32 {
        self.mean(|e| e.steps as f32)
    }

    pub fn mean_reward(&self) -> f32 {
        self.mean(|e| e.reward)
    }

    pub fn mean_score(&self) -> f32 {
        self.mean(|e| e.score as f32)
    }

    pub fn best_score(&self) -> u32 {
        self.episodes.iter().map(|e| e.score).max().unwrap_or(0)
    }

    fn mean(&self, f: impl Fn(&EpisodeResult) -> f32) -> f32 {
        if self.episodes.is_empty() {
            return 0.0;
        }
        self.episodes.iter().map(f).sum::<f32>() / self.episodes.len() as f32
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Episodes: {} | Avg Steps: {:.1} | Avg Reward: {:.2} | Avg Score: {:.2} | Best Score: {}",
            self.episodes.len(),
            self.mean_steps(),
            self.mean_reward(),
            self.mean_score(),
            self.best_score(),
        )
    }
}

/// Play `episodes` episodes choosing actions with `policy`
pub fn evaluate_policy<F>(
    env: &mut SnakeEnv,
    mut policy: F,
    episodes: usize,
    max_steps: usize,
) -> EvaluationReport
where
    F: FnMut(&[f32]) -> usize,
{
    let mut report = EvaluationReport::default();

    for _ in 0..episodes {
        let mut observation = env.reset();
        let mut result = EpisodeResult {
            steps: 0,
            reward: 0.0,
            score: 0,
            terminated: false,
        };

        while result.steps < max_steps {
            let outcome = env.step(policy(&observation));
            result.steps += 1;
            result.reward += outcome.reward;
            observation = outcome.observation;

            if outcome.terminated {
                result.terminated = true;
                break;
            }
        }

        result.score = env.score();
        report.episodes.push(result);
    }

    report
}

/// Greedy evaluation of a loaded network
pub fn evaluate_greedy<B: Backend>(
    env: &mut SnakeEnv,
    network: &QNetwork<B>,
    device: &B::Device,
    episodes: usize,
    max_steps: usize,
) -> EvaluationReport {
    evaluate_policy(
        env,
        |observation| network.greedy_action(observation, device),
        episodes,
        max_steps,
    )
}

/// Load a saved model, rebuild its environment and evaluate it
pub fn run_evaluation<B: Backend>(
    model_path: &Path,
    episodes: usize,
    max_steps: usize,
    seed: Option<u64>,
    device: &B::Device,
) -> Result<EvaluationReport> {
    let (network, metadata) = load_network::<B>(model_path, device)
        .with_context(|| format!("Failed to load model from {:?}", model_path))?;

    let mut env_config = metadata.env_config.clone();
    if seed.is_some() {
        env_config.seed = seed;
    }
    let mut env = EnvRegistry::default().make(&metadata.env_id, &env_config)?;

    println!("{}", "=".repeat(70));
    println!("DQN Evaluation - Snake");
    println!("{}", "=".repeat(70));
    println!("Model: {:?}", model_path);
    println!("Environment: {}", metadata.env_id);
    println!(
        "Trained for {} episodes ({} env steps)",
        metadata.episodes_trained, metadata.env_steps
    );
    println!("{}", "=".repeat(70));

    let report = evaluate_greedy(&mut env, &network, device, episodes, max_steps);

    for (i, episode) in report.episodes.iter().enumerate() {
        println!(
            "Testing episode {}: steps {} rewards {:.2} score {}{}",
            i + 1,
            episode.steps,
            episode.reward,
            episode.score,
            if episode.terminated { "" } else { " (step cap)" },
        );
    }
    println!("{}", report.format_summary());

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Direction, GameConfig};
    use crate::rl::{InferenceBackend, ObservationKind, default_device};

    fn env() -> SnakeEnv {
        SnakeEnv::with_seed("test", GameConfig::small(), ObservationKind::Features, 11)
    }

    #[test]
    fn test_straight_policy_hits_wall() {
        let mut env = env();
        let right = Direction::Right.index();

        let report = evaluate_policy(&mut env, |_| right, 3, 100);

        assert_eq!(report.episodes.len(), 3);
        for episode in &report.episodes {
            assert!(episode.terminated);
            // Head starts at x = 5 on a 10-wide board
            assert!(episode.steps <= 5);
        }
    }

    #[test]
    fn test_step_cap() {
        let mut env = env();
        let down = Direction::Down.index();

        // Two steps from the centre of a 10x10 board can't reach a wall
        let report = evaluate_policy(&mut env, |_| down, 1, 2);

        let episode = report.episodes[0];
        assert_eq!(episode.steps, 2);
        assert!(!episode.terminated);
    }

    #[test]
    fn test_report_means() {
        let report = EvaluationReport {
            episodes: vec![
                EpisodeResult { steps: 10, reward: 1.0, score: 1, terminated: true },
                EpisodeResult { steps: 30, reward: 3.0, score: 3, terminated: true },
            ],
        };
        assert_eq!(report.mean_steps(), 20.0);
        assert_eq!(report.mean_reward(), 2.0);
        assert_eq!(report.mean_score(), 2.0);
        assert_eq!(report.best_score(), 3);
        assert!(report.format_summary().contains("Episodes: 2"));

        let empty = EvaluationReport::default();
        assert_eq!(empty.mean_reward(), 0.0);
    }

    #[test]
    fn test_evaluate_greedy_network() {
        let device = default_device();
        let mut env = env();
        let network = crate::rl::NetworkArchitecture::for_observation(
            ObservationKind::Features,
            10,
            10,
            4,
            Some(8),
        )
        .init::<InferenceBackend>(&device);

        let report = evaluate_greedy(&mut env, &network, &device, 2, 50);
        assert_eq!(report.episodes.len(), 2);
        assert!(report.episodes.iter().all(|e| e.steps <= 50));
    }
}
