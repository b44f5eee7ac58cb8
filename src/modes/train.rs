//! Training mode for the DQN agent
//!
//! This module implements the training loop for the DQN agent. It plays
//! episodes in a registered Snake environment, feeds every transition to the
//! agent, writes TensorBoard scalars per episode and periodically saves
//! checkpoints.
//!
//! # Example
//!
//! ```rust,ignore
//! use snake_dqn::modes::{TrainConfig, train};
//! use snake_dqn::rl::{TrainingBackend, default_device};
//!
//! let config = TrainConfig::directed().with_episodes(200);
//! let report = train::<TrainingBackend>(config, default_device())?;
//! println!("model saved to {:?}", report.model_path);
//! ```

use anyhow::{Context, Result, bail};
use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::evaluate::{EvaluationReport, evaluate_policy};
use crate::metrics::{EpisodeSummary, LossAccumulator, SummaryLogger, TrainingStats};
use crate::rl::{
    ConfigError, DqnAgent, DqnConfig, EnvConfig, EnvRegistry, NetworkArchitecture, QFunction,
    ModelMetadata, SNAKE_DIR_V0, SNAKE_VANILLA, SnakeEnv, Transition, load_metadata, load_weights,
    save_model,
};

/// Placeholder in `save_path` replaced by the episode count
pub const EPISODES_PLACEHOLDER: &str = "{episodes}";

/// Prefix of periodic checkpoint files inside the run directory
pub const CHECKPOINT_PREFIX: &str = "DQN_Snake_";

/// Configuration for training mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Registry id of the environment
    pub env_id: String,

    /// Overrides applied to the registered environment
    pub env_config: EnvConfig,

    /// Number of episodes to train
    pub num_episodes: usize,

    /// Cut an episode after this many steps
    pub max_steps_per_episode: Option<usize>,

    /// Reward stored for terminal transitions instead of the environment's
    pub terminal_reward: Option<f32>,

    /// Print training progress every N episodes
    pub log_frequency: usize,

    /// Save a checkpoint every N episodes
    pub checkpoint_frequency: Option<usize>,

    /// Root of the per-run log directories
    pub log_dir: PathBuf,

    /// Where the final model goes; defaults to the run directory.
    /// `{episodes}` is replaced by `num_episodes`.
    pub save_path: Option<String>,

    /// Width of the hidden layers
    pub hidden_dim: Option<usize>,

    /// Step cap of the greedy evaluation after training
    pub eval_max_steps: usize,

    /// Seeds the environment and the agent
    pub seed: Option<u64>,

    /// Continue from a saved model: weights, counters and ε
    pub resume_from: Option<PathBuf>,

    /// DQN hyperparameters
    pub dqn: DqnConfig,
}

impl TrainConfig {
    /// Directed-observation setup: conv network on a 12x12 board
    pub fn directed() -> Self {
        Self {
            env_id: SNAKE_DIR_V0.to_string(),
            env_config: EnvConfig::default().with_grid_size(12, 12),
            num_episodes: 1000,
            max_steps_per_episode: None,
            terminal_reward: Some(-200.0),
            log_frequency: 100,
            checkpoint_frequency: Some(10_000),
            log_dir: PathBuf::from("logs"),
            save_path: None,
            hidden_dim: None,
            eval_max_steps: 1000,
            seed: None,
            resume_from: None,
            dqn: DqnConfig::directed(),
        }
    }

    /// Feature-vector setup: MLP on a 20x20 board with a one-cell snake
    pub fn vanilla() -> Self {
        Self {
            env_id: SNAKE_VANILLA.to_string(),
            env_config: EnvConfig::default()
                .with_grid_size(20, 20)
                .with_snake_length(1),
            num_episodes: 1500,
            max_steps_per_episode: Some(1000),
            terminal_reward: None,
            log_frequency: 100,
            checkpoint_frequency: None,
            log_dir: PathBuf::from("logs"),
            save_path: Some(format!("Models/ffdqn_{EPISODES_PLACEHOLDER}episodes")),
            hidden_dim: None,
            eval_max_steps: 1000,
            seed: Some(0),
            resume_from: None,
            dqn: DqnConfig::vanilla(),
        }
    }

    pub fn with_episodes(mut self, num_episodes: usize) -> Self {
        self.num_episodes = num_episodes;
        self
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Load a configuration from a JSON file
    ///
    /// Missing fields take the `directed()` values.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read training config {:?}", path))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse training config {:?}", path))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.env_id.is_empty() {
            return Err(ConfigError::Inconsistent("env_id must not be empty".into()));
        }
        if self.num_episodes == 0 {
            return Err(ConfigError::Zero("num_episodes"));
        }
        if self.log_frequency == 0 {
            return Err(ConfigError::Zero("log_frequency"));
        }
        if self.eval_max_steps == 0 {
            return Err(ConfigError::Zero("eval_max_steps"));
        }
        if self.max_steps_per_episode == Some(0) {
            return Err(ConfigError::Zero("max_steps_per_episode"));
        }
        if self.checkpoint_frequency == Some(0) {
            return Err(ConfigError::Zero("checkpoint_frequency"));
        }
        if self.hidden_dim == Some(0) {
            return Err(ConfigError::Zero("hidden_dim"));
        }
        if let Some(reward) = self.terminal_reward {
            if !reward.is_finite() {
                return Err(ConfigError::out_of_range("terminal_reward", "finite", reward));
            }
        }
        self.dqn.validate()
    }

    /// The final model path with `{episodes}` filled in, if one is configured
    pub fn resolved_save_path(&self) -> Option<PathBuf> {
        self.save_path.as_ref().map(|path| {
            PathBuf::from(path.replace(EPISODES_PLACEHOLDER, &self.num_episodes.to_string()))
        })
    }
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self::directed()
    }
}

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub run_dir: PathBuf,
    pub model_path: PathBuf,
    pub episodes: usize,
    pub env_steps: usize,
    pub running_avg_reward: f32,
    pub high_score: u32,
    pub evaluation: EvaluationReport,
}

/// `<log_root>/dqn_<env_id>/<timestamp>`
pub fn run_log_dir(log_root: &Path, env_id: &str, timestamp: &str) -> PathBuf {
    log_root.join(format!("dqn_{env_id}")).join(timestamp)
}

/// A fresh run directory stamped with the local time
///
/// Runs started within the same second get a numeric suffix.
fn new_run_dir(log_root: &Path, env_id: &str) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
    let base = run_log_dir(log_root, env_id, &timestamp);
    if !base.exists() {
        return base;
    }
    (1..)
        .map(|n| run_log_dir(log_root, env_id, &format!("{timestamp}-{n}")))
        .find(|dir| !dir.exists())
        .unwrap_or(base)
}

/// Reward written to the replay buffer for one step
fn stored_reward(reward: f32, terminated: bool, terminal_reward: Option<f32>) -> f32 {
    match terminal_reward {
        Some(replacement) if terminated => replacement,
        _ => reward,
    }
}

/// A saved model can only continue on the environment and network it was saved with
fn check_resumable(
    metadata: &ModelMetadata,
    env_id: &str,
    architecture: &NetworkArchitecture,
) -> Result<()> {
    if metadata.env_id != env_id {
        bail!(
            "model was trained on {} but this run uses {}",
            metadata.env_id,
            env_id
        );
    }
    if &metadata.architecture != architecture {
        bail!("model architecture {:?} does not match {:?}", metadata.architecture, architecture);
    }
    Ok(())
}

/// Build the environment and network for `config` and train one agent
pub fn train<B: AutodiffBackend>(config: TrainConfig, device: B::Device) -> Result<TrainReport> {
    config.validate()?;

    let mut env_config = config.env_config.clone();
    if env_config.seed.is_none() {
        env_config.seed = config.seed;
    }
    let env = EnvRegistry::default().make(&config.env_id, &env_config)?;

    let saved = config.resume_from.as_deref().map(load_metadata).transpose()?;

    // A resumed run keeps the saved layer width unless one is given
    let hidden_dim = config
        .hidden_dim
        .or_else(|| saved.as_ref().map(|metadata| metadata.architecture.hidden_dim()));
    let game = env.game_config();
    let architecture = NetworkArchitecture::for_observation(
        env.observation_kind(),
        game.grid_width,
        game.grid_height,
        env.num_actions(),
        hidden_dim,
    );
    if let Some(metadata) = &saved {
        check_resumable(metadata, env.id(), &architecture)?;
    }

    match &architecture {
        NetworkArchitecture::Conv(network) => {
            let network = network.init::<B>(&device);
            TrainMode::new(config, env, network, architecture, device)?.run()
        }
        NetworkArchitecture::Mlp(network) => {
            let network = network.init::<B>(&device);
            TrainMode::new(config, env, network, architecture, device)?.run()
        }
    }
}

/// Repeat the experiment `runs` times, each with a fresh agent and log directory
pub fn train_runs<B: AutodiffBackend>(
    config: TrainConfig,
    runs: usize,
    device: B::Device,
) -> Result<Vec<TrainReport>> {
    let mut reports = Vec::with_capacity(runs);
    for run in 0..runs {
        let mut run_config = config.clone();
        run_config.seed = config.seed.map(|seed| seed + run as u64);
        if runs > 1 {
            println!("\n### Run {}/{} ###\n", run + 1, runs);
        }
        reports.push(train::<B>(run_config, device.clone())?);
    }
    Ok(reports)
}

/// Training mode coordinator
///
/// Manages the training loop, statistics tracking, scalar logging and model
/// checkpointing for one run.
pub struct TrainMode<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + QFunction<B>,
    M::InnerModule: QFunction<B::InnerBackend>,
{
    config: TrainConfig,
    env_config: EnvConfig,
    env: SnakeEnv,
    agent: DqnAgent<B, M>,
    architecture: NetworkArchitecture,
    stats: TrainingStats,
    logger: SummaryLogger,
    run_dir: PathBuf,
}

impl<B, M> TrainMode<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + QFunction<B>,
    M::InnerModule: QFunction<B::InnerBackend>,
{
    /// Create a training run around an environment and a fresh network
    ///
    /// With `resume_from` set, the saved weights are loaded into `network` and
    /// the agent continues the saved run's counters and ε. Creates the run's
    /// log directory.
    pub fn new(
        config: TrainConfig,
        env: SnakeEnv,
        network: M,
        architecture: NetworkArchitecture,
        device: B::Device,
    ) -> Result<Self> {
        config.validate()?;

        let (network, resumed) = match &config.resume_from {
            Some(path) => {
                let metadata = load_metadata(path)?;
                check_resumable(&metadata, env.id(), &architecture)?;
                (load_weights(network, path, &device)?, Some(metadata))
            }
            None => (network, None),
        };

        let mut agent = DqnAgent::new(network, config.dqn.clone(), env.num_actions(), device)?;
        if let Some(seed) = config.seed {
            agent = agent.with_seed(seed);
        }
        if let Some(metadata) = resumed {
            agent.restore_progress(
                metadata.env_steps,
                metadata.training_steps,
                metadata.episodes_trained,
                metadata.epsilon,
            );
            log::info!(
                "resuming after {} episodes ({} env steps)",
                metadata.episodes_trained,
                metadata.env_steps
            );
        }

        let run_dir = new_run_dir(&config.log_dir, env.id());
        let logger = SummaryLogger::new(&run_dir)?;
        log::info!("logging run to {}", run_dir.display());

        let mut env_config = config.env_config.clone();
        if env_config.seed.is_none() {
            env_config.seed = config.seed;
        }

        Ok(Self {
            config,
            env_config,
            env,
            agent,
            architecture,
            stats: TrainingStats::default(),
            logger,
            run_dir,
        })
    }

    /// Run the training loop
    ///
    /// Trains for `num_episodes`, then saves the final model and plays one
    /// greedy episode.
    pub fn run(&mut self) -> Result<TrainReport> {
        self.print_header();

        // Resumed runs continue the saved episode numbering
        let first_episode = self.agent.episodes_trained();
        for episode in first_episode..first_episode + self.config.num_episodes {
            let summary = self.run_episode(episode);
            self.stats.record_episode(&summary);
            self.logger.log_episode(&summary, &self.stats);

            if episode % self.config.log_frequency == 0 {
                self.print_progress(episode, first_episode + self.config.num_episodes);
            }

            if let Some(frequency) = self.config.checkpoint_frequency {
                if episode % frequency == 0 {
                    self.save_checkpoint(episode)?;
                }
            }
        }
        self.logger.flush();

        let model_path = self.final_model_path();
        self.save_model(&model_path)?;

        println!("\nTraining complete!");
        println!("Final model saved to: {:?}", model_path);
        println!("\nFinal Statistics:");
        println!("{}", self.stats.format_summary());
        println!(
            "avg reward for last {} episodes: {:.2}",
            self.stats.window_size(),
            self.stats.running_avg_reward()
        );

        let evaluation = self.evaluate();
        if let Some(episode) = evaluation.episodes.first() {
            println!("Testing steps: {} rewards {}", episode.steps, episode.reward);
        }

        Ok(TrainReport {
            run_dir: self.run_dir.clone(),
            model_path,
            episodes: self.stats.total_episodes(),
            env_steps: self.agent.env_steps(),
            running_avg_reward: self.stats.running_avg_reward(),
            high_score: self.stats.high_score(),
            evaluation,
        })
    }

    /// Play one episode, learning after every step
    fn run_episode(&mut self, episode: usize) -> EpisodeSummary {
        self.agent.begin_episode();
        let epsilon = self.agent.epsilon();

        let mut observation = self.env.reset();
        let mut total_reward = 0.0;
        let mut iterations = 0;
        let mut losses = LossAccumulator::default();

        loop {
            let action = self.agent.select_action(&observation);
            let outcome = self.env.step(action);
            total_reward += outcome.reward;
            iterations += 1;

            self.agent.store(Transition {
                observation,
                action,
                reward: stored_reward(
                    outcome.reward,
                    outcome.terminated,
                    self.config.terminal_reward,
                ),
                next_observation: outcome.observation.clone(),
                done: outcome.terminated,
            });

            if let Some(loss) = self.agent.learn() {
                losses.push(loss);
            }
            self.agent.update_target();

            observation = outcome.observation;

            let truncated = self
                .config
                .max_steps_per_episode
                .is_some_and(|max| iterations >= max);
            if outcome.terminated || truncated {
                break;
            }
        }
        self.agent.end_episode();

        EpisodeSummary {
            episode,
            reward: total_reward,
            iterations,
            score: self.env.score(),
            high_score: self.env.high_score(),
            mean_loss: losses.mean(),
            epsilon,
        }
    }

    /// One greedy episode with the trained network
    fn evaluate(&mut self) -> EvaluationReport {
        let agent = &self.agent;
        evaluate_policy(
            &mut self.env,
            |observation| agent.greedy_action(observation),
            1,
            self.config.eval_max_steps,
        )
    }

    fn final_model_path(&self) -> PathBuf {
        self.config
            .resolved_save_path()
            .unwrap_or_else(|| self.run_dir.join(format!("{CHECKPOINT_PREFIX}final")))
    }

    fn save_checkpoint(&self, episode: usize) -> Result<()> {
        let checkpoint_path = self.run_dir.join(format!("{CHECKPOINT_PREFIX}{episode}"));
        self.save_model(&checkpoint_path)
            .with_context(|| format!("Failed to save checkpoint at episode {}", episode))?;
        println!("  Checkpoint saved: {:?}", checkpoint_path);
        Ok(())
    }

    fn save_model(&self, path: &Path) -> Result<()> {
        save_model(
            &self.agent,
            &self.architecture,
            &self.config.env_id,
            &self.env_config,
            path,
        )
        .with_context(|| format!("Failed to save model to {:?}", path))
    }

    fn print_header(&self) {
        let dqn = &self.config.dqn;
        println!("{}", "=".repeat(70));
        println!("DQN Training - Snake");
        println!("{}", "=".repeat(70));
        println!("Environment: {}", self.config.env_id);
        let game = self.env.game_config();
        println!(
            "Grid: {}x{} | Snake length: {}",
            game.grid_width, game.grid_height, game.initial_snake_length
        );
        println!("Episodes: {}", self.config.num_episodes);
        if let Some(max_steps) = self.config.max_steps_per_episode {
            println!("Max steps per episode: {}", max_steps);
        }
        println!("DQN Config:");
        println!("  Learning rate: {}", dqn.learning_rate);
        println!("  Gamma: {}", dqn.gamma);
        println!("  Batch size: {}", dqn.batch_size);
        println!("  Buffer capacity: {}", dqn.buffer_capacity);
        println!("  Min experiences: {}", dqn.min_experiences);
        println!("  Train frequency: {}", dqn.train_frequency);
        println!("  Target update: {:?}", dqn.target_update);
        println!(
            "  Epsilon: {} (decay {}, min {})",
            dqn.exploration.start, dqn.exploration.decay, dqn.exploration.min
        );
        if let Some(checkpoints) = self.config.checkpoint_frequency {
            println!("Checkpoints: Every {} episodes", checkpoints);
        }
        println!("Logging: Every {} episodes", self.config.log_frequency);
        println!("Log dir: {:?}", self.run_dir);
        println!("{}", "=".repeat(70));
        println!();
    }

    fn print_progress(&self, episode: usize, total_episodes: usize) {
        println!(
            "[Episode {}/{}] {}",
            episode + 1,
            total_episodes,
            self.stats.format_summary()
        );
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn agent(&self) -> &DqnAgent<B, M> {
        &self.agent
    }

    pub fn stats(&self) -> &TrainingStats {
        &self.stats
    }
}
