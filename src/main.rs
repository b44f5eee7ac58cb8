use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use snake_dqn::modes::{TrainConfig, VisualizeMode, run_evaluation, train_runs};
use snake_dqn::rl::{InferenceBackend, TrainingBackend, default_device};

#[derive(Parser)]
#[command(name = "snake_dqn")]
#[command(version, about = "Deep Q-learning agents for the Snake game")]
struct Cli {
    /// What to do
    #[arg(long, default_value = "train")]
    mode: Mode,

    /// Training setup to start from
    #[arg(long, default_value = "directed")]
    preset: Preset,

    /// JSON training config, used instead of the preset
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of training episodes
    #[arg(long)]
    episodes: Option<usize>,

    /// Repeat training this many times with fresh agents
    #[arg(long, default_value = "1")]
    runs: usize,

    /// Root directory of the per-run logs
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Model path: where training saves the final model, or what to load
    #[arg(long)]
    model: Option<PathBuf>,

    /// Seed for the environment and the agent
    #[arg(long)]
    seed: Option<u64>,

    /// Continue training from a saved model
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Episodes played in evaluate mode
    #[arg(long, default_value = "10")]
    eval_episodes: usize,

    /// Step cap per evaluation episode
    #[arg(long, default_value = "1000")]
    eval_max_steps: usize,
}

#[derive(Clone, ValueEnum)]
enum Mode {
    /// Train a DQN agent
    Train,
    /// Watch a trained model play in the terminal
    Visualize,
    /// Play greedy episodes with a trained model and report the results
    Evaluate,
}

#[derive(Clone, ValueEnum)]
enum Preset {
    /// Grid observations and a convolutional network
    Directed,
    /// Feature observations and an MLP
    Vanilla,
}

impl Cli {
    fn train_config(&self) -> Result<TrainConfig> {
        let mut config = match &self.config {
            Some(path) => TrainConfig::from_json_file(path)?,
            None => match self.preset {
                Preset::Directed => TrainConfig::directed(),
                Preset::Vanilla => TrainConfig::vanilla(),
            },
        };

        if let Some(episodes) = self.episodes {
            config.num_episodes = episodes;
        }
        if let Some(log_dir) = &self.log_dir {
            config.log_dir = log_dir.clone();
        }
        if let Some(model) = &self.model {
            config.save_path = Some(model.to_string_lossy().into_owned());
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(resume) = &self.resume {
            config.resume_from = Some(resume.clone());
        }

        config.validate().context("Invalid training configuration")?;
        Ok(config)
    }

    fn model_path(&self) -> Result<PathBuf> {
        match &self.model {
            Some(path) => Ok(path.clone()),
            None => bail!("--model is required in this mode"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let device = default_device();

    match cli.mode {
        Mode::Train => {
            if cli.runs == 0 {
                bail!("--runs must be at least 1");
            }
            let config = cli.train_config()?;
            let reports = train_runs::<TrainingBackend>(config, cli.runs, device)?;
            for (i, report) in reports.iter().enumerate() {
                log::info!(
                    "run {}: avg reward {:.2}, high score {}, model {}",
                    i + 1,
                    report.running_avg_reward,
                    report.high_score,
                    report.model_path.display()
                );
            }
        }
        Mode::Visualize => {
            let model_path = cli.model_path()?;
            let mut visualize_mode =
                VisualizeMode::<InferenceBackend>::new(&model_path, cli.seed, device)?;
            visualize_mode.run().await?;
        }
        Mode::Evaluate => {
            let model_path = cli.model_path()?;
            run_evaluation::<InferenceBackend>(
                &model_path,
                cli.eval_episodes,
                cli.eval_max_steps,
                cli.seed,
                &device,
            )?;
        }
    }

    Ok(())
}
