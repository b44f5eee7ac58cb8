//! Model persistence for saving and loading trained agents
//!
//! A saved model is two files next to each other:
//! - `<path>.mpk` - online network weights (Burn named MessagePack record)
//! - `<path>.meta.json` - [`ModelMetadata`] describing how to rebuild it

use super::{DqnAgent, DqnConfig, EnvConfig, NetworkArchitecture, QFunction, QNetwork};
use anyhow::{Context, Result};
use burn::{
    module::{AutodiffModule, Module},
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
    tensor::backend::{AutodiffBackend, Backend},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Metadata saved with the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Registry id of the environment the model was trained on
    pub env_id: String,
    /// Overrides the environment was built with
    #[serde(default)]
    pub env_config: EnvConfig,
    pub architecture: NetworkArchitecture,
    pub dqn_config: DqnConfig,
    /// Gradient steps taken
    pub training_steps: usize,
    pub env_steps: usize,
    pub episodes_trained: usize,
    /// ε at save time, so training can resume on schedule
    pub epsilon: f32,
    /// Crate version that wrote the model
    pub version: String,
}

impl ModelMetadata {
    pub fn from_agent<B, M>(
        agent: &DqnAgent<B, M>,
        architecture: &NetworkArchitecture,
        env_id: &str,
        env_config: &EnvConfig,
    ) -> Self
    where
        B: AutodiffBackend,
        M: AutodiffModule<B> + QFunction<B>,
        M::InnerModule: QFunction<B::InnerBackend>,
    {
        Self {
            env_id: env_id.to_string(),
            env_config: env_config.clone(),
            architecture: architecture.clone(),
            dqn_config: agent.config().clone(),
            training_steps: agent.train_steps(),
            env_steps: agent.env_steps(),
            episodes_trained: agent.episodes_trained(),
            epsilon: agent.epsilon(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Path of the metadata file belonging to a model path
pub fn metadata_path(path: &Path) -> PathBuf {
    path.with_extension("meta.json")
}

/// Path of the weights file the recorder writes for a model path
pub fn weights_path(path: &Path) -> PathBuf {
    path.with_extension("mpk")
}

/// Save a DQN agent's online network and metadata
///
/// Creates parent directories if they don't exist.
pub fn save_model<B, M>(
    agent: &DqnAgent<B, M>,
    architecture: &NetworkArchitecture,
    env_id: &str,
    env_config: &EnvConfig,
    path: &Path,
) -> Result<()>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + QFunction<B>,
    M::InnerModule: QFunction<B::InnerBackend>,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    let record = agent.network().valid().into_record();
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    recorder
        .record(record, path.to_path_buf())
        .context("Failed to save network weights")?;

    let metadata = ModelMetadata::from_agent(agent, architecture, env_id, env_config);
    let meta_path = metadata_path(path);
    let meta_json =
        serde_json::to_string_pretty(&metadata).context("Failed to serialize metadata")?;
    std::fs::write(&meta_path, meta_json)
        .with_context(|| format!("Failed to write metadata to {:?}", meta_path))?;

    log::info!("saved model to {}", weights_path(path).display());
    Ok(())
}

pub fn load_metadata(path: &Path) -> Result<ModelMetadata> {
    let meta_path = metadata_path(path);
    let meta_json = std::fs::read_to_string(&meta_path)
        .with_context(|| format!("Failed to read metadata from {:?}", meta_path))?;
    serde_json::from_str(&meta_json).context("Failed to deserialize metadata")
}

/// Load saved weights into an already initialised module of the same shape
pub fn load_weights<B: Backend, M: Module<B>>(module: M, path: &Path, device: &B::Device) -> Result<M> {
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let record = recorder
        .load(path.to_path_buf(), device)
        .with_context(|| format!("Failed to load network weights from {:?}", path))?;
    Ok(module.load_record(record))
}

/// Load a trained network for inference
///
/// The architecture is rebuilt from the metadata before the weights are
/// loaded into it.
pub fn load_network<B: Backend>(
    path: &Path,
    device: &B::Device,
) -> Result<(QNetwork<B>, ModelMetadata)> {
    let metadata = load_metadata(path)?;

    let network = match metadata.architecture.init::<B>(device) {
        QNetwork::Conv(network) => QNetwork::Conv(load_weights(network, path, device)?),
        QNetwork::Mlp(network) => QNetwork::Mlp(load_weights(network, path, device)?),
    };

    Ok((network, metadata))
}
