//! Deep Q-learning agent
//!
//! The agent owns the online network (on the autodiff backend), a target copy
//! on the inner backend, the replay buffer and the ε-greedy schedule. The
//! training loop drives it one environment step at a time:
//!
//! ```text
//! select_action(obs) → env.step → store(transition) → learn() → update_target()
//! ```
//!
//! TD targets are `y = r + γ · max_a Q_target(s', a) · (1 − done)` and the online
//! network takes one Adam step on `MSE(Q_online(s, a), y)` per `learn` call.

use burn::{
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    nn::loss::{MseLoss, Reduction},
    optim::{Adam, AdamConfig, GradientsParams, Optimizer, adaptor::OptimizerAdaptor},
    tensor::{ElementConversion, Int, Tensor, backend::AutodiffBackend},
};
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::buffer::{Batch, ReplayBuffer, Transition};
use super::config::{ConfigError, DqnConfig, TargetUpdate};
use super::exploration::EpsilonGreedy;
use super::network::{QFunction, argmax_rows};

/// DQN agent with experience replay and a target network
///
/// # Type Parameters
///
/// * `B` - Autodiff backend for gradient computation
/// * `M` - Q-network; its inner module serves as the target network
///
/// # Example
///
/// ```rust,ignore
/// use snake_dqn::rl::{DqnAgent, DqnConfig, MlpQNetworkConfig};
/// use burn::backend::{Autodiff, ndarray::{NdArray, NdArrayDevice}};
///
/// type Backend = Autodiff<NdArray<f32>>;
///
/// let device = NdArrayDevice::default();
/// let network = MlpQNetworkConfig::new(13).init::<Backend>(&device);
/// let agent = DqnAgent::new(network, DqnConfig::vanilla(), 4, device)?;
/// ```
pub struct DqnAgent<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + QFunction<B>,
    M::InnerModule: QFunction<B::InnerBackend>,
{
    online: M,
    target: M::InnerModule,
    optim: OptimizerAdaptor<Adam, M, B>,
    config: DqnConfig,
    buffer: ReplayBuffer,
    exploration: EpsilonGreedy,
    rng: StdRng,
    num_actions: usize,
    env_steps: usize,
    train_steps: usize,
    episodes_trained: usize,
    device: B::Device,
}

impl<B, M> DqnAgent<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + QFunction<B>,
    M::InnerModule: QFunction<B::InnerBackend>,
{
    /// Create an agent around a freshly initialised network
    ///
    /// The target network starts as an exact copy of `network`.
    pub fn new(
        network: M,
        config: DqnConfig,
        num_actions: usize,
        device: B::Device,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if num_actions == 0 {
            return Err(ConfigError::Zero("num_actions"));
        }

        let optim = AdamConfig::new()
            .with_grad_clipping(config.max_grad_norm.map(GradientClippingConfig::Norm))
            .init();

        Ok(Self {
            target: network.valid(),
            online: network,
            optim,
            buffer: ReplayBuffer::new(config.buffer_capacity),
            exploration: EpsilonGreedy::new(config.exploration),
            config,
            rng: StdRng::from_entropy(),
            num_actions,
            env_steps: 0,
            train_steps: 0,
            episodes_trained: 0,
            device,
        })
    }

    /// Make exploration and replay sampling reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// ε-greedy action for one observation
    pub fn select_action(&mut self, observation: &[f32]) -> usize {
        if self.exploration.explore(&mut self.rng) {
            self.rng.gen_range(0..self.num_actions)
        } else {
            self.greedy_action(observation)
        }
    }

    /// Action with the highest online Q value
    pub fn greedy_action(&self, observation: &[f32]) -> usize {
        argmax_rows(self.q_values(observation))
            .first()
            .copied()
            .unwrap_or(0)
    }

    /// Online Q values for one observation, `[1, num_actions]`
    pub fn q_values(&self, observation: &[f32]) -> Tensor<B::InnerBackend, 2> {
        let network = self.online.valid();
        let input =
            Tensor::<B::InnerBackend, 1>::from_floats(observation, &self.device).unsqueeze::<2>();
        network.q_values(input)
    }

    /// Target Q values for one observation, `[1, num_actions]`
    pub fn target_q_values(&self, observation: &[f32]) -> Tensor<B::InnerBackend, 2> {
        let input =
            Tensor::<B::InnerBackend, 1>::from_floats(observation, &self.device).unsqueeze::<2>();
        self.target.q_values(input)
    }

    /// Record one environment step
    pub fn store(&mut self, transition: Transition) {
        self.buffer.push(transition);
        self.env_steps += 1;
    }

    /// Decay ε ahead of a new episode
    pub fn begin_episode(&mut self) {
        self.exploration.begin_episode();
    }

    pub fn end_episode(&mut self) {
        self.episodes_trained += 1;
    }

    /// One gradient step on a replay minibatch
    ///
    /// Returns `None` while fewer than `min_experiences` transitions are stored
    /// or when the current env step is not a multiple of `train_frequency`.
    pub fn learn(&mut self) -> Option<f32> {
        if self.buffer.len() < self.config.min_experiences.max(1)
            || self.env_steps % self.config.train_frequency != 0
        {
            return None;
        }

        let batch = self.buffer.sample(self.config.batch_size, &mut self.rng)?;
        let targets = self.td_targets(&batch);

        let Batch {
            observations,
            actions,
            batch_size,
            obs_dim,
            ..
        } = batch;

        let observations = Tensor::<B, 1>::from_floats(observations.as_slice(), &self.device)
            .reshape([batch_size, obs_dim]);
        let actions = Tensor::<B, 1, Int>::from_ints(actions.as_slice(), &self.device)
            .unsqueeze_dim::<2>(1);

        let predicted = self.online.q_values(observations).gather(1, actions);
        let loss = MseLoss::new().forward(predicted, targets, Reduction::Mean);
        let loss_value = loss.clone().into_scalar().elem::<f32>();

        let grads = GradientsParams::from_grads(loss.backward(), &self.online);
        self.online = self
            .optim
            .step(self.config.learning_rate, self.online.clone(), grads);
        self.train_steps += 1;

        Some(loss_value)
    }

    /// `r + γ · max_a Q_target(s', a) · not_done`, shaped `[batch, 1]`
    fn td_targets(&self, batch: &Batch) -> Tensor<B, 2> {
        let next_observations =
            Tensor::<B::InnerBackend, 1>::from_floats(batch.next_observations.as_slice(), &self.device)
                .reshape([batch.batch_size, batch.obs_dim]);
        let rewards = Tensor::<B::InnerBackend, 1>::from_floats(batch.rewards.as_slice(), &self.device)
            .unsqueeze_dim::<2>(1);
        let not_done =
            Tensor::<B::InnerBackend, 1>::from_floats(batch.not_done.as_slice(), &self.device)
                .unsqueeze_dim::<2>(1);

        let next_max = self.target.q_values(next_observations).max_dim(1);
        let targets = rewards + next_max.mul(not_done).mul_scalar(self.config.gamma);

        Tensor::from_inner(targets)
    }

    /// Synchronise the target network when the env step count calls for it
    ///
    /// Returns `true` when the target was updated.
    pub fn update_target(&mut self) -> bool {
        let every = self.config.target_update.every();
        if self.env_steps == 0 || self.env_steps % every != 0 {
            return false;
        }

        match self.config.target_update {
            TargetUpdate::Hard { .. } => self.sync_target(),
            TargetUpdate::Soft { tau, .. } => {
                let source = self.online.valid();
                self.target = self.target.clone().soft_update(&source, tau);
            }
        }
        log::debug!(
            "target network updated at env step {} ({:?})",
            self.env_steps,
            self.config.target_update
        );
        true
    }

    /// Copy the online weights into the target network
    pub fn sync_target(&mut self) {
        self.target = self.online.valid();
    }

    /// Continue counting from a previous run
    pub fn restore_progress(
        &mut self,
        env_steps: usize,
        train_steps: usize,
        episodes_trained: usize,
        epsilon: f32,
    ) {
        self.env_steps = env_steps;
        self.train_steps = train_steps;
        self.episodes_trained = episodes_trained;
        self.exploration = EpsilonGreedy::new(self.config.exploration).with_epsilon(epsilon);
    }

    pub fn network(&self) -> &M {
        &self.online
    }

    pub fn config(&self) -> &DqnConfig {
        &self.config
    }

    pub fn epsilon(&self) -> f32 {
        self.exploration.epsilon()
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    pub fn env_steps(&self) -> usize {
        self.env_steps
    }

    pub fn train_steps(&self) -> usize {
        self.train_steps
    }

    pub fn episodes_trained(&self) -> usize {
        self.episodes_trained
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }
}
