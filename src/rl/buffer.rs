//! Experience replay buffer for DQN training
//!
//! Transitions are kept in a bounded FIFO. Once the buffer is full every push
//! evicts the oldest transition. Batches are drawn uniformly with replacement.

use rand::Rng;
use std::collections::VecDeque;

/// One environment step as seen by the learner
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub observation: Vec<f32>,
    pub action: usize,
    pub reward: f32,
    pub next_observation: Vec<f32>,
    pub done: bool,
}

/// A sampled minibatch, flattened row-major and ready for tensor construction
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// `[batch_size * obs_dim]`
    pub observations: Vec<f32>,
    pub actions: Vec<i64>,
    pub rewards: Vec<f32>,
    /// `[batch_size * obs_dim]`
    pub next_observations: Vec<f32>,
    /// 0.0 for terminal transitions, 1.0 otherwise
    pub not_done: Vec<f32>,
    pub batch_size: usize,
    pub obs_dim: usize,
}

/// Bounded FIFO of transitions
///
/// # Example
///
/// ```rust
/// use snake_dqn::rl::{ReplayBuffer, Transition};
///
/// let mut buffer = ReplayBuffer::new(2);
/// for action in 0..3 {
///     buffer.push(Transition {
///         observation: vec![0.0; 4],
///         action,
///         reward: -1.0,
///         next_observation: vec![0.0; 4],
///         done: false,
///     });
/// }
///
/// // The first transition was evicted
/// assert_eq!(buffer.len(), 2);
/// assert!(buffer.is_full());
/// ```
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    transitions: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            transitions: VecDeque::with_capacity(capacity.min(1 << 16)),
            capacity,
        }
    }

    pub fn push(&mut self, transition: Transition) {
        if self.capacity == 0 {
            return;
        }
        if self.transitions.len() == self.capacity {
            self.transitions.pop_front();
        }
        self.transitions.push_back(transition);
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.transitions.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.transitions.clear();
    }

    /// Draw `batch_size` transitions uniformly with replacement
    ///
    /// Returns `None` when the buffer is empty or `batch_size` is zero.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Option<Batch> {
        if self.transitions.is_empty() || batch_size == 0 {
            return None;
        }

        let obs_dim = self.transitions[0].observation.len();
        let mut batch = Batch {
            observations: Vec::with_capacity(batch_size * obs_dim),
            actions: Vec::with_capacity(batch_size),
            rewards: Vec::with_capacity(batch_size),
            next_observations: Vec::with_capacity(batch_size * obs_dim),
            not_done: Vec::with_capacity(batch_size),
            batch_size,
            obs_dim,
        };

        for _ in 0..batch_size {
            let transition = &self.transitions[rng.gen_range(0..self.transitions.len())];
            batch.observations.extend_from_slice(&transition.observation);
            batch.actions.push(transition.action as i64);
            batch.rewards.push(transition.reward);
            batch
                .next_observations
                .extend_from_slice(&transition.next_observation);
            batch.not_done.push(if transition.done { 0.0 } else { 1.0 });
        }

        Some(batch)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter()
    }
}
