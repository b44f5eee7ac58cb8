use rand::Rng;

use super::config::ExplorationConfig;

/// Epsilon-greedy exploration with per-episode multiplicative decay
#[derive(Debug, Clone, PartialEq)]
pub struct EpsilonGreedy {
    epsilon: f32,
    decay: f32,
    min: f32,
}

impl EpsilonGreedy {
    pub fn new(config: ExplorationConfig) -> Self {
        Self {
            epsilon: config.start,
            decay: config.decay,
            min: config.min,
        }
    }

    /// Resume a schedule at a known ε, e.g. from saved metadata
    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Decay ε ahead of a new episode
    pub fn begin_episode(&mut self) {
        self.epsilon = (self.epsilon * self.decay).max(self.min);
    }

    /// True with probability ε
    pub fn explore<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.r#gen::<f32>() < self.epsilon
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn test_decay_respects_floor() {
        let mut schedule = EpsilonGreedy::new(ExplorationConfig {
            start: 0.99,
            decay: 0.5,
            min: 0.1,
        });

        schedule.begin_episode();
        assert!((schedule.epsilon() - 0.495).abs() < 1e-6);

        for _ in 0..10 {
            schedule.begin_episode();
        }
        assert_eq!(schedule.epsilon(), 0.1);
    }

    #[test]
    fn test_constant_schedule() {
        let mut schedule = EpsilonGreedy::new(ExplorationConfig::constant(0.1));
        for _ in 0..100 {
            schedule.begin_episode();
        }
        assert_eq!(schedule.epsilon(), 0.1);
    }

    #[test]
    fn test_explore_extremes() {
        let mut rng = StdRng::seed_from_u64(0);

        let always = EpsilonGreedy::new(ExplorationConfig::constant(1.0));
        assert!((0..100).all(|_| always.explore(&mut rng)));

        let never = EpsilonGreedy::new(ExplorationConfig::constant(0.0));
        assert!((0..100).all(|_| !never.explore(&mut rng)));
    }

    #[test]
    fn test_explore_rate() {
        let mut rng = StdRng::seed_from_u64(42);
        let schedule = EpsilonGreedy::new(ExplorationConfig::constant(0.25));

        let hits = (0..10_000).filter(|_| schedule.explore(&mut rng)).count();
        assert!((2_000..3_000).contains(&hits), "explored {hits} times");
    }

    #[test]
    fn test_resume_epsilon() {
        let schedule = EpsilonGreedy::new(ExplorationConfig::default()).with_epsilon(0.3);
        assert_eq!(schedule.epsilon(), 0.3);
    }
}
