pub mod evaluate;
pub mod train;
pub mod visualize;

pub use evaluate::{EpisodeResult, EvaluationReport, evaluate_greedy, evaluate_policy, run_evaluation};
pub use train::{TrainConfig, TrainMode, TrainReport, train, train_runs};
pub use visualize::VisualizeMode;
