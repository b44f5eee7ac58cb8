pub mod game_metrics;
pub mod summary;
pub mod training_stats;

pub use game_metrics::GameMetrics;
pub use summary::SummaryLogger;
pub use training_stats::{EpisodeSummary, LossAccumulator, RUNNING_AVERAGE_WINDOW, TrainingStats};
