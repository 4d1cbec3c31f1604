//! Training and evaluation drivers.
//!
//! Both drivers are generic over the environment and the trainer; all they
//! share is the filesystem, where training leaves artifacts and evaluation
//! picks up the newest one.

mod eval;
mod options;
mod train;

pub use eval::{evaluate, play_games, EvaluationReport};
pub use options::{EvalOptions, RewardTally, TrainOptions};
pub use train::{train, TrainOutcome};
