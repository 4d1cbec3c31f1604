//! # gossip-rl
//!
//! Train one shared policy for a cooperative multi-agent environment and
//! evaluate it turn by turn.
//!
//! ## Overview
//!
//! gossip-rl provides:
//! - The `ParallelEnv` trait (all agents act at once) and the `AecEnv`
//!   turn-based view produced by `ParallelToAec`
//! - Vectorization of a multi-agent env into single-policy slots
//!   (`MarkovVecEnv`) and concatenation of copies over a worker pool
//!   (`ConcatVecEnv`)
//! - The `PolicyTrainer` / `Policy` contracts and a PPO implementation
//! - Checkpoint discovery by name prefix and modification time
//! - The training and evaluation drivers that tie everything together
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gossip_rl::prelude::*;
//! use gossip_envs::{WeddingGossip, WeddingGossipConfig};
//!
//! let config = WeddingGossipConfig::default();
//! let options = TrainOptions::default().with_steps(50_000);
//! train::<_, _, PpoTrainer>(|| Ok(WeddingGossip::new(config.clone())), &options, &PpoConfig::default())?;
//!
//! let report = evaluate::<_, _, PpoTrainer>(
//!     |render_mode| Ok(WeddingGossip::new(config.clone().with_render_mode(render_mode))),
//!     &EvalOptions::default(),
//! )?;
//! println!("{}", report.average_reward);
//! ```

pub mod checkpoint;
pub mod driver;
pub mod env;
pub mod log;
pub mod policy;
pub mod spaces;
pub mod training;
pub mod utils;
pub mod vector;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::env::{
        AecEnv, AgentId, AgentTurn, EnvInfo, EnvMetadata, ParallelEnv, ParallelStepResult,
        ParallelToAec, RenderMode,
    };
    pub use crate::spaces::*;
    pub use crate::vector::{ConcatVecEnv, MarkovVecEnv, VecEnvBackend, VecEnvResult};

    pub use crate::checkpoint::{CheckpointSelector, ManifestEntry, RunManifest};
    pub use crate::driver::{
        evaluate, play_games, train, EvalOptions, EvaluationReport, RewardTally, TrainOptions,
        TrainOutcome,
    };
    pub use crate::log::{CompositeLogger, ConsoleLogger, MetricLogger, NoOpLogger};
    pub use crate::policy::{Policy, PolicyTrainer, Prediction};
    pub use crate::training::{PpoConfig, PpoPolicy, PpoTrainer, TrainSummary};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for the library
#[derive(Debug, thiserror::Error)]
pub enum GossipError {
    #[error("Environment error: {0}")]
    EnvError(String),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Incompatible spaces: {0}")]
    IncompatibleSpaces(String),

    #[error("Policy not found (no file matching {pattern})")]
    PolicyNotFound { pattern: String },

    #[error("Incompatible checkpoint {path}: {reason}")]
    IncompatibleCheckpoint { path: String, reason: String },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, GossipError>;
