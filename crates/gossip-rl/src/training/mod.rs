//! Training system for PPO.
//!
//! Provides:
//! - `RolloutBuffer` - Storage for rollout data
//! - `PpoTrainer` - The learner behind the `PolicyTrainer` contract
//! - `PpoPolicy` - Its inference-only policy

mod buffer;
mod config;
mod optimizer;
mod ppo;
mod trainer;

pub use buffer::{Minibatch, RolloutBuffer};
pub use config::PpoConfig;
pub use optimizer::{clip_grad_norm, Adam};
pub use ppo::{clipped_surrogate, compute_gae};
pub use trainer::{PpoPolicy, PpoTrainer};

use crate::log::Metrics;

/// What one `learn` call did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainSummary {
    /// Vector-slot steps collected
    pub timesteps: u64,
    /// Rollout/update iterations
    pub iterations: u64,
    /// Slot episodes that ended
    pub episodes: u64,
    /// Mean return of the most recent episodes
    pub mean_episode_reward: Option<f64>,
    /// Metrics of the last update
    pub metrics: Metrics,
}
