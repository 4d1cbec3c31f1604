//! Environment traits and adapters.
//!
//! Provides the `ParallelEnv` trait every multi-agent environment implements,
//! the turn-based `AecEnv` view, and the `EpisodeStats` wrapper.

mod aec;
mod stats;
#[cfg(test)]
pub(crate) mod testing;
mod traits;

pub use aec::ParallelToAec;
pub use stats::EpisodeStats;
pub use traits::{
    AecEnv, AgentId, AgentMap, AgentTurn, EnvInfo, EnvMetadata, ParallelEnv, ParallelStepResult,
    RenderMode,
};
