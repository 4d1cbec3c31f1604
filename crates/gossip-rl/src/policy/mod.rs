//! Policy and trainer contracts.
//!
//! The drivers only talk to these traits:
//! - `PolicyTrainer` builds, resumes, trains and saves a learner
//! - `Policy` maps one observation to one action
//!
//! `mlp` and `distribution` are the building blocks of the bundled PPO
//! learner.

mod distribution;
mod mlp;

pub use distribution::Categorical;
pub use mlp::{Activation, Dense, ForwardCache, Gradients, Mlp};

use crate::spaces::DynSpace;
use crate::training::TrainSummary;
use crate::vector::VecEnvBackend;
use crate::Result;
use ndarray::ArrayD;
use std::path::Path;

/// An action chosen by a policy.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    /// Action in the environment's encoding, e.g. `[k]` for `Discrete`
    pub action: ArrayD<f32>,
    /// Log-probability of the action under the policy
    pub log_prob: f32,
}

/// A trained policy, usable without any environment attached.
pub trait Policy: Send {
    /// Choose an action for one observation.
    ///
    /// Sampled when `deterministic` is false, otherwise the most likely action.
    fn predict(&mut self, observation: &ArrayD<f32>, deterministic: bool) -> Result<Prediction>;
}

/// A learner that can be created fresh or resumed from an artifact.
///
/// # Example
///
/// ```ignore
/// let mut trainer = match selector.latest()? {
///     Some(path) => T::load(&path, &obs_space, &action_space)?,
///     None => T::construct(&config, &obs_space, &action_space)?,
/// };
/// trainer.learn(&mut envs, 196_608)?;
/// trainer.save(&selector.next_artifact_path(now))?;
/// ```
pub trait PolicyTrainer: Sized {
    /// Hyper-parameters for a fresh learner
    type Config;
    /// Inference-only policy restored by [`PolicyTrainer::load_policy`]
    type Policy: Policy;

    /// Fresh learner for the given spaces
    fn construct(config: &Self::Config, obs_space: &DynSpace, action_space: &DynSpace)
        -> Result<Self>;

    /// Resume a learner from an artifact, checking it fits the spaces
    fn load(path: &Path, obs_space: &DynSpace, action_space: &DynSpace) -> Result<Self>;

    /// Train for at least `total_timesteps` vector-slot steps
    fn learn<B: VecEnvBackend + ?Sized>(&mut self, envs: &mut B, total_timesteps: u64)
        -> Result<TrainSummary>;

    /// Write a new artifact at `path`
    fn save(&self, path: &Path) -> Result<()>;

    /// Restore only the policy from an artifact
    fn load_policy(path: &Path) -> Result<Self::Policy>;
}
