//! Vectorized environment abstraction.

use crate::env::EnvInfo;
use crate::spaces::DynSpace;
use crate::Result;
use ndarray::Array2;

/// Result from stepping all environment slots
#[derive(Clone, Debug)]
pub struct VecEnvResult {
    /// Observations for all slots, one row each
    pub observations: Array2<f32>,
    /// Rewards for all slots
    pub rewards: Vec<f32>,
    /// Terminated flags
    pub terminated: Vec<bool>,
    /// Truncated flags
    pub truncated: Vec<bool>,
    /// Info dictionaries
    pub infos: Vec<EnvInfo>,
}

impl VecEnvResult {
    /// Check which slots are done
    pub fn dones(&self) -> Vec<bool> {
        self.terminated
            .iter()
            .zip(self.truncated.iter())
            .map(|(&t, &tr)| t || tr)
            .collect()
    }
}

/// Trait for vectorized environment backends.
///
/// Every slot shares one observation space and one action space, so a single
/// policy can act for all of them. Actions are passed one row per slot.
pub trait VecEnvBackend: Send {
    /// Get the observation space (single slot)
    fn observation_space(&self) -> DynSpace;

    /// Get the action space (single slot)
    fn action_space(&self) -> DynSpace;

    /// Get the number of slots
    fn num_envs(&self) -> usize;

    /// Reset all slots
    fn reset(&mut self, seed: Option<u64>) -> Result<(Array2<f32>, Vec<EnvInfo>)>;

    /// Step all slots with given actions
    fn step(&mut self, actions: &Array2<f32>) -> Result<VecEnvResult>;

    /// Close all environments
    fn close(&mut self);
}
