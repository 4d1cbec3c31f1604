//! Rollout storage for on-policy updates.

use super::ppo::compute_gae;
use ndarray::{s, Array1, Array2, Axis};

/// Samples gathered for one minibatch.
pub struct Minibatch {
    pub observations: Array2<f32>,
    pub actions: Vec<usize>,
    pub old_log_probs: Array1<f32>,
    pub advantages: Array1<f32>,
    pub returns: Array1<f32>,
}

/// Buffer for storing experience from environment rollouts
///
/// Step `t` of slot `n` is stored at flat index `t * num_envs + n`.
pub struct RolloutBuffer {
    /// Observations [T * N, obs_size]
    observations: Array2<f32>,
    actions: Vec<usize>,
    /// Per-step arrays [T, N]
    log_probs: Array2<f32>,
    rewards: Array2<f32>,
    dones: Array2<f32>,
    values: Array2<f32>,
    advantages: Array2<f32>,
    returns: Array2<f32>,
    /// Current position in buffer
    pos: usize,
    capacity: usize,
    num_envs: usize,
}

impl RolloutBuffer {
    pub fn new(capacity: usize, num_envs: usize, obs_size: usize) -> Self {
        Self {
            observations: Array2::zeros((capacity * num_envs, obs_size)),
            actions: vec![0; capacity * num_envs],
            log_probs: Array2::zeros((capacity, num_envs)),
            rewards: Array2::zeros((capacity, num_envs)),
            dones: Array2::zeros((capacity, num_envs)),
            values: Array2::zeros((capacity, num_envs)),
            advantages: Array2::zeros((capacity, num_envs)),
            returns: Array2::zeros((capacity, num_envs)),
            pos: 0,
            capacity,
            num_envs,
        }
    }

    /// Add one step of every slot
    pub fn add(
        &mut self,
        observations: &Array2<f32>,
        actions: &[usize],
        log_probs: &Array1<f32>,
        rewards: &[f32],
        dones: &[bool],
        values: &Array1<f32>,
    ) {
        let start = self.pos * self.num_envs;
        self.observations
            .slice_mut(s![start..start + self.num_envs, ..])
            .assign(observations);
        self.actions[start..start + self.num_envs].copy_from_slice(actions);

        let t = self.pos;
        self.log_probs.row_mut(t).assign(log_probs);
        self.values.row_mut(t).assign(values);
        for n in 0..self.num_envs {
            self.rewards[[t, n]] = rewards[n];
            self.dones[[t, n]] = if dones[n] { 1.0 } else { 0.0 };
        }
        self.pos += 1;
    }

    /// Reset buffer position
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.pos >= self.capacity
    }

    /// Total number of stored samples
    pub fn len(&self) -> usize {
        self.pos * self.num_envs
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    /// Fill advantages and returns once the buffer is full.
    ///
    /// A done step never bootstraps, whether the episode terminated or was
    /// truncated.
    pub fn compute_returns_and_advantages(&mut self, last_values: &Array1<f32>, gamma: f32, gae_lambda: f32) {
        let t = self.pos;
        let advantages = compute_gae(
            &self.rewards.slice(s![..t, ..]).to_owned(),
            &self.values.slice(s![..t, ..]).to_owned(),
            &self.dones.slice(s![..t, ..]).to_owned(),
            last_values,
            gamma,
            gae_lambda,
        );
        let returns = &advantages + &self.values.slice(s![..t, ..]);
        self.returns.slice_mut(s![..t, ..]).assign(&returns);
        self.advantages.slice_mut(s![..t, ..]).assign(&advantages);
    }

    /// Stored values and returns, flattened in storage order
    pub fn values_and_returns(&self) -> (Vec<f32>, Vec<f32>) {
        let t = self.pos;
        (
            self.values.slice(s![..t, ..]).iter().copied().collect(),
            self.returns.slice(s![..t, ..]).iter().copied().collect(),
        )
    }

    /// Collect the samples at the given flat indices
    pub fn gather(&self, indices: &[usize]) -> Minibatch {
        let at = |a: &Array2<f32>, i: usize| a[[i / self.num_envs, i % self.num_envs]];
        Minibatch {
            observations: self.observations.select(Axis(0), indices),
            actions: indices.iter().map(|&i| self.actions[i]).collect(),
            old_log_probs: indices.iter().map(|&i| at(&self.log_probs, i)).collect(),
            advantages: indices.iter().map(|&i| at(&self.advantages, i)).collect(),
            returns: indices.iter().map(|&i| at(&self.returns, i)).collect(),
        }
    }
}
