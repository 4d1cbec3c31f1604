//! PPO configuration.

use crate::policy::Activation;
use crate::{GossipError, Result};
use serde::{Deserialize, Serialize};

/// Hyper-parameters of the PPO learner.
///
/// Missing fields in a config file fall back to [`PpoConfig::default`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PpoConfig {
    /// Adam step size
    pub learning_rate: f64,
    /// Steps collected per vector slot before each update
    pub n_steps: usize,
    /// Minibatch size
    pub batch_size: usize,
    /// Passes over each rollout
    pub n_epochs: usize,
    /// Discount factor
    pub gamma: f64,
    /// GAE lambda
    pub gae_lambda: f64,
    /// PPO clipping coefficient
    pub clip_range: f64,
    /// Entropy bonus coefficient
    pub ent_coef: f64,
    /// Value loss coefficient
    pub vf_coef: f64,
    /// Maximum global gradient norm
    pub max_grad_norm: f64,
    /// Normalize advantages within each minibatch
    pub normalize_advantage: bool,
    /// Hidden layer sizes of both actor and critic
    pub hidden_sizes: Vec<usize>,
    pub activation: Activation,
    /// Seed for weight init, sampling and shuffling; `None` draws from entropy
    pub seed: Option<u64>,
    /// Draw a progress bar while learning
    pub show_progress: bool,
}

impl Default for PpoConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            n_steps: 2048,
            batch_size: 256,
            n_epochs: 10,
            gamma: 0.99,
            gae_lambda: 0.95,
            clip_range: 0.2,
            ent_coef: 0.0,
            vf_coef: 0.5,
            max_grad_norm: 0.5,
            normalize_advantage: true,
            hidden_sizes: vec![64, 64],
            activation: Activation::Tanh,
            seed: None,
            show_progress: true,
        }
    }
}

impl PpoConfig {
    /// Set learning rate
    pub fn with_lr(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set rollout length per slot
    pub fn with_n_steps(mut self, n_steps: usize) -> Self {
        self.n_steps = n_steps;
        self
    }

    /// Set minibatch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_n_epochs(mut self, n_epochs: usize) -> Self {
        self.n_epochs = n_epochs;
        self
    }

    pub fn with_hidden_sizes(mut self, hidden_sizes: Vec<usize>) -> Self {
        self.hidden_sizes = hidden_sizes;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Reject settings the update cannot run with
    pub fn validate(&self) -> Result<()> {
        let problem = if self.n_steps == 0 {
            Some("n_steps must be positive")
        } else if self.batch_size == 0 {
            Some("batch_size must be positive")
        } else if self.n_epochs == 0 {
            Some("n_epochs must be positive")
        } else if !(self.learning_rate > 0.0) {
            Some("learning_rate must be positive")
        } else if !(0.0..=1.0).contains(&self.gamma) || !(0.0..=1.0).contains(&self.gae_lambda) {
            Some("gamma and gae_lambda must lie in [0, 1]")
        } else {
            None
        };
        match problem {
            Some(msg) => Err(GossipError::TrainingError(msg.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PpoConfig::default();
        assert_eq!(config.learning_rate, 1e-3);
        assert_eq!(config.batch_size, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PpoConfig = serde_json::from_str(r#"{"n_steps": 64, "seed": 3}"#).unwrap();
        assert_eq!(config.n_steps, 64);
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.hidden_sizes, vec![64, 64]);
    }

    #[test]
    fn test_validate_rejects_empty_batches() {
        assert!(PpoConfig::default().with_batch_size(0).validate().is_err());
        assert!(PpoConfig::default().with_n_steps(0).validate().is_err());
    }
}
