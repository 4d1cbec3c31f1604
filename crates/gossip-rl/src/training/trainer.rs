//! PPO learner and its inference policy.

use super::buffer::RolloutBuffer;
use super::config::PpoConfig;
use super::optimizer::{clip_grad_norm, Adam};
use super::ppo::clipped_surrogate;
use super::TrainSummary;
use crate::checkpoint::PolicyArtifact;
use crate::log::{ConsoleLogger, MetricLogger, Metrics};
use crate::policy::{Categorical, Mlp, Policy, PolicyTrainer, Prediction};
use crate::spaces::DynSpace;
use crate::utils::{abbreviate, explained_variance, format_duration};
use crate::vector::VecEnvBackend;
use crate::{GossipError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array1, Array2, ArrayD, Axis, IxDyn};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::time::Instant;

/// Algorithm name stored in every artifact
const ALGORITHM: &str = "ppo";

/// Episodes kept for the `ep_rew_mean` window
const EPISODE_WINDOW: usize = 100;

/// Everything needed to resume a learner.
#[derive(Clone, Serialize, Deserialize)]
struct PpoState {
    config: PpoConfig,
    obs_size: usize,
    num_actions: usize,
    actor: Mlp,
    critic: Mlp,
    actor_optimizer: Adam,
    critic_optimizer: Adam,
    num_timesteps: u64,
}

fn make_rng(seed: Option<u64>, offset: u64) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(offset)),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Observation size and action count a discrete-action learner needs.
fn space_sizes(obs_space: &DynSpace, action_space: &DynSpace) -> Result<(usize, usize)> {
    let num_actions = action_space.num_actions().ok_or_else(|| {
        GossipError::IncompatibleSpaces("PPO supports discrete action spaces only".into())
    })?;
    Ok((obs_space.flat_size(), num_actions))
}

/// Proximal Policy Optimization with separate MLP actor and critic.
///
/// Each iteration collects `n_steps` steps from every slot of the vector
/// environment, computes GAE advantages, then runs `n_epochs` passes of
/// shuffled minibatches of the clipped surrogate objective.
pub struct PpoTrainer {
    config: PpoConfig,
    obs_size: usize,
    num_actions: usize,
    actor: Mlp,
    critic: Mlp,
    actor_optimizer: Adam,
    critic_optimizer: Adam,
    /// Lifetime environment steps across every `learn` call
    num_timesteps: u64,
    rng: ChaCha8Rng,
    logger: Box<dyn MetricLogger>,
}

impl PpoTrainer {
    fn from_state(state: PpoState) -> Self {
        Self {
            rng: make_rng(state.config.seed, state.num_timesteps),
            config: state.config,
            obs_size: state.obs_size,
            num_actions: state.num_actions,
            actor: state.actor,
            critic: state.critic,
            actor_optimizer: state.actor_optimizer,
            critic_optimizer: state.critic_optimizer,
            num_timesteps: state.num_timesteps,
            logger: Box::new(ConsoleLogger::new(ALGORITHM)),
        }
    }

    fn read_state(path: &Path) -> Result<PpoState> {
        Ok(PolicyArtifact::<PpoState>::load(path, ALGORITHM)?.state)
    }

    /// Replace the metric sink (console by default)
    pub fn with_logger(mut self, logger: Box<dyn MetricLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &PpoConfig {
        &self.config
    }

    /// Environment steps trained over the learner's lifetime
    pub fn num_timesteps(&self) -> u64 {
        self.num_timesteps
    }

    /// Snapshot of the current actor as an inference policy
    pub fn policy(&self) -> PpoPolicy {
        PpoPolicy::new(self.actor.clone())
    }

    fn action_logits(&self, observations: &Array2<f32>) -> Categorical {
        Categorical::from_logits(&self.actor.forward(observations))
    }

    fn values(&self, observations: &Array2<f32>) -> Array1<f32> {
        self.critic.forward(observations).column(0).to_owned()
    }

    fn progress_bar(&self, total: u64) -> Option<ProgressBar> {
        if !self.config.show_progress {
            return None;
        }
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        Some(pb)
    }

    /// Run the optimisation epochs over a full buffer
    fn update(&mut self, buffer: &RolloutBuffer) -> Metrics {
        let total = buffer.len();
        let batch_size = self.config.batch_size.min(total).max(1);
        let clip_range = self.config.clip_range as f32;
        let ent_coef = self.config.ent_coef as f32;
        let vf_coef = self.config.vf_coef as f32;

        let mut indices: Vec<usize> = (0..total).collect();
        let mut policy_losses = Vec::new();
        let mut value_losses = Vec::new();
        let mut entropies = Vec::new();
        let mut approx_kls = Vec::new();
        let mut clip_fractions = Vec::new();

        for _ in 0..self.config.n_epochs {
            indices.shuffle(&mut self.rng);

            for chunk in indices.chunks(batch_size) {
                let mb = buffer.gather(chunk);
                let n = chunk.len() as f32;

                let mut advantages = mb.advantages.clone();
                if self.config.normalize_advantage && chunk.len() > 1 {
                    let mean = advantages.mean().unwrap_or(0.0);
                    let std = advantages.std(1.0);
                    advantages.mapv_inplace(|a| (a - mean) / (std + 1e-8));
                }

                // actor
                let (logits, actor_cache) = self.actor.forward_cached(&mb.observations);
                let dist = Categorical::from_logits(&logits);
                let log_probs = dist.log_prob(&mb.actions);
                let entropy = dist.entropy();
                let probs = dist.probs();

                let mut grad_logits = Array2::<f32>::zeros(logits.raw_dim());
                let mut policy_loss = 0.0;
                let mut clipped = 0usize;
                let mut kl = 0.0;
                for i in 0..chunk.len() {
                    let log_ratio = log_probs[i] - mb.old_log_probs[i];
                    let ratio = log_ratio.exp();
                    let (loss, d_log_prob) = clipped_surrogate(ratio, advantages[i], clip_range);
                    policy_loss += loss / n;
                    if (ratio - 1.0).abs() > clip_range {
                        clipped += 1;
                    }
                    kl += ((ratio - 1.0) - log_ratio) / n;

                    // d log p(a) / d z_k = 1[k = a] - p_k
                    // d H / d z_k = -p_k (log p_k + H)
                    let d_log_prob = d_log_prob / n;
                    for k in 0..self.num_actions {
                        let p = probs[[i, k]];
                        let onehot = if k == mb.actions[i] { 1.0 } else { 0.0 };
                        let lp = dist.log_probs()[[i, k]];
                        grad_logits[[i, k]] =
                            d_log_prob * (onehot - p) + ent_coef / n * p * (lp + entropy[i]);
                    }
                }
                let mean_entropy = entropy.mean().unwrap_or(0.0);

                // critic
                let (values, critic_cache) = self.critic.forward_cached(&mb.observations);
                let values = values.column(0).to_owned();
                let errors = &values - &mb.returns;
                let value_loss = errors.mapv(|e| e * e).mean().unwrap_or(0.0);
                let grad_values = errors.mapv(|e| vf_coef * 2.0 * e / n).insert_axis(Axis(1));

                let mut actor_grads = self.actor.backward(&actor_cache, &grad_logits);
                let mut critic_grads = self.critic.backward(&critic_cache, &grad_values);
                clip_grad_norm(
                    &mut [&mut actor_grads, &mut critic_grads],
                    self.config.max_grad_norm as f32,
                );
                self.actor_optimizer.step(&mut self.actor, &actor_grads);
                self.critic_optimizer.step(&mut self.critic, &critic_grads);

                policy_losses.push(policy_loss as f64);
                value_losses.push(value_loss as f64);
                entropies.push(mean_entropy as f64);
                approx_kls.push(kl as f64);
                clip_fractions.push(clipped as f64 / chunk.len() as f64);
            }
        }

        let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len().max(1) as f64;
        let (values, returns) = buffer.values_and_returns();

        let mut metrics = Metrics::new();
        metrics.insert("policy_loss", mean(&policy_losses));
        metrics.insert("value_loss", mean(&value_losses));
        metrics.insert("entropy", mean(&entropies));
        metrics.insert("approx_kl", mean(&approx_kls));
        metrics.insert("clip_fraction", mean(&clip_fractions));
        metrics.insert("explained_variance", explained_variance(&values, &returns));
        metrics
    }
}

impl PolicyTrainer for PpoTrainer {
    type Config = PpoConfig;
    type Policy = PpoPolicy;

    fn construct(config: &PpoConfig, obs_space: &DynSpace, action_space: &DynSpace) -> Result<Self> {
        config.validate()?;
        let (obs_size, num_actions) = space_sizes(obs_space, action_space)?;

        let mut rng = make_rng(config.seed, 0);
        let actor = Mlp::new(
            obs_size,
            &config.hidden_sizes,
            num_actions,
            config.activation,
            0.01,
            &mut rng,
        );
        let critic = Mlp::new(obs_size, &config.hidden_sizes, 1, config.activation, 1.0, &mut rng);
        let lr = config.learning_rate as f32;

        tracing::info!(
            obs_size,
            num_actions,
            parameters = actor.num_parameters() + critic.num_parameters(),
            "Constructed PPO learner"
        );

        Ok(Self {
            actor_optimizer: Adam::new(&actor, lr, 1e-5),
            critic_optimizer: Adam::new(&critic, lr, 1e-5),
            config: config.clone(),
            obs_size,
            num_actions,
            actor,
            critic,
            num_timesteps: 0,
            rng,
            logger: Box::new(ConsoleLogger::new(ALGORITHM)),
        })
    }

    fn load(path: &Path, obs_space: &DynSpace, action_space: &DynSpace) -> Result<Self> {
        let state = Self::read_state(path)?;
        let (obs_size, num_actions) = space_sizes(obs_space, action_space)?;
        if state.obs_size != obs_size || state.num_actions != num_actions {
            return Err(GossipError::IncompatibleCheckpoint {
                path: path.display().to_string(),
                reason: format!(
                    "trained for {} observations and {} actions, environment has {} and {}",
                    state.obs_size, state.num_actions, obs_size, num_actions
                ),
            });
        }
        Ok(Self::from_state(state))
    }

    fn learn<B: VecEnvBackend + ?Sized>(&mut self, envs: &mut B, total_timesteps: u64) -> Result<TrainSummary> {
        let (obs_size, num_actions) = space_sizes(&envs.observation_space(), &envs.action_space())?;
        if obs_size != self.obs_size || num_actions != self.num_actions {
            return Err(GossipError::IncompatibleSpaces(format!(
                "learner expects {} observations and {} actions, environment has {} and {}",
                self.obs_size, self.num_actions, obs_size, num_actions
            )));
        }

        let num_envs = envs.num_envs();
        let n_steps = self.config.n_steps;
        let gamma = self.config.gamma as f32;
        let gae_lambda = self.config.gae_lambda as f32;
        let mut buffer = RolloutBuffer::new(n_steps, num_envs, obs_size);

        let (mut obs, _) = envs.reset(self.config.seed)?;
        let mut running_returns = vec![0.0f32; num_envs];
        let mut recent_returns: VecDeque<f32> = VecDeque::with_capacity(EPISODE_WINDOW);
        let mut summary = TrainSummary::default();
        let start = Instant::now();
        let progress = self.progress_bar(total_timesteps);

        tracing::info!(
            total_timesteps = %abbreviate(total_timesteps),
            num_envs,
            n_steps,
            "Learning"
        );

        while summary.timesteps < total_timesteps {
            buffer.reset();
            while !buffer.is_full() {
                let dist = self.action_logits(&obs);
                let actions = dist.sample(&mut self.rng);
                let log_probs = dist.log_prob(&actions);
                let values = self.values(&obs);

                let action_rows =
                    Array2::from_shape_fn((num_envs, 1), |(i, _)| actions[i] as f32);
                let result = envs.step(&action_rows)?;
                let dones = result.dones();

                buffer.add(&obs, &actions, &log_probs, &result.rewards, &dones, &values);

                for (i, &done) in dones.iter().enumerate() {
                    running_returns[i] += result.rewards[i];
                    if done {
                        let ret = result.infos[i].episode_return.unwrap_or(running_returns[i]);
                        if recent_returns.len() == EPISODE_WINDOW {
                            recent_returns.pop_front();
                        }
                        recent_returns.push_back(ret);
                        running_returns[i] = 0.0;
                        summary.episodes += 1;
                    }
                }

                obs = result.observations;
                summary.timesteps += num_envs as u64;
                self.num_timesteps += num_envs as u64;
                if let Some(pb) = &progress {
                    pb.set_position(summary.timesteps.min(total_timesteps));
                }
            }

            let last_values = self.values(&obs);
            buffer.compute_returns_and_advantages(&last_values, gamma, gae_lambda);

            let mut metrics = self.update(&buffer);
            summary.iterations += 1;
            if !recent_returns.is_empty() {
                let mean = recent_returns.iter().map(|&r| r as f64).sum::<f64>()
                    / recent_returns.len() as f64;
                metrics.insert("ep_rew_mean", mean);
                summary.mean_episode_reward = Some(mean);
            }
            let elapsed = start.elapsed().as_secs_f64();
            metrics.insert("sps", summary.timesteps as f64 / elapsed.max(1e-9));
            self.logger.log_metrics(&metrics, self.num_timesteps);

            if let Some(pb) = &progress {
                pb.set_message(format!(
                    "Loss: {:.4} Reward: {:.2}",
                    metrics.get("value_loss").copied().unwrap_or(0.0),
                    summary.mean_episode_reward.unwrap_or(0.0)
                ));
            }
            summary.metrics = metrics;
        }

        if let Some(pb) = progress {
            pb.finish_with_message("Training complete");
        }
        self.logger.close();
        tracing::info!(
            timesteps = summary.timesteps,
            iterations = summary.iterations,
            elapsed = %format_duration(start.elapsed().as_secs_f64()),
            "Learning finished"
        );
        Ok(summary)
    }

    fn save(&self, path: &Path) -> Result<()> {
        let state = PpoState {
            config: self.config.clone(),
            obs_size: self.obs_size,
            num_actions: self.num_actions,
            actor: self.actor.clone(),
            critic: self.critic.clone(),
            actor_optimizer: self.actor_optimizer.clone(),
            critic_optimizer: self.critic_optimizer.clone(),
            num_timesteps: self.num_timesteps,
        };
        PolicyArtifact::new(ALGORITHM, state).save(path)
    }

    fn load_policy(path: &Path) -> Result<PpoPolicy> {
        let state = Self::read_state(path)?;
        Ok(PpoPolicy::new(state.actor))
    }
}

/// Inference side of a PPO learner: the actor network alone.
pub struct PpoPolicy {
    actor: Mlp,
    rng: ChaCha8Rng,
}

impl PpoPolicy {
    pub fn new(actor: Mlp) -> Self {
        Self {
            actor,
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Make sampled actions reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn num_actions(&self) -> usize {
        self.actor.output_size()
    }
}

impl Policy for PpoPolicy {
    fn predict(&mut self, observation: &ArrayD<f32>, deterministic: bool) -> Result<Prediction> {
        let obs_size = self.actor.input_size();
        if observation.len() != obs_size {
            return Err(GossipError::ShapeMismatch {
                expected: vec![obs_size],
                actual: observation.shape().to_vec(),
            });
        }
        let row = Array2::from_shape_vec((1, obs_size), observation.iter().copied().collect())
            .map_err(|e| GossipError::EnvError(e.to_string()))?;

        let dist = Categorical::from_logits(&self.actor.forward(&row));
        let action = if deterministic {
            dist.mode()[0]
        } else {
            dist.sample(&mut self.rng)[0]
        };
        Ok(Prediction {
            action: ArrayD::from_elem(IxDyn(&[1]), action as f32),
            log_prob: dist.log_prob(&[action])[0],
        })
    }
}
