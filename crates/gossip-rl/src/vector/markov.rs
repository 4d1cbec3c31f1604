//! One vector slot per agent of a parallel environment.

use super::vecenv::{VecEnvBackend, VecEnvResult};
use crate::env::{AgentId, AgentMap, EnvInfo, ParallelEnv};
use crate::spaces::DynSpace;
use crate::{GossipError, Result};
use ndarray::{Array2, ArrayD, IxDyn};

/// Exposes every possible agent of a [`ParallelEnv`] as its own slot.
///
/// Slots follow `possible_agents()` order. An agent that left the episode
/// early keeps its slot with a zero observation and zero reward until the
/// whole episode ends. Once no agent is live the environment is reset
/// automatically and the returned observations are the first of the new
/// episode, while the done flags still describe the finished one.
pub struct MarkovVecEnv<E: ParallelEnv> {
    env: E,
    agents: Vec<AgentId>,
    obs_space: DynSpace,
    action_space: DynSpace,
    obs_size: usize,
    closed: bool,
}

impl<E: ParallelEnv> MarkovVecEnv<E> {
    /// Wrap an environment whose agents all share one observation space and
    /// one action space. The environment is closed if it does not qualify.
    pub fn new(mut env: E) -> Result<Self> {
        let (obs_space, action_space) = match shared_spaces(&env) {
            Ok(spaces) => spaces,
            Err(e) => {
                env.close();
                return Err(e);
            }
        };

        Ok(Self {
            agents: env.possible_agents().to_vec(),
            obs_size: obs_space.flat_size(),
            env,
            obs_space,
            action_space,
            closed: false,
        })
    }

    /// The wrapped environment
    pub fn inner(&self) -> &E {
        &self.env
    }

    fn stack(&self, observations: &AgentMap<ArrayD<f32>>) -> Result<Array2<f32>> {
        let mut flat = Vec::with_capacity(self.agents.len() * self.obs_size);
        for agent in &self.agents {
            match observations.get(agent) {
                Some(obs) if obs.len() == self.obs_size => flat.extend(obs.iter().copied()),
                Some(obs) => {
                    return Err(GossipError::ShapeMismatch {
                        expected: self.obs_space.shape(),
                        actual: obs.shape().to_vec(),
                    })
                }
                None => flat.extend(std::iter::repeat(0.0).take(self.obs_size)),
            }
        }
        Array2::from_shape_vec((self.agents.len(), self.obs_size), flat)
            .map_err(|e| GossipError::EnvError(e.to_string()))
    }
}

fn shared_spaces<E: ParallelEnv>(env: &E) -> Result<(DynSpace, DynSpace)> {
    let agents = env.possible_agents();
    let first = agents
        .first()
        .ok_or_else(|| GossipError::EnvError("environment declares no agents".into()))?;
    let obs_space = env.observation_space(first);
    let action_space = env.action_space(first);

    for agent in &agents[1..] {
        if env.observation_space(agent) != obs_space || env.action_space(agent) != action_space {
            return Err(GossipError::IncompatibleSpaces(format!(
                "{agent} does not share the spaces of {first}"
            )));
        }
    }
    Ok((obs_space, action_space))
}

impl<E: ParallelEnv> VecEnvBackend for MarkovVecEnv<E> {
    fn observation_space(&self) -> DynSpace {
        self.obs_space.clone()
    }

    fn action_space(&self) -> DynSpace {
        self.action_space.clone()
    }

    fn num_envs(&self) -> usize {
        self.agents.len()
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<(Array2<f32>, Vec<EnvInfo>)> {
        let (observations, mut infos) = self.env.reset(seed)?;
        let stacked = self.stack(&observations)?;
        let infos = self
            .agents
            .iter()
            .map(|a| infos.remove(a).unwrap_or_default())
            .collect();
        Ok((stacked, infos))
    }

    fn step(&mut self, actions: &Array2<f32>) -> Result<VecEnvResult> {
        if actions.nrows() != self.agents.len() {
            return Err(GossipError::ShapeMismatch {
                expected: vec![self.agents.len()],
                actual: vec![actions.nrows()],
            });
        }

        let live = self.env.agents().to_vec();
        let mut agent_actions = AgentMap::with_capacity(live.len());
        for (i, agent) in self.agents.iter().enumerate() {
            if live.contains(agent) {
                let row = actions.row(i);
                let action = ArrayD::from_shape_vec(IxDyn(&[row.len()]), row.to_vec())
                    .map_err(|e| GossipError::InvalidAction(e.to_string()))?;
                agent_actions.insert(agent.clone(), action);
            }
        }

        let mut result = self.env.step(&agent_actions)?;

        let mut rewards = Vec::with_capacity(self.agents.len());
        let mut terminated = Vec::with_capacity(self.agents.len());
        let mut truncated = Vec::with_capacity(self.agents.len());
        let mut infos = Vec::with_capacity(self.agents.len());
        for agent in &self.agents {
            rewards.push(result.rewards.get(agent).copied().unwrap_or(0.0));
            terminated.push(result.terminations.get(agent).copied().unwrap_or(false));
            truncated.push(result.truncations.get(agent).copied().unwrap_or(false));
            infos.push(result.infos.remove(agent).unwrap_or_default());
        }

        let observations = if self.env.agents().is_empty() {
            let (observations, _) = self.env.reset(None)?;
            self.stack(&observations)?
        } else {
            self.stack(&result.observations)?
        };

        Ok(VecEnvResult {
            observations,
            rewards,
            terminated,
            truncated,
            infos,
        })
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.env.close();
        }
    }
}

impl<E: ParallelEnv> Drop for MarkovVecEnv<E> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::testing::LineEnv;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_one_slot_per_agent() {
        let mut envs = MarkovVecEnv::new(LineEnv::new(3, 4)).unwrap();
        assert_eq!(envs.num_envs(), 3);

        let (obs, infos) = envs.reset(Some(1)).unwrap();
        assert_eq!(obs.shape(), &[3, 2]);
        assert_eq!(infos.len(), 3);

        let result = envs.step(&Array2::zeros((3, 1))).unwrap();
        assert_eq!(result.rewards, vec![1.0; 3]);
        assert_eq!(result.observations[[0, 0]], 1.0);
    }

    #[test]
    fn test_auto_reset_after_episode() {
        let mut envs = MarkovVecEnv::new(LineEnv::new(2, 2)).unwrap();
        envs.reset(None).unwrap();

        let actions = Array2::zeros((2, 1));
        assert!(!envs.step(&actions).unwrap().dones()[0]);

        let result = envs.step(&actions).unwrap();
        assert_eq!(result.dones(), vec![true, true]);
        // observation already belongs to the new episode
        assert_eq!(result.observations[[0, 0]], 0.0);
        assert_eq!(envs.inner().agents().len(), 2);
    }

    #[test]
    fn test_wrong_action_rows_rejected() {
        let mut envs = MarkovVecEnv::new(LineEnv::new(2, 2)).unwrap();
        envs.reset(None).unwrap();
        assert!(matches!(
            envs.step(&Array2::zeros((3, 1))),
            Err(GossipError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_close_on_drop() {
        let inner = LineEnv::new(2, 2);
        let closes = inner.close_counter();
        let envs = MarkovVecEnv::new(inner).unwrap();
        drop(envs);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
