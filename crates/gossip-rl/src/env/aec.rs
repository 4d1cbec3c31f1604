//! Turn-based view over a parallel environment.

use super::traits::{AecEnv, AgentId, AgentMap, AgentTurn, EnvInfo, EnvMetadata, ParallelEnv};
use crate::{GossipError, Result};
use ndarray::{ArrayD, IxDyn};

/// Presents a [`ParallelEnv`] one agent at a time.
///
/// Actions are buffered until the last agent of the cycle acts; only then is
/// the wrapped environment stepped with every buffered action. Per-step
/// rewards are cleared when the first agent of the next cycle acts, so
/// `reward()` reports the latest step's rewards only until the cycle moves on.
/// Agents that finished are listed first and must take one `None` step to
/// leave the cycle.
pub struct ParallelToAec<E: ParallelEnv> {
    env: E,
    possible_agents: Vec<AgentId>,
    agents: Vec<AgentId>,
    /// Live agents in acting order for the current cycle
    cycle: Vec<AgentId>,
    cursor: usize,
    selection: Option<AgentId>,
    /// Agent to resume with once every finished agent has left
    resume_selection: Option<AgentId>,
    actions: AgentMap<ArrayD<f32>>,
    observations: AgentMap<ArrayD<f32>>,
    rewards: AgentMap<f32>,
    cumulative_rewards: AgentMap<f32>,
    terminations: AgentMap<bool>,
    truncations: AgentMap<bool>,
    infos: AgentMap<EnvInfo>,
    closed: bool,
}

impl<E: ParallelEnv> ParallelToAec<E> {
    pub fn new(env: E) -> Self {
        let possible_agents = env.possible_agents().to_vec();
        Self {
            env,
            possible_agents,
            agents: Vec::new(),
            cycle: Vec::new(),
            cursor: 0,
            selection: None,
            resume_selection: None,
            actions: AgentMap::new(),
            observations: AgentMap::new(),
            rewards: AgentMap::new(),
            cumulative_rewards: AgentMap::new(),
            terminations: AgentMap::new(),
            truncations: AgentMap::new(),
            infos: AgentMap::new(),
            closed: false,
        }
    }

    /// The wrapped parallel environment
    pub fn unwrapped(&self) -> &E {
        &self.env
    }

    fn is_done(&self, agent: &str) -> bool {
        self.terminations.get(agent).copied().unwrap_or(false)
            || self.truncations.get(agent).copied().unwrap_or(false)
    }

    fn select_first_done(&mut self) {
        self.resume_selection = self.selection.clone();
        if let Some(done) = self.agents.iter().find(|a| self.is_done(a)) {
            self.selection = Some(done.clone());
        }
    }

    fn step_parallel(&mut self) -> Result<()> {
        let actions = std::mem::take(&mut self.actions);
        let result = self.env.step(&actions)?;

        self.observations = result.observations;
        self.terminations = result.terminations;
        self.truncations = result.truncations;
        self.infos = result.infos;
        self.cumulative_rewards = result.rewards.clone();
        self.rewards = result.rewards;

        let live = self.env.agents().to_vec();
        let mut finished: Vec<AgentId> = self
            .observations
            .keys()
            .filter(|a| !live.contains(a))
            .cloned()
            .collect();
        finished.sort();

        self.agents = live.clone();
        self.agents.extend(finished);

        if !live.is_empty() {
            self.cycle = live;
            self.cursor = 0;
            self.selection = self.cycle.first().cloned();
        }
        self.select_first_done();
        Ok(())
    }

    fn step_finished(&mut self, agent: &str) {
        self.agents.retain(|a| a != agent);
        self.rewards.remove(agent);
        self.cumulative_rewards.remove(agent);
        self.terminations.remove(agent);
        self.truncations.remove(agent);
        self.infos.remove(agent);

        if let Some(next) = self.agents.iter().find(|a| self.is_done(a)) {
            self.selection = Some(next.clone());
            return;
        }

        self.selection = self
            .resume_selection
            .take()
            .filter(|a| self.agents.contains(a))
            .or_else(|| self.cycle.get(self.cursor).cloned())
            .filter(|a| self.agents.contains(a));
    }
}

impl<E: ParallelEnv> AecEnv for ParallelToAec<E> {
    fn metadata(&self) -> &EnvMetadata {
        self.env.metadata()
    }

    fn possible_agents(&self) -> &[AgentId] {
        &self.possible_agents
    }

    fn agents(&self) -> &[AgentId] {
        &self.agents
    }

    fn agent_selection(&self) -> Option<&AgentId> {
        self.selection.as_ref()
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<()> {
        let (observations, mut infos) = self.env.reset(seed)?;

        self.agents = self.env.agents().to_vec();
        self.cycle = self.agents.clone();
        self.cursor = 0;
        self.selection = self.cycle.first().cloned();
        self.resume_selection = None;
        self.actions.clear();
        self.observations = observations;

        self.rewards = self.agents.iter().map(|a| (a.clone(), 0.0)).collect();
        self.cumulative_rewards = self.rewards.clone();
        self.terminations = self.agents.iter().map(|a| (a.clone(), false)).collect();
        self.truncations = self.terminations.clone();
        self.infos = self
            .agents
            .iter()
            .map(|a| (a.clone(), infos.remove(a).unwrap_or_default()))
            .collect();
        Ok(())
    }

    fn last(&self) -> Result<AgentTurn> {
        let agent = self
            .selection
            .clone()
            .ok_or_else(|| GossipError::EnvError("no agent is selected".into()))?;

        let observation = match self.observations.get(&agent) {
            Some(obs) => obs.clone(),
            None => ArrayD::zeros(IxDyn(&self.env.observation_space(&agent).shape())),
        };

        Ok(AgentTurn {
            observation,
            reward: self.cumulative_rewards.get(&agent).copied().unwrap_or(0.0),
            terminated: self.terminations.get(&agent).copied().unwrap_or(false),
            truncated: self.truncations.get(&agent).copied().unwrap_or(false),
            info: self.infos.get(&agent).cloned().unwrap_or_default(),
            agent,
        })
    }

    fn reward(&self, agent: &str) -> f32 {
        self.rewards.get(agent).copied().unwrap_or(0.0)
    }

    fn step(&mut self, action: Option<&ArrayD<f32>>) -> Result<()> {
        let agent = self
            .selection
            .clone()
            .ok_or_else(|| GossipError::EnvError("step called with no agent selected".into()))?;

        if self.is_done(&agent) {
            if action.is_some() {
                return Err(GossipError::InvalidAction(format!(
                    "{agent} has finished; the only valid action is None"
                )));
            }
            self.step_finished(&agent);
            return Ok(());
        }

        let action = action.ok_or_else(|| {
            GossipError::InvalidAction(format!("{agent} is still live and needs an action"))
        })?;
        self.cumulative_rewards.insert(agent.clone(), 0.0);
        self.actions.insert(agent, action.clone());

        if self.cursor + 1 >= self.cycle.len() {
            self.step_parallel()
        } else {
            if self.cursor == 0 {
                self.rewards.values_mut().for_each(|r| *r = 0.0);
            }
            self.cursor += 1;
            self.selection = self.cycle.get(self.cursor).cloned();
            Ok(())
        }
    }

    fn render(&self) -> Option<String> {
        self.env.render()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.env.close();
        }
    }
}

impl<E: ParallelEnv> Drop for ParallelToAec<E> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::testing::LineEnv;
    use std::sync::atomic::Ordering;

    fn act(value: f32) -> ArrayD<f32> {
        ArrayD::from_elem(IxDyn(&[1]), value)
    }

    #[test]
    fn test_cycle_order_and_buffered_step() {
        let mut env = ParallelToAec::new(LineEnv::new(3, 4));
        env.reset(Some(0)).unwrap();

        assert_eq!(env.agent_selection().map(String::as_str), Some("agent_0"));
        env.step(Some(&act(1.0))).unwrap();
        assert_eq!(env.agent_selection().map(String::as_str), Some("agent_1"));
        assert_eq!(env.unwrapped().steps_taken(), 0);

        env.step(Some(&act(1.0))).unwrap();
        env.step(Some(&act(1.0))).unwrap();
        assert_eq!(env.unwrapped().steps_taken(), 1);
        assert_eq!(env.agent_selection().map(String::as_str), Some("agent_0"));
        assert_eq!(env.reward("agent_2"), 1.0);
    }

    #[test]
    fn test_rewards_cleared_when_cycle_moves_on() {
        let mut env = ParallelToAec::new(LineEnv::new(2, 4));
        env.reset(None).unwrap();
        env.step(Some(&act(0.0))).unwrap();
        env.step(Some(&act(0.0))).unwrap();

        assert_eq!(env.reward("agent_0"), 1.0);
        assert_eq!(env.last().unwrap().reward, 1.0);

        env.step(Some(&act(0.0))).unwrap();
        assert_eq!(env.reward("agent_0"), 0.0);
        assert_eq!(env.reward("agent_1"), 0.0);
        // accumulated reward stays visible to the next actor
        assert_eq!(env.last().unwrap().reward, 1.0);
    }

    #[test]
    fn test_finished_agents_step_out_with_none() {
        let mut env = ParallelToAec::new(LineEnv::new(2, 1));
        env.reset(None).unwrap();
        env.step(Some(&act(0.0))).unwrap();
        env.step(Some(&act(0.0))).unwrap();

        let turn = env.last().unwrap();
        assert!(turn.terminated);
        assert_eq!(turn.agent, "agent_0");
        assert!(env.step(Some(&act(0.0))).is_err());

        env.step(None).unwrap();
        assert_eq!(env.agent_selection().map(String::as_str), Some("agent_1"));
        env.step(None).unwrap();
        assert!(env.agent_selection().is_none());
        assert!(env.agents().is_empty());
    }

    #[test]
    fn test_live_agent_requires_action() {
        let mut env = ParallelToAec::new(LineEnv::new(2, 3));
        env.reset(None).unwrap();
        assert!(matches!(env.step(None), Err(GossipError::InvalidAction(_))));
    }

    #[test]
    fn test_close_once_including_drop() {
        let inner = LineEnv::new(2, 3);
        let closes = inner.close_counter();
        let mut env = ParallelToAec::new(inner);
        env.close();
        env.close();
        drop(env);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
