//! Minimal parallel environment for unit tests.

use super::traits::{AgentId, AgentMap, EnvInfo, EnvMetadata, ParallelEnv, ParallelStepResult};
use crate::spaces::{Box as BoxSpace, Discrete, DynSpace};
use crate::{GossipError, Result};
use ndarray::{ArrayD, IxDyn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Agents walk along a line; every agent earns 1.0 per step and all of them
/// terminate together after `episode_len` steps. Action 2 is rejected.
pub struct LineEnv {
    metadata: EnvMetadata,
    possible_agents: Vec<AgentId>,
    agents: Vec<AgentId>,
    episode_len: u32,
    tick: u32,
    steps_taken: usize,
    closes: Arc<AtomicUsize>,
}

impl LineEnv {
    pub fn new(num_agents: usize, episode_len: u32) -> Self {
        Self {
            metadata: EnvMetadata::new("line_v0"),
            possible_agents: (0..num_agents).map(|i| format!("agent_{i}")).collect(),
            agents: Vec::new(),
            episode_len,
            tick: 0,
            steps_taken: 0,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }

    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }

    fn observe(&self) -> ArrayD<f32> {
        ArrayD::from_shape_vec(IxDyn(&[2]), vec![self.tick as f32, 1.0]).unwrap()
    }
}

impl ParallelEnv for LineEnv {
    fn metadata(&self) -> &EnvMetadata {
        &self.metadata
    }

    fn possible_agents(&self) -> &[AgentId] {
        &self.possible_agents
    }

    fn agents(&self) -> &[AgentId] {
        &self.agents
    }

    fn observation_space(&self, _agent: &str) -> DynSpace {
        DynSpace::Box(BoxSpace::uniform(&[2], 0.0, 100.0))
    }

    fn action_space(&self, _agent: &str) -> DynSpace {
        DynSpace::Discrete(Discrete::new(2))
    }

    fn reset(&mut self, _seed: Option<u64>) -> Result<(AgentMap<ArrayD<f32>>, AgentMap<EnvInfo>)> {
        self.tick = 0;
        self.agents = self.possible_agents.clone();
        let obs = self.agents.iter().map(|a| (a.clone(), self.observe())).collect();
        Ok((obs, AgentMap::new()))
    }

    fn step(&mut self, actions: &AgentMap<ArrayD<f32>>) -> Result<ParallelStepResult> {
        if actions.values().any(|a| a.iter().any(|&v| v >= 2.0)) {
            return Err(GossipError::InvalidAction("line env only accepts 0 or 1".into()));
        }
        self.tick += 1;
        self.steps_taken += 1;
        let done = self.tick >= self.episode_len;

        let mut result = ParallelStepResult::default();
        for agent in &self.agents {
            result.observations.insert(agent.clone(), self.observe());
            result.rewards.insert(agent.clone(), 1.0);
            result.terminations.insert(agent.clone(), done);
            result.truncations.insert(agent.clone(), false);
            result.infos.insert(agent.clone(), EnvInfo::new());
        }
        if done {
            self.agents.clear();
        }
        Ok(result)
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
