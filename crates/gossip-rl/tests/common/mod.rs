//! Test doubles shared by the driver integration tests.
#![allow(dead_code)]

use gossip_rl::checkpoint::PolicyArtifact;
use gossip_rl::prelude::*;
use gossip_rl::{GossipError, Result};
use ndarray::{Array2, ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Cooperative parallel env: every live agent earns 1.0 per step and all of
/// them terminate together after `episode_len` steps.
pub struct CountingEnv {
    metadata: EnvMetadata,
    possible_agents: Vec<AgentId>,
    agents: Vec<AgentId>,
    episode_len: u32,
    tick: u32,
    steps: usize,
    fail_at_step: Option<usize>,
    closes: Arc<AtomicUsize>,
}

impl CountingEnv {
    pub fn new(num_agents: usize, episode_len: u32) -> Self {
        Self {
            metadata: EnvMetadata::new("counting_v0"),
            possible_agents: (0..num_agents).map(|i| format!("guest_{i}")).collect(),
            agents: Vec::new(),
            episode_len,
            tick: 0,
            steps: 0,
            fail_at_step: None,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make the `n`-th call to `step` fail
    pub fn failing_at(mut self, n: usize) -> Self {
        self.fail_at_step = Some(n);
        self
    }

    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }

    fn observe(&self) -> ArrayD<f32> {
        ArrayD::from_elem(IxDyn(&[1]), self.tick as f32 / self.episode_len as f32)
    }
}

impl ParallelEnv for CountingEnv {
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
        DynSpace::Box(Box::uniform(&[1], 0.0, 1.0))
    }

    fn action_space(&self, _agent: &str) -> DynSpace {
        DynSpace::Discrete(Discrete::new(2))
    }

    fn reset(
        &mut self,
        _seed: Option<u64>,
    ) -> Result<(HashMap<AgentId, ArrayD<f32>>, HashMap<AgentId, EnvInfo>)> {
        self.tick = 0;
        self.agents = self.possible_agents.clone();
        let obs = self.agents.iter().map(|a| (a.clone(), self.observe())).collect();
        Ok((obs, HashMap::new()))
    }

    fn step(&mut self, _actions: &HashMap<AgentId, ArrayD<f32>>) -> Result<ParallelStepResult> {
        self.steps += 1;
        if self.fail_at_step == Some(self.steps) {
            return Err(GossipError::EnvError("scripted failure".into()));
        }
        self.tick += 1;
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

/// Factory that keeps the close counter of every env it builds.
#[derive(Default)]
pub struct EnvFactory {
    pub closes: Mutex<Vec<Arc<AtomicUsize>>>,
    pub fail_at_step: Option<usize>,
    /// Fail the `n`-th construction
    pub fail_at_build: Option<usize>,
}

impl EnvFactory {
    pub fn build(&self) -> Result<CountingEnv> {
        let mut closes = self.closes.lock().unwrap();
        if self.fail_at_build == Some(closes.len() + 1) {
            return Err(GossipError::EnvError("factory refused".into()));
        }
        let mut env = CountingEnv::new(2, 3);
        if let Some(n) = self.fail_at_step {
            env = env.failing_at(n);
        }
        closes.push(env.close_counter());
        Ok(env)
    }

    pub fn built(&self) -> usize {
        self.closes.lock().unwrap().len()
    }

    /// Close count of every env built so far
    pub fn close_counts(&self) -> Vec<usize> {
        self.closes
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.load(Ordering::SeqCst))
            .collect()
    }
}

/// One scripted turn: who acts, every agent's visible step reward, and
/// whether the acting agent is done.
#[derive(Clone, Debug)]
pub struct ScriptedTurn {
    pub agent: &'static str,
    pub rewards: [f32; 2],
    pub done: bool,
}

/// Turn-based env replaying the same script every game.
pub struct ScriptedAec {
    metadata: EnvMetadata,
    possible_agents: Vec<AgentId>,
    script: Vec<ScriptedTurn>,
    cursor: usize,
    selection: Option<AgentId>,
    pub seeds: Vec<Option<u64>>,
    pub actions: Vec<(AgentId, f32)>,
    pub closes: usize,
}

impl ScriptedAec {
    pub fn new(script: Vec<ScriptedTurn>) -> Self {
        Self {
            metadata: EnvMetadata::new("scripted_v0"),
            possible_agents: vec!["a".to_string(), "b".to_string()],
            script,
            cursor: 0,
            selection: None,
            seeds: Vec::new(),
            actions: Vec::new(),
            closes: 0,
        }
    }

    fn turn(&self) -> Result<&ScriptedTurn> {
        self.script
            .get(self.cursor)
            .ok_or_else(|| GossipError::EnvError("script exhausted".into()))
    }

    fn index(agent: &str) -> usize {
        usize::from(agent == "b")
    }
}

impl AecEnv for ScriptedAec {
    fn metadata(&self) -> &EnvMetadata {
        &self.metadata
    }

    fn possible_agents(&self) -> &[AgentId] {
        &self.possible_agents
    }

    fn agents(&self) -> &[AgentId] {
        &self.possible_agents
    }

    fn agent_selection(&self) -> Option<&AgentId> {
        self.selection.as_ref()
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<()> {
        self.seeds.push(seed);
        self.cursor = 0;
        self.selection = self.script.first().map(|t| t.agent.to_string());
        Ok(())
    }

    fn last(&self) -> Result<AgentTurn> {
        let turn = self.turn()?;
        Ok(AgentTurn {
            agent: turn.agent.to_string(),
            observation: ArrayD::zeros(IxDyn(&[1])),
            reward: turn.rewards[Self::index(turn.agent)],
            terminated: turn.done,
            truncated: false,
            info: EnvInfo::new(),
        })
    }

    fn reward(&self, agent: &str) -> f32 {
        self.turn().map_or(0.0, |t| t.rewards[Self::index(agent)])
    }

    fn step(&mut self, action: Option<&ArrayD<f32>>) -> Result<()> {
        let agent = self.turn()?.agent.to_string();
        let value = action.and_then(|a| a.iter().next().copied()).unwrap_or(-1.0);
        self.actions.push((agent, value));
        self.cursor += 1;
        self.selection = self.script.get(self.cursor).map(|t| t.agent.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}

/// Policy that always answers with the same discrete action.
pub struct ConstantPolicy(pub f32);

impl Policy for ConstantPolicy {
    fn predict(&mut self, _observation: &ArrayD<f32>, _deterministic: bool) -> Result<Prediction> {
        Ok(Prediction {
            action: ArrayD::from_elem(IxDyn(&[1]), self.0),
            log_prob: 0.0,
        })
    }
}

thread_local! {
    static CONSTRUCTS: Cell<usize> = Cell::new(0);
    static LOADS: Cell<usize> = Cell::new(0);
    static POLICY_LOADS: Cell<usize> = Cell::new(0);
}

/// Calls made to [`MockTrainer`] on the current thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrainerCalls {
    pub constructs: usize,
    pub loads: usize,
    pub policy_loads: usize,
}

pub fn trainer_calls() -> TrainerCalls {
    TrainerCalls {
        constructs: CONSTRUCTS.with(Cell::get),
        loads: LOADS.with(Cell::get),
        policy_loads: POLICY_LOADS.with(Cell::get),
    }
}

fn bump(counter: &'static std::thread::LocalKey<Cell<usize>>) {
    counter.with(|c| c.set(c.get() + 1));
}

#[derive(Clone, Debug, Default)]
pub struct MockConfig {
    pub marker: String,
}

/// What a mock artifact carries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MockState {
    pub marker: String,
    /// Rounds this learner has been through
    pub generation: u32,
    pub timesteps: u64,
}

/// Trainer that steps the env with action 0 and saves a marker.
pub struct MockTrainer {
    pub state: MockState,
}

impl MockTrainer {
    pub const ALGORITHM: &'static str = "mock";

    pub fn read(path: &Path) -> MockState {
        PolicyArtifact::<MockState>::load(path, Self::ALGORITHM)
            .unwrap()
            .state
    }
}

impl PolicyTrainer for MockTrainer {
    type Config = MockConfig;
    type Policy = ConstantPolicy;

    fn construct(config: &MockConfig, _obs: &DynSpace, _action: &DynSpace) -> Result<Self> {
        bump(&CONSTRUCTS);
        Ok(Self {
            state: MockState {
                marker: config.marker.clone(),
                generation: 0,
                timesteps: 0,
            },
        })
    }

    fn load(path: &Path, _obs: &DynSpace, _action: &DynSpace) -> Result<Self> {
        bump(&LOADS);
        let artifact = PolicyArtifact::<MockState>::load(path, Self::ALGORITHM)?;
        Ok(Self {
            state: artifact.state,
        })
    }

    fn learn<B: VecEnvBackend + ?Sized>(
        &mut self,
        envs: &mut B,
        total_timesteps: u64,
    ) -> Result<TrainSummary> {
        envs.reset(None)?;
        let num_envs = envs.num_envs();
        let actions = Array2::zeros((num_envs, 1));
        let mut summary = TrainSummary::default();
        while summary.timesteps < total_timesteps {
            envs.step(&actions)?;
            summary.timesteps += num_envs as u64;
            summary.iterations += 1;
        }
        self.state.generation += 1;
        self.state.timesteps += summary.timesteps;
        Ok(summary)
    }

    fn save(&self, path: &Path) -> Result<()> {
        PolicyArtifact::new(Self::ALGORITHM, self.state.clone()).save(path)
    }

    fn load_policy(path: &Path) -> Result<ConstantPolicy> {
        bump(&POLICY_LOADS);
        PolicyArtifact::<MockState>::load(path, Self::ALGORITHM)?;
        Ok(ConstantPolicy(0.0))
    }
}
