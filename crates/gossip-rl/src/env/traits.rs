//! Core environment trait definitions.

use crate::spaces::DynSpace;
use crate::Result;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Agent identifier, e.g. `"guest_3"`.
pub type AgentId = String;

/// Per-agent values keyed by agent identifier.
pub type AgentMap<T> = HashMap<AgentId, T>;

/// Information returned from environment steps
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvInfo {
    /// Episode return (if done)
    pub episode_return: Option<f32>,
    /// Episode length (if done)
    pub episode_length: Option<f32>,
    /// Custom metrics (kept minimal for performance)
    pub extra: smallvec::SmallVec<[(&'static str, f32); 4]>,
}

impl EnvInfo {
    /// Create empty info
    pub fn new() -> Self {
        Self::default()
    }

    /// Add episode stats
    pub fn with_episode_stats(mut self, ret: f32, len: u32) -> Self {
        self.episode_return = Some(ret);
        self.episode_length = Some(len as f32);
        self
    }

    /// Add a custom metric (use rarely)
    pub fn with_extra(mut self, key: &'static str, value: f32) -> Self {
        self.extra.push((key, value));
        self
    }

    /// Get a value by key (including defaults)
    pub fn get(&self, key: &str) -> Option<f32> {
        match key {
            "episode_return" => self.episode_return,
            "episode_length" => self.episode_length,
            _ => self.extra.iter().find(|(k, _)| k == &key).map(|(_, v)| *v),
        }
    }
}

/// How an environment presents itself visually.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Frames are printed to stdout as the episode advances
    Human,
    /// Frames are only produced on request through `render()`
    Ansi,
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderMode::Human => write!(f, "human"),
            RenderMode::Ansi => write!(f, "ansi"),
        }
    }
}

/// Static description of an environment.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvMetadata {
    /// Declared name, also the prefix of every policy artifact
    pub name: String,
    /// Render modes the environment supports
    pub render_modes: Vec<RenderMode>,
}

impl EnvMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            render_modes: Vec::new(),
        }
    }

    pub fn with_render_modes(mut self, modes: &[RenderMode]) -> Self {
        self.render_modes = modes.to_vec();
        self
    }
}

/// Result from a simultaneous step of every live agent
#[derive(Clone, Debug, Default)]
pub struct ParallelStepResult {
    pub observations: AgentMap<ArrayD<f32>>,
    pub rewards: AgentMap<f32>,
    pub terminations: AgentMap<bool>,
    pub truncations: AgentMap<bool>,
    pub infos: AgentMap<EnvInfo>,
}

impl ParallelStepResult {
    /// Whether the given agent finished its episode in this step
    pub fn done(&self, agent: &str) -> bool {
        self.terminations.get(agent).copied().unwrap_or(false)
            || self.truncations.get(agent).copied().unwrap_or(false)
    }
}

/// Multi-agent environment where every live agent acts at once.
///
/// This is the batched view used for training. `agents()` lists the agents
/// still in the episode; an agent that terminated or truncated disappears from
/// it after the step that reported it.
///
/// # Example
///
/// ```rust,ignore
/// let (observations, _infos) = env.reset(Some(0))?;
/// let actions = env
///     .agents()
///     .iter()
///     .map(|a| (a.clone(), env.action_space(a).sample(&mut rng)))
///     .collect();
/// let result = env.step(&actions)?;
/// ```
pub trait ParallelEnv: Send {
    /// Name and render modes
    fn metadata(&self) -> &EnvMetadata;

    /// Every agent that can ever appear, in a fixed order
    fn possible_agents(&self) -> &[AgentId];

    /// Agents currently in the episode
    fn agents(&self) -> &[AgentId];

    /// Observation space of one agent
    fn observation_space(&self, agent: &str) -> DynSpace;

    /// Action space of one agent
    fn action_space(&self, agent: &str) -> DynSpace;

    /// Reset the environment
    ///
    /// # Arguments
    /// * `seed` - Optional random seed for reproducibility
    fn reset(&mut self, seed: Option<u64>) -> Result<(AgentMap<ArrayD<f32>>, AgentMap<EnvInfo>)>;

    /// Step every live agent with its action
    fn step(&mut self, actions: &AgentMap<ArrayD<f32>>) -> Result<ParallelStepResult>;

    /// Optional: Render the environment
    fn render(&self) -> Option<String> {
        None
    }

    /// Optional: Close the environment and free resources
    fn close(&mut self) {}
}

/// What the acting agent sees at its turn.
#[derive(Clone, Debug)]
pub struct AgentTurn {
    pub agent: AgentId,
    pub observation: ArrayD<f32>,
    /// Reward accumulated since this agent last acted
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
    pub info: EnvInfo,
}

impl AgentTurn {
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Turn-based (agent-environment-cycle) view: exactly one agent acts per step.
pub trait AecEnv {
    fn metadata(&self) -> &EnvMetadata;

    fn possible_agents(&self) -> &[AgentId];

    /// Agents still listed by the cycle, including finished agents that have
    /// not yet taken their final step
    fn agents(&self) -> &[AgentId];

    /// The agent whose turn it is, `None` once every agent has left
    fn agent_selection(&self) -> Option<&AgentId>;

    fn reset(&mut self, seed: Option<u64>) -> Result<()>;

    /// Observation, accumulated reward and done flags of the selected agent
    fn last(&self) -> Result<AgentTurn>;

    /// Reward the agent received from the most recent environment step
    fn reward(&self, agent: &str) -> f32;

    /// Act for the selected agent. Finished agents must pass `None`.
    fn step(&mut self, action: Option<&ArrayD<f32>>) -> Result<()>;

    fn render(&self) -> Option<String> {
        None
    }

    fn close(&mut self) {}
}
