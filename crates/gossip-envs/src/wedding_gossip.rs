//! Wedding gossip: guests spread a rumour around the reception tables.

use gossip_rl::env::{AgentId, AgentMap, EnvInfo, EnvMetadata, ParallelEnv, ParallelStepResult, RenderMode};
use gossip_rl::spaces::{Box as BoxSpace, Discrete, DynSpace};
use gossip_rl::{GossipError, Result};
use ndarray::{ArrayD, IxDyn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Registered name; artifacts of this environment are prefixed with it.
pub const NAME: &str = "wedding_gossip_v2";

const LISTEN: usize = 0;
const SHARE: usize = 1;
/// Charged to every guest on every step
const STEP_COST: f32 = 0.01;

/// Construction options for [`WeddingGossip`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeddingGossipConfig {
    pub num_guests: usize,
    pub num_tables: usize,
    /// Steps before the episode is truncated
    pub max_cycles: u32,
    pub render_mode: Option<RenderMode>,
}

impl Default for WeddingGossipConfig {
    fn default() -> Self {
        Self {
            num_guests: 6,
            num_tables: 3,
            max_cycles: 50,
            render_mode: None,
        }
    }
}

impl WeddingGossipConfig {
    pub fn with_guests(mut self, num_guests: usize) -> Self {
        self.num_guests = num_guests;
        self
    }

    pub fn with_tables(mut self, num_tables: usize) -> Self {
        self.num_tables = num_tables;
        self
    }

    pub fn with_max_cycles(mut self, max_cycles: u32) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    pub fn with_render_mode(mut self, render_mode: Option<RenderMode>) -> Self {
        self.render_mode = render_mode;
        self
    }
}

/// Cooperative gossip spreading at a wedding reception.
///
/// Every guest sits at one table. At reset one random guest knows the
/// gossip. Each step every guest picks one action:
/// - `0` listen
/// - `1` share: if the guest knows the gossip, everyone at its table learns it
/// - `2 + k` move to table `k`
///
/// Sharing is resolved before moving. All guests receive the same reward:
/// the number of newly informed guests minus a small per-step cost. The
/// episode terminates once everyone knows and is truncated after
/// `max_cycles` steps.
///
/// Observation per guest (`3 * tables + 2` values in `[0, 1]`): one-hot own
/// table, own knowledge flag, informed fraction per table, occupancy
/// fraction per table, elapsed fraction of `max_cycles`.
pub struct WeddingGossip {
    config: WeddingGossipConfig,
    metadata: EnvMetadata,
    possible_agents: Vec<AgentId>,
    agents: Vec<AgentId>,
    /// Table of each guest
    seating: Vec<usize>,
    informed: Vec<bool>,
    tick: u32,
    rng: ChaCha8Rng,
}

impl WeddingGossip {
    pub fn new(config: WeddingGossipConfig) -> Self {
        Self {
            metadata: EnvMetadata::new(NAME).with_render_modes(&[RenderMode::Human, RenderMode::Ansi]),
            possible_agents: (0..config.num_guests).map(|i| format!("guest_{i}")).collect(),
            agents: Vec::new(),
            seating: vec![0; config.num_guests],
            informed: vec![false; config.num_guests],
            tick: 0,
            rng: ChaCha8Rng::from_entropy(),
            config,
        }
    }

    pub fn config(&self) -> &WeddingGossipConfig {
        &self.config
    }

    /// Table of every guest, in guest order
    pub fn seating(&self) -> &[usize] {
        &self.seating
    }

    /// Whether each guest knows the gossip, in guest order
    pub fn informed(&self) -> &[bool] {
        &self.informed
    }

    pub fn num_informed(&self) -> usize {
        self.informed.iter().filter(|&&k| k).count()
    }

    fn num_actions(&self) -> usize {
        2 + self.config.num_tables
    }

    fn obs_size(&self) -> usize {
        3 * self.config.num_tables + 2
    }

    fn guest_index(&self, agent: &str) -> Option<usize> {
        self.possible_agents.iter().position(|a| a == agent)
    }

    fn parse_action(&self, agent: &str, action: &ArrayD<f32>) -> Result<usize> {
        let value = action
            .iter()
            .next()
            .copied()
            .ok_or_else(|| GossipError::InvalidAction(format!("{agent} sent an empty action")))?;
        Discrete::new(self.num_actions()).decode(value).ok_or_else(|| {
            GossipError::InvalidAction(format!(
                "{agent} chose {value}, expected an integer in 0..{}",
                self.num_actions()
            ))
        })
    }

    fn observe(&self, guest: usize) -> ArrayD<f32> {
        let tables = self.config.num_tables;
        let guests = self.config.num_guests.max(1) as f32;
        let mut obs = vec![0.0f32; self.obs_size()];

        obs[self.seating[guest]] = 1.0;
        obs[tables] = if self.informed[guest] { 1.0 } else { 0.0 };
        for (g, &table) in self.seating.iter().enumerate() {
            if self.informed[g] {
                obs[tables + 1 + table] += 1.0;
            }
            obs[2 * tables + 1 + table] += 1.0 / guests;
        }
        for table in 0..tables {
            let seated = obs[2 * tables + 1 + table] * guests;
            if seated > 0.0 {
                obs[tables + 1 + table] /= seated;
            }
        }
        obs[3 * tables + 1] = self.tick as f32 / self.config.max_cycles.max(1) as f32;

        ArrayD::from_shape_vec(IxDyn(&[obs.len()]), obs)
            .unwrap_or_else(|_| ArrayD::zeros(IxDyn(&[self.obs_size()])))
    }

    fn observations(&self, agents: &[AgentId]) -> AgentMap<ArrayD<f32>> {
        agents
            .iter()
            .filter_map(|a| self.guest_index(a).map(|g| (a.clone(), self.observe(g))))
            .collect()
    }

    fn show(&self) {
        if self.config.render_mode == Some(RenderMode::Human) {
            if let Some(frame) = self.render() {
                println!("{frame}");
            }
        }
    }
}

impl ParallelEnv for WeddingGossip {
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
        DynSpace::Box(BoxSpace::uniform(&[self.obs_size()], 0.0, 1.0))
    }

    fn action_space(&self, _agent: &str) -> DynSpace {
        DynSpace::Discrete(Discrete::new(self.num_actions()))
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<(AgentMap<ArrayD<f32>>, AgentMap<EnvInfo>)> {
        if self.config.num_guests == 0 || self.config.num_tables == 0 {
            return Err(GossipError::EnvError(
                "a reception needs at least one guest and one table".into(),
            ));
        }
        if let Some(s) = seed {
            self.rng = ChaCha8Rng::seed_from_u64(s);
        }

        let tables = self.config.num_tables;
        self.tick = 0;
        self.seating = (0..self.config.num_guests)
            .map(|_| self.rng.gen_range(0..tables))
            .collect();
        self.informed = vec![false; self.config.num_guests];
        let source = self.rng.gen_range(0..self.config.num_guests);
        self.informed[source] = true;
        self.agents = self.possible_agents.clone();

        tracing::debug!(seed = ?seed, source, "Reception reset");
        self.show();

        let infos = self.agents.iter().map(|a| (a.clone(), EnvInfo::new())).collect();
        Ok((self.observations(&self.agents), infos))
    }

    fn step(&mut self, actions: &AgentMap<ArrayD<f32>>) -> Result<ParallelStepResult> {
        if self.agents.is_empty() {
            return Err(GossipError::EnvError("step called on a finished episode; call reset".into()));
        }

        let mut chosen = Vec::with_capacity(self.agents.len());
        for agent in &self.agents {
            let action = actions
                .get(agent)
                .ok_or_else(|| GossipError::InvalidAction(format!("no action for {agent}")))?;
            let guest = self
                .guest_index(agent)
                .ok_or_else(|| GossipError::EnvError(format!("unknown guest {agent}")))?;
            chosen.push((guest, self.parse_action(agent, action)?));
        }

        let sharing_tables: Vec<usize> = chosen
            .iter()
            .filter(|&&(guest, action)| action == SHARE && self.informed[guest])
            .map(|&(guest, _)| self.seating[guest])
            .collect();
        let mut newly_informed = 0usize;
        for guest in 0..self.config.num_guests {
            if !self.informed[guest] && sharing_tables.contains(&self.seating[guest]) {
                self.informed[guest] = true;
                newly_informed += 1;
            }
        }
        for &(guest, action) in &chosen {
            match action {
                LISTEN | SHARE => {}
                table => self.seating[guest] = table - 2,
            }
        }
        self.tick += 1;

        let everyone_knows = self.informed.iter().all(|&k| k);
        let out_of_time = self.tick >= self.config.max_cycles;
        let reward = newly_informed as f32 - STEP_COST;

        let stepped = std::mem::take(&mut self.agents);
        let mut result = ParallelStepResult {
            observations: self.observations(&stepped),
            ..Default::default()
        };
        let informed_fraction = self.num_informed() as f32 / self.config.num_guests as f32;
        for agent in &stepped {
            result.rewards.insert(agent.clone(), reward);
            result.terminations.insert(agent.clone(), everyone_knows);
            result.truncations.insert(agent.clone(), out_of_time && !everyone_knows);
            let info = if everyone_knows || out_of_time {
                EnvInfo::new().with_extra("informed", informed_fraction)
            } else {
                EnvInfo::new()
            };
            result.infos.insert(agent.clone(), info);
        }
        if !(everyone_knows || out_of_time) {
            self.agents = stepped;
        }

        self.show();
        Ok(result)
    }

    fn render(&self) -> Option<String> {
        let mut lines = vec![format!(
            "cycle {}/{}  informed {}/{}",
            self.tick,
            self.config.max_cycles,
            self.num_informed(),
            self.config.num_guests
        )];
        for table in 0..self.config.num_tables {
            let seated: Vec<String> = self
                .seating
                .iter()
                .enumerate()
                .filter(|&(_, &t)| t == table)
                .map(|(g, _)| {
                    let mark = if self.informed[g] { "*" } else { "" };
                    format!("{}{mark}", self.possible_agents[g])
                })
                .collect();
            let seated = if seated.is_empty() {
                "(empty)".to_string()
            } else {
                seated.join(" ")
            };
            lines.push(format!("table {table}: {seated}"));
        }
        Some(lines.join("\n"))
    }
}
