//! Driver options.

use crate::env::RenderMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Options for one training round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainOptions {
    /// Minimum environment steps, counted per vector slot
    pub steps: u64,
    /// Seed for the first environment's reset
    pub seed: Option<u64>,
    /// Environment copies stepped together
    pub num_copies: usize,
    /// Worker threads stepping the copies
    pub num_workers: usize,
    /// Where artifacts are found and written
    pub checkpoint_dir: PathBuf,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            steps: 196_608,
            seed: Some(0),
            num_copies: 8,
            num_workers: 2,
            checkpoint_dir: PathBuf::from("."),
        }
    }
}

impl TrainOptions {
    pub fn with_steps(mut self, steps: u64) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_copies(mut self, num_copies: usize) -> Self {
        self.num_copies = num_copies;
        self
    }

    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = dir.into();
        self
    }
}

/// How evaluation turns rewards into per-agent totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardTally {
    /// At every turn, add the latest step reward of every listed agent.
    /// A reward still visible on several turns is counted on each of them.
    #[default]
    EveryTurn,
    /// At every turn, add only the acting agent's reward accumulated since
    /// it last acted.
    ActingAgent,
}

/// Options for one evaluation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalOptions {
    /// Games played; game `i` is reset with seed `i`
    pub num_games: u64,
    /// Passed to the environment factory; actions are echoed when set
    pub render_mode: Option<RenderMode>,
    /// Where the newest artifact is looked up
    pub checkpoint_dir: PathBuf,
    pub tally: RewardTally,
    /// Greedy actions instead of sampled ones
    pub deterministic: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            num_games: 100,
            render_mode: None,
            checkpoint_dir: PathBuf::from("."),
            tally: RewardTally::EveryTurn,
            deterministic: false,
        }
    }
}

impl EvalOptions {
    pub fn with_games(mut self, num_games: u64) -> Self {
        self.num_games = num_games;
        self
    }

    pub fn with_render_mode(mut self, render_mode: Option<RenderMode>) -> Self {
        self.render_mode = render_mode;
        self
    }

    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = dir.into();
        self
    }

    pub fn with_tally(mut self, tally: RewardTally) -> Self {
        self.tally = tally;
        self
    }

    pub fn with_deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }
}
