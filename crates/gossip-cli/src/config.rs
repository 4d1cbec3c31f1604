//! Run configuration: every knob of the fixed train-then-evaluate script.

use anyhow::{Context, Result};
use gossip_envs::WeddingGossipConfig;
use gossip_rl::prelude::{EvalOptions, PpoConfig, RenderMode, TrainOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Training rounds before the final evaluation
    pub learn_rounds: u32,
    pub train: TrainOptions,
    pub eval: EvalOptions,
    pub ppo: PpoConfig,
    pub env: WeddingGossipConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            learn_rounds: 5,
            train: TrainOptions::default(),
            eval: EvalOptions::default()
                .with_games(1)
                .with_render_mode(Some(RenderMode::Human)),
            ppo: PpoConfig::default(),
            env: WeddingGossipConfig::default(),
        }
    }
}

impl RunConfig {
    /// Defaults, overridden by whatever the JSON file at `path` sets.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded run config");
        Ok(config)
    }
}
