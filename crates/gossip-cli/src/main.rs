//! gossip CLI
//!
//! Trains a shared policy on the wedding gossip environment and evaluates
//! it. Without a sub-command it runs the full script: several training
//! rounds, then one rendered evaluation game.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use gossip_envs::{WeddingGossip, WeddingGossipConfig, NAME};
use gossip_rl::prelude::*;
use gossip_rl::GossipError;

mod config;

use config::RunConfig;

#[derive(Parser)]
#[command(name = "gossip")]
#[command(version, about = "Train and evaluate a wedding gossip policy", long_about = None)]
struct Cli {
    /// JSON file overriding the default run configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding policy artifacts
    #[arg(long, global = true)]
    checkpoint_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train for the configured rounds, then evaluate (the default)
    Run,

    /// Run training rounds only
    Train {
        /// Number of rounds
        #[arg(long)]
        rounds: Option<u32>,

        /// Environment steps per round
        #[arg(long)]
        steps: Option<u64>,

        /// Seed for the first environment reset
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Evaluate the newest artifact
    Eval {
        /// Number of games
        #[arg(long)]
        games: Option<u64>,

        /// Print every frame and action, even if the config turns it off
        #[arg(long)]
        render: bool,
    },

    /// Show the rounds recorded in the run manifest
    History,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = RunConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.checkpoint_dir {
        config.train.checkpoint_dir = dir.clone();
        config.eval.checkpoint_dir = dir;
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            train_rounds(&config)?;
            eval(&config)?;
        }
        Commands::Train {
            rounds,
            steps,
            seed,
        } => {
            if let Some(rounds) = rounds {
                config.learn_rounds = rounds;
            }
            if let Some(steps) = steps {
                config.train.steps = steps;
            }
            if seed.is_some() {
                config.train.seed = seed;
            }
            train_rounds(&config)?;
        }
        Commands::Eval { games, render } => {
            if let Some(games) = games {
                config.eval.num_games = games;
            }
            if render {
                config.eval.render_mode = Some(RenderMode::Human);
            }
            eval(&config)?;
        }
        Commands::History => history(&config.train.checkpoint_dir)?,
    }

    Ok(())
}

fn train_rounds(config: &RunConfig) -> Result<()> {
    let env_config = WeddingGossipConfig {
        render_mode: None,
        ..config.env.clone()
    };
    for round in 0..config.learn_rounds {
        tracing::info!(round = round + 1, of = config.learn_rounds, "Training round");
        let outcome = train::<_, _, PpoTrainer>(
            || Ok(WeddingGossip::new(env_config.clone())),
            &config.train,
            &config.ppo,
        )?;
        tracing::info!(
            artifact = %outcome.artifact.display(),
            timesteps = outcome.summary.timesteps,
            mean_episode_reward = ?outcome.summary.mean_episode_reward,
            "Round complete"
        );
    }
    Ok(())
}

fn eval(config: &RunConfig) -> Result<()> {
    let result = evaluate::<_, _, PpoTrainer>(
        |render_mode| {
            Ok(WeddingGossip::new(
                config.env.clone().with_render_mode(render_mode),
            ))
        },
        &config.eval,
    );
    match result {
        Ok(_) => Ok(()),
        Err(GossipError::PolicyNotFound { pattern }) => {
            tracing::debug!(%pattern, "No artifact to evaluate");
            println!("Policy not found.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn history(dir: &Path) -> Result<()> {
    let manifest = RunManifest::load_or_default(dir, NAME)?;
    if manifest.entries().is_empty() {
        println!("No training rounds recorded in {}", dir.display());
        return Ok(());
    }
    for entry in manifest.entries() {
        let origin = entry.resumed_from.as_deref().unwrap_or("fresh");
        println!(
            "round {}: {} ({} steps, from {}) at {}",
            entry.round, entry.artifact, entry.timesteps, origin, entry.completed_at
        );
    }
    Ok(())
}
