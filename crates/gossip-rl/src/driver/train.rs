//! One training round.

use super::options::TrainOptions;
use crate::checkpoint::{CheckpointSelector, RunManifest};
use crate::env::{EpisodeStats, ParallelEnv};
use crate::policy::PolicyTrainer;
use crate::training::TrainSummary;
use crate::vector::{ConcatVecEnv, MarkovVecEnv, VecEnvBackend};
use crate::{GossipError, Result};
use std::fs;
use std::path::PathBuf;

/// Result of a training round.
#[derive(Clone, Debug)]
pub struct TrainOutcome {
    /// Artifact written by this round
    pub artifact: PathBuf,
    /// Artifact the trainer was resumed from, `None` for a fresh trainer
    pub resumed_from: Option<PathBuf>,
    /// Round number recorded in the run manifest
    pub round: u64,
    pub summary: TrainSummary,
}

fn vectorize<E: ParallelEnv>(env: E) -> Result<MarkovVecEnv<EpisodeStats<E>>> {
    MarkovVecEnv::new(EpisodeStats::new(env))
}

/// Train one round and save a new artifact.
///
/// The newest artifact in `options.checkpoint_dir` whose name starts with
/// the environment's name is resumed; without one a fresh trainer is built
/// from `config`. Every environment created here is closed before
/// returning, on success and on error.
pub fn train<E, F, T>(make_env: F, options: &TrainOptions, config: &T::Config) -> Result<TrainOutcome>
where
    E: ParallelEnv,
    F: Fn() -> Result<E>,
    T: PolicyTrainer,
{
    if options.num_copies == 0 {
        return Err(GossipError::EnvError("num_copies must be at least 1".into()));
    }

    let mut first = vectorize(make_env()?)?;
    first.reset(options.seed)?;
    let name = first.inner().metadata().name.clone();
    println!("Starting training on {name}.");

    let mut copies = Vec::with_capacity(options.num_copies);
    copies.push(first);
    for _ in 1..options.num_copies {
        copies.push(vectorize(make_env()?)?);
    }
    let mut envs = ConcatVecEnv::new(copies, options.num_workers)?;
    let obs_space = envs.observation_space();
    let action_space = envs.action_space();

    let selector = CheckpointSelector::new(&options.checkpoint_dir, &name);
    let resumed_from = selector.latest()?;
    let mut trainer = match &resumed_from {
        Some(path) => {
            println!("\nloading checkpoint");
            tracing::info!(path = %path.display(), "Resuming trainer");
            T::load(path, &obs_space, &action_space)?
        }
        None => {
            tracing::info!(pattern = %selector.pattern(), "No artifact found, constructing a fresh trainer");
            T::construct(config, &obs_space, &action_space)?
        }
    };

    let summary = trainer.learn(&mut envs, options.steps)?;

    fs::create_dir_all(&options.checkpoint_dir)?;
    let artifact = selector.next_artifact_path(chrono::Local::now().naive_local());
    trainer.save(&artifact)?;
    println!("Model has been saved.");

    let mut manifest = RunManifest::load_or_default(&options.checkpoint_dir, &name)?;
    let round = manifest
        .record(&artifact, resumed_from.as_deref(), summary.timesteps)
        .round;
    manifest.save()?;
    tracing::info!(round, artifact = %artifact.display(), "Recorded training round");

    println!("Finished training on {name}.");
    envs.close();

    Ok(TrainOutcome {
        artifact,
        resumed_from,
        round,
        summary,
    })
}
