//! Concatenation of several backends stepped on a worker pool.

use super::vecenv::{VecEnvBackend, VecEnvResult};
use crate::env::EnvInfo;
use crate::spaces::DynSpace;
use crate::{GossipError, Result};
use ndarray::{concatenate, s, Array2, ArrayView2, Axis};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Stacks the slots of several copies of a backend into one backend.
///
/// Copy `i` owns rows `offsets[i]..offsets[i + 1]`. With more than one worker
/// the copies are reset and stepped concurrently on a dedicated rayon pool.
pub struct ConcatVecEnv<B: VecEnvBackend> {
    copies: Vec<B>,
    offsets: Vec<usize>,
    obs_space: DynSpace,
    action_space: DynSpace,
    pool: Option<ThreadPool>,
    num_workers: usize,
    closed: bool,
}

impl<B: VecEnvBackend> ConcatVecEnv<B> {
    /// Concatenate `copies`, running them on `num_workers` threads.
    ///
    /// Every copy must expose the same observation and action space.
    pub fn new(mut copies: Vec<B>, num_workers: usize) -> Result<Self> {
        if let Err(e) = check_copies(&copies) {
            copies.iter_mut().for_each(|c| c.close());
            return Err(e);
        }
        let obs_space = copies[0].observation_space();
        let action_space = copies[0].action_space();

        let mut offsets = Vec::with_capacity(copies.len() + 1);
        offsets.push(0);
        for copy in &copies {
            let last = offsets[offsets.len() - 1];
            offsets.push(last + copy.num_envs());
        }

        let pool = if num_workers > 1 {
            let built = ThreadPoolBuilder::new()
                .num_threads(num_workers)
                .thread_name(|i| format!("vec-worker-{i}"))
                .build();
            match built {
                Ok(pool) => Some(pool),
                Err(e) => {
                    copies.iter_mut().for_each(|c| c.close());
                    return Err(GossipError::EnvError(format!(
                        "failed to start worker pool: {e}"
                    )));
                }
            }
        } else {
            None
        };

        tracing::debug!(
            copies = copies.len(),
            slots = offsets[copies.len()],
            num_workers,
            "concatenated vector env"
        );

        Ok(Self {
            copies,
            offsets,
            obs_space,
            action_space,
            pool,
            num_workers,
            closed: false,
        })
    }

    /// Number of wrapped copies
    pub fn num_copies(&self) -> usize {
        self.copies.len()
    }

    /// Worker threads requested at construction
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Run `f` over every copy, on the pool when there is one.
    fn map_copies<T, F>(&mut self, f: F) -> Vec<Result<T>>
    where
        T: Send,
        F: Fn(usize, &mut B) -> Result<T> + Send + Sync,
    {
        let copies = &mut self.copies;
        match &self.pool {
            Some(pool) => pool.install(|| {
                copies
                    .par_iter_mut()
                    .enumerate()
                    .map(|(i, copy)| f(i, copy))
                    .collect()
            }),
            None => copies
                .iter_mut()
                .enumerate()
                .map(|(i, copy)| f(i, copy))
                .collect(),
        }
    }
}

fn check_copies<B: VecEnvBackend>(copies: &[B]) -> Result<()> {
    let first = copies
        .first()
        .ok_or_else(|| GossipError::EnvError("no environment copies to concatenate".into()))?;
    let obs_space = first.observation_space();
    let action_space = first.action_space();
    for (i, copy) in copies.iter().enumerate().skip(1) {
        if copy.observation_space() != obs_space || copy.action_space() != action_space {
            return Err(GossipError::IncompatibleSpaces(format!(
                "copy {i} does not share the spaces of copy 0"
            )));
        }
    }
    Ok(())
}

fn stack_rows(parts: &[Array2<f32>]) -> Result<Array2<f32>> {
    let views: Vec<ArrayView2<f32>> = parts.iter().map(|p| p.view()).collect();
    concatenate(Axis(0), &views).map_err(|e| GossipError::EnvError(e.to_string()))
}

impl<B: VecEnvBackend> VecEnvBackend for ConcatVecEnv<B> {
    fn observation_space(&self) -> DynSpace {
        self.obs_space.clone()
    }

    fn action_space(&self) -> DynSpace {
        self.action_space.clone()
    }

    fn num_envs(&self) -> usize {
        self.offsets[self.copies.len()]
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<(Array2<f32>, Vec<EnvInfo>)> {
        let results =
            self.map_copies(|i, copy| copy.reset(seed.map(|s| s.wrapping_add(i as u64))));

        let mut observations = Vec::with_capacity(results.len());
        let mut infos = Vec::with_capacity(self.num_envs());
        for result in results {
            let (obs, copy_infos) = result?;
            observations.push(obs);
            infos.extend(copy_infos);
        }
        Ok((stack_rows(&observations)?, infos))
    }

    fn step(&mut self, actions: &Array2<f32>) -> Result<VecEnvResult> {
        let num_envs = self.num_envs();
        if actions.nrows() != num_envs {
            return Err(GossipError::ShapeMismatch {
                expected: vec![num_envs],
                actual: vec![actions.nrows()],
            });
        }

        let offsets = self.offsets.clone();
        let results = self.map_copies(|i, copy| {
            let rows = actions.slice(s![offsets[i]..offsets[i + 1], ..]).to_owned();
            copy.step(&rows)
        });

        let mut observations = Vec::with_capacity(results.len());
        let mut rewards = Vec::with_capacity(num_envs);
        let mut terminated = Vec::with_capacity(num_envs);
        let mut truncated = Vec::with_capacity(num_envs);
        let mut infos = Vec::with_capacity(num_envs);
        for result in results {
            let part = result?;
            observations.push(part.observations);
            rewards.extend(part.rewards);
            terminated.extend(part.terminated);
            truncated.extend(part.truncated);
            infos.extend(part.infos);
        }

        Ok(VecEnvResult {
            observations: stack_rows(&observations)?,
            rewards,
            terminated,
            truncated,
            infos,
        })
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for copy in &mut self.copies {
            copy.close();
        }
        self.pool = None;
    }
}

impl<B: VecEnvBackend> Drop for ConcatVecEnv<B> {
    fn drop(&mut self) {
        self.close();
    }
}
