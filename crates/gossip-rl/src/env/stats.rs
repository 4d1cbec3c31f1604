//! Per-agent episode statistics.

use super::traits::{AgentId, AgentMap, EnvInfo, EnvMetadata, ParallelEnv, ParallelStepResult};
use crate::spaces::DynSpace;
use crate::Result;
use ndarray::ArrayD;

/// Wrapper that tracks episode statistics (return and length) for every agent.
///
/// Adds `episode_return` and `episode_length` to an agent's info on the step
/// where that agent terminates or truncates.
pub struct EpisodeStats<E: ParallelEnv> {
    env: E,
    returns: AgentMap<f32>,
    lengths: AgentMap<u32>,
}

impl<E: ParallelEnv> EpisodeStats<E> {
    /// Wrap an environment with episode statistics tracking
    pub fn new(env: E) -> Self {
        Self {
            env,
            returns: AgentMap::new(),
            lengths: AgentMap::new(),
        }
    }

    /// Get a reference to the inner environment
    pub fn inner(&self) -> &E {
        &self.env
    }
}

impl<E: ParallelEnv> ParallelEnv for EpisodeStats<E> {
    fn metadata(&self) -> &EnvMetadata {
        self.env.metadata()
    }

    fn possible_agents(&self) -> &[AgentId] {
        self.env.possible_agents()
    }

    fn agents(&self) -> &[AgentId] {
        self.env.agents()
    }

    fn observation_space(&self, agent: &str) -> DynSpace {
        self.env.observation_space(agent)
    }

    fn action_space(&self, agent: &str) -> DynSpace {
        self.env.action_space(agent)
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<(AgentMap<ArrayD<f32>>, AgentMap<EnvInfo>)> {
        self.returns.clear();
        self.lengths.clear();
        self.env.reset(seed)
    }

    fn step(&mut self, actions: &AgentMap<ArrayD<f32>>) -> Result<ParallelStepResult> {
        let mut result = self.env.step(actions)?;

        for (agent, reward) in &result.rewards {
            *self.returns.entry(agent.clone()).or_insert(0.0) += reward;
            *self.lengths.entry(agent.clone()).or_insert(0) += 1;
        }

        let finished: Vec<AgentId> = result
            .rewards
            .keys()
            .filter(|a| result.done(a))
            .cloned()
            .collect();
        for agent in finished {
            let ret = self.returns.remove(&agent).unwrap_or(0.0);
            let len = self.lengths.remove(&agent).unwrap_or(0);
            let info = result.infos.remove(&agent).unwrap_or_default();
            result
                .infos
                .insert(agent, info.with_episode_stats(ret, len));
        }

        Ok(result)
    }

    fn render(&self) -> Option<String> {
        self.env.render()
    }

    fn close(&mut self) {
        self.env.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::testing::LineEnv;
    use ndarray::IxDyn;

    #[test]
    fn test_episode_stats() {
        let mut wrapped = EpisodeStats::new(LineEnv::new(2, 5));
        wrapped.reset(None).unwrap();

        let actions: AgentMap<ArrayD<f32>> = wrapped
            .agents()
            .iter()
            .map(|a| (a.clone(), ArrayD::zeros(IxDyn(&[1]))))
            .collect();

        for _ in 0..4 {
            let result = wrapped.step(&actions).unwrap();
            assert!(!result.done("agent_0"));
            assert!(result.infos["agent_0"].get("episode_return").is_none());
        }

        // 5th step should terminate
        let result = wrapped.step(&actions).unwrap();
        assert!(result.done("agent_1"));
        assert_eq!(result.infos["agent_1"].get("episode_return"), Some(5.0));
        assert_eq!(result.infos["agent_1"].get("episode_length"), Some(5.0));
    }
}
