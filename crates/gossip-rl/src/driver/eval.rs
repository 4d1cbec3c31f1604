//! Turn-by-turn evaluation of the newest artifact.

use super::options::{EvalOptions, RewardTally};
use crate::checkpoint::CheckpointSelector;
use crate::env::{AecEnv, AgentId, ParallelEnv, ParallelToAec, RenderMode};
use crate::policy::{Policy, PolicyTrainer};
use crate::{GossipError, Result};
use ndarray::ArrayD;
use std::fmt;

/// Reward totals gathered over an evaluation run.
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationReport {
    /// One total per possible agent, in possible-agent order
    pub totals: Vec<(AgentId, f32)>,
    /// Arithmetic mean of `totals`
    pub average_reward: f32,
    pub games: u64,
}

impl EvaluationReport {
    fn new(totals: Vec<(AgentId, f32)>, games: u64) -> Self {
        let average_reward = if totals.is_empty() {
            0.0
        } else {
            totals.iter().map(|(_, total)| total).sum::<f32>() / totals.len() as f32
        };
        Self {
            totals,
            average_reward,
            games,
        }
    }

    /// Total of one agent, `None` for an agent the environment never declared
    pub fn total(&self, agent: &str) -> Option<f32> {
        self.totals
            .iter()
            .find(|(id, _)| id == agent)
            .map(|(_, total)| *total)
    }

    /// `{agent: total, ...}` in possible-agent order
    pub fn rewards_display(&self) -> impl fmt::Display + '_ {
        RewardsDisplay(&self.totals)
    }
}

struct RewardsDisplay<'a>(&'a [(AgentId, f32)]);

impl fmt::Display for RewardsDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (agent, total)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{agent}: {total}")?;
        }
        write!(f, "}}")
    }
}

fn format_action(action: &ArrayD<f32>) -> String {
    match action.as_slice() {
        Some([value]) if value.fract() == 0.0 => format!("{}", *value as i64),
        Some(values) => format!("{values:?}"),
        None => format!("{:?}", action.iter().collect::<Vec<_>>()),
    }
}

/// Play `options.num_games` games with `policy` and tally the rewards.
///
/// Game `i` is reset with seed `i`. A game ends at the first turn whose
/// agent has terminated or truncated; rewards are tallied for that turn
/// before stopping. With a render mode set, every action is echoed as
/// `<agent> <action>`.
pub fn play_games<A, P>(env: &mut A, policy: &mut P, options: &EvalOptions) -> Result<EvaluationReport>
where
    A: AecEnv + ?Sized,
    P: Policy + ?Sized,
{
    let mut totals: Vec<(AgentId, f32)> = env
        .possible_agents()
        .iter()
        .map(|agent| (agent.clone(), 0.0))
        .collect();
    let echo = options.render_mode.is_some();

    for game in 0..options.num_games {
        env.reset(Some(game))?;

        while env.agent_selection().is_some() {
            let turn = env.last()?;

            match options.tally {
                RewardTally::EveryTurn => {
                    for agent in env.agents() {
                        let reward = env.reward(agent);
                        if let Some((_, total)) = totals.iter_mut().find(|(id, _)| *id == *agent) {
                            *total += reward;
                        }
                    }
                }
                RewardTally::ActingAgent => {
                    if let Some((_, total)) = totals.iter_mut().find(|(id, _)| *id == turn.agent) {
                        *total += turn.reward;
                    }
                }
            }

            if turn.done() {
                break;
            }

            let prediction = policy.predict(&turn.observation, options.deterministic)?;
            if echo {
                println!("{} {}", turn.agent, format_action(&prediction.action));
            }
            env.step(Some(&prediction.action))?;
        }
        tracing::debug!(game, "Finished evaluation game");
    }

    Ok(EvaluationReport::new(totals, options.num_games))
}

/// Evaluate the newest artifact for the environment built by `make_env`.
///
/// Fails with [`GossipError::PolicyNotFound`] when the checkpoint directory
/// holds no artifact for the environment; the environment is closed and no
/// policy is loaded in that case.
pub fn evaluate<E, F, T>(make_env: F, options: &EvalOptions) -> Result<EvaluationReport>
where
    E: ParallelEnv,
    F: FnOnce(Option<RenderMode>) -> Result<E>,
    T: PolicyTrainer,
{
    let mut env = ParallelToAec::new(make_env(options.render_mode)?);
    let name = env.unwrapped().metadata().name.clone();
    let render_mode = options
        .render_mode
        .map_or_else(|| "None".to_string(), |mode| mode.to_string());
    println!(
        "\nStarting evaluation on {name} (num_games={}, render_mode={render_mode})",
        options.num_games
    );

    let selector = CheckpointSelector::new(&options.checkpoint_dir, &name);
    let artifact = selector.latest()?.ok_or_else(|| GossipError::PolicyNotFound {
        pattern: selector.pattern(),
    })?;
    tracing::info!(path = %artifact.display(), "Evaluating artifact");

    let mut policy = T::load_policy(&artifact)?;
    let report = play_games(&mut env, &mut policy, options)?;
    env.close();

    println!("Rewards: {}", report.rewards_display());
    println!("Avg reward: {}", report.average_reward);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::testing::LineEnv;
    use crate::policy::Prediction;
    use ndarray::IxDyn;
    use std::sync::atomic::Ordering;

    /// Always picks action 0.
    struct Idle {
        calls: usize,
    }

    impl Policy for Idle {
        fn predict(&mut self, _obs: &ArrayD<f32>, _deterministic: bool) -> Result<Prediction> {
            self.calls += 1;
            Ok(Prediction {
                action: ArrayD::zeros(IxDyn(&[1])),
                log_prob: 0.0,
            })
        }
    }

    /// Picks an action the line env rejects.
    struct Broken;

    impl Policy for Broken {
        fn predict(&mut self, _obs: &ArrayD<f32>, _deterministic: bool) -> Result<Prediction> {
            Ok(Prediction {
                action: ArrayD::from_elem(IxDyn(&[1]), 2.0),
                log_prob: 0.0,
            })
        }
    }

    #[test]
    fn test_every_turn_tally_counts_visible_rewards_on_each_turn() {
        let mut env = ParallelToAec::new(LineEnv::new(2, 2));
        let mut policy = Idle { calls: 0 };
        let options = EvalOptions::default().with_games(3);

        let report = play_games(&mut env, &mut policy, &options).unwrap();
        // per game: both step rewards seen by agent_0's second turn, again at
        // the terminal turn
        assert_eq!(report.total("agent_0"), Some(6.0));
        assert_eq!(report.total("agent_1"), Some(6.0));
        assert_eq!(report.average_reward, 6.0);
        assert_eq!(report.games, 3);
        assert_eq!(policy.calls, 12);
    }

    #[test]
    fn test_acting_agent_tally() {
        let mut env = ParallelToAec::new(LineEnv::new(2, 2));
        let mut policy = Idle { calls: 0 };
        let options = EvalOptions::default()
            .with_games(1)
            .with_tally(RewardTally::ActingAgent);

        let report = play_games(&mut env, &mut policy, &options).unwrap();
        assert_eq!(report.total("agent_0"), Some(2.0));
        assert_eq!(report.total("agent_1"), Some(1.0));
        assert_eq!(report.average_reward, 1.5);
    }

    #[test]
    fn test_zero_games_reports_zero() {
        let mut env = ParallelToAec::new(LineEnv::new(3, 2));
        let report = play_games(&mut env, &mut Idle { calls: 0 }, &EvalOptions::default().with_games(0))
            .unwrap();
        assert_eq!(report.totals.len(), 3);
        assert_eq!(report.average_reward, 0.0);
    }

    #[test]
    fn test_error_inside_game_propagates_and_env_closes_once() {
        let inner = LineEnv::new(2, 2);
        let closes = inner.close_counter();
        {
            let mut env = ParallelToAec::new(inner);
            let result = play_games(&mut env, &mut Broken, &EvalOptions::default().with_games(1));
            assert!(matches!(result, Err(GossipError::InvalidAction(_))));
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rewards_display() {
        let report = EvaluationReport::new(vec![("a".into(), 1.5), ("b".into(), 2.0)], 1);
        assert_eq!(report.rewards_display().to_string(), "{a: 1.5, b: 2}");
        assert_eq!(report.average_reward, 1.75);
        assert_eq!(report.total("c"), None);
    }

    #[test]
    fn test_format_action() {
        assert_eq!(format_action(&ArrayD::from_elem(IxDyn(&[1]), 3.0)), "3");
        assert_eq!(format_action(&ArrayD::from_elem(IxDyn(&[2]), 0.5)), "[0.5, 0.5]");
    }
}
