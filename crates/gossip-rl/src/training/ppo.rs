//! PPO algorithm utilities.

use ndarray::{Array1, Array2};

/// Compute Generalized Advantage Estimation (GAE)
///
/// # Arguments
/// * `rewards` - rewards [T, N]
/// * `values` - value estimates [T, N]
/// * `dones` - 1.0 where the step ended the slot's episode [T, N]
/// * `last_values` - value estimate of the observation after the last step [N]
/// * `gamma` - Discount factor
/// * `gae_lambda` - GAE lambda
///
/// # Returns
/// Advantages [T, N]
pub fn compute_gae(
    rewards: &Array2<f32>,
    values: &Array2<f32>,
    dones: &Array2<f32>,
    last_values: &Array1<f32>,
    gamma: f32,
    gae_lambda: f32,
) -> Array2<f32> {
    let (steps, num_envs) = rewards.dim();
    let mut advantages = Array2::zeros((steps, num_envs));
    let mut last_gae = Array1::<f32>::zeros(num_envs);

    for t in (0..steps).rev() {
        for n in 0..num_envs {
            let next_value = if t + 1 == steps {
                last_values[n]
            } else {
                values[[t + 1, n]]
            };
            let not_done = 1.0 - dones[[t, n]];
            let delta = rewards[[t, n]] + gamma * next_value * not_done - values[[t, n]];
            last_gae[n] = delta + gamma * gae_lambda * not_done * last_gae[n];
            advantages[[t, n]] = last_gae[n];
        }
    }

    advantages
}

/// Clipped surrogate objective for one sample.
///
/// Returns the loss `-min(r·A, clip(r)·A)` and its derivative with respect
/// to the new log-probability.
pub fn clipped_surrogate(ratio: f32, advantage: f32, clip_range: f32) -> (f32, f32) {
    let unclipped = ratio * advantage;
    let clipped = ratio.clamp(1.0 - clip_range, 1.0 + clip_range) * advantage;
    if unclipped <= clipped {
        // d(ratio)/d(log_prob) = ratio
        (-unclipped, -advantage * ratio)
    } else {
        (-clipped, 0.0)
    }
}
