//! Categorical action distribution over a batch of logits.

use ndarray::{Array1, Array2, Axis};
use rand::Rng;

/// One categorical distribution per row of `logits`.
///
/// Stores normalized log-probabilities, computed with the max-shift trick so
/// large logits do not overflow.
#[derive(Clone, Debug)]
pub struct Categorical {
    log_probs: Array2<f32>,
}

impl Categorical {
    pub fn from_logits(logits: &Array2<f32>) -> Self {
        let mut log_probs = logits.clone();
        for mut row in log_probs.axis_iter_mut(Axis(0)) {
            let max = row.fold(f32::NEG_INFINITY, |m, &x| m.max(x));
            let log_sum = row.iter().map(|&x| (x - max).exp()).sum::<f32>().ln() + max;
            row.mapv_inplace(|x| x - log_sum);
        }
        Self { log_probs }
    }

    /// Number of categories
    pub fn num_actions(&self) -> usize {
        self.log_probs.ncols()
    }

    pub fn log_probs(&self) -> &Array2<f32> {
        &self.log_probs
    }

    pub fn probs(&self) -> Array2<f32> {
        self.log_probs.mapv(f32::exp)
    }

    /// Log-probability of `actions[i]` under row `i`
    pub fn log_prob(&self, actions: &[usize]) -> Array1<f32> {
        actions
            .iter()
            .enumerate()
            .map(|(i, &a)| self.log_probs[[i, a]])
            .collect()
    }

    /// Entropy of every row
    pub fn entropy(&self) -> Array1<f32> {
        self.log_probs
            .axis_iter(Axis(0))
            .map(|row| -row.iter().map(|&lp| lp.exp() * lp).sum::<f32>())
            .collect()
    }

    /// Draw one action per row
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<usize> {
        self.log_probs
            .axis_iter(Axis(0))
            .map(|row| {
                let u: f32 = rng.gen();
                let mut acc = 0.0;
                for (k, &lp) in row.iter().enumerate() {
                    acc += lp.exp();
                    if u < acc {
                        return k;
                    }
                }
                // rounding left the cumulative sum just below u
                row.len() - 1
            })
            .collect()
    }

    /// Most likely action per row
    pub fn mode(&self) -> Vec<usize> {
        self.log_probs
            .axis_iter(Axis(0))
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |best, (k, &lp)| {
                        if lp > best.1 {
                            (k, lp)
                        } else {
                            best
                        }
                    })
                    .0
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_normalized() {
        let dist = Categorical::from_logits(&array![[1.0, 2.0, 3.0], [1000.0, 0.0, -1000.0]]);
        for row in dist.probs().axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-5);
        }
        assert_eq!(dist.mode(), vec![2, 0]);
    }

    #[test]
    fn test_uniform_entropy() {
        let dist = Categorical::from_logits(&Array2::zeros((2, 4)));
        for h in dist.entropy() {
            assert!((h - 4f32.ln()).abs() < 1e-5);
        }
        let lp = dist.log_prob(&[0, 3]);
        assert!((lp[1] + 4f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_sampling_follows_probabilities() {
        let dist = Categorical::from_logits(&array![[0.0, 3f32.ln()]]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let ones = (0..4000)
            .map(|_| dist.sample(&mut rng)[0])
            .filter(|&a| a == 1)
            .count();
        // p(1) = 0.75
        assert!((2800..3200).contains(&ones), "{ones}");
    }
}
