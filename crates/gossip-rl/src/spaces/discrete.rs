//! Finite action choices.

use super::Space;
use rand::Rng;

/// One of `n` numbered choices, `0..n`.
///
/// Actions travel through the vector envs as a single `f32`, so the space
/// also knows how to turn that value back into a choice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Discrete {
    pub n: usize,
}

impl Discrete {
    /// Panics when `n` is zero; an action space needs at least one choice.
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "an action space needs at least one choice");
        Self { n }
    }

    /// The choice encoded by `value`, if it is a whole number below `n`
    pub fn decode(&self, value: f32) -> Option<usize> {
        if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
            let index = value as usize;
            (index < self.n).then_some(index)
        } else {
            None
        }
    }
}

impl Space for Discrete {
    type Sample = usize;

    fn sample<R: Rng>(&self, rng: &mut R) -> usize {
        rng.gen_range(0..self.n)
    }

    fn contains(&self, value: &usize) -> bool {
        *value < self.n
    }

    fn shape(&self) -> &[usize] {
        &[1]
    }
}
