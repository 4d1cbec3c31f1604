//! Observation and action space types.
//!
//! Gymnasium-style space definitions shared by every agent of an environment.

mod r#box;
mod discrete;

pub use discrete::Discrete;
pub use r#box::Box;

use ndarray::{ArrayD, IxDyn};
use rand::Rng;

/// Trait for observation and action spaces
pub trait Space: Clone + Send + Sync {
    /// The type of samples from this space
    type Sample;

    /// Sample a random element from this space
    fn sample<R: Rng>(&self, rng: &mut R) -> Self::Sample;

    /// Check if a value is contained in this space
    fn contains(&self, value: &Self::Sample) -> bool;

    /// Get the shape of samples from this space
    fn shape(&self) -> &[usize];

    /// Get the total number of elements in a sample
    fn num_elements(&self) -> usize {
        self.shape().iter().product()
    }
}

/// Enum for dynamic space types
#[derive(Clone, Debug, PartialEq)]
pub enum DynSpace {
    Discrete(Discrete),
    Box(Box),
}

impl DynSpace {
    /// Get the shape of this space
    pub fn shape(&self) -> Vec<usize> {
        match self {
            DynSpace::Discrete(s) => s.shape().to_vec(),
            DynSpace::Box(s) => s.shape().to_vec(),
        }
    }

    /// Number of scalars in a flattened sample
    pub fn flat_size(&self) -> usize {
        match self {
            DynSpace::Discrete(s) => s.num_elements(),
            DynSpace::Box(s) => s.num_elements(),
        }
    }

    /// Number of choices for a discrete space, `None` otherwise
    pub fn num_actions(&self) -> Option<usize> {
        match self {
            DynSpace::Discrete(s) => Some(s.n),
            DynSpace::Box(_) => None,
        }
    }

    /// Sample from this space
    pub fn sample<R: Rng>(&self, rng: &mut R) -> ArrayD<f32> {
        match self {
            DynSpace::Discrete(s) => ArrayD::from_elem(IxDyn(&[1]), s.sample(rng) as f32),
            DynSpace::Box(s) => s.sample(rng),
        }
    }

    /// Check if this space contains the value
    pub fn contains(&self, value: &ArrayD<f32>) -> bool {
        match self {
            DynSpace::Discrete(s) => match value.iter().next() {
                Some(&v) if value.len() == 1 => s.decode(v).is_some(),
                _ => false,
            },
            DynSpace::Box(s) => s.contains(value),
        }
    }
}
