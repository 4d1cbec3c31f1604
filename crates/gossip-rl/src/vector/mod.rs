//! Vectorized environment backends.
//!
//! - `MarkovVecEnv` - one slot per agent of a single parallel environment
//! - `ConcatVecEnv` - several backends stacked and stepped on a worker pool

mod concat;
mod markov;
mod vecenv;

pub use concat::ConcatVecEnv;
pub use markov::MarkovVecEnv;
pub use vecenv::{VecEnvBackend, VecEnvResult};
