//! Policy artifacts on disk.
//!
//! Provides:
//! - `CheckpointSelector` for locating the newest artifact of an environment
//! - `PolicyArtifact` for the versioned envelope every trainer writes
//! - `RunManifest` for the ledger of completed training rounds

mod manifest;
mod selector;
mod state;

pub use manifest::{ManifestEntry, RunManifest};
pub use selector::{Candidate, CheckpointSelector, ARTIFACT_EXTENSION};
pub use state::{PolicyArtifact, ARTIFACT_FORMAT_VERSION};
