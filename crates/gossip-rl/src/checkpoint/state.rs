//! Versioned envelope around a trainer's saved state.

use crate::{GossipError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Version of the envelope layout written by this crate.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// A policy artifact as stored on disk.
///
/// The envelope is shared by every trainer; `state` is whatever the trainer
/// needs to resume (weights, optimizer moments, counters).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PolicyArtifact<S> {
    /// Envelope layout version
    pub format_version: u32,
    /// Name of the algorithm that produced `state`
    pub algorithm: String,
    /// RFC 3339 creation time
    pub created_at: String,
    /// Library version that wrote the artifact
    pub version: String,
    pub state: S,
}

impl<S> PolicyArtifact<S> {
    pub fn new(algorithm: impl Into<String>, state: S) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            algorithm: algorithm.into(),
            created_at: chrono::Local::now().to_rfc3339(),
            version: crate::VERSION.to_string(),
            state,
        }
    }
}

impl<S: Serialize> PolicyArtifact<S> {
    /// Write the artifact as JSON. Fails if `path` already exists.
    ///
    /// The JSON goes to a hidden `.<name>.tmp` sibling first and is linked
    /// into place only once complete, so `path` never holds a partial file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = staging_path(path);
        let written = self
            .write_to(&tmp)
            .and_then(|()| fs::hard_link(&tmp, path).map_err(Into::into));
        // staging file is never kept, linked or not
        let _ = fs::remove_file(&tmp);
        written?;
        tracing::info!(path = %path.display(), algorithm = %self.algorithm, "Saved artifact");
        Ok(())
    }

    fn write_to(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

impl<S: DeserializeOwned> PolicyArtifact<S> {
    /// Read an artifact, rejecting other layouts and other algorithms.
    pub fn load(path: &Path, algorithm: &str) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let artifact: Self = serde_json::from_reader(reader).map_err(|e| {
            GossipError::IncompatibleCheckpoint {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(GossipError::IncompatibleCheckpoint {
                path: path.display().to_string(),
                reason: format!(
                    "format version {} (expected {})",
                    artifact.format_version, ARTIFACT_FORMAT_VERSION
                ),
            });
        }
        if artifact.algorithm != algorithm {
            return Err(GossipError::IncompatibleCheckpoint {
                path: path.display().to_string(),
                reason: format!("written by {} (expected {algorithm})", artifact.algorithm),
            });
        }

        tracing::info!(path = %path.display(), created_at = %artifact.created_at, "Loaded artifact");
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Weights {
        layers: Vec<f32>,
        timesteps: u64,
    }

    fn weights() -> Weights {
        Weights {
            layers: vec![0.5, -1.0],
            timesteps: 4096,
        }
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("env_1.json");

        PolicyArtifact::new("ppo", weights()).save(&path).unwrap();
        let loaded: PolicyArtifact<Weights> = PolicyArtifact::load(&path, "ppo").unwrap();

        assert_eq!(loaded.format_version, ARTIFACT_FORMAT_VERSION);
        assert_eq!(loaded.state, weights());
    }

    #[test]
    fn test_save_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("env_1.json");
        PolicyArtifact::new("ppo", weights()).save(&path).unwrap();
        assert!(PolicyArtifact::new("a2c", weights()).save(&path).is_err());

        // the first artifact survives the refused write
        assert!(PolicyArtifact::<Weights>::load(&path, "ppo").is_ok());
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn test_save_leaves_only_the_artifact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("env_1.json");
        PolicyArtifact::new("ppo", weights()).save(&path).unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["env_1.json".to_string()]);
        assert_eq!(staging_path(&path), dir.path().join(".env_1.json.tmp"));
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("env_1.json");
        PolicyArtifact::new("a2c", weights()).save(&path).unwrap();

        let err = PolicyArtifact::<Weights>::load(&path, "ppo").unwrap_err();
        assert!(matches!(err, GossipError::IncompatibleCheckpoint { .. }));
    }

    #[test]
    fn test_garbage_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("env_1.json");
        std::fs::write(&path, b"{\"not\": \"an artifact\"}").unwrap();

        let err = PolicyArtifact::<Weights>::load(&path, "ppo").unwrap_err();
        assert!(matches!(err, GossipError::IncompatibleCheckpoint { .. }));
    }
}
