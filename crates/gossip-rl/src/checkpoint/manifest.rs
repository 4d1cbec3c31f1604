//! Ledger of completed training rounds.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One completed training round.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ManifestEntry {
    /// Monotonic round counter, starting at 1
    pub round: u64,
    /// File name of the artifact the round wrote
    pub artifact: String,
    /// File name of the artifact the round resumed from
    pub resumed_from: Option<String>,
    /// Environment steps requested for the round
    pub timesteps: u64,
    pub completed_at: String,
}

/// Append-only record of the rounds trained for one environment.
///
/// Stored as `.<env-name>.manifest.json` next to the artifacts. The leading
/// dot keeps it out of artifact discovery.
#[derive(Debug)]
pub struct RunManifest {
    path: PathBuf,
    env_name: String,
    entries: Vec<ManifestEntry>,
}

#[derive(Serialize, Deserialize)]
struct ManifestFile {
    env_name: String,
    entries: Vec<ManifestEntry>,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl RunManifest {
    /// Location of the manifest for `env_name` in `dir`
    pub fn path_for(dir: &Path, env_name: &str) -> PathBuf {
        dir.join(format!(".{env_name}.manifest.json"))
    }

    /// Read the manifest, or start an empty one if none exists yet.
    ///
    /// An unreadable manifest is replaced rather than failing the round;
    /// the artifacts themselves stay authoritative.
    pub fn load_or_default(dir: &Path, env_name: &str) -> Result<Self> {
        let path = Self::path_for(dir, env_name);
        let entries = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<ManifestFile>(&text) {
                Ok(file) => file.entries,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Run manifest is corrupt, starting a new one"
                    );
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            env_name: env_name.to_string(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Round number the next recorded entry receives
    pub fn next_round(&self) -> u64 {
        self.entries.last().map_or(1, |e| e.round + 1)
    }

    /// Append a round. Call [`RunManifest::save`] to persist it.
    pub fn record(
        &mut self,
        artifact: &Path,
        resumed_from: Option<&Path>,
        timesteps: u64,
    ) -> &ManifestEntry {
        let entry = ManifestEntry {
            round: self.next_round(),
            artifact: file_name(artifact),
            resumed_from: resumed_from.map(file_name),
            timesteps,
            completed_at: chrono::Local::now().to_rfc3339(),
        };
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn save(&self) -> Result<()> {
        let file = ManifestFile {
            env_name: self.env_name.clone(),
            entries: self.entries.clone(),
        };

        // write beside the target, then swap it in
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&file)?)?;
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), rounds = self.entries.len(), "Saved run manifest");
        Ok(())
    }
}
