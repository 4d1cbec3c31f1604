//! Artifact discovery by name prefix and modification time.

use crate::Result;
use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// File extension of every policy artifact.
pub const ARTIFACT_EXTENSION: &str = "json";

/// An artifact file found in the checkpoint directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Finds the artifacts of one environment in one directory.
///
/// An artifact matches when its file name starts with the environment name
/// and ends with `.json`. The current artifact is the most recently
/// modified match; on equal modification times the greatest file stem wins,
/// so a `-1` collision suffix ranks above the unsuffixed name.
///
/// # Example
///
/// ```ignore
/// let selector = CheckpointSelector::new(".", "wedding_gossip_v2");
/// match selector.latest()? {
///     Some(path) => println!("resuming from {}", path.display()),
///     None => println!("no artifact matching {}", selector.pattern()),
/// }
/// ```
#[derive(Clone, Debug)]
pub struct CheckpointSelector {
    dir: PathBuf,
    prefix: String,
}

impl CheckpointSelector {
    pub fn new(dir: impl Into<PathBuf>, env_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: env_name.into(),
        }
    }

    /// Directory searched for artifacts
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Glob-style description of the matched files, used in messages
    pub fn pattern(&self) -> String {
        self.dir
            .join(format!("{}*.{}", self.prefix, ARTIFACT_EXTENSION))
            .display()
            .to_string()
    }

    fn matches(&self, name: &str) -> bool {
        name.starts_with(&self.prefix)
            && Path::new(name)
                .extension()
                .map_or(false, |ext| ext == ARTIFACT_EXTENSION)
    }

    /// Every matching regular file, unordered.
    ///
    /// A missing directory yields no candidates.
    pub fn candidates(&self) -> Result<Vec<Candidate>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !self.matches(name) {
                continue;
            }
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            found.push(Candidate {
                path: entry.path(),
                modified: meta.modified()?,
            });
        }
        Ok(found)
    }

    /// The most recently modified artifact, if any.
    pub fn latest(&self) -> Result<Option<PathBuf>> {
        let latest = self
            .candidates()?
            .into_iter()
            .max_by(|a, b| {
                a.modified
                    .cmp(&b.modified)
                    .then_with(|| a.path.file_stem().cmp(&b.path.file_stem()))
            })
            .map(|c| c.path);

        match &latest {
            Some(path) => tracing::debug!(path = %path.display(), "selected artifact"),
            None => tracing::debug!(pattern = %self.pattern(), "no artifact found"),
        }
        Ok(latest)
    }

    /// Path for a new artifact stamped with `now`.
    ///
    /// A `-1`, `-2`, ... suffix is added while the stamped name is taken, so
    /// two rounds finishing within the same second never overwrite each other.
    pub fn next_artifact_path(&self, now: NaiveDateTime) -> PathBuf {
        let stem = format!("{}_{}", self.prefix, now.format("%Y%m%d-%H%M%S"));
        let mut path = self.dir.join(format!("{stem}.{ARTIFACT_EXTENSION}"));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{stem}-{n}.{ARTIFACT_EXTENSION}"));
            n += 1;
        }
        path
    }
}
