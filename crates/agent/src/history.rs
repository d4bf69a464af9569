//! Per-identity transcript files under a history folder.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use unison_core::{Result, Transcript};

#[derive(Debug, Clone)]
pub struct HistoryStore {
    folder: PathBuf,
}

impl HistoryStore {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// `<folder>/<identity>.json`, with path separators in the identity
    /// replaced so every agent stays inside the folder.
    pub fn path_for(&self, identity: &str) -> PathBuf {
        let file: String = identity
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        self.folder.join(format!("{file}.json"))
    }

    /// Load an agent's transcript, creating an empty file when there is
    /// none yet. Unreadable JSON is logged and treated as an empty history.
    pub fn load(&self, identity: &str) -> Result<Transcript> {
        let path = self.path_for(identity);
        if !path.exists() {
            fs::create_dir_all(&self.folder)?;
            fs::write(&path, "")?;
            return Ok(Transcript::new());
        }

        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(Transcript::new());
        }

        match serde_json::from_str(&content) {
            Ok(transcript) => Ok(transcript),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not load history");
                Ok(Transcript::new())
            }
        }
    }

    pub fn save(&self, identity: &str, transcript: &Transcript) -> Result<()> {
        fs::create_dir_all(&self.folder)?;
        let json = serde_json::to_string_pretty(transcript)?;
        fs::write(self.path_for(identity), json)?;
        Ok(())
    }
}
