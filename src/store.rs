//! Persistence of the run output.
//!
//! The previous output doubles as the cache for the next run. Reading is
//! forgiving (anything unreadable is an empty cache); writing replaces the
//! whole file through a sibling temp file.

use crate::error::Result;
use crate::record::{PublicationRecord, RunOutput};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Only the part of a previous output the cache needs.
#[derive(Debug, Deserialize)]
struct CachedOutput {
    #[serde(default)]
    publications: Vec<PublicationRecord>,
}

/// Reads and writes the output file at a fixed path
#[derive(Debug, Clone)]
pub struct OutputStore {
    path: PathBuf,
}

impl OutputStore {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the output file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a previous output exists on disk
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Load records of the previous run.
    ///
    /// Returns empty vec if the file doesn't exist, can't be read, or is malformed
    pub fn load(&self) -> Vec<PublicationRecord> {
        if !self.exists() {
            debug!("Output file not found: {:?}", self.path);
            return Vec::new();
        }

        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<CachedOutput>(&content) {
                Ok(cached) => {
                    info!(
                        "Loaded {} cached publications from {:?}",
                        cached.publications.len(),
                        self.path
                    );
                    cached.publications
                }
                Err(e) => {
                    warn!("Failed to parse existing output, ignoring cache: {}", e);
                    Vec::new()
                }
            },
            Err(e) => {
                warn!("Failed to read existing output, ignoring cache: {}", e);
                Vec::new()
            }
        }
    }

    /// Replace the output file with `output`.
    pub fn save(&self, output: &RunOutput) -> Result<()> {
        let mut content = serde_json::to_string_pretty(output)?;
        content.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = self.temp_path();
        std::fs::write(&tmp, content)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!(
            "Saved {} publications to {:?}",
            output.total_publications, self.path
        );
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Current UTC time as ISO-8601 with a `Z` suffix.
pub fn utc_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
