//! Segments and the job manifest handed to the external renderers.
//!
//! The manifest is the contract between `select` and `assemble`: TTS and
//! screenshot tools read it and write one audio/image pair per segment
//! index.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use uuid::Uuid;

use super::content::{ContentUnit, Mode};

/// One timed audio+image slot, addressed by `index`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub index: usize,
    pub source_unit_id: String,
    pub accepted_body: String,
}

/// Everything one run needs to assemble a video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub mode: Mode,

    /// Ledger partition key (the subreddit)
    pub group: String,

    /// Spoken/displayed group label, e.g. "ask reddit part 3"
    pub label: String,

    /// Set when the units came from an explicit override
    #[serde(default)]
    pub pinned: bool,

    /// Units in selection order
    pub units: Vec<ContentUnit>,

    /// Segments in index order
    pub segments: Vec<Segment>,
}

impl Job {
    pub fn new(mode: Mode, group: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            mode,
            group: group.into(),
            label: label.into(),
            pinned: false,
            units: Vec::new(),
            segments: Vec::new(),
        }
    }

    pub fn pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    pub fn with_units(mut self, units: Vec<ContentUnit>) -> Self {
        self.units = units;
        self
    }

    pub fn with_segments(mut self, segments: Vec<Segment>) -> Self {
        self.segments = segments;
        self
    }

    /// Ids of every unit the job consumed, in selection order
    pub fn unit_ids(&self) -> Vec<String> {
        self.units.iter().map(|u| u.id.clone()).collect()
    }

    /// Title of the lead unit (the thread in single mode)
    pub fn lead_title(&self) -> Option<&str> {
        self.units.first().map(|u| u.title.as_str())
    }

    /// Load a manifest from disk
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse manifest JSON")
    }

    /// Save the manifest to disk
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write manifest: {}", path.display()))?;

        Ok(())
    }
}
