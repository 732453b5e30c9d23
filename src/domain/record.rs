//! Rows persisted in the completion ledger documents.
//!
//! Field names match the on-disk JSON so older ledgers stay readable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed single-unit video (`videos.json` row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub subreddit: String,
    pub id: String,

    /// Unix seconds, stored as a string
    pub time: String,

    pub background_credit: String,
    pub reddit_title: String,
    pub filename: String,
}

/// One completed multi-unit video (`stories.json` item)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryItem {
    pub subreddit: String,

    /// Unit ids joined by "+"
    pub ids: String,

    /// Unix seconds, stored as a string
    pub time: String,

    pub background_credit: String,
    pub reddit_title: String,
    pub filename: String,
    pub part: u32,
}

impl StoryItem {
    /// Split the composite key back into unit ids
    pub fn id_list(&self) -> impl Iterator<Item = &str> {
        self.ids.split('+').filter(|s| !s.is_empty())
    }
}

/// Per-group history in `stories.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupEntry {
    #[serde(default)]
    pub latest_part: u32,

    #[serde(default)]
    pub items: Vec<StoryItem>,
}

/// Ledger timestamp format: unix seconds as a string
pub fn ledger_time(at: DateTime<Utc>) -> String {
    at.timestamp().to_string()
}
