//! Completion ledger (which units are done) and part ledger (per-group
//! sequence numbers), backed by `videos.json` and `stories.json`.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::record::ledger_time;
use crate::domain::{GroupEntry, Mode, StoryItem, VideoRecord};

use super::store::{Change, JsonDocument};
use super::LedgerError;

type Groups = BTreeMap<String, GroupEntry>;

/// Everything the ledger needs to record one finished video
#[derive(Debug, Clone)]
pub struct Completion {
    /// Ledger partition key (the subreddit)
    pub group: String,

    /// Selects which document receives the row
    pub mode: Mode,

    /// Every unit the video consumed, in order
    pub unit_ids: Vec<String>,

    pub title: String,
    pub credit: String,
    pub filename: String,
    pub at: DateTime<Utc>,

    /// Part reserved earlier with [`Ledger::next_part`]; story rows use it
    /// instead of taking a new one
    pub part: Option<u32>,
}

/// Result of [`Ledger::record`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A row was appended; story rows carry their part number
    Recorded { part: Option<u32> },

    /// Every unit was already done (explicit re-run); nothing written
    AlreadyRecorded,
}

/// Handle to both ledger documents
#[derive(Debug, Clone)]
pub struct Ledger {
    videos: JsonDocument<Vec<VideoRecord>>,
    stories: JsonDocument<Groups>,
}

impl Ledger {
    /// Open the ledger documents inside a state directory
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("videos.json"), dir.join("stories.json"))
    }

    pub fn new(videos_path: impl Into<PathBuf>, stories_path: impl Into<PathBuf>) -> Self {
        Self {
            videos: JsonDocument::new(videos_path),
            stories: JsonDocument::new(stories_path),
        }
    }

    pub fn videos_path(&self) -> &Path {
        self.videos.path()
    }

    pub fn stories_path(&self) -> &Path {
        self.stories.path()
    }

    /// Create empty documents where none exist. Returns the number created.
    pub fn init(&self) -> Result<usize, LedgerError> {
        let mut created = 0;
        if self.videos.create_if_missing(&Vec::new())? {
            info!("Created {}", self.videos.path().display());
            created += 1;
        }
        if self.stories.create_if_missing(&Groups::new())? {
            info!("Created {}", self.stories.path().display());
            created += 1;
        }
        Ok(created)
    }

    /// Load both documents into a read-only view
    pub fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        let videos = self.videos.read()?;
        let groups = self.stories.read()?;
        Ok(LedgerSnapshot::new(videos, groups))
    }

    /// True iff the unit appears in any record of any group
    pub fn is_done(&self, unit_id: &str) -> Result<bool, LedgerError> {
        Ok(self.snapshot()?.is_done(unit_id))
    }

    /// Part number the next story video of `group` will get (read-only)
    pub fn upcoming_part(&self, group: &str) -> Result<u32, LedgerError> {
        Ok(self.snapshot()?.latest_part(group) + 1)
    }

    /// Reserve and persist the next part number for `group`.
    /// Starts at 1 for a group never seen before. Pass the result in
    /// [`Completion::part`] so the recorded row keeps it.
    pub fn next_part(&self, group: &str) -> Result<u32, LedgerError> {
        self.stories
            .update(|groups| Change::Write(bump_part(groups, group)))
    }

    /// Record a finished video. Units already done are never counted twice:
    /// they are dropped from the row, and if none remain nothing is written.
    pub fn record(&self, completion: &Completion) -> Result<RecordOutcome, LedgerError> {
        let done = self.snapshot()?;
        let mut seen = HashSet::new();
        let fresh: Vec<String> = completion
            .unit_ids
            .iter()
            .filter(|id| !done.is_done(id) && seen.insert(id.as_str()))
            .cloned()
            .collect();

        if fresh.is_empty() {
            info!(
                group = %completion.group,
                "Units already recorded, leaving ledger unchanged"
            );
            return Ok(RecordOutcome::AlreadyRecorded);
        }

        match completion.mode {
            Mode::Single => self.record_unit(completion, &fresh[0]),
            Mode::Story => self.record_group(completion, &fresh),
        }
    }

    fn record_unit(
        &self,
        completion: &Completion,
        unit_id: &str,
    ) -> Result<RecordOutcome, LedgerError> {
        let row = VideoRecord {
            subreddit: completion.group.clone(),
            id: unit_id.to_string(),
            time: ledger_time(completion.at),
            background_credit: completion.credit.clone(),
            reddit_title: completion.title.clone(),
            filename: completion.filename.clone(),
        };

        let outcome = self.videos.update(|rows| {
            if rows.iter().any(|r| r.id == row.id) {
                return Change::Keep(RecordOutcome::AlreadyRecorded);
            }
            rows.push(row);
            Change::Write(RecordOutcome::Recorded { part: None })
        })?;

        if outcome != RecordOutcome::AlreadyRecorded {
            info!(group = %completion.group, unit = %unit_id, "Recorded completed unit");
        }
        Ok(outcome)
    }

    fn record_group(
        &self,
        completion: &Completion,
        unit_ids: &[String],
    ) -> Result<RecordOutcome, LedgerError> {
        let part = self.stories.update(|groups| {
            let part = match completion.part {
                Some(reserved) => keep_part(groups, &completion.group, reserved),
                None => bump_part(groups, &completion.group),
            };
            let entry = groups.entry(completion.group.clone()).or_default();
            entry.items.push(StoryItem {
                subreddit: completion.group.clone(),
                ids: unit_ids.join("+"),
                time: ledger_time(completion.at),
                background_credit: completion.credit.clone(),
                reddit_title: completion.title.clone(),
                filename: completion.filename.clone(),
                part,
            });
            Change::Write(part)
        })?;

        info!(
            group = %completion.group,
            part,
            units = unit_ids.len(),
            "Recorded completed group video"
        );
        Ok(RecordOutcome::Recorded { part: Some(part) })
    }
}

/// Increment and return a group's part counter
fn bump_part(groups: &mut Groups, group: &str) -> u32 {
    let entry = groups.entry(group.to_string()).or_default();
    entry.latest_part += 1;
    debug!(group, part = entry.latest_part, "Part counter advanced");
    entry.latest_part
}

/// Use an already reserved part; the counter never moves backwards
fn keep_part(groups: &mut Groups, group: &str, part: u32) -> u32 {
    let entry = groups.entry(group.to_string()).or_default();
    entry.latest_part = entry.latest_part.max(part);
    part
}

/// Read-only view of both documents at one point in time
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    videos: Vec<VideoRecord>,
    groups: Groups,
    done: HashSet<String>,
}

impl LedgerSnapshot {
    fn new(videos: Vec<VideoRecord>, groups: Groups) -> Self {
        let mut done: HashSet<String> = videos.iter().map(|v| v.id.clone()).collect();
        for entry in groups.values() {
            for item in &entry.items {
                done.extend(item.id_list().map(str::to_string));
            }
        }

        Self {
            videos,
            groups,
            done,
        }
    }

    pub fn is_done(&self, unit_id: &str) -> bool {
        self.done.contains(unit_id)
    }

    /// 0 for a group with no history
    pub fn latest_part(&self, group: &str) -> u32 {
        self.groups.get(group).map(|g| g.latest_part).unwrap_or(0)
    }

    pub fn videos(&self) -> &[VideoRecord] {
        &self.videos
    }

    pub fn groups(&self) -> &BTreeMap<String, GroupEntry> {
        &self.groups
    }

    /// Number of distinct done unit ids
    pub fn done_count(&self) -> usize {
        self.done.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ledger() -> (Ledger, TempDir) {
        let temp = TempDir::new().unwrap();
        let ledger = Ledger::in_dir(temp.path());
        ledger.init().unwrap();
        (ledger, temp)
    }

    fn completion(mode: Mode, ids: &[&str]) -> Completion {
        Completion {
            group: "askreddit".to_string(),
            mode,
            unit_ids: ids.iter().map(|s| s.to_string()).collect(),
            title: "Title".to_string(),
            credit: "bbswitzer".to_string(),
            filename: "Title.mp4".to_string(),
            at: Utc::now(),
            part: None,
        }
    }

    #[test]
    fn test_init_is_idempotent() {
        let (ledger, _temp) = ledger();
        assert_eq!(ledger.init().unwrap(), 0);
    }

    #[test]
    fn test_single_record_marks_done() {
        let (ledger, _temp) = ledger();
        assert!(!ledger.is_done("a1").unwrap());

        let outcome = ledger.record(&completion(Mode::Single, &["a1"])).unwrap();
        assert_eq!(outcome, RecordOutcome::Recorded { part: None });
        assert!(ledger.is_done("a1").unwrap());
    }

    #[test]
    fn test_group_record_is_global_scope() {
        let (ledger, _temp) = ledger();
        ledger
            .record(&completion(Mode::Story, &["a1", "b2"]))
            .unwrap();

        // a different group never recorded b2, but it's still done
        assert!(ledger.is_done("b2").unwrap());
        assert_eq!(ledger.upcoming_part("askreddit").unwrap(), 2);
        assert_eq!(ledger.upcoming_part("tifu").unwrap(), 1);
    }

    #[test]
    fn test_group_record_drops_already_done_ids() {
        let (ledger, _temp) = ledger();
        ledger.record(&completion(Mode::Single, &["a1"])).unwrap();

        let outcome = ledger
            .record(&completion(Mode::Story, &["a1", "b2"]))
            .unwrap();
        assert_eq!(outcome, RecordOutcome::Recorded { part: Some(1) });

        let snapshot = ledger.snapshot().unwrap();
        let items = &snapshot.groups()["askreddit"].items;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].ids, "b2");
    }

    #[test]
    fn test_all_done_writes_nothing_and_keeps_part() {
        let (ledger, _temp) = ledger();
        ledger
            .record(&completion(Mode::Story, &["a1", "b2"]))
            .unwrap();

        let outcome = ledger
            .record(&completion(Mode::Story, &["b2", "a1"]))
            .unwrap();
        assert_eq!(outcome, RecordOutcome::AlreadyRecorded);

        let snapshot = ledger.snapshot().unwrap();
        assert_eq!(snapshot.latest_part("askreddit"), 1);
        assert_eq!(snapshot.groups()["askreddit"].items.len(), 1);
    }

    #[test]
    fn test_missing_document_is_fatal() {
        let temp = TempDir::new().unwrap();
        let ledger = Ledger::in_dir(temp.path());

        assert!(matches!(
            ledger.is_done("a1"),
            Err(LedgerError::Missing(_))
        ));
    }
}
