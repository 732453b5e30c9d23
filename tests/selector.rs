//! Selector Integration Tests
//!
//! Selection against an in-memory content source and a real ledger.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use storyreel::adapters::{ContentSource, SourceError};
use storyreel::core::{ContentSelector, SelectRequest, SelectionError};
use storyreel::domain::{CommentNode, ContentUnit, Mode, RankMode, RawComment, UnitRef};
use storyreel::ledger::{Completion, Ledger};
use tempfile::TempDir;

/// Serves a fixed ranked list; records every listing limit it was asked for
struct FakeSource {
    ranked: Vec<ContentUnit>,
    comments: HashMap<String, Vec<CommentNode>>,
    requests: Mutex<Vec<usize>>,
}

impl FakeSource {
    fn new(ranked: Vec<ContentUnit>) -> Self {
        Self {
            ranked,
            comments: HashMap::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn with_comments(mut self, unit_id: &str, bodies: &[&str]) -> Self {
        let nodes = bodies
            .iter()
            .enumerate()
            .map(|(i, body)| {
                CommentNode::Comment(RawComment {
                    id: format!("{}_c{}", unit_id, i),
                    body: body.to_string(),
                    author: Some("someone".to_string()),
                    stickied: false,
                    permalink: String::new(),
                })
            })
            .collect();
        self.comments.insert(unit_id.to_string(), nodes);
        self
    }

    fn requests(&self) -> Vec<usize> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    async fn ranked(
        &self,
        _group: &str,
        _rank: RankMode,
        limit: usize,
    ) -> Result<Vec<ContentUnit>, SourceError> {
        self.requests.lock().unwrap().push(limit);
        Ok(self.ranked.iter().take(limit).cloned().collect())
    }

    async fn lookup(&self, reference: &UnitRef) -> Result<ContentUnit, SourceError> {
        let id = match reference {
            UnitRef::Id(id) => id.clone(),
            UnitRef::Url(url) => url.rsplit('/').next().unwrap_or_default().to_string(),
        };
        self.ranked
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(SourceError::NotFound(id))
    }

    async fn comments(&self, unit: &ContentUnit) -> Result<Vec<CommentNode>, SourceError> {
        Ok(self.comments.get(&unit.id).cloned().unwrap_or_default())
    }
}

fn unit(id: &str, comments: u64) -> ContentUnit {
    ContentUnit::new(id, "askreddit", format!("Thread {}", id), format!("/r/askreddit/{}", id))
        .with_comments(comments)
}

fn ledger_with_done(temp: &TempDir, done: &[&str]) -> Ledger {
    let ledger = Ledger::in_dir(temp.path());
    ledger.init().unwrap();
    for id in done {
        ledger
            .record(&Completion {
                group: "askreddit".to_string(),
                mode: Mode::Single,
                unit_ids: vec![id.to_string()],
                title: String::new(),
                credit: String::new(),
                filename: format!("{}.mp4", id),
                at: Utc::now(),
                part: None,
            })
            .unwrap();
    }
    ledger
}

#[tokio::test]
async fn test_single_mode_skips_done_and_commentless() {
    let temp = TempDir::new().unwrap();
    let ledger = ledger_with_done(&temp, &["A"]);
    let source = FakeSource::new(vec![unit("A", 12), unit("B", 0), unit("C", 3)]);
    let selector = ContentSelector::new(Arc::new(source), ledger);

    let selection = selector
        .select_units(&SelectRequest::new("askreddit", Mode::Single))
        .await
        .unwrap();

    assert_eq!(selection.units.len(), 1);
    assert_eq!(selection.units[0].id, "C");
    assert!(!selection.pinned);
}

#[tokio::test]
async fn test_single_mode_exhaustion_is_an_error() {
    let temp = TempDir::new().unwrap();
    let ledger = ledger_with_done(&temp, &["A"]);
    let source = Arc::new(FakeSource::new(vec![unit("A", 5), unit("B", 0)]));
    let selector = ContentSelector::new(source.clone(), ledger);

    let err = selector
        .select_units(&SelectRequest::new("askreddit", Mode::Single))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SelectionError::NoEligibleContent { ref group } if group == "askreddit"
    ));
    // the stream ran dry within the first window, so no re-query
    assert_eq!(source.requests(), vec![25]);
}

#[tokio::test]
async fn test_single_mode_requeries_with_wider_window() {
    let temp = TempDir::new().unwrap();
    let done: Vec<String> = (0..25).map(|i| format!("d{}", i)).collect();
    let done_refs: Vec<&str> = done.iter().map(String::as_str).collect();
    let ledger = ledger_with_done(&temp, &done_refs);

    let mut ranked: Vec<ContentUnit> = done.iter().map(|id| unit(id, 4)).collect();
    ranked.push(unit("fresh", 2));
    let source = Arc::new(FakeSource::new(ranked));
    let selector = ContentSelector::new(source.clone(), ledger);

    let selection = selector
        .select_units(&SelectRequest::new("askreddit", Mode::Single))
        .await
        .unwrap();

    assert_eq!(selection.units[0].id, "fresh");
    assert_eq!(source.requests(), vec![25, 50]);
}

#[tokio::test]
async fn test_min_comments_threshold() {
    let temp = TempDir::new().unwrap();
    let ledger = ledger_with_done(&temp, &[]);
    let source = FakeSource::new(vec![unit("A", 3), unit("B", 30)]);
    let selector = ContentSelector::new(Arc::new(source), ledger).with_min_comments(20);

    let selection = selector
        .select_units(&SelectRequest::new("askreddit", Mode::Single))
        .await
        .unwrap();
    assert_eq!(selection.units[0].id, "B");
}

#[tokio::test]
async fn test_story_mode_drops_done_and_keeps_order() {
    let temp = TempDir::new().unwrap();
    let ledger = ledger_with_done(&temp, &["B", "D"]);
    let source = FakeSource::new(vec![
        unit("A", 0),
        unit("B", 0),
        unit("C", 0),
        unit("D", 0),
        unit("E", 0),
    ]);
    let selector = ContentSelector::new(Arc::new(source), ledger);

    let selection = selector
        .select_units(&SelectRequest::new("askreddit", Mode::Story))
        .await
        .unwrap();

    let ids: Vec<&str> = selection.units.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "C", "E"]);
}

#[tokio::test]
async fn test_story_mode_batch_is_capped_and_may_be_empty() {
    let temp = TempDir::new().unwrap();
    let ids: Vec<String> = (0..30).map(|i| format!("u{}", i)).collect();
    let id_refs: Vec<&str> = ids.iter().take(25).map(String::as_str).collect();
    let ledger = ledger_with_done(&temp, &id_refs);

    let source = FakeSource::new(ids.iter().map(|id| unit(id, 1)).collect());
    let selector = ContentSelector::new(Arc::new(source), ledger);

    // the five fresh units sit past the batch of 25
    let selection = selector
        .select_units(&SelectRequest::new("askreddit", Mode::Story))
        .await
        .unwrap();
    assert!(selection.units.is_empty());
}

#[tokio::test]
async fn test_explicit_override_bypasses_done_filter() {
    let temp = TempDir::new().unwrap();
    let ledger = ledger_with_done(&temp, &["A"]);
    let source = FakeSource::new(vec![unit("A", 0), unit("B", 9)]);
    let selector = ContentSelector::new(Arc::new(source), ledger);

    let request = SelectRequest::new("askreddit", Mode::Single)
        .with_explicit(vec![UnitRef::Url("https://www.reddit.com/r/askreddit/A".to_string())]);
    let selection = selector.select_units(&request).await.unwrap();

    assert!(selection.pinned);
    assert_eq!(selection.units[0].id, "A");
}

#[tokio::test]
async fn test_duplicate_explicit_refs_resolve_once() {
    let temp = TempDir::new().unwrap();
    let ledger = ledger_with_done(&temp, &[]);
    let source = FakeSource::new(vec![unit("A", 0), unit("B", 0)]);
    let selector = ContentSelector::new(Arc::new(source), ledger);

    // same thread by id twice and once by URL
    let request = SelectRequest::new("askreddit", Mode::Story).with_explicit(vec![
        UnitRef::Id("A".to_string()),
        UnitRef::Id("B".to_string()),
        UnitRef::Id("A".to_string()),
        UnitRef::Url("https://www.reddit.com/r/askreddit/A".to_string()),
    ]);
    let selection = selector.select_units(&request).await.unwrap();

    let ids: Vec<&str> = selection.units.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);
}

#[tokio::test]
async fn test_recorded_units_are_never_reselected() {
    let temp = TempDir::new().unwrap();
    let ledger = ledger_with_done(&temp, &[]);
    let source = Arc::new(FakeSource::new(vec![unit("A", 2), unit("B", 2)]));
    let selector = ContentSelector::new(source.clone(), ledger.clone());
    let request = SelectRequest::new("askreddit", Mode::Single);

    let first = selector.select_units(&request).await.unwrap();
    assert_eq!(first.units[0].id, "A");

    ledger
        .record(&Completion {
            group: "askreddit".to_string(),
            mode: Mode::Single,
            unit_ids: vec!["A".to_string()],
            title: "Thread A".to_string(),
            credit: String::new(),
            filename: "Thread A.mp4".to_string(),
            at: Utc::now(),
            part: None,
        })
        .unwrap();

    let second = selector.select_units(&request).await.unwrap();
    assert_eq!(second.units[0].id, "B");
}

#[tokio::test]
async fn test_prepare_job_single_mode_filters_comments() {
    let temp = TempDir::new().unwrap();
    let ledger = ledger_with_done(&temp, &[]);
    let source = FakeSource::new(vec![unit("A", 4)]).with_comments(
        "A",
        &["first answer", "[deleted]", "second answer", "***"],
    );
    let selector = ContentSelector::new(Arc::new(source), ledger);

    let job = selector
        .prepare_job(&SelectRequest::new("AskReddit", Mode::Single))
        .await
        .unwrap();

    assert_eq!(job.label, "ask reddit");
    assert_eq!(job.unit_ids(), vec!["A".to_string()]);
    let bodies: Vec<&str> = job.segments.iter().map(|s| s.accepted_body.as_str()).collect();
    assert_eq!(bodies, vec!["first answer", "second answer"]);
    let indices: Vec<usize> = job.segments.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 1]);
}

#[tokio::test]
async fn test_prepare_job_story_label_uses_upcoming_part() {
    let temp = TempDir::new().unwrap();
    let ledger = ledger_with_done(&temp, &[]);
    ledger
        .record(&Completion {
            group: "NoSleep".to_string(),
            mode: Mode::Story,
            unit_ids: vec!["old".to_string()],
            title: String::new(),
            credit: String::new(),
            filename: "no sleep part 1.mp4".to_string(),
            at: Utc::now(),
            part: None,
        })
        .unwrap();

    let source = FakeSource::new(vec![unit("old", 0), unit("n1", 0), unit("n2", 0)]);
    let selector = ContentSelector::new(Arc::new(source), ledger);

    let job = selector
        .prepare_job(&SelectRequest::new("NoSleep", Mode::Story))
        .await
        .unwrap();

    assert_eq!(job.label, "no sleep part 2");
    assert_eq!(job.unit_ids(), vec!["n1".to_string(), "n2".to_string()]);
    let indices: Vec<usize> = job.segments.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 1]);
}
