//! Content selection: which unit(s) the next video is made of.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::adapters::{ContentSource, SourceError};
use crate::domain::{ContentUnit, Job, Mode, RankMode, UnitRef};
use crate::ledger::{Ledger, LedgerError};

use super::filter::SegmentFilter;
use super::naming::camel_case_to_text;

/// Units drawn per listing request in story mode, and the first window in
/// single mode
pub const BATCH_SIZE: usize = 25;

/// Largest window a listing request may ask for
pub const MAX_DRAW: usize = 100;

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("No eligible content in r/{group}: every ranked unit is done or has too few comments")]
    NoEligibleContent { group: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// What to select
#[derive(Debug, Clone)]
pub struct SelectRequest {
    /// Group name without any `r/` prefix
    pub group: String,
    pub mode: Mode,
    pub rank: RankMode,

    /// Explicit override; bypasses ranking and the done check
    pub explicit: Vec<UnitRef>,
}

impl SelectRequest {
    pub fn new(group: impl Into<String>, mode: Mode) -> Self {
        Self {
            group: group.into(),
            mode,
            rank: RankMode::default(),
            explicit: Vec::new(),
        }
    }

    pub fn with_rank(mut self, rank: RankMode) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_explicit(mut self, explicit: Vec<UnitRef>) -> Self {
        self.explicit = explicit;
        self
    }
}

/// Selected units, in stream (or override) order
#[derive(Debug, Clone)]
pub struct Selection {
    pub units: Vec<ContentUnit>,

    /// True when the units came from an explicit override
    pub pinned: bool,
}

/// Picks eligible units from a ranked source, skipping anything the
/// ledger already holds
pub struct ContentSelector {
    source: Arc<dyn ContentSource>,
    ledger: Ledger,
    filter: SegmentFilter,
    min_comments: u64,
}

impl ContentSelector {
    pub fn new(source: Arc<dyn ContentSource>, ledger: Ledger) -> Self {
        Self {
            source,
            ledger,
            filter: SegmentFilter::default(),
            min_comments: 1,
        }
    }

    pub fn with_filter(mut self, filter: SegmentFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Minimum comment count a single-mode unit needs (at least 1)
    pub fn with_min_comments(mut self, min_comments: u64) -> Self {
        self.min_comments = min_comments.max(1);
        self
    }

    /// Choose the unit(s) for the next video.
    ///
    /// Single mode returns exactly one unit or fails with
    /// [`SelectionError::NoEligibleContent`]. Story mode returns the
    /// not-yet-done part of one batch, possibly empty.
    #[instrument(skip(self, request), fields(group = %request.group, mode = %request.mode))]
    pub async fn select_units(&self, request: &SelectRequest) -> Result<Selection, SelectionError> {
        if !request.explicit.is_empty() {
            return self.select_explicit(request).await;
        }

        match request.mode {
            Mode::Single => self.select_single(request).await,
            Mode::Story => self.select_batch(request).await,
        }
    }

    /// Select units and turn them into a job manifest
    pub async fn prepare_job(&self, request: &SelectRequest) -> Result<Job, SelectionError> {
        let selection = self.select_units(request).await?;
        let group_text = camel_case_to_text(&request.group);

        let job = match request.mode {
            Mode::Single => {
                let unit = selection
                    .units
                    .first()
                    .ok_or_else(|| SelectionError::NoEligibleContent {
                        group: request.group.clone(),
                    })?;
                let comments = self.source.comments(unit).await?;
                let segments = self.filter.segments(&comments);
                info!(
                    unit = %unit.id,
                    accepted = segments.len(),
                    fetched = comments.len(),
                    "Filtered comments"
                );
                Job::new(Mode::Single, &request.group, group_text).with_segments(segments)
            }
            Mode::Story => {
                let part = self.ledger.upcoming_part(&request.group)?;
                let segments = self.filter.story_segments(&selection.units);
                Job::new(
                    Mode::Story,
                    &request.group,
                    format!("{} part {}", group_text, part),
                )
                .with_segments(segments)
            }
        };

        Ok(job.pinned(selection.pinned).with_units(selection.units))
    }

    async fn select_explicit(&self, request: &SelectRequest) -> Result<Selection, SelectionError> {
        let refs = match request.mode {
            Mode::Single if request.explicit.len() > 1 => {
                warn!(
                    given = request.explicit.len(),
                    "Single mode uses only the first explicit reference"
                );
                &request.explicit[..1]
            }
            _ => &request.explicit[..],
        };

        let mut seen = HashSet::new();
        let mut units = Vec::with_capacity(refs.len());
        for reference in refs {
            let unit = self.source.lookup(reference).await?;
            if !seen.insert(unit.id.clone()) {
                debug!(unit = %unit.id, reference = %reference, "Duplicate explicit reference dropped");
                continue;
            }
            if self.ledger.is_done(&unit.id)? {
                info!(unit = %unit.id, "Explicit unit already done, selecting anyway");
            }
            units.push(unit);
        }

        Ok(Selection {
            units,
            pinned: true,
        })
    }

    /// Walk the ranked stream until an undone unit with comments turns up.
    /// When a window is used up the stream is re-queried with a wider one,
    /// up to [`MAX_DRAW`] or until the stream has nothing more to give.
    async fn select_single(&self, request: &SelectRequest) -> Result<Selection, SelectionError> {
        let snapshot = self.ledger.snapshot()?;
        let mut seen = 0;
        let mut limit = BATCH_SIZE;

        loop {
            let ranked = self
                .source
                .ranked(&request.group, request.rank, limit)
                .await?;

            for unit in ranked.iter().skip(seen) {
                if snapshot.is_done(&unit.id) {
                    debug!(unit = %unit.id, "Already done, drawing next");
                    continue;
                }
                if unit.num_comments < self.min_comments {
                    debug!(unit = %unit.id, comments = unit.num_comments, "Too few comments, drawing next");
                    continue;
                }

                info!(
                    unit = %unit.id,
                    title = %unit.title,
                    score = unit.score,
                    upvote_ratio = unit.upvote_ratio,
                    comments = unit.num_comments,
                    "Selected unit"
                );
                return Ok(Selection {
                    units: vec![unit.clone()],
                    pinned: false,
                });
            }

            if ranked.len() < limit || limit >= MAX_DRAW {
                break;
            }
            seen = ranked.len();
            limit = (limit * 2).min(MAX_DRAW);
            debug!(limit, "Window exhausted, re-querying");
        }

        Err(SelectionError::NoEligibleContent {
            group: request.group.clone(),
        })
    }

    async fn select_batch(&self, request: &SelectRequest) -> Result<Selection, SelectionError> {
        let snapshot = self.ledger.snapshot()?;
        let ranked = self
            .source
            .ranked(&request.group, request.rank, BATCH_SIZE)
            .await?;
        let drawn = ranked.len();

        let units: Vec<ContentUnit> = ranked
            .into_iter()
            .filter(|unit| !snapshot.is_done(&unit.id))
            .collect();

        info!(drawn, fresh = units.len(), "Selected story batch");
        Ok(Selection {
            units,
            pinned: false,
        })
    }
}
