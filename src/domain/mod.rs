//! Domain types for the storyreel pipeline.
//!
//! This module contains the core data structures:
//! - Content: threads, comments and how to reference them
//! - Segment: timed audio+image slots and the job manifest
//! - Record: the persisted ledger rows

pub mod content;
pub mod record;
pub mod segment;

// Re-export commonly used types
pub use content::{CommentNode, ContentUnit, Mode, RankMode, RawComment, TimeFilter, UnitRef};
pub use record::{GroupEntry, StoryItem, VideoRecord};
pub use segment::{Job, Segment};
