//! Core selection and assembly logic.
//!
//! This module contains:
//! - SegmentFilter: Per-comment eligibility
//! - ContentSelector: Next eligible unit(s) for a group
//! - SegmentSource: Segment index → asset file mapping
//! - AssemblyPipeline: Timeline, render, extract, record

pub mod assembly;
pub mod filter;
pub mod naming;
pub mod segments;
pub mod selector;

// Re-export commonly used types
pub use assembly::{AssemblyError, AssemblyOutput, AssemblyPipeline, BackgroundConfig};
pub use filter::{sanitize_text, Rejection, SegmentFilter};
pub use naming::{camel_case_to_text, name_normalize, FilenameBuilder};
pub use segments::{AssetLayout, PlannedClip, SegmentSource};
pub use selector::{ContentSelector, SelectRequest, Selection, SelectionError};
