//! storyreel - Narrated short videos from discussion threads
//!
//! Picks threads from a subreddit that have not been used before, hands
//! their text to external TTS/screenshot tools via a job manifest, then
//! stitches the resulting numbered audio/image files into one video and
//! records the threads as done.
//!
//! # Architecture
//!
//! The hard guarantees live in two places:
//! - The ledger: a unit is done once any record names it, and records are
//!   written atomically so a crash never leaves a half-written document
//! - The assembly pipeline: completion is recorded only after the final
//!   video has been extracted
//!
//! # Modules
//!
//! - `adapters`: External collaborators (Reddit, ffmpeg/ffprobe, translation)
//! - `core`: Selection, filtering and assembly
//! - `domain`: Data structures (ContentUnit, Segment, Job, ledger records)
//! - `ledger`: Durable completion and part ledgers
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Create the ledger documents once
//! storyreel init
//!
//! # Pick the next thread and write assets/temp/manifest.json
//! storyreel select --subreddit AskReddit
//!
//! # ... render assets/temp/mp3 and assets/temp/png ...
//!
//! # Build the video and record it
//! storyreel assemble
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ledger;

// Re-export main types at crate root for convenience
pub use core::{AssemblyPipeline, ContentSelector, SegmentFilter};
pub use domain::{ContentUnit, Job, Mode, Segment};
pub use ledger::{Ledger, LedgerError};
