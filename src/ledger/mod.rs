//! Durable completion and part ledgers.
//!
//! Two JSON documents live in the state directory:
//!
//! ```text
//! <home>/
//! ├── videos.json    # completed single-unit videos, one row per unit id
//! └── stories.json   # group -> { latest_part, items[] } for story mode
//! ```
//!
//! Every write takes an exclusive lock, writes a sibling temp file and
//! renames it over the document, so readers only ever see a complete
//! document. A missing or unparsable document is fatal: without it no
//! duplicate check can be trusted.

pub mod completion;
pub mod store;

use std::path::PathBuf;

use thiserror::Error;

pub use completion::{Completion, Ledger, LedgerSnapshot, RecordOutcome};
pub use store::{Change, JsonDocument};

/// Errors raised by the ledger documents
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger document not found: {0} (run `storyreel init` to create it)")]
    Missing(PathBuf),

    #[error("Ledger document is corrupt: {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to lock ledger document {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
