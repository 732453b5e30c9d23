//! Adapter interfaces for external collaborators.
//!
//! The pipeline never talks to the network or to ffmpeg directly; it goes
//! through these traits so tests can swap in fakes:
//! - `ContentSource`: ranked listings, direct lookup and comments (Reddit)
//! - `AudioProbe`: duration of a rendered audio file (ffprobe)
//! - `Renderer`: composite + extract of the final video (ffmpeg)
//! - `Translator`: optional filename translation

pub mod ffmpeg;
pub mod reddit;
pub mod translate;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CommentNode, ContentUnit, RankMode, UnitRef};

pub use ffmpeg::{FfmpegRenderer, FfprobeProbe};
pub use reddit::{RedditClient, RedditCredentials};
pub use translate::GoogleTranslator;

/// Errors from the content platform
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// Errors from probing or rendering media
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{0} not found in PATH")]
    BinaryNotFound(&'static str),

    #[error("{program} failed: {message}")]
    Failed {
        program: &'static str,
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    pub fn failed(
        program: &'static str,
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::Failed {
            program,
            message: message.into(),
            stderr,
            exit_code,
        }
    }
}

/// Errors from the translation service
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected translation response: {0}")]
    Decode(String),
}

/// Source of content units for a group
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Human-readable source name
    fn name(&self) -> &str;

    /// Up to `limit` units of `group` in ranking order
    async fn ranked(
        &self,
        group: &str,
        rank: RankMode,
        limit: usize,
    ) -> Result<Vec<ContentUnit>, SourceError>;

    /// Resolve one unit by id or URL
    async fn lookup(&self, reference: &UnitRef) -> Result<ContentUnit, SourceError>;

    /// Top-level comments in platform order
    async fn comments(&self, unit: &ContentUnit) -> Result<Vec<CommentNode>, SourceError>;
}

/// Measures audio files
#[async_trait]
pub trait AudioProbe: Send + Sync {
    /// Duration in seconds
    async fn duration(&self, path: &Path) -> Result<f64, RenderError>;
}

/// Turns ordered clip descriptors into a video file
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Composite everything into `temp_path`
    async fn render(&self, job: &RenderJob, temp_path: &Path) -> Result<(), RenderError>;

    /// Copy the `[start, end]` window of `source` into `dest`
    async fn extract(
        &self,
        source: &Path,
        start: f64,
        end: f64,
        dest: &Path,
    ) -> Result<(), RenderError>;
}

/// Translates short strings (filenames)
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TranslateError>;
}

/// One audio+image pair on the timeline
#[derive(Debug, Clone, PartialEq)]
pub struct ClipDescriptor {
    /// Segment label, e.g. "title" or "3"
    pub label: String,
    pub audio: PathBuf,
    pub image: PathBuf,

    /// Seconds; always the audio file's duration
    pub duration: f64,

    /// Width the image is scaled to
    pub width: u32,
}

/// Where the image track sits on the frame; `None` centers on that axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipPosition {
    #[serde(default)]
    pub x: Option<i32>,

    #[serde(default)]
    pub y: Option<i32>,
}

impl ClipPosition {
    pub fn centered() -> Self {
        Self::default()
    }
}

/// Everything the renderer needs for one video
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub background: PathBuf,

    /// Clips in timeline order
    pub clips: Vec<ClipDescriptor>,

    pub position: ClipPosition,

    /// 0.0..=1.0
    pub opacity: f64,

    pub frame_width: u32,
    pub frame_height: u32,
    pub fps: u32,
}

impl RenderJob {
    /// Sum of all clip durations
    pub fn total_duration(&self) -> f64 {
        self.clips.iter().map(|c| c.duration).sum()
    }

    /// Start offset of each clip on the timeline
    pub fn offsets(&self) -> Vec<f64> {
        let mut t = 0.0;
        self.clips
            .iter()
            .map(|c| {
                let start = t;
                t += c.duration;
                start
            })
            .collect()
    }
}
