//! Assembly pipeline: numbered audio/image files → one finished video.
//!
//! Steps, in order:
//! 1. Map segments to files ([`SegmentSource`]) and check they all exist
//! 2. Probe each audio file; the paired image runs for exactly that long
//! 3. Derive the output filename from the title or group label
//! 4. Render the composite to a temp file, then extract `[0, total]`
//!    into `<results>/<group>/<filename>`
//! 5. Record completion in the ledger
//!
//! A failure anywhere before step 5 leaves the ledger untouched. Temp
//! files are left behind for `storyreel cleanup`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::adapters::{
    AudioProbe, ClipDescriptor, ClipPosition, RenderError, RenderJob, Renderer, TranslateError,
};
use crate::domain::{Job, Mode};
use crate::ledger::{Completion, Ledger, LedgerError, RecordOutcome};

use super::naming::{clean_title, FilenameBuilder};
use super::segments::{AssetLayout, SegmentSource, FRAME_HEIGHT, FRAME_WIDTH};

/// Output frame rate
pub const FPS: u32 = 30;

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Missing asset for segment '{label}': {}", .path.display())]
    AssetMissing { label: String, path: PathBuf },

    #[error("Invalid segment sequence: {0}")]
    InvalidSegments(String),

    #[error("Failed to measure {}: {source}", .path.display())]
    Probe {
        path: PathBuf,
        #[source]
        source: RenderError,
    },

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error("Filename translation failed: {0}")]
    Translate(#[from] TranslateError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Background video and how the image track sits on it
#[derive(Debug, Clone)]
pub struct BackgroundConfig {
    /// Already cut to the right length; cropped to the frame at render time
    pub path: PathBuf,

    /// Attribution stored in the ledger
    pub credit: String,

    pub position: ClipPosition,
}

/// What a successful run produced
#[derive(Debug, Clone)]
pub struct AssemblyOutput {
    pub path: PathBuf,
    pub filename: String,

    /// Seconds
    pub duration: f64,

    pub outcome: RecordOutcome,
}

pub struct AssemblyPipeline {
    layout: AssetLayout,
    results_dir: PathBuf,
    ledger: Ledger,
    probe: Arc<dyn AudioProbe>,
    renderer: Arc<dyn Renderer>,
    namer: FilenameBuilder,
    opacity: f64,
}

impl AssemblyPipeline {
    pub fn new(
        assets_dir: &Path,
        results_dir: impl Into<PathBuf>,
        ledger: Ledger,
        probe: Arc<dyn AudioProbe>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            layout: AssetLayout::new(assets_dir),
            results_dir: results_dir.into(),
            ledger,
            probe,
            renderer,
            namer: FilenameBuilder::new(),
            opacity: 1.0,
        }
    }

    pub fn with_namer(mut self, namer: FilenameBuilder) -> Self {
        self.namer = namer;
        self
    }

    /// Image opacity; missing, out of range or ≥ 1 means fully opaque
    pub fn with_opacity(mut self, opacity: Option<f64>) -> Self {
        self.opacity = normalize_opacity(opacity);
        self
    }

    pub fn layout(&self) -> &AssetLayout {
        &self.layout
    }

    /// Assemble the job's video and record it as done
    #[instrument(skip(self, job, background), fields(group = %job.group, mode = %job.mode, job = %job.id))]
    pub async fn assemble(
        &self,
        job: &Job,
        background: &BackgroundConfig,
    ) -> Result<AssemblyOutput, AssemblyError> {
        // ledger must be readable before anything is rendered
        self.ledger.snapshot()?;

        let planned = SegmentSource::from(job.mode)
            .plan(job, &self.layout)
            .map_err(AssemblyError::InvalidSegments)?;

        if !background.path.exists() {
            return Err(AssemblyError::AssetMissing {
                label: "background".to_string(),
                path: background.path.clone(),
            });
        }
        for clip in &planned {
            for path in [&clip.audio, &clip.image] {
                if !path.exists() {
                    return Err(AssemblyError::AssetMissing {
                        label: clip.label.clone(),
                        path: path.clone(),
                    });
                }
            }
        }

        let mut clips = Vec::with_capacity(planned.len());
        for clip in planned {
            let duration = self
                .probe
                .duration(&clip.audio)
                .await
                .map_err(|source| AssemblyError::Probe {
                    path: clip.audio.clone(),
                    source,
                })?;
            debug!(label = %clip.label, duration, "Probed segment audio");

            clips.push(ClipDescriptor {
                label: clip.label,
                audio: clip.audio,
                image: clip.image,
                duration,
                width: clip.width,
            });
        }

        let render_job = RenderJob {
            background: background.path.clone(),
            clips,
            position: background.position,
            opacity: self.opacity,
            frame_width: FRAME_WIDTH,
            frame_height: FRAME_HEIGHT,
            fps: FPS,
        };
        let total = render_job.total_duration();
        info!(
            clips = render_job.clips.len(),
            duration = total,
            "Timeline built"
        );

        let (title, filename) = self.naming(job).await?;

        let dest_dir = self.results_dir.join(&job.group);
        fs::create_dir_all(&dest_dir).await?;
        let dest = dest_dir.join(&filename);

        let composite = self.layout.composite();
        self.renderer.render(&render_job, &composite).await?;
        self.renderer.extract(&composite, 0.0, total, &dest).await?;
        info!(path = %dest.display(), "Video written");

        let outcome = self.ledger.record(&Completion {
            group: job.group.clone(),
            mode: job.mode,
            unit_ids: job.unit_ids(),
            title,
            credit: background.credit.clone(),
            filename: filename.clone(),
            at: Utc::now(),
            part: None,
        })?;

        Ok(AssemblyOutput {
            path: dest,
            filename,
            duration: total,
            outcome,
        })
    }

    /// Ledger title and output filename for a job
    async fn naming(&self, job: &Job) -> Result<(String, String), AssemblyError> {
        match job.mode {
            Mode::Single => {
                let raw = job.lead_title().unwrap_or(&job.label);
                let filename = self.namer.filename(raw).await?;
                Ok((clean_title(raw), filename))
            }
            Mode::Story => {
                let filename = self.namer.filename(&job.label).await?;
                Ok((filename.clone(), filename))
            }
        }
    }
}

fn normalize_opacity(opacity: Option<f64>) -> f64 {
    match opacity {
        Some(o) if (0.0..1.0).contains(&o) => o,
        _ => 1.0,
    }
}
