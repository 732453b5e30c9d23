//! ffmpeg/ffprobe subprocess adapters.
//!
//! One ffmpeg invocation composites the whole video: a looping background,
//! each segment image overlaid for exactly its audio's duration, and the
//! audio clips concatenated in the same order.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{AudioProbe, RenderError, RenderJob, Renderer};

/// ffmpeg-backed renderer
pub struct FfmpegRenderer {
    /// Path to the ffmpeg binary (default: "ffmpeg")
    binary_path: String,

    /// Encoder threads
    threads: usize,
}

impl Default for FfmpegRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRenderer {
    pub fn new() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            binary_path: "ffmpeg".to_string(),
            threads,
        }
    }

    pub fn with_binary_path(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
            ..Self::new()
        }
    }

    /// Arguments for the composite render
    pub fn render_args(&self, job: &RenderJob, temp_path: &Path) -> Vec<String> {
        let total = job.total_duration();
        let mut args: Vec<String> = vec!["-y".into(), "-v".into(), "error".into()];

        // input 0: background, looped so it never runs out
        args.extend(["-stream_loop".into(), "-1".into(), "-i".into()]);
        args.push(job.background.to_string_lossy().to_string());

        // inputs 1..: image, audio, image, audio, ...
        for clip in &job.clips {
            args.extend(["-loop".into(), "1".into(), "-t".into()]);
            args.push(format!("{:.3}", clip.duration));
            args.push("-i".into());
            args.push(clip.image.to_string_lossy().to_string());
            args.push("-i".into());
            args.push(clip.audio.to_string_lossy().to_string());
        }

        args.push("-filter_complex".into());
        args.push(filter_graph(job));

        args.extend([
            "-map".into(),
            "[vout]".into(),
            "-map".into(),
            "[aout]".into(),
            "-r".into(),
            job.fps.to_string(),
            "-c:v".into(),
            "libx264".into(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            "192k".into(),
            "-threads".into(),
            self.threads.to_string(),
            "-t".into(),
            format!("{:.3}", total),
        ]);
        args.push(temp_path.to_string_lossy().to_string());

        args
    }

    /// Arguments for cutting `[start, end]` without re-encoding
    pub fn extract_args(source: &Path, start: f64, end: f64, dest: &Path) -> Vec<String> {
        vec![
            "-y".into(),
            "-v".into(),
            "error".into(),
            "-ss".into(),
            format!("{:.3}", start),
            "-t".into(),
            format!("{:.3}", (end - start).max(0.0)),
            "-i".into(),
            source.to_string_lossy().to_string(),
            "-map".into(),
            "0".into(),
            "-c".into(),
            "copy".into(),
            dest.to_string_lossy().to_string(),
        ]
    }

    async fn run(&self, args: &[String]) -> Result<(), RenderError> {
        debug!("Running: {} {}", self.binary_path, args.join(" "));

        let output = Command::new(&self.binary_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => RenderError::BinaryNotFound("ffmpeg"),
                _ => RenderError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(RenderError::failed(
                "ffmpeg",
                "exited with non-zero status",
                Some(stderr),
                output.status.code(),
            ));
        }

        Ok(())
    }
}

/// Build the filter graph: background crop, timed overlays, audio concat
fn filter_graph(job: &RenderJob) -> String {
    let mut parts = Vec::new();
    parts.push(format!(
        "[0:v]scale=-2:{h},crop={w}:{h},setsar=1[bg0]",
        w = job.frame_width,
        h = job.frame_height
    ));

    let x = job
        .position
        .x
        .map(|v| v.to_string())
        .unwrap_or_else(|| "(main_w-overlay_w)/2".to_string());
    let y = job
        .position
        .y
        .map(|v| v.to_string())
        .unwrap_or_else(|| "(main_h-overlay_h)/2".to_string());

    let offsets = job.offsets();
    for (i, clip) in job.clips.iter().enumerate() {
        let image_input = 1 + 2 * i;
        let start = offsets[i];
        let end = start + clip.duration;

        parts.push(format!(
            "[{input}:v]scale={width}:-2,format=rgba,colorchannelmixer=aa={opacity:.2},setpts=PTS+{start:.3}/TB[img{i}]",
            input = image_input,
            width = clip.width,
            opacity = job.opacity,
            start = start,
            i = i
        ));
        parts.push(format!(
            "[bg{i}][img{i}]overlay=x={x}:y={y}:enable='between(t,{start:.3},{end:.3})'[bg{next}]",
            i = i,
            next = i + 1,
            x = x,
            y = y,
            start = start,
            end = end
        ));
    }
    parts.push(format!("[bg{}]null[vout]", job.clips.len()));

    let audio_inputs: String = (0..job.clips.len())
        .map(|i| format!("[{}:a]", 2 + 2 * i))
        .collect();
    parts.push(format!(
        "{}concat=n={}:v=0:a=1[aout]",
        audio_inputs,
        job.clips.len()
    ));

    parts.join(";")
}

#[async_trait]
impl Renderer for FfmpegRenderer {
    async fn render(&self, job: &RenderJob, temp_path: &Path) -> Result<(), RenderError> {
        if job.clips.is_empty() {
            return Err(RenderError::failed("ffmpeg", "no clips to render", None, None));
        }
        if let Some(parent) = temp_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.run(&self.render_args(job, temp_path)).await
    }

    async fn extract(
        &self,
        source: &Path,
        start: f64,
        end: f64,
        dest: &Path,
    ) -> Result<(), RenderError> {
        self.run(&Self::extract_args(source, start, end, dest)).await
    }
}

/// ffprobe-backed duration probe
pub struct FfprobeProbe {
    binary_path: String,
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl FfprobeProbe {
    pub fn new() -> Self {
        Self {
            binary_path: "ffprobe".to_string(),
        }
    }
}

#[async_trait]
impl AudioProbe for FfprobeProbe {
    async fn duration(&self, path: &Path) -> Result<f64, RenderError> {
        let output = Command::new(&self.binary_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => RenderError::BinaryNotFound("ffprobe"),
                _ => RenderError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(RenderError::failed(
                "ffprobe",
                format!("could not read {}", path.display()),
                Some(stderr),
                output.status.code(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout.trim().parse::<f64>().map_err(|_| {
            RenderError::failed(
                "ffprobe",
                format!("unparsable duration {:?} for {}", stdout.trim(), path.display()),
                None,
                None,
            )
        })
    }
}
