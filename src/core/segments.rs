//! Maps a job's segments onto the audio/image files produced for it.

use std::path::{Path, PathBuf};

use crate::domain::{Job, Mode};

/// Frame width of the final video
pub const FRAME_WIDTH: u32 = 1080;

/// Frame height of the final video
pub const FRAME_HEIGHT: u32 = 1920;

/// Where one run's intermediate files live
#[derive(Debug, Clone)]
pub struct AssetLayout {
    temp_dir: PathBuf,
}

impl AssetLayout {
    /// Layout rooted at `<assets>/temp`
    pub fn new(assets_dir: &Path) -> Self {
        Self {
            temp_dir: assets_dir.join("temp"),
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn audio(&self, stem: &str) -> PathBuf {
        self.temp_dir.join("mp3").join(format!("{}.mp3", stem))
    }

    pub fn image(&self, stem: &str) -> PathBuf {
        self.temp_dir.join("png").join(format!("{}.png", stem))
    }

    pub fn background(&self) -> PathBuf {
        self.temp_dir.join("background.mp4")
    }

    pub fn manifest(&self) -> PathBuf {
        self.temp_dir.join("manifest.json")
    }

    /// Composite written before the final extract
    pub fn composite(&self) -> PathBuf {
        self.temp_dir.join("temp.mp4")
    }
}

/// One clip before its duration is known
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedClip {
    pub label: String,
    pub audio: PathBuf,
    pub image: PathBuf,
    pub width: u32,
}

/// How segment indices map to files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentSource {
    /// Subreddit and title cards, then `0..n` comments; no gaps allowed
    Flat,

    /// Intro card, then one title card per kept unit; gaps allowed
    Story,
}

impl From<Mode> for SegmentSource {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Single => SegmentSource::Flat,
            Mode::Story => SegmentSource::Story,
        }
    }
}

impl SegmentSource {
    /// Validate the job's index sequence and list its clips in timeline
    /// order. The leading card is wider than the rest.
    pub fn plan(&self, job: &Job, layout: &AssetLayout) -> Result<Vec<PlannedClip>, String> {
        let indices: Vec<usize> = job.segments.iter().map(|s| s.index).collect();
        check_indices(*self, &indices)?;

        let lead_width = FRAME_WIDTH + 100;
        let width = FRAME_WIDTH - 100;
        let clip = |label: String, audio: PathBuf, image: PathBuf, width: u32| PlannedClip {
            label,
            audio,
            image,
            width,
        };

        let clips = match self {
            SegmentSource::Flat => {
                let mut clips = vec![
                    clip(
                        "subreddit".to_string(),
                        layout.audio("subreddit"),
                        layout.image("subreddit"),
                        lead_width,
                    ),
                    clip(
                        "title".to_string(),
                        layout.audio("title"),
                        layout.image("title"),
                        width,
                    ),
                ];
                clips.extend(indices.iter().map(|i| {
                    clip(
                        i.to_string(),
                        layout.audio(&i.to_string()),
                        layout.image(&format!("comment_{}", i)),
                        width,
                    )
                }));
                clips
            }
            SegmentSource::Story => {
                let mut clips = vec![clip(
                    "intro".to_string(),
                    layout.audio("subreddit"),
                    layout.image("intro"),
                    lead_width,
                )];
                clips.extend(indices.iter().map(|i| {
                    let stem = format!("title_{}", i);
                    clip(stem.clone(), layout.audio(&stem), layout.image(&stem), width)
                }));
                clips
            }
        };

        Ok(clips)
    }
}

fn check_indices(source: SegmentSource, indices: &[usize]) -> Result<(), String> {
    match source {
        SegmentSource::Flat => {
            if let Some((pos, i)) = indices.iter().enumerate().find(|(pos, i)| *pos != **i) {
                return Err(format!("expected segment {} at position {}, found {}", pos, pos, i));
            }
        }
        SegmentSource::Story => {
            if let Some(pair) = indices.windows(2).find(|w| w[0] >= w[1]) {
                return Err(format!(
                    "segment indices must increase, found {} then {}",
                    pair[0], pair[1]
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Segment;

    fn job(mode: Mode, indices: &[usize]) -> Job {
        let segments = indices
            .iter()
            .map(|&index| Segment {
                index,
                source_unit_id: format!("u{}", index),
                accepted_body: "text".to_string(),
            })
            .collect();
        Job::new(mode, "askreddit", "ask reddit").with_segments(segments)
    }

    #[test]
    fn test_flat_plan_order_and_names() {
        let layout = AssetLayout::new(Path::new("/assets"));
        let clips = SegmentSource::Flat
            .plan(&job(Mode::Single, &[0, 1, 2]), &layout)
            .unwrap();

        let labels: Vec<&str> = clips.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["subreddit", "title", "0", "1", "2"]);
        assert_eq!(clips[2].audio, PathBuf::from("/assets/temp/mp3/0.mp3"));
        assert_eq!(clips[4].image, PathBuf::from("/assets/temp/png/comment_2.png"));
        assert_eq!(clips[0].width, 1180);
        assert_eq!(clips[1].width, 980);
    }

    #[test]
    fn test_flat_rejects_gaps() {
        let layout = AssetLayout::new(Path::new("/assets"));
        let err = SegmentSource::Flat
            .plan(&job(Mode::Single, &[0, 2]), &layout)
            .unwrap_err();
        assert!(err.contains("expected segment 1"));
    }

    #[test]
    fn test_story_plan_keeps_gaps() {
        let layout = AssetLayout::new(Path::new("/assets"));
        let clips = SegmentSource::Story
            .plan(&job(Mode::Story, &[0, 3, 4]), &layout)
            .unwrap();

        let labels: Vec<&str> = clips.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["intro", "title_0", "title_3", "title_4"]);
        assert_eq!(clips[0].audio, PathBuf::from("/assets/temp/mp3/subreddit.mp3"));
        assert_eq!(clips[0].image, PathBuf::from("/assets/temp/png/intro.png"));
    }

    #[test]
    fn test_story_rejects_out_of_order() {
        let layout = AssetLayout::new(Path::new("/assets"));
        assert!(SegmentSource::Story
            .plan(&job(Mode::Story, &[2, 1]), &layout)
            .is_err());
    }
}
