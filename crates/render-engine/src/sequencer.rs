//! Video source sequencing.
//!
//! A [`ClipSequencer`] decides which video clips a render needs and how their
//! fetched files feed the transcode. Only the single-source path exists today;
//! concatenation and transitions slot in behind the same trait.

use std::path::PathBuf;

use montage_common::error::{MontageError, MontageResult};
use montage_timeline_resolver::ActiveClip;

/// A fetched video clip.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSource {
    pub clip_id: String,
    pub path: PathBuf,
    pub start_secs: f64,
    pub duration_secs: f64,
    /// Trim window inside the source file, when the clip carries one.
    pub source_start_secs: Option<f64>,
    pub source_end_secs: Option<f64>,
}

/// Transcode video inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencedVideo {
    /// Files passed to ffmpeg as inputs `0..inputs.len()`.
    pub inputs: Vec<PathBuf>,
    /// Filter combining the inputs into [`Self::OUTPUT_LABEL`]. `None` when
    /// input 0 is used as is.
    pub graph: Option<String>,
}

impl SequencedVideo {
    pub const OUTPUT_LABEL: &'static str = "vseq";

    pub fn single(path: PathBuf) -> Self {
        Self {
            inputs: vec![path],
            graph: None,
        }
    }
}

/// Chooses and combines video sources.
pub trait ClipSequencer: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &str;

    /// The video clips, from `candidates` in start order, whose sources must
    /// be fetched.
    fn select<'c, 't>(&self, candidates: &'c [ActiveClip<'t>]) -> Vec<&'c ActiveClip<'t>>;

    /// Combine the fetched sources into transcode inputs.
    fn sequence(&self, sources: &[VideoSource]) -> MontageResult<SequencedVideo>;
}

/// Renders the earliest video clip only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleSourceSequencer;

impl ClipSequencer for SingleSourceSequencer {
    fn name(&self) -> &str {
        "single-source"
    }

    fn select<'c, 't>(&self, candidates: &'c [ActiveClip<'t>]) -> Vec<&'c ActiveClip<'t>> {
        if candidates.len() > 1 {
            tracing::warn!(
                clips = candidates.len(),
                used = %candidates[0].clip.clip_id,
                "Multi-clip sequencing is not supported, rendering the first video clip only"
            );
        }
        candidates.iter().take(1).collect()
    }

    fn sequence(&self, sources: &[VideoSource]) -> MontageResult<SequencedVideo> {
        let first = sources
            .first()
            .ok_or_else(|| MontageError::configuration("No video source to render"))?;
        if first.source_start_secs.is_some() || first.source_end_secs.is_some() {
            tracing::debug!(clip_id = %first.clip_id, "Source trim is not applied in single-source rendering");
        }
        Ok(SequencedVideo::single(first.path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_project_model::{Clip, Track, TrackKind};

    fn source(id: &str) -> VideoSource {
        VideoSource {
            clip_id: id.to_string(),
            path: PathBuf::from(format!("/work/{id}.mp4")),
            start_secs: 0.0,
            duration_secs: 1.0,
            source_start_secs: None,
            source_end_secs: None,
        }
    }

    #[test]
    fn test_selects_first_candidate() {
        let track = Track {
            id: None,
            kind: TrackKind::Video,
            volume: 1.0,
            muted: false,
            clips: vec![Clip::new("a", 0.0, 1.0), Clip::new("b", 1.0, 1.0)],
        };
        let candidates: Vec<ActiveClip<'_>> = track
            .clips
            .iter()
            .enumerate()
            .map(|(clip_index, clip)| ActiveClip {
                clip,
                track: &track,
                track_index: 0,
                clip_index,
                local_time_secs: 0.0,
            })
            .collect();

        let selected = SingleSourceSequencer.select(&candidates);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].clip.clip_id, "a");
    }

    #[test]
    fn test_sequences_first_source() {
        let sequenced = SingleSourceSequencer
            .sequence(&[source("a"), source("b")])
            .unwrap();
        assert_eq!(sequenced, SequencedVideo::single(PathBuf::from("/work/a.mp4")));
    }

    #[test]
    fn test_no_sources_is_configuration_error() {
        let err = SingleSourceSequencer.sequence(&[]).unwrap_err();
        assert_eq!(err.kind(), "configuration");
    }
}
