//! Timeline model: typed tracks of time-positioned clips.
//!
//! The timeline is pure data. It is validated once when parsed, so every
//! `Timeline` value in the program satisfies the invariants the resolver
//! relies on: positive finite duration and fps, `startTime >= 0` and
//! `duration > 0` for every clip.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::resolution::VideoFormat;

/// FPS assumed when a timeline does not carry one.
pub const DEFAULT_FPS: f64 = 30.0;

/// Upper bound on `floor(duration * fps)`: ten hours at 60 fps.
pub const MAX_TIMELINE_FRAMES: u64 = 2_160_000;

/// Declarative description of tracks and clips positioned in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeline")]
pub struct Timeline {
    /// Timeline format version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Output aspect ratio the timeline was edited for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<VideoFormat>,

    /// Total duration in seconds.
    #[serde(rename = "duration")]
    pub duration_secs: f64,

    /// Frames per second.
    pub fps: f64,

    /// Lanes, in declaration order.
    pub tracks: Vec<Track>,
}

/// Wire shape accepted for a timeline; `fps` may also arrive under
/// `settings.fps`, as editor exports put it there.
#[derive(Debug, Deserialize)]
struct RawTimeline {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    format: Option<VideoFormat>,
    duration: f64,
    #[serde(default)]
    fps: Option<f64>,
    #[serde(default)]
    settings: Option<RawSettings>,
    #[serde(default)]
    tracks: Vec<Track>,
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(default)]
    fps: Option<f64>,
}

impl TryFrom<RawTimeline> for Timeline {
    type Error = ModelError;

    fn try_from(raw: RawTimeline) -> Result<Self, Self::Error> {
        let fps = raw
            .fps
            .or_else(|| raw.settings.as_ref().and_then(|s| s.fps))
            .unwrap_or(DEFAULT_FPS);

        let timeline = Self {
            version: raw.version,
            format: raw.format,
            duration_secs: raw.duration,
            fps,
            tracks: raw.tracks,
        };
        timeline.validate()?;
        Ok(timeline)
    }
}

/// Type of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Subtitle,
}

impl TrackKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
            TrackKind::Subtitle => "subtitle",
        }
    }
}

/// A typed lane containing clips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type")]
    pub kind: TrackKind,

    /// Linear gain, audio tracks only. `1.0` is unity.
    #[serde(default = "default_volume")]
    pub volume: f64,

    /// Muted audio tracks contribute nothing to the mix.
    #[serde(default)]
    pub muted: bool,

    /// Clips in no particular order.
    #[serde(default)]
    pub clips: Vec<Clip>,
}

fn default_volume() -> f64 {
    1.0
}

/// A time-bounded reference to a source asset plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub clip_id: String,

    /// Start on the timeline, in seconds.
    pub start_time: f64,

    /// Length on the timeline, in seconds.
    pub duration: f64,

    /// Opaque asset pointer (`store://bucket/key`), required for video clips.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,

    /// Trim window inside the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_start_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_end_time: Option<f64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transformations: Vec<Transformation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_job_id: Option<String>,

    /// Finished voice-clone output for this clip, once the job completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_output_ref: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_track_id: Option<String>,

    /// Static audio attached to the clip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_track: Option<AudioTrack>,

    /// Literal subtitle text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle_text: Option<String>,

    /// Transcribed subtitle tracks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtitles: Vec<SubtitleTrack>,
}

impl Clip {
    /// Minimal clip with only timing information.
    pub fn new(clip_id: impl Into<String>, start_time: f64, duration: f64) -> Self {
        Self {
            clip_id: clip_id.into(),
            start_time,
            duration,
            source_ref: None,
            source_start_time: None,
            source_end_time: None,
            transformations: vec![],
            voice_id: None,
            voice_text: None,
            voice_language: None,
            voice_job_id: None,
            voice_output_ref: None,
            character_id: None,
            face_track_id: None,
            audio_track: None,
            subtitle_text: None,
            subtitles: vec![],
        }
    }

    /// Exclusive end of the clip on the timeline.
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Half-open membership: active on `[start, start + duration)`.
    pub fn is_active_at(&self, t: f64) -> bool {
        self.start_time <= t && t < self.end_time()
    }

    /// Transformations whose output is ready to be applied.
    pub fn completed_transformations(&self) -> impl Iterator<Item = &Transformation> {
        self.transformations
            .iter()
            .filter(|t| t.status == TransformationStatus::Completed)
    }
}

/// Kind of per-clip transformation produced by an inference service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationKind {
    FaceTransform,
    BackgroundReplace,
    VoiceReplace,
    LipSync,
    SubtitleAdd,
    Crop,
    Filter,
}

/// Lifecycle of a transformation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformationStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

/// A transformation attached to a clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transformation {
    #[serde(rename = "type")]
    pub kind: TransformationKind,

    #[serde(default)]
    pub status: TransformationStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    /// Transformation-specific settings, passed through untouched.
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

/// Static audio attached to a clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTrack {
    /// Asset pointer to the audio file.
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u32>,
    /// Informational; gain comes from the owning track.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

/// Subtitles transcribed for a clip in one language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleTrack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// ISO 639-1 code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default)]
    pub segments: Vec<SubtitleSegment>,
}

/// One transcribed line, timed relative to the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleSegment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
}

impl Timeline {
    /// Create an empty, valid timeline.
    pub fn new(duration_secs: f64, fps: f64) -> Self {
        Self {
            version: Some("1.0".to_string()),
            format: None,
            duration_secs,
            fps,
            tracks: vec![],
        }
    }

    /// Parse and validate a timeline from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let raw: RawTimeline = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    /// Parse and validate a timeline from an already-decoded JSON value.
    ///
    /// Unlike deserializing `Timeline` directly, semantic problems surface
    /// as [`ModelError::InvalidTimeline`] rather than as a parse error.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ModelError> {
        let raw: RawTimeline = serde_json::from_value(value)?;
        Self::try_from(raw)
    }

    /// Number of frames the timeline renders to.
    ///
    /// Truncating: a trailing partial frame (`duration * fps` non-integral)
    /// is never produced and its time is dropped.
    pub fn total_frames(&self) -> u64 {
        (self.duration_secs * self.fps).floor() as u64
    }

    /// [`total_frames`](Self::total_frames), rejected past
    /// [`MAX_TIMELINE_FRAMES`].
    pub fn bounded_total_frames(&self) -> Result<u64, ModelError> {
        let frames = (self.duration_secs * self.fps).floor();
        if frames.is_nan() || frames > MAX_TIMELINE_FRAMES as f64 {
            return Err(ModelError::invalid_timeline(format!(
                "timeline spans {frames} frames, limit is {MAX_TIMELINE_FRAMES}"
            )));
        }
        Ok(self.total_frames())
    }

    /// Tracks of a given type, with their index in the timeline.
    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = (usize, &Track)> {
        self.tracks
            .iter()
            .enumerate()
            .filter(move |(_, track)| track.kind == kind)
    }

    /// Whether any video track carries at least one clip.
    pub fn has_video(&self) -> bool {
        self.tracks_of(TrackKind::Video)
            .any(|(_, track)| !track.clips.is_empty())
    }

    /// Check the timeline invariants.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(ModelError::invalid_timeline(format!(
                "duration must be a positive number of seconds, got {}",
                self.duration_secs
            )));
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(ModelError::invalid_timeline(format!(
                "fps must be positive, got {}",
                self.fps
            )));
        }
        self.bounded_total_frames()?;

        for (track_index, track) in self.tracks.iter().enumerate() {
            if !track.volume.is_finite() || track.volume < 0.0 {
                return Err(ModelError::invalid_timeline(format!(
                    "track {track_index} has invalid volume {}",
                    track.volume
                )));
            }
            for clip in &track.clips {
                if clip.clip_id.trim().is_empty() {
                    return Err(ModelError::invalid_timeline(format!(
                        "track {track_index} has a clip without clipId"
                    )));
                }
                if !clip.start_time.is_finite() || clip.start_time < 0.0 {
                    return Err(ModelError::invalid_timeline(format!(
                        "clip {} has invalid startTime {}",
                        clip.clip_id, clip.start_time
                    )));
                }
                if !clip.duration.is_finite() || clip.duration <= 0.0 {
                    return Err(ModelError::invalid_timeline(format!(
                        "clip {} has non-positive duration {}",
                        clip.clip_id, clip.duration
                    )));
                }
            }
        }

        Ok(())
    }
}
