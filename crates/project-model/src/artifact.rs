//! Intermediate and final files produced while composing a render.

use std::path::PathBuf;

/// Kind of composition artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Audio,
    Subtitles,
    Video,
    Thumbnail,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Audio => "aac",
            ArtifactKind::Subtitles => "ass",
            ArtifactKind::Video => "mp4",
            ArtifactKind::Thumbnail => "jpg",
        }
    }
}

/// A file in the job workspace.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionArtifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    /// Known playback length, when the producer computed one.
    pub duration_secs: Option<f64>,
}

impl CompositionArtifact {
    pub fn new(path: impl Into<PathBuf>, kind: ArtifactKind) -> Self {
        Self {
            path: path.into(),
            kind,
            duration_secs: None,
        }
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = Some(secs);
        self
    }
}
