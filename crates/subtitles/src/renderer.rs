//! Subtitle rendering for resolved timelines.

use std::path::Path;
use std::sync::Arc;

use montage_common::error::MontageResult;
use montage_project_model::{ArtifactKind, Clip, CompositionArtifact};
use montage_timeline_resolver::ActiveClip;

use crate::ass::{generate_ass, AssStyle, SubtitleEntry};

/// Finds the display text of a subtitle clip.
///
/// `Ok(None)` means the clip has nothing to show.
pub trait SubtitleTextResolver: Send + Sync {
    fn resolve(&self, clip: &Clip) -> MontageResult<Option<String>>;
}

/// Reads text straight from the clip: `subtitleText` when non-empty, else
/// the segments of the first transcribed track joined by spaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipTextResolver;

impl SubtitleTextResolver for ClipTextResolver {
    fn resolve(&self, clip: &Clip) -> MontageResult<Option<String>> {
        if let Some(text) = clip.subtitle_text.as_deref() {
            if !text.trim().is_empty() {
                return Ok(Some(text.trim().to_string()));
            }
        }

        let joined = clip
            .subtitles
            .iter()
            .find(|track| !track.segments.is_empty())
            .map(|track| {
                track
                    .segments
                    .iter()
                    .map(|segment| segment.text.trim())
                    .filter(|text| !text.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|text| !text.is_empty());

        Ok(joined)
    }
}

/// Renders subtitle clips with a single global style.
#[derive(Clone)]
pub struct SubtitleRenderer {
    style: AssStyle,
    resolver: Arc<dyn SubtitleTextResolver>,
}

impl Default for SubtitleRenderer {
    fn default() -> Self {
        Self::new(AssStyle::default())
    }
}

impl SubtitleRenderer {
    pub fn new(style: AssStyle) -> Self {
        Self {
            style,
            resolver: Arc::new(ClipTextResolver),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn SubtitleTextResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn style(&self) -> &AssStyle {
        &self.style
    }

    /// Dialogue entries for `clips` in start order. Clips without text, or
    /// whose text fails to resolve, are skipped.
    pub fn entries(&self, clips: &[ActiveClip<'_>]) -> Vec<SubtitleEntry> {
        let mut ordered: Vec<&Clip> = clips.iter().map(|active| active.clip).collect();
        ordered.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        ordered
            .into_iter()
            .filter_map(|clip| match self.resolver.resolve(clip) {
                Ok(Some(text)) => Some(SubtitleEntry {
                    clip_id: clip.clip_id.clone(),
                    start_secs: clip.start_time,
                    end_secs: clip.end_time(),
                    text,
                }),
                Ok(None) => {
                    tracing::warn!(clip_id = %clip.clip_id, "Subtitle clip has no text, skipping");
                    None
                }
                Err(err) => {
                    tracing::warn!(clip_id = %clip.clip_id, error = %err, "Failed to resolve subtitle text, skipping");
                    None
                }
            })
            .collect()
    }

    /// The ASS script for `clips`.
    pub fn render_ass(&self, clips: &[ActiveClip<'_>]) -> String {
        generate_ass(&self.entries(clips), &self.style)
    }

    /// Write the ASS script for `clips` to `path`. Returns `None` without
    /// writing anything when no clip has text.
    pub async fn render_styled_subtitles(
        &self,
        clips: &[ActiveClip<'_>],
        path: &Path,
    ) -> MontageResult<Option<CompositionArtifact>> {
        let entries = self.entries(clips);
        if entries.is_empty() {
            tracing::info!(clips = clips.len(), "No subtitle text to render");
            return Ok(None);
        }

        let script = generate_ass(&entries, &self.style);
        tokio::fs::write(path, script).await?;

        tracing::info!(entries = entries.len(), path = %path.display(), "Rendered subtitles");
        Ok(Some(CompositionArtifact::new(path, ArtifactKind::Subtitles)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_project_model::{SubtitleSegment, SubtitleTrack};

    fn segment(text: &str) -> SubtitleSegment {
        SubtitleSegment {
            id: None,
            start_time: 0.0,
            end_time: 1.0,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_subtitle_text_wins() {
        let mut clip = Clip::new("s", 0.0, 1.0);
        clip.subtitle_text = Some(" Hello ".to_string());
        clip.subtitles.push(SubtitleTrack {
            id: None,
            language: Some("en".to_string()),
            file_path: None,
            segments: vec![segment("ignored")],
        });
        assert_eq!(
            ClipTextResolver.resolve(&clip).unwrap(),
            Some("Hello".to_string())
        );
    }

    #[test]
    fn test_segments_are_joined() {
        let mut clip = Clip::new("s", 0.0, 1.0);
        clip.subtitles.push(SubtitleTrack {
            id: None,
            language: None,
            file_path: None,
            segments: vec![],
        });
        clip.subtitles.push(SubtitleTrack {
            id: None,
            language: Some("es".to_string()),
            file_path: None,
            segments: vec![segment("Hola"), segment(" "), segment("mundo")],
        });
        assert_eq!(
            ClipTextResolver.resolve(&clip).unwrap(),
            Some("Hola mundo".to_string())
        );
    }

    #[test]
    fn test_clip_without_text_resolves_to_none() {
        let mut clip = Clip::new("s", 0.0, 1.0);
        clip.subtitle_text = Some("   ".to_string());
        assert_eq!(ClipTextResolver.resolve(&clip).unwrap(), None);
    }
}
