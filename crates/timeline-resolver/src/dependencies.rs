//! Asset dependencies of a timeline.

use montage_project_model::{Timeline, TrackKind};

/// Ids and asset pointers a render of a timeline depends on. Every list
/// holds unique entries in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetDependencies {
    /// Clip ids on video tracks.
    pub videos: Vec<String>,
    /// Voice profile ids.
    pub voices: Vec<String>,
    /// Character ids.
    pub characters: Vec<String>,
    /// Clip ids on subtitle tracks.
    pub subtitles: Vec<String>,
    /// Audio asset pointers (`voiceOutputRef` and `audioTrack.filePath`).
    pub audio: Vec<String>,
}

impl AssetDependencies {
    pub fn collect(timeline: &Timeline) -> Self {
        let mut deps = Self::default();

        for track in &timeline.tracks {
            for clip in &track.clips {
                match track.kind {
                    TrackKind::Video => push_unique(&mut deps.videos, &clip.clip_id),
                    TrackKind::Subtitle => push_unique(&mut deps.subtitles, &clip.clip_id),
                    TrackKind::Audio => {}
                }
                if let Some(voice) = &clip.voice_id {
                    push_unique(&mut deps.voices, voice);
                }
                if let Some(character) = &clip.character_id {
                    push_unique(&mut deps.characters, character);
                }
                if let Some(output) = &clip.voice_output_ref {
                    push_unique(&mut deps.audio, output);
                }
                if let Some(audio) = &clip.audio_track {
                    push_unique(&mut deps.audio, &audio.file_path);
                }
            }
        }

        deps
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
            && self.voices.is_empty()
            && self.characters.is_empty()
            && self.subtitles.is_empty()
            && self.audio.is_empty()
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !list.iter().any(|existing| existing == value) {
        list.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_unique_dependencies_in_order() {
        let timeline = Timeline::from_json(
            r#"{"duration": 4, "fps": 10, "tracks": [
                {"type": "video", "clips": [
                    {"clipId": "v1", "startTime": 0, "duration": 2, "characterId": "hero"},
                    {"clipId": "v2", "startTime": 2, "duration": 2, "characterId": "hero"}
                ]},
                {"type": "audio", "clips": [
                    {"clipId": "a1", "startTime": 0, "duration": 1, "voiceId": "narrator",
                     "voiceOutputRef": "store://media/voice/a1.wav"},
                    {"clipId": "a2", "startTime": 1, "duration": 1, "voiceId": "narrator",
                     "audioTrack": {"filePath": "store://media/music.mp3"}}
                ]},
                {"type": "subtitle", "clips": [
                    {"clipId": "s1", "startTime": 0, "duration": 1}
                ]}
            ]}"#,
        )
        .unwrap();

        let deps = AssetDependencies::collect(&timeline);
        assert_eq!(deps.videos, vec!["v1", "v2"]);
        assert_eq!(deps.characters, vec!["hero"]);
        assert_eq!(deps.voices, vec!["narrator"]);
        assert_eq!(deps.subtitles, vec!["s1"]);
        assert_eq!(
            deps.audio,
            vec!["store://media/voice/a1.wav", "store://media/music.mp3"]
        );
    }

    #[test]
    fn test_empty_timeline_has_no_dependencies() {
        assert!(AssetDependencies::collect(&Timeline::new(1.0, 30.0)).is_empty());
    }
}
