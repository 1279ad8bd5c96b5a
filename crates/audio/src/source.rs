//! Audio source resolution for clips.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use montage_common::error::{MontageError, MontageResult};
use montage_project_model::Clip;

/// Finds the playable audio file for a clip.
///
/// `Ok(None)` means the clip carries no audio attachment at all; `Err` means
/// it has one that could not be turned into a local file.
pub trait AudioSourceResolver: Send + Sync {
    fn resolve(&self, clip: &Clip) -> MontageResult<Option<PathBuf>>;
}

/// Resolves a clip's attachments against assets already fetched locally.
///
/// The voice-clone output (`voiceOutputRef`) wins over the static
/// `audioTrack.filePath`. Pointers that are not `store://` addresses are
/// treated as local paths and used when the file exists.
#[derive(Debug, Clone, Default)]
pub struct ClipAttachmentResolver {
    fetched: HashMap<String, PathBuf>,
}

impl ClipAttachmentResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record where the asset behind `pointer` was fetched to.
    pub fn insert(&mut self, pointer: impl Into<String>, local: impl Into<PathBuf>) {
        self.fetched.insert(pointer.into(), local.into());
    }

    /// Attachment pointers of a clip, in preference order.
    pub fn attachments(clip: &Clip) -> impl Iterator<Item = &str> {
        clip.voice_output_ref
            .as_deref()
            .into_iter()
            .chain(clip.audio_track.as_ref().map(|a| a.file_path.as_str()))
            .filter(|pointer| !pointer.trim().is_empty())
    }

    fn lookup(&self, pointer: &str) -> Option<PathBuf> {
        if let Some(local) = self.fetched.get(pointer) {
            return Some(local.clone());
        }
        if pointer.starts_with("store://") {
            return None;
        }
        let path = Path::new(pointer);
        path.is_file().then(|| path.to_path_buf())
    }
}

impl AudioSourceResolver for ClipAttachmentResolver {
    fn resolve(&self, clip: &Clip) -> MontageResult<Option<PathBuf>> {
        let mut unresolved = Vec::new();
        for pointer in Self::attachments(clip) {
            match self.lookup(pointer) {
                Some(path) => return Ok(Some(path)),
                None => unresolved.push(pointer),
            }
        }

        if unresolved.is_empty() {
            Ok(None)
        } else {
            Err(MontageError::asset_resolution(format!(
                "audio for clip {} is not available locally: {}",
                clip.clip_id,
                unresolved.join(", ")
            )))
        }
    }
}
