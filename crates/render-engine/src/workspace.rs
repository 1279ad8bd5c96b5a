//! Per-job scratch directory.

use std::path::{Path, PathBuf};

use montage_common::error::{MontageError, MontageResult};
use montage_project_model::AssetRef;

/// Private directory holding one job's intermediate files. Removed when
/// dropped.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: tempfile::TempDir,
}

impl JobWorkspace {
    /// Create a fresh workspace for `job_id` under `parent`. The directory
    /// setup runs on the blocking pool.
    pub async fn create(parent: &Path, job_id: &str) -> MontageResult<Self> {
        let parent = parent.to_path_buf();
        let prefix = format!("montage-{}-", sanitize(job_id));
        let dir = tokio::task::spawn_blocking(move || -> std::io::Result<tempfile::TempDir> {
            std::fs::create_dir_all(&parent)?;
            let dir = tempfile::Builder::new().prefix(&prefix).tempdir_in(&parent)?;
            std::fs::create_dir(dir.path().join("assets"))?;
            Ok(dir)
        })
        .await
        .map_err(|e| MontageError::Other(anyhow::Error::new(e)))??;

        tracing::debug!(path = %dir.path().display(), "Created job workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Local destination for a fetched asset. `index` keeps assets with the
    /// same file name apart.
    pub fn asset_path(&self, index: usize, asset: &AssetRef) -> PathBuf {
        self.dir
            .path()
            .join("assets")
            .join(format!("{index:03}-{}", sanitize(asset.file_name())))
    }

    pub fn audio_path(&self) -> PathBuf {
        self.dir.path().join("audio.aac")
    }

    pub fn subtitles_path(&self) -> PathBuf {
        self.dir.path().join("subtitles.ass")
    }

    pub fn output_path(&self) -> PathBuf {
        self.dir.path().join("output.mp4")
    }

    pub fn thumbnail_path(&self) -> PathBuf {
        self.dir.path().join("thumbnail.jpg")
    }
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "asset".to_string()
    } else {
        cleaned
    }
}
