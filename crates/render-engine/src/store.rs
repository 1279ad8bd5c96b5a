//! Object store access for source assets and published artifacts.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use montage_common::config::RetryPolicy;
use montage_common::error::{MontageError, MontageResult};
use montage_project_model::{ArtifactKey, AssetRef};

/// Trait for object stores.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn name(&self) -> &str;

    /// Copy the object behind `asset` to the local file `dest`.
    async fn fetch(&self, asset: &AssetRef, dest: &Path) -> MontageResult<()>;

    /// Upload `src` under `key` and return its address.
    async fn publish(&self, src: &Path, key: &ArtifactKey) -> MontageResult<AssetRef>;
}

/// Object store backed by a local directory: `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    publish_bucket: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, publish_bucket: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            publish_bucket: publish_bucket.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path of an object.
    pub fn object_path(&self, asset: &AssetRef) -> PathBuf {
        let mut path = self.root.join(&asset.bucket);
        for segment in asset.key.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn fetch(&self, asset: &AssetRef, dest: &Path) -> MontageResult<()> {
        let src = self.object_path(asset);
        match tokio::fs::copy(&src, dest).await {
            Ok(bytes) => {
                tracing::debug!(asset = %asset, bytes, dest = %dest.display(), "Fetched asset");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Err(MontageError::asset_resolution(
                format!("{asset} does not exist"),
            )),
            Err(err) => Err(MontageError::transient_io(format!(
                "Failed to fetch {asset}: {err}"
            ))),
        }
    }

    async fn publish(&self, src: &Path, key: &ArtifactKey) -> MontageResult<AssetRef> {
        let asset = AssetRef::new(&self.publish_bucket, key.as_str());
        let dest = self.object_path(&asset);
        let io_err =
            |err: std::io::Error| MontageError::transient_io(format!("Failed to publish {asset}: {err}"));

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        // Copy next to the destination, then rename into place.
        let partial = dest.with_extension("partial");
        tokio::fs::copy(src, &partial).await.map_err(io_err)?;
        tokio::fs::rename(&partial, &dest).await.map_err(io_err)?;

        tracing::debug!(asset = %asset, "Published artifact");
        Ok(asset)
    }
}

/// Retries transient failures of another store with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: ObjectStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.policy.initial_backoff_ms.saturating_mul(factor))
    }

    fn should_retry(&self, err: &MontageError, attempt: u32) -> bool {
        err.is_transient() && attempt < self.policy.max_attempts.max(1)
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for RetryingStore<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch(&self, asset: &AssetRef, dest: &Path) -> MontageResult<()> {
        let mut attempt = 1;
        loop {
            match self.inner.fetch(asset, dest).await {
                Err(err) if self.should_retry(&err, attempt) => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(asset = %asset, attempt, delay_ms = delay.as_millis() as u64, error = %err, "Fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn publish(&self, src: &Path, key: &ArtifactKey) -> MontageResult<AssetRef> {
        let mut attempt = 1;
        loop {
            match self.inner.publish(src, key).await {
                Err(err) if self.should_retry(&err, attempt) => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(key = %key, attempt, delay_ms = delay.as_millis() as u64, error = %err, "Publish failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
