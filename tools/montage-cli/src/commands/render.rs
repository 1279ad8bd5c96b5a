//! Run a render job against a local object store.

use std::path::PathBuf;
use std::sync::Arc;

use montage_common::config::AppConfig;
use montage_common::media::{FfmpegBackend, MediaBackend};
use montage_project_model::{JobStatus, RenderRequest};
use montage_render_engine::{ChannelStatusSink, LocalObjectStore, Renderer, RetryingStore};

pub async fn run(
    request_path: PathBuf,
    store_root: Option<PathBuf>,
    bucket: Option<String>,
    mut config: AppConfig,
) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(&request_path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", request_path.display()))?;
    let request = RenderRequest::from_json(&json)
        .map_err(|e| anyhow::anyhow!("Invalid render request: {e}"))?;

    if let Some(root) = store_root {
        config.store.root = root;
    }
    if let Some(bucket) = bucket {
        config.store.bucket = bucket;
    }

    let media = Arc::new(FfmpegBackend::from_defaults(&config.render));
    let lookup = Arc::clone(&media);
    if !tokio::task::spawn_blocking(move || lookup.is_available()).await? {
        return Err(anyhow::anyhow!(
            "ffmpeg/ffprobe not found (expected '{}' and '{}')",
            config.render.ffmpeg_path,
            config.render.ffprobe_path
        ));
    }

    let store = RetryingStore::new(
        LocalObjectStore::new(&config.store.root, &config.store.bucket),
        config.store.retry,
    );
    let (sink, mut updates) = ChannelStatusSink::new();
    let renderer = Renderer::new(Arc::new(store), Arc::new(sink), media, config);

    println!("Rendering job: {}", request.job_id);
    let handle = renderer.spawn(request);
    let cancel = handle.cancellation_token();

    let printer = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            match update.status {
                JobStatus::Processing => {
                    println!("  [{:>3}%] {}", update.progress, update.stage)
                }
                JobStatus::Completed => println!("  [100%] completed"),
                JobStatus::Failed => println!(
                    "  [{:>3}%] failed: {}",
                    update.progress,
                    update.error.as_deref().unwrap_or_default()
                ),
            }
        }
    });

    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling render");
            cancel.cancel();
        }
    });

    let result = handle.wait().await;
    ctrl_c.abort();
    drop(renderer);
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "Status printer stopped unexpectedly");
    }

    let output = result.map_err(|e| anyhow::anyhow!("Render failed: {e}"))?;
    println!("\nRender complete:");
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
