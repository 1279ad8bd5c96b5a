use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use montage_common::config::AppConfig;
use montage_common::error::{MontageError, MontageResult};
use montage_common::media::{FfmpegInvocation, MediaBackend, ProgressFn};
use montage_project_model::{JobStage, JobStatus, JobStatusUpdate, RenderRequest, Resolution};
use montage_render_engine::{ChannelStatusSink, LocalObjectStore, Renderer};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

const PLACEHOLDER: &[u8] = b"rendered-bytes";

/// Writes a placeholder for every output instead of running ffmpeg.
#[derive(Default)]
struct FakeBackend {
    runs: Mutex<Vec<FfmpegInvocation>>,
    fail_thumbnail: bool,
    fail_probe: bool,
    block_transcode: bool,
    probed_secs: Option<f64>,
}

#[async_trait]
impl MediaBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn run(
        &self,
        invocation: &FfmpegInvocation,
        cancel: &CancellationToken,
        progress: Option<ProgressFn<'_>>,
    ) -> MontageResult<()> {
        if cancel.is_cancelled() {
            return Err(MontageError::Cancelled);
        }
        self.runs.lock().unwrap().push(invocation.clone());

        let output = invocation.output().unwrap_or_default().to_string();
        if output.ends_with(".mp4") && self.block_transcode {
            cancel.cancelled().await;
            return Err(MontageError::Cancelled);
        }
        if output.ends_with(".jpg") && self.fail_thumbnail {
            return Err(MontageError::external_process("thumbnail seek failed"));
        }
        if let Some(cb) = progress {
            cb(1.0);
        }
        std::fs::write(&output, PLACEHOLDER)?;
        Ok(())
    }

    async fn probe_duration(&self, _path: &Path) -> MontageResult<f64> {
        if self.fail_probe {
            Err(MontageError::external_process("ffprobe missing"))
        } else {
            Ok(self.probed_secs.unwrap_or(2.0))
        }
    }
}

struct Harness {
    store_root: tempfile::TempDir,
    workspace_root: tempfile::TempDir,
    backend: Arc<FakeBackend>,
    renderer: Renderer,
    updates: UnboundedReceiver<JobStatusUpdate>,
}

impl Harness {
    fn new(backend: FakeBackend) -> Self {
        let store_root = tempfile::tempdir().unwrap();
        let workspace_root = tempfile::tempdir().unwrap();
        put(store_root.path(), "media/main.mp4");
        put(store_root.path(), "media/voice.wav");

        let mut config = AppConfig::default();
        config.workspace_dir = workspace_root.path().to_path_buf();

        let backend = Arc::new(backend);
        let (sink, updates) = ChannelStatusSink::new();
        let renderer = Renderer::new(
            Arc::new(LocalObjectStore::new(store_root.path(), "renders")),
            Arc::new(sink),
            backend.clone(),
            config,
        );

        Self {
            store_root,
            workspace_root,
            backend,
            renderer,
            updates,
        }
    }

    fn drain(&mut self) -> Vec<JobStatusUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = self.updates.try_recv() {
            updates.push(update);
        }
        updates
    }

    fn published(&self) -> PathBuf {
        self.store_root.path().join("renders")
    }

    fn invocation_ending_with(&self, suffix: &str) -> Option<FfmpegInvocation> {
        self.backend
            .runs
            .lock()
            .unwrap()
            .iter()
            .find(|inv| inv.output().is_some_and(|out| out.ends_with(suffix)))
            .cloned()
    }
}

fn put(root: &Path, key: &str) {
    let path = root.join(key);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"source").unwrap();
}

fn request(timeline: serde_json::Value, extra: serde_json::Value) -> RenderRequest {
    let mut input = serde_json::json!({
        "projectId": "p1",
        "userId": "u1",
        "format": "9:16",
        "timeline": timeline,
    });
    if let (Some(input), Some(extra)) = (input.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            input.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(serde_json::json!({
        "jobId": "job-1",
        "type": "render",
        "input": input,
    }))
    .unwrap()
}

fn scenario() -> serde_json::Value {
    serde_json::json!({
        "duration": 2.0,
        "fps": 10,
        "tracks": [
            {"type": "video", "clips": [
                {"clipId": "main", "startTime": 0, "duration": 2, "sourceRef": "store://media/main.mp4"}
            ]},
            {"type": "audio", "volume": 0.5, "clips": [
                {"clipId": "voice", "startTime": 0.5, "duration": 0.5,
                 "audioTrack": {"filePath": "store://media/voice.wav"}}
            ]},
            {"type": "subtitle", "clips": [
                {"clipId": "caption", "startTime": 0, "duration": 1, "subtitleText": "Hello"}
            ]}
        ]
    })
}

#[tokio::test]
async fn render_publishes_video_and_thumbnail() {
    let mut harness = Harness::new(FakeBackend::default());
    let output = harness
        .renderer
        .run(
            &request(scenario(), serde_json::json!({})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        output.file_path,
        "store://renders/users/u1/projects/p1/renders/job-1.mp4"
    );
    assert_eq!(
        output.thumbnail_path.as_deref(),
        Some("store://renders/users/u1/projects/p1/thumbnails/job-1.jpg")
    );
    assert_eq!(output.duration, 2.0);
    assert_eq!(output.file_size, PLACEHOLDER.len() as u64);
    assert_eq!(output.resolution, Resolution::new(1080, 1920));
    assert!(harness
        .published()
        .join("users/u1/projects/p1/renders/job-1.mp4")
        .is_file());

    let updates = harness.drain();
    let progress: Vec<u8> = updates.iter().map(|u| u.progress).collect();
    assert_eq!(progress, vec![10, 30, 50, 70, 90, 100]);
    let last = updates.last().unwrap();
    assert_eq!(last.status, JobStatus::Completed);
    assert_eq!(last.output.as_ref(), Some(&output));
}

#[tokio::test]
async fn render_wires_audio_subtitles_and_scaling() {
    let harness = Harness::new(FakeBackend::default());
    harness
        .renderer
        .run(
            &request(scenario(), serde_json::json!({"quality": "high"})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let audio = harness.invocation_ending_with("audio.aac").unwrap();
    let audio_graph = audio.args.join(" ");
    assert!(audio_graph.contains("adelay=500|500"), "{audio_graph}");
    assert!(audio_graph.contains("volume=-10.00dB"), "{audio_graph}");

    let transcode = harness.invocation_ending_with("output.mp4").unwrap();
    let args = transcode.args.join(" ");
    assert!(args.contains("scale=1080:1920:force_original_aspect_ratio=decrease"));
    assert!(args.contains("fps=10"));
    assert!(args.contains("subtitles='"), "{args}");
    assert!(args.contains("-crf 18"));
    assert!(args.contains("-t 2.000000"));
}

#[tokio::test]
async fn workspace_is_cleaned_up() {
    let harness = Harness::new(FakeBackend::default());
    harness
        .renderer
        .run(
            &request(scenario(), serde_json::json!({})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let leftovers = std::fs::read_dir(harness.workspace_root.path())
        .unwrap()
        .count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn timeline_without_video_fails_with_configuration_error() {
    let mut harness = Harness::new(FakeBackend::default());
    let timeline = serde_json::json!({
        "duration": 1.0, "fps": 10,
        "tracks": [{"type": "audio", "clips": [{"clipId": "a", "startTime": 0, "duration": 1}]}]
    });

    let err = harness
        .renderer
        .run(
            &request(timeline, serde_json::json!({})),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "configuration");

    let updates = harness.drain();
    assert_eq!(updates.len(), 2);
    let failed = &updates[1];
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.progress, 10);
    assert!(failed.output.is_none());
    assert!(failed.error.as_deref().unwrap().contains("no video clips"));
    assert!(!harness.published().exists());
}

#[tokio::test]
async fn overlapping_video_clips_fail_the_job() {
    let harness = Harness::new(FakeBackend::default());
    let timeline = serde_json::json!({
        "duration": 2.0, "fps": 10,
        "tracks": [{"type": "video", "clips": [
            {"clipId": "a", "startTime": 0, "duration": 1.5, "sourceRef": "store://media/main.mp4"},
            {"clipId": "b", "startTime": 1.0, "duration": 1.0, "sourceRef": "store://media/main.mp4"}
        ]}]
    });

    let err = harness
        .renderer
        .run(
            &request(timeline, serde_json::json!({})),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "configuration");
    assert!(err.to_string().contains("frame 10"), "{err}");
}

#[tokio::test]
async fn missing_video_source_is_asset_resolution_error() {
    let harness = Harness::new(FakeBackend::default());
    let timeline = serde_json::json!({
        "duration": 1.0, "fps": 10,
        "tracks": [{"type": "video", "clips": [
            {"clipId": "a", "startTime": 0, "duration": 1, "sourceRef": "store://media/missing.mp4"}
        ]}]
    });

    let err = harness
        .renderer
        .run(
            &request(timeline, serde_json::json!({})),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "asset_resolution");
    assert!(harness.backend.runs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_audio_asset_is_dropped() {
    let harness = Harness::new(FakeBackend::default());
    std::fs::remove_file(harness.store_root.path().join("media/voice.wav")).unwrap();

    harness
        .renderer
        .run(
            &request(scenario(), serde_json::json!({})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let audio = harness.invocation_ending_with("audio.aac").unwrap();
    assert!(audio.args.iter().any(|arg| arg.starts_with("anullsrc=")));
}

#[tokio::test]
async fn thumbnail_failure_does_not_fail_the_render() {
    let harness = Harness::new(FakeBackend {
        fail_thumbnail: true,
        ..Default::default()
    });
    let output = harness
        .renderer
        .run(
            &request(scenario(), serde_json::json!({})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(output.thumbnail_path.is_none());
    assert!(!harness.published().join("users/u1/projects/p1/thumbnails").exists());
}

#[tokio::test]
async fn probe_failure_falls_back_to_frame_count() {
    let harness = Harness::new(FakeBackend {
        fail_probe: true,
        ..Default::default()
    });
    let timeline = serde_json::json!({
        "duration": 1.25, "fps": 10,
        "tracks": [{"type": "video", "clips": [
            {"clipId": "a", "startTime": 0, "duration": 1.25, "sourceRef": "store://media/main.mp4"}
        ]}]
    });

    let output = harness
        .renderer
        .run(
            &request(timeline, serde_json::json!({})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!((output.duration - 1.2).abs() < 1e-9);
}

#[tokio::test]
async fn thumbnail_offset_follows_the_probed_output_length() {
    let harness = Harness::new(FakeBackend {
        probed_secs: Some(0.8),
        ..Default::default()
    });

    let output = harness
        .renderer
        .run(
            &request(scenario(), serde_json::json!({})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(output.duration, 0.8);

    let thumbnail = harness.invocation_ending_with(".jpg").unwrap();
    assert_eq!(&thumbnail.args[..2], ["-ss", "0.400"]);
}

#[tokio::test]
async fn cancelling_a_spawned_job_stops_the_transcode() {
    let mut harness = Harness::new(FakeBackend {
        block_transcode: true,
        ..Default::default()
    });
    let handle = harness
        .renderer
        .spawn(request(scenario(), serde_json::json!({})));
    assert_eq!(handle.job_id(), "job-1");

    loop {
        let update = harness.updates.recv().await.unwrap();
        if update.stage == JobStage::Transcoding {
            break;
        }
    }
    handle.cancel();

    let err = handle.wait().await.unwrap_err();
    assert!(matches!(err, MontageError::Cancelled));

    let failed = harness.updates.recv().await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.progress, 70);
    assert!(!harness.published().exists());
}

#[tokio::test]
async fn cancelled_before_start_reports_failure() {
    let mut harness = Harness::new(FakeBackend::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = harness
        .renderer
        .run(&request(scenario(), serde_json::json!({})), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, MontageError::Cancelled));

    let updates = harness.drain();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].status, JobStatus::Failed);
    assert_eq!(updates[0].progress, 0);
}
