//! Render job orchestration.
//!
//! [`Renderer::run`] drives one job through the stage machine:
//!
//! ```text
//! resolving → composing-audio → rendering-subtitles → transcoding
//!           → extracting-thumbnail → completed
//! ```
//!
//! Every stage entry is reported to the [`JobStatusSink`]. Any error aborts
//! the job with a single `failed` update and nothing is published; the only
//! lenient step is the thumbnail.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use montage_audio::{AudioComposer, ClipAttachmentResolver};
use montage_common::config::AppConfig;
use montage_common::error::{MontageError, MontageResult};
use montage_common::media::MediaBackend;
use montage_project_model::{
    ArtifactCategory, ArtifactKey, AssetRef, JobProgress, JobStage, JobStatusUpdate, RenderOutput,
    RenderRequest, Timeline, TrackKind,
};
use montage_subtitles::{AssStyle, SubtitleRenderer};
use montage_timeline_resolver::{ActiveClip, TimelineResolver};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::sequencer::{ClipSequencer, SingleSourceSequencer, VideoSource};
use crate::status::JobStatusSink;
use crate::store::ObjectStore;
use crate::transcode::{thumbnail_invocation, thumbnail_offset, EncodeSettings, TranscodePlan};
use crate::transform::{unique_transformations, PassthroughTransformations, TransformationApplier};
use crate::workspace::JobWorkspace;

/// Executes render jobs against a store, a status sink and a media backend.
#[derive(Clone)]
pub struct Renderer {
    store: Arc<dyn ObjectStore>,
    status: Arc<dyn JobStatusSink>,
    media: Arc<dyn MediaBackend>,
    config: AppConfig,
    sequencer: Arc<dyn ClipSequencer>,
    transformations: Arc<dyn TransformationApplier>,
}

impl Renderer {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        status: Arc<dyn JobStatusSink>,
        media: Arc<dyn MediaBackend>,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            status,
            media,
            config,
            sequencer: Arc::new(SingleSourceSequencer),
            transformations: Arc::new(PassthroughTransformations),
        }
    }

    pub fn with_sequencer(mut self, sequencer: Arc<dyn ClipSequencer>) -> Self {
        self.sequencer = sequencer;
        self
    }

    pub fn with_transformations(mut self, transformations: Arc<dyn TransformationApplier>) -> Self {
        self.transformations = transformations;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run `request` on a background task. The returned handle owns the
    /// job's cancellation token.
    pub fn spawn(&self, request: RenderRequest) -> RenderHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let job_id = request.job_id.clone();
        let renderer = self.clone();
        let task = tokio::spawn(async move { renderer.run(&request, &token).await });

        RenderHandle {
            job_id,
            cancel,
            task,
        }
    }

    /// Execute one render job to completion or failure.
    pub async fn run(
        &self,
        request: &RenderRequest,
        cancel: &CancellationToken,
    ) -> MontageResult<RenderOutput> {
        let span = tracing::info_span!("render", job_id = %request.job_id);
        let mut tracker = StageTracker::new(&request.job_id, self.status.as_ref());

        let result = async {
            let output = self.execute(request, cancel, &mut tracker).await?;
            tracker.complete(output.clone()).await?;
            Ok::<_, MontageError>(output)
        }
        .instrument(span.clone())
        .await;

        if let Err(err) = &result {
            tracker.fail(err).instrument(span).await;
        }
        result
    }

    async fn execute(
        &self,
        request: &RenderRequest,
        cancel: &CancellationToken,
        tracker: &mut StageTracker<'_>,
    ) -> MontageResult<RenderOutput> {
        let started = std::time::Instant::now();

        tracker.enter(JobStage::Resolving, cancel).await?;
        request.validate()?;
        let input = &request.input;
        let resolution = input.target_resolution()?;
        let timeline = Timeline::from_value(input.timeline.clone())?;
        let resolved = TimelineResolver::new().resolve(&timeline)?;
        tracing::info!(
            frames = resolved.total_frames,
            fps = resolved.fps,
            resolution = %resolution,
            "Resolved timeline"
        );

        let candidates = resolved.video_sources();
        if candidates.is_empty() {
            return Err(MontageError::configuration("Timeline has no video clips"));
        }

        let workspace = JobWorkspace::create(&self.config.workspace_dir, &request.job_id).await?;
        let selected = self.sequencer.select(&candidates);
        let mut sources = Vec::with_capacity(selected.len());
        for (index, active) in selected.into_iter().enumerate() {
            sources.push(self.fetch_video(active, index, &workspace, cancel).await?);
        }
        let video = self.sequencer.sequence(&sources)?;

        tracker.enter(JobStage::ComposingAudio, cancel).await?;
        let audio_clips = resolved.unique_clips(TrackKind::Audio);
        let audio_resolver = self
            .fetch_audio(&audio_clips, sources.len(), &workspace, cancel)
            .await?;
        let audio = AudioComposer::from_defaults(&self.config.render)
            .compose(
                &audio_clips,
                &audio_resolver,
                &workspace.audio_path(),
                self.media.as_ref(),
                cancel,
            )
            .await?;

        tracker.enter(JobStage::RenderingSubtitles, cancel).await?;
        let subtitle_clips = resolved.unique_clips(TrackKind::Subtitle);
        let subtitles = SubtitleRenderer::new(AssStyle::from_config(&self.config.subtitles))
            .render_styled_subtitles(&subtitle_clips, &workspace.subtitles_path())
            .await?;

        tracker.enter(JobStage::Transcoding, cancel).await?;
        let transformations = unique_transformations(&resolved.frames);
        let extra_video_filters = self.transformations.video_filters(&transformations)?;
        let defaults = &self.config.render;
        let plan = TranscodePlan {
            video,
            audio: audio.path,
            subtitles: subtitles.map(|artifact| artifact.path),
            output: workspace.output_path(),
            resolution,
            fps: timeline.fps,
            duration_secs: timeline.duration_secs,
            extra_video_filters,
            encode: EncodeSettings {
                crf: input
                    .quality
                    .and_then(|quality| quality.crf_override())
                    .unwrap_or(defaults.crf),
                preset: defaults.preset.clone(),
                audio_bitrate_kbps: defaults.audio_bitrate_kbps,
                audio_sample_rate: defaults.audio_sample_rate,
            },
        };
        let job_id = request.job_id.as_str();
        let on_progress = move |fraction: f64| {
            tracing::debug!(job_id, percent = (fraction * 100.0).round() as u32, "Transcoding");
        };
        self.media
            .run(&plan.invocation(), cancel, Some(&on_progress))
            .await?;

        tracker.enter(JobStage::ExtractingThumbnail, cancel).await?;
        let duration = match self.media.probe_duration(&plan.output).await {
            Ok(duration) => duration,
            Err(err) => {
                let fallback = resolved.total_frames as f64 / timeline.fps;
                tracing::warn!(error = %err, fallback_secs = fallback, "Failed to probe output duration");
                fallback
            }
        };
        let thumbnail = self
            .extract_thumbnail(&plan.output, &workspace, duration, cancel)
            .await?;
        let file_size = tokio::fs::metadata(&plan.output).await?.len();

        if cancel.is_cancelled() {
            return Err(MontageError::Cancelled);
        }

        let video_key = ArtifactKey::new(
            &input.user_id,
            Some(input.project_id.as_str()),
            ArtifactCategory::Renders,
            &format!("{job_id}.mp4"),
        );
        let video_ref = self.store.publish(&plan.output, &video_key).await?;

        let thumbnail_ref = match thumbnail {
            Some(path) => {
                let key = ArtifactKey::new(
                    &input.user_id,
                    Some(input.project_id.as_str()),
                    ArtifactCategory::Thumbnails,
                    &format!("{job_id}.jpg"),
                );
                match self.store.publish(&path, &key).await {
                    Ok(asset) => Some(asset.to_string()),
                    Err(err) => {
                        tracing::warn!(error = %err, "Failed to publish thumbnail");
                        None
                    }
                }
            }
            None => None,
        };

        tracing::info!(
            output = %video_ref,
            duration_secs = duration,
            file_size,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Render finished"
        );

        Ok(RenderOutput {
            file_path: video_ref.to_string(),
            thumbnail_path: thumbnail_ref,
            duration,
            file_size,
            format: input.format,
            resolution,
            watermark: input.watermark,
        })
    }

    async fn fetch_video(
        &self,
        active: &ActiveClip<'_>,
        index: usize,
        workspace: &JobWorkspace,
        cancel: &CancellationToken,
    ) -> MontageResult<VideoSource> {
        let clip = active.clip;
        let pointer = clip
            .source_ref
            .as_deref()
            .filter(|pointer| !pointer.trim().is_empty())
            .ok_or_else(|| {
                MontageError::asset_resolution(format!(
                    "video clip {} has no sourceRef",
                    clip.clip_id
                ))
            })?;
        let asset = AssetRef::parse(pointer)
            .map_err(|err| MontageError::asset_resolution(err.to_string()))?;

        let path = workspace.asset_path(index, &asset);
        self.fetch(&asset, &path, cancel).await?;

        Ok(VideoSource {
            clip_id: clip.clip_id.clone(),
            path,
            start_secs: clip.start_time,
            duration_secs: clip.duration,
            source_start_secs: clip.source_start_time,
            source_end_secs: clip.source_end_time,
        })
    }

    /// Fetch the audio attachments of `clips`. Failed fetches only drop the
    /// attachment; the composer then skips the clip.
    async fn fetch_audio(
        &self,
        clips: &[ActiveClip<'_>],
        first_index: usize,
        workspace: &JobWorkspace,
        cancel: &CancellationToken,
    ) -> MontageResult<ClipAttachmentResolver> {
        let mut resolver = ClipAttachmentResolver::new();
        let mut seen = HashSet::new();
        let mut index = first_index;

        for active in clips.iter().filter(|active| !active.track.muted) {
            for pointer in ClipAttachmentResolver::attachments(active.clip) {
                if !pointer.starts_with("store://") || !seen.insert(pointer) {
                    continue;
                }
                let asset = match AssetRef::parse(pointer) {
                    Ok(asset) => asset,
                    Err(err) => {
                        tracing::warn!(clip_id = %active.clip.clip_id, error = %err, "Skipping malformed audio reference");
                        continue;
                    }
                };

                let path = workspace.asset_path(index, &asset);
                index += 1;
                match self.fetch(&asset, &path, cancel).await {
                    Ok(()) => resolver.insert(pointer, path),
                    Err(MontageError::Cancelled) => return Err(MontageError::Cancelled),
                    Err(err) => {
                        tracing::warn!(clip_id = %active.clip.clip_id, asset = %asset, error = %err, "Failed to fetch audio, dropping it");
                    }
                }
            }
        }

        Ok(resolver)
    }

    async fn fetch(
        &self,
        asset: &AssetRef,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> MontageResult<()> {
        tokio::select! {
            _ = cancel.cancelled() => Err(MontageError::Cancelled),
            result = self.store.fetch(asset, dest) => result,
        }
    }

    /// Grab the thumbnail frame. Only cancellation is an error here.
    async fn extract_thumbnail(
        &self,
        video: &Path,
        workspace: &JobWorkspace,
        duration_secs: f64,
        cancel: &CancellationToken,
    ) -> MontageResult<Option<PathBuf>> {
        let path = workspace.thumbnail_path();
        let offset = thumbnail_offset(self.config.render.thumbnail_offset_secs, duration_secs);
        let invocation = thumbnail_invocation(video, &path, offset);

        match self.media.run(&invocation, cancel, None).await {
            Ok(()) if path.is_file() => Ok(Some(path)),
            Ok(()) => {
                tracing::warn!(offset_secs = offset, "Thumbnail extraction produced no file");
                Ok(None)
            }
            Err(MontageError::Cancelled) => Err(MontageError::Cancelled),
            Err(err) => {
                tracing::warn!(error = %err, "Thumbnail extraction failed");
                Ok(None)
            }
        }
    }
}

/// Handle to a spawned render job.
#[derive(Debug)]
pub struct RenderHandle {
    job_id: String,
    cancel: CancellationToken,
    task: JoinHandle<MontageResult<RenderOutput>>,
}

impl RenderHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Request cancellation. A running transcode is terminated.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the job to finish.
    pub async fn wait(self) -> MontageResult<RenderOutput> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(MontageError::Other(anyhow::anyhow!(
                "render task for job {} did not finish: {err}",
                self.job_id
            ))),
        }
    }
}

/// Walks a job through its stages and reports each one.
struct StageTracker<'a> {
    job_id: &'a str,
    progress: JobProgress,
    sink: &'a dyn JobStatusSink,
}

impl<'a> StageTracker<'a> {
    fn new(job_id: &'a str, sink: &'a dyn JobStatusSink) -> Self {
        Self {
            job_id,
            progress: JobProgress::new(),
            sink,
        }
    }

    async fn enter(&mut self, stage: JobStage, cancel: &CancellationToken) -> MontageResult<()> {
        if cancel.is_cancelled() {
            return Err(MontageError::Cancelled);
        }
        let progress = self.progress.advance(stage)?;
        tracing::info!(stage = %stage, progress, "Entering stage");
        self.report(JobStatusUpdate::stage(self.job_id, stage, progress))
            .await;
        Ok(())
    }

    async fn complete(&mut self, output: RenderOutput) -> MontageResult<()> {
        self.progress.advance(JobStage::Completed)?;
        self.report(JobStatusUpdate::completed(self.job_id, output))
            .await;
        Ok(())
    }

    async fn fail(&mut self, err: &MontageError) {
        if self.progress.stage().is_terminal() {
            return;
        }
        let progress = match self.progress.advance(JobStage::Failed) {
            Ok(progress) => progress,
            Err(_) => self.progress.progress(),
        };
        tracing::error!(kind = err.kind(), error = %err, progress, "Render job failed");
        self.report(JobStatusUpdate::failed(self.job_id, progress, err.to_string()))
            .await;
    }

    async fn report(&self, update: JobStatusUpdate) {
        if let Err(err) = self.sink.report(&update).await {
            tracing::warn!(stage = %update.stage, error = %err, "Failed to report job status");
        }
    }
}
