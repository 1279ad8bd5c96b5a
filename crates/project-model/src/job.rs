//! Render job contracts and the job state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::resolution::{Resolution, VideoFormat};

/// The only job type this worker accepts.
pub const RENDER_JOB_TYPE: &str = "render";

/// User id recorded when a request carries none.
pub const UNKNOWN_USER: &str = "unknown";

/// A render job handed to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    pub job_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub input: RenderInput,
}

/// Payload of a render job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderInput {
    pub project_id: String,

    /// Raw timeline; parsed and validated when the job starts resolving.
    pub timeline: serde_json::Value,

    #[serde(default)]
    pub format: VideoFormat,

    /// `"<W>x<H>"`; the format's default resolution when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,

    #[serde(default)]
    pub watermark: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<RenderQuality>,

    #[serde(default = "default_user")]
    pub user_id: String,
}

fn default_user() -> String {
    UNKNOWN_USER.to_string()
}

/// Requested encode quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderQuality {
    Low,
    Medium,
    High,
}

impl RenderQuality {
    /// CRF to use instead of the configured default, if any.
    pub fn crf_override(self) -> Option<u32> {
        match self {
            RenderQuality::Low => Some(28),
            RenderQuality::Medium => None,
            RenderQuality::High => Some(18),
        }
    }
}

impl RenderRequest {
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let request: Self = serde_json::from_str(json)?;
        request.validate()?;
        Ok(request)
    }

    /// Reject requests that are not render jobs or lack identifiers.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.kind != RENDER_JOB_TYPE {
            return Err(ModelError::invalid_field(
                "type",
                format!("unsupported job type '{}'", self.kind),
            ));
        }
        if self.job_id.trim().is_empty() {
            return Err(ModelError::invalid_field("jobId", "must not be empty"));
        }
        if self.input.project_id.trim().is_empty() {
            return Err(ModelError::invalid_field("projectId", "must not be empty"));
        }
        if self.input.timeline.is_null() {
            return Err(ModelError::invalid_field("timeline", "is required"));
        }
        Ok(())
    }

    pub fn accepted(&self) -> AcceptedResponse {
        AcceptedResponse {
            job_id: self.job_id.clone(),
            status: "accepted".to_string(),
        }
    }
}

impl RenderInput {
    /// Output resolution: the explicit one, else the format's default.
    pub fn target_resolution(&self) -> Result<Resolution, ModelError> {
        match self.resolution.as_deref() {
            Some(s) => Resolution::parse(s),
            None => Ok(self.format.default_resolution()),
        }
    }
}

/// Acknowledgement returned when a job is taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedResponse {
    pub job_id: String,
    pub status: String,
}

/// Stage of a render job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStage {
    Queued,
    Resolving,
    ComposingAudio,
    RenderingSubtitles,
    Transcoding,
    ExtractingThumbnail,
    Completed,
    Failed,
}

impl JobStage {
    /// Stages in execution order, excluding `Failed`.
    pub const PIPELINE: [JobStage; 7] = [
        JobStage::Queued,
        JobStage::Resolving,
        JobStage::ComposingAudio,
        JobStage::RenderingSubtitles,
        JobStage::Transcoding,
        JobStage::ExtractingThumbnail,
        JobStage::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStage::Queued => "queued",
            JobStage::Resolving => "resolving",
            JobStage::ComposingAudio => "composing-audio",
            JobStage::RenderingSubtitles => "rendering-subtitles",
            JobStage::Transcoding => "transcoding",
            JobStage::ExtractingThumbnail => "extracting-thumbnail",
            JobStage::Completed => "completed",
            JobStage::Failed => "failed",
        }
    }

    /// Progress reported on entering the stage. `None` for `Failed`, which
    /// keeps whatever was last reported.
    pub fn progress(self) -> Option<u8> {
        match self {
            JobStage::Queued => Some(0),
            JobStage::Resolving => Some(10),
            JobStage::ComposingAudio => Some(30),
            JobStage::RenderingSubtitles => Some(50),
            JobStage::Transcoding => Some(70),
            JobStage::ExtractingThumbnail => Some(90),
            JobStage::Completed => Some(100),
            JobStage::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStage::Completed | JobStage::Failed)
    }

    /// Status as seen by the external job tracker.
    pub fn wire_status(self) -> JobStatus {
        match self {
            JobStage::Completed => JobStatus::Completed,
            JobStage::Failed => JobStatus::Failed,
            _ => JobStatus::Processing,
        }
    }

    fn position(self) -> Option<usize> {
        Self::PIPELINE.iter().position(|s| *s == self)
    }
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse status reported to the job tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

/// Forward-only progress through [`JobStage::PIPELINE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobProgress {
    stage: JobStage,
    progress: u8,
}

impl Default for JobProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl JobProgress {
    pub fn new() -> Self {
        Self {
            stage: JobStage::Queued,
            progress: 0,
        }
    }

    pub fn stage(&self) -> JobStage {
        self.stage
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Move to the next pipeline stage, or to `Failed` from any
    /// non-terminal stage. Returns the progress to report.
    pub fn advance(&mut self, to: JobStage) -> Result<u8, ModelError> {
        let illegal = ModelError::IllegalTransition {
            from: self.stage.as_str(),
            to: to.as_str(),
        };
        if self.stage.is_terminal() {
            return Err(illegal);
        }

        if to == JobStage::Failed {
            self.stage = to;
            return Ok(self.progress);
        }

        match (self.stage.position(), to.position()) {
            (Some(from), Some(next)) if next == from + 1 => {
                self.stage = to;
                self.progress = to.progress().unwrap_or(self.progress).max(self.progress);
                Ok(self.progress)
            }
            _ => Err(illegal),
        }
    }
}

/// Status callback payload sent to the job tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusUpdate {
    pub job_id: String,
    pub progress: u8,
    pub status: JobStatus,
    /// Fine-grained stage; informational.
    pub stage: JobStage,
    pub output: Option<RenderOutput>,
    pub error: Option<String>,
    pub reported_at: DateTime<Utc>,
}

impl JobStatusUpdate {
    pub fn stage(job_id: impl Into<String>, stage: JobStage, progress: u8) -> Self {
        Self {
            job_id: job_id.into(),
            progress,
            status: stage.wire_status(),
            stage,
            output: None,
            error: None,
            reported_at: Utc::now(),
        }
    }

    pub fn completed(job_id: impl Into<String>, output: RenderOutput) -> Self {
        Self {
            output: Some(output),
            ..Self::stage(job_id, JobStage::Completed, 100)
        }
    }

    pub fn failed(job_id: impl Into<String>, progress: u8, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::stage(job_id, JobStage::Failed, progress)
        }
    }
}

/// Result of a successful render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOutput {
    /// `store://` address of the published video.
    pub file_path: String,
    /// `None` when thumbnail extraction failed.
    pub thumbnail_path: Option<String>,
    pub duration: f64,
    pub file_size: u64,
    pub format: VideoFormat,
    pub resolution: Resolution,
    pub watermark: bool,
}
