//! Job status reporting to the external job tracker.

use async_trait::async_trait;
use montage_common::error::{MontageError, MontageResult};
use montage_project_model::{JobStatus, JobStatusUpdate};
use tokio::sync::mpsc;

/// Receives one update per job stage transition.
#[async_trait]
pub trait JobStatusSink: Send + Sync {
    async fn report(&self, update: &JobStatusUpdate) -> MontageResult<()>;
}

/// Writes updates to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatusSink;

#[async_trait]
impl JobStatusSink for TracingStatusSink {
    async fn report(&self, update: &JobStatusUpdate) -> MontageResult<()> {
        match update.status {
            JobStatus::Failed => tracing::error!(
                job_id = %update.job_id,
                progress = update.progress,
                error = update.error.as_deref().unwrap_or_default(),
                "Render failed"
            ),
            JobStatus::Completed => tracing::info!(
                job_id = %update.job_id,
                output = update.output.as_ref().map(|o| o.file_path.as_str()).unwrap_or_default(),
                "Render completed"
            ),
            JobStatus::Processing => tracing::info!(
                job_id = %update.job_id,
                stage = %update.stage,
                progress = update.progress,
                "Render progress"
            ),
        }
        Ok(())
    }
}

/// Forwards updates to an in-process receiver.
#[derive(Debug, Clone)]
pub struct ChannelStatusSink {
    tx: mpsc::UnboundedSender<JobStatusUpdate>,
}

impl ChannelStatusSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<JobStatusUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl JobStatusSink for ChannelStatusSink {
    async fn report(&self, update: &JobStatusUpdate) -> MontageResult<()> {
        self.tx
            .send(update.clone())
            .map_err(|_| MontageError::transient_io("status receiver dropped"))
    }
}
