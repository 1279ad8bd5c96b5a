//! Media-tool backend: how Montage talks to the external transcoder.
//!
//! Every ffmpeg invocation in the workspace goes through [`MediaBackend`],
//! so the composers and the orchestrator can be exercised against a fake
//! backend and a job cancellation can always reach the running process.

use std::path::Path;
use std::process::{Command, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::config::RenderDefaults;
use crate::error::{MontageError, MontageResult};

/// Progress sink for a running invocation; receives a fraction in `[0.0, 1.0]`.
pub type ProgressFn<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// One ffmpeg run: the arguments after the global flags, plus what is
/// needed to turn `-progress` output into a fraction.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegInvocation {
    /// Arguments, inputs first, output path last.
    pub args: Vec<String>,

    /// Expected output duration, used for progress reporting.
    pub expected_duration_secs: Option<f64>,
}

impl FfmpegInvocation {
    pub fn new(args: Vec<String>) -> Self {
        Self {
            args,
            expected_duration_secs: None,
        }
    }

    pub fn with_expected_duration(mut self, secs: f64) -> Self {
        self.expected_duration_secs = Some(secs);
        self
    }

    /// The output path (last argument), if any.
    pub fn output(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }
}

/// Trait for transcoder backends.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Backend name.
    fn name(&self) -> &str;

    /// Check if this backend is available on the system.
    fn is_available(&self) -> bool;

    /// Run one invocation to completion.
    ///
    /// Must return [`MontageError::Cancelled`] and terminate the underlying
    /// process when `cancel` fires mid-run.
    async fn run(
        &self,
        invocation: &FfmpegInvocation,
        cancel: &CancellationToken,
        progress: Option<ProgressFn<'_>>,
    ) -> MontageResult<()>;

    /// Container duration of a media file in seconds.
    async fn probe_duration(&self, path: &Path) -> MontageResult<f64>;
}

/// Runs the real `ffmpeg`/`ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegBackend {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    pub fn from_defaults(defaults: &RenderDefaults) -> Self {
        Self::new(&defaults.ffmpeg_path, &defaults.ffprobe_path)
    }

    fn command(&self, invocation: &FfmpegInvocation) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.ffmpeg_path);
        cmd.args([
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-nostats",
            "-progress",
            "pipe:1",
        ])
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl MediaBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_available(&self) -> bool {
        command_exists(&self.ffmpeg_path) && command_exists(&self.ffprobe_path)
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

        tracing::debug!(args = ?invocation.args, "Running ffmpeg");
        let started = std::time::Instant::now();
        let mut child = self.command(invocation).spawn().map_err(|e| {
            MontageError::external_process(format!(
                "Failed to start {}: {e}",
                self.ffmpeg_path
            ))
        })?;

        tracing::debug!(pid = child.id(), "ffmpeg process started");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MontageError::external_process("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MontageError::external_process("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output).await {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let expected = invocation.expected_duration_secs;
        let outcome = tokio::select! {
            _ = cancel.cancelled() => None,
            result = async {
                let mut lines = BufReader::new(stdout).lines();
                let mut state = ProgressState::default();
                while let Some(line) = lines.next_line().await? {
                    let Some((key, value)) = line.trim().split_once('=') else {
                        continue;
                    };
                    state.update(key, value);
                    if key == "progress" {
                        if let Some(cb) = progress {
                            cb(state.fraction(expected));
                        }
                    }
                }
                Ok::<_, std::io::Error>(child.wait().await?)
            } => Some(result),
        };

        let Some(result) = outcome else {
            tracing::warn!(pid = child.id(), "Cancellation requested, terminating ffmpeg");
            if let Err(err) = child.kill().await {
                tracing::warn!(error = %err, "Failed to kill ffmpeg");
            }
            stderr_task.abort();
            return Err(MontageError::Cancelled);
        };

        let status = result
            .map_err(|e| MontageError::external_process(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr_output = stderr_task
            .await
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(MontageError::external_process(format!(
                "ffmpeg failed ({status}): {}",
                stderr_output.trim()
            )));
        }

        tracing::debug!(
            elapsed_secs = started.elapsed().as_secs_f64(),
            output = invocation.output().unwrap_or_default(),
            "ffmpeg finished"
        );
        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> MontageResult<f64> {
        let output = tokio::process::Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                MontageError::external_process(format!(
                    "Failed to run {} for {}: {e}",
                    self.ffprobe_path,
                    path.display()
                ))
            })?;

        if !output.status.success() {
            return Err(MontageError::external_process(format!(
                "ffprobe failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        raw.trim().parse::<f64>().map_err(|e| {
            MontageError::external_process(format!(
                "Unparseable ffprobe duration '{}' for {}: {e}",
                raw.trim(),
                path.display()
            ))
        })
    }
}

/// Whether a binary can be executed, either by path or through `PATH`.
pub fn command_exists(binary: &str) -> bool {
    if binary.contains(std::path::MAIN_SEPARATOR) {
        return Path::new(binary).is_file();
    }
    Command::new("sh")
        .args(["-c", r#"command -v "$1" >/dev/null 2>&1"#, "sh", binary])
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Accumulates ffmpeg `-progress` key/value lines.
#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both names.
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }

    fn fraction(&self, expected_duration_secs: Option<f64>) -> f64 {
        if self.complete {
            return 1.0;
        }
        match expected_duration_secs {
            Some(expected) if expected > 0.0 => (self.out_time_secs / expected).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }
}
