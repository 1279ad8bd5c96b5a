//! Error types shared across Montage crates.

/// Top-level error type for Montage operations.
///
/// A render job fails with exactly one of these; the message is what the
/// job tracker ends up showing.
#[derive(Debug, thiserror::Error)]
pub enum MontageError {
    /// Malformed timeline: no video clips, non-positive duration/fps,
    /// conflicting simultaneous video clips on one track.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A required source reference could not be resolved to playable media.
    #[error("Asset resolution error: {message}")]
    AssetResolution { message: String },

    /// The transcoder (or prober) failed or exited abnormally.
    #[error("External process error: {message}")]
    ExternalProcess { message: String },

    /// Object-store read/write failure.
    #[error("Transient I/O error: {message}")]
    TransientIo { message: String },

    /// Structurally invalid input field (resolution string, asset address, ...).
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Render job cancelled")]
    Cancelled,

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using MontageError.
pub type MontageResult<T> = Result<T, MontageError>;

impl MontageError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    pub fn asset_resolution(msg: impl Into<String>) -> Self {
        Self::AssetResolution {
            message: msg.into(),
        }
    }

    pub fn external_process(msg: impl Into<String>) -> Self {
        Self::ExternalProcess {
            message: msg.into(),
        }
    }

    pub fn transient_io(msg: impl Into<String>) -> Self {
        Self::TransientIo {
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientIo { .. })
    }

    /// Short machine-friendly category name, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::AssetResolution { .. } => "asset_resolution",
            Self::ExternalProcess { .. } => "external_process",
            Self::TransientIo { .. } => "transient_io",
            Self::Validation { .. } => "validation",
            Self::Cancelled => "cancelled",
            Self::Unsupported { .. } => "unsupported",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }
}
