//! Errors raised while parsing or validating model types.

use montage_common::error::MontageError;

/// Errors that can occur when building model values from untrusted input.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// The timeline is structurally well-formed but semantically unusable.
    #[error("Invalid timeline: {message}")]
    InvalidTimeline { message: String },

    /// A single field failed validation.
    #[error("Invalid {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    /// A render-job stage transition that the state machine forbids.
    #[error("Illegal job transition from {from} to {to}")]
    IllegalTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ModelError {
    pub fn invalid_timeline(msg: impl Into<String>) -> Self {
        Self::InvalidTimeline {
            message: msg.into(),
        }
    }

    pub fn invalid_field(field: &'static str, msg: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            message: msg.into(),
        }
    }
}

impl From<ModelError> for MontageError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidTimeline { .. } => MontageError::configuration(err.to_string()),
            ModelError::IllegalTransition { .. } => MontageError::Other(anyhow::anyhow!(err)),
            ModelError::InvalidField { .. } | ModelError::Parse(_) => {
                MontageError::validation(err.to_string())
            }
        }
    }
}
