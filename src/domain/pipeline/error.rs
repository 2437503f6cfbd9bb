//! Pipeline failure taxonomy
//!
//! Only fatal outcomes are errors here. Recoverable stage failures are logged and
//! recorded as degradations in the metrics, and corrective outcomes (refuse,
//! degrade) are normal terminal results.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::event::Stage;

/// Serializable category of a fatal failure, carried by the `Failed` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    Cancelled,
    InvalidRequest,
    GenerationUnavailable,
    GuardrailUnavailable,
}

/// Fatal pipeline errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("Pipeline cancelled during {stage}")]
    Cancelled { stage: Stage },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Generation backend unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("Guardrail backend unavailable: {0}")]
    GuardrailUnavailable(String),
}

impl PipelineError {
    pub fn cancelled(stage: Stage) -> Self {
        Self::Cancelled { stage }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::GenerationUnavailable(message.into())
    }

    pub fn guardrail(message: impl Into<String>) -> Self {
        Self::GuardrailUnavailable(message.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Cancelled { .. } => FailureKind::Cancelled,
            Self::InvalidRequest(_) => FailureKind::InvalidRequest,
            Self::GenerationUnavailable(_) => FailureKind::GenerationUnavailable,
            Self::GuardrailUnavailable(_) => FailureKind::GuardrailUnavailable,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
