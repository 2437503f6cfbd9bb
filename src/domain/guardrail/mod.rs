//! Guardrail domain

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Answer released in place of content that failed validation
pub const DEFAULT_GUARDRAIL_REFUSAL: &str =
    "I can't share that response because it conflicts with the content policy.";

/// Outcome of validating a complete answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GuardrailVerdict {
    Pass,
    Violation { rule: String, reason: String },
}

impl GuardrailVerdict {
    pub fn violation(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Violation {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Pass => None,
            Self::Violation { reason, .. } => Some(reason),
        }
    }
}

/// Safety and policy check over the full generated answer
#[async_trait]
pub trait GuardrailValidator: Send + Sync + Debug {
    async fn validate(&self, answer: &str) -> Result<GuardrailVerdict, DomainError>;

    fn validator_name(&self) -> &'static str;
}
