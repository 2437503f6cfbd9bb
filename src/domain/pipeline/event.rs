//! Pipeline stages and the event sequence emitted while a request runs

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::FailureKind;
use super::request::RoutingMode;
use super::result::{Citation, RagResult};
use crate::domain::crag::CragVerdict;
use crate::domain::query::QueryIntent;

/// Pipeline stages in their fixed execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classify,
    Decontextualize,
    Retrieve,
    Grade,
    Rerank,
    Context,
    Prompt,
    Generate,
    Guardrail,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classify => "classify",
            Self::Decontextualize => "decontextualize",
            Self::Retrieve => "retrieve",
            Self::Grade => "grade",
            Self::Rerank => "rerank",
            Self::Context => "context",
            Self::Prompt => "prompt",
            Self::Generate => "generate",
            Self::Guardrail => "guardrail",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage-specific summary attached to `StageCompleted`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StagePayload {
    Classified {
        mode: RoutingMode,
        intent: QueryIntent,
        fallback: bool,
    },
    Decontextualized {
        query: String,
        rewritten: bool,
    },
    Retrieved {
        documents: usize,
        strategies_attempted: usize,
        strategies_failed: Vec<String>,
    },
    Graded {
        verdict: CragVerdict,
        reason: String,
        relevant: usize,
        ambiguous: usize,
        irrelevant: usize,
        watchdog_triggered: bool,
        self_reflection_attempted: bool,
    },
    Reranked {
        document_ids: Vec<String>,
    },
    ContextBuilt {
        included: Vec<String>,
        excluded: Vec<String>,
        tokens_used: usize,
        token_budget: usize,
    },
    PromptBuilt {
        contract: String,
        exemplars: usize,
        estimated_tokens: usize,
    },
    Generated {
        characters: usize,
    },
    Validated {
        passed: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

/// Event emitted by the pipeline. A run emits exactly one terminal event
/// (`Done`, `Refused` or `Failed`) and nothing after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    StageStarted {
        stage: Stage,
    },
    StageCompleted {
        stage: Stage,
        payload: StagePayload,
    },
    Token {
        text: String,
    },
    CitationEmitted {
        citation: Citation,
    },
    Refused {
        reason: String,
        result: Box<RagResult>,
    },
    Failed {
        kind: FailureKind,
        message: String,
    },
    Done {
        result: Box<RagResult>,
    },
}

impl PipelineEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Refused { .. } | Self::Failed { .. } | Self::Done { .. }
        )
    }

    /// Event name, used as the SSE event field
    pub fn name(&self) -> &'static str {
        match self {
            Self::StageStarted { .. } => "stage_started",
            Self::StageCompleted { .. } => "stage_completed",
            Self::Token { .. } => "token",
            Self::CitationEmitted { .. } => "citation",
            Self::Refused { .. } => "refused",
            Self::Failed { .. } => "failed",
            Self::Done { .. } => "done",
        }
    }

    /// The result carried by a successful terminal event
    pub fn into_result(self) -> Option<RagResult> {
        match self {
            Self::Done { result } | Self::Refused { result, .. } => Some(*result),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert!(Stage::Classify < Stage::Decontextualize);
        assert!(Stage::Grade < Stage::Rerank);
        assert!(Stage::Generate < Stage::Guardrail);
    }

    #[test]
    fn test_terminal_events() {
        assert!(!PipelineEvent::StageStarted { stage: Stage::Retrieve }.is_terminal());
        assert!(!PipelineEvent::Token { text: "a".into() }.is_terminal());
        assert!(
            PipelineEvent::Failed {
                kind: FailureKind::Cancelled,
                message: "cancelled".into()
            }
            .is_terminal()
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = PipelineEvent::StageStarted { stage: Stage::Grade };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "stage_started");
        assert_eq!(json["stage"], "grade");
    }
}
