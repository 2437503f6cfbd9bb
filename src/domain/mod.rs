//! Domain layer - Core entities, collaborator traits and pipeline policy

pub mod contract;
pub mod crag;
pub mod error;
pub mod guardrail;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod query;
pub mod rerank;
pub mod retrieval;

pub use contract::{AnswerContract, AnswerContractRegistry, ContractOverride};
pub use crag::{
    CragConfig, CragResult, CragVerdict, DocumentGrader, Grade, GradedDocument, GradeTally,
    GradingStrategy,
};
pub use error::DomainError;
pub use guardrail::{GuardrailValidator, GuardrailVerdict};
pub use llm::{
    FinishReason, LlmProvider, LlmRequest, LlmRequestBuilder, LlmResponse, LlmStream, Message,
    MessageRole, StreamChunk, Usage,
};
pub use pipeline::{
    Citation, ConfidenceTier, ConversationTurn, EvidenceLevel, FailureKind, PipelineConfig,
    PipelineError, PipelineEvent, PipelineMetrics, PipelineRequest, RagResult, RequestOptions,
    RoutingMode, Stage, StagePayload,
};
pub use prompt::{AnswerExemplar, ExampleProvider, PromptTemplate, TemplateError};
pub use query::{Classification, Decontextualizer, QueryClassifier, QueryIntent, QueryRefiner};
pub use rerank::{RankedDocument, Reranker};
pub use retrieval::{DocumentType, RetrievalStrategy, RetrievedDocument, StrategyConfig};
