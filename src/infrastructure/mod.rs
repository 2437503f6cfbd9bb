//! Infrastructure layer - Stage implementations and external service adapters

pub mod context;
pub mod crag;
pub mod guardrail;
pub mod llm;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod prompt;
pub mod query;
pub mod rerank;
pub mod retrieval;
pub mod text;
