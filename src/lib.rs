//! PMP RAG Engine
//!
//! Corrective retrieval-augmented answering with:
//! - Query classification, decontextualization and routing modes
//! - Multi-strategy retrieval with corrective grading and a grading watchdog
//! - Token-budgeted context, answer contracts and guardrail validation
//! - Batch and streaming execution over one stage runner

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;


use api::state::AppState;
use infrastructure::pipeline::build_orchestrator;
use tracing::info;

/// Build the pipeline from configuration and wrap it in the HTTP state
pub fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let pipeline = build_orchestrator(config)?;
    info!(
        default_top_k = pipeline.config().top_k,
        token_budget = pipeline.config().token_budget,
        "RAG pipeline initialized"
    );

    Ok(AppState::new(pipeline).with_request_timeout(config.server.request_timeout()))
}
