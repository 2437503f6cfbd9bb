//! Request body of the RAG endpoints

use serde::Deserialize;

use super::error::ApiError;
use crate::domain::pipeline::{
    validate_pipeline_request, ConversationTurn, PipelineRequest, RequestOptions, RoutingMode,
};

/// Body of `POST /v1/rag/query` and `POST /v1/rag/stream`
#[derive(Debug, Clone, Deserialize)]
pub struct RagQueryRequest {
    pub query: String,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    /// `auto`, `fast` or `deep`, case-insensitive
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub options: RagRequestOptions,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RagRequestOptions {
    pub token_budget: Option<usize>,
    pub watchdog_timeout_ms: Option<u64>,
    pub top_k: Option<usize>,
}

impl From<RagRequestOptions> for RequestOptions {
    fn from(options: RagRequestOptions) -> Self {
        Self {
            token_budget: options.token_budget,
            watchdog_timeout_ms: options.watchdog_timeout_ms,
            top_k: options.top_k,
        }
    }
}

impl RagQueryRequest {
    /// Build and validate the pipeline request
    pub fn into_pipeline_request(self, request_id: Option<String>) -> Result<PipelineRequest, ApiError> {
        let mode = match self.mode.as_deref() {
            Some(mode) => mode
                .parse::<RoutingMode>()
                .map_err(|e| ApiError::bad_request(e).with_param("mode"))?,
            None => RoutingMode::Auto,
        };

        let mut request = PipelineRequest::new(self.query)
            .with_history(self.history)
            .with_mode(mode)
            .with_options(self.options.into());
        if let Some(id) = request_id {
            request = request.with_id(id);
        }

        validate_pipeline_request(&request).map_err(ApiError::bad_request)?;
        Ok(request)
    }
}
