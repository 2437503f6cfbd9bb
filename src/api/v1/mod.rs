//! v1 API endpoints

pub mod rag;

use axum::{routing::post, Router};

use super::state::AppState;

pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/rag/query", post(rag::query))
        .route("/rag/stream", post(rag::stream))
}
