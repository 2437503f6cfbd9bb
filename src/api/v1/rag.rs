//! RAG endpoints: batch JSON answers and SSE event streams

use axum::{
    extract::State,
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::middleware::request_id;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, RagQueryRequest};
use crate::domain::pipeline::RagResult;

/// Answer a query and return the complete result
pub async fn query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RagQueryRequest>,
) -> Result<Json<RagResult>, ApiError> {
    let request = body.into_pipeline_request(request_id(&headers))?;
    info!(request_id = %request.id(), mode = %request.mode(), "RAG query");

    let cancel = CancellationToken::new();
    let _deadline = state.arm_deadline(&cancel);
    let result = state
        .pipeline
        .execute_with_cancellation(request, cancel)
        .await?;

    Ok(Json(result))
}

/// Stream the pipeline events as SSE; the event name is the event kind.
///
/// A client disconnect drops the event stream, which cancels the run.
pub async fn stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RagQueryRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let request = body.into_pipeline_request(request_id(&headers))?;
    info!(request_id = %request.id(), mode = %request.mode(), "RAG stream");

    let cancel = CancellationToken::new();
    let deadline = state.arm_deadline(&cancel);
    let events = state
        .pipeline
        .execute_streaming_with_cancellation(request, cancel)
        .map(move |event| {
            let _deadline = &deadline;
            Event::default().event(event.name()).json_data(&event)
        });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
