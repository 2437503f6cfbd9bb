//! Application state shared by the handlers

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::warn;

use crate::infrastructure::pipeline::PipelineOrchestrator;

/// Built once at start-up and shared read-only by every request
#[derive(Debug, Clone)]
pub struct AppState {
    pub pipeline: Arc<PipelineOrchestrator>,
    /// Caller-level deadline applied to every pipeline run
    pub request_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(pipeline: PipelineOrchestrator) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            request_timeout: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Cancel `cancel` once the request deadline passes.
    ///
    /// The timer stops when the returned guard is dropped, so the guard must
    /// live as long as the request.
    pub fn arm_deadline(&self, cancel: &CancellationToken) -> Option<DropGuard> {
        let timeout = self.request_timeout?;
        let finished = CancellationToken::new();
        let guard = finished.clone().drop_guard();
        let cancel = cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = finished.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    warn!(timeout_ms = timeout.as_millis() as u64, "Request deadline exceeded");
                    cancel.cancel();
                }
            }
        });

        Some(guard)
    }
}
