//! Per-request pipeline metrics

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::Stage;

/// Latency and document flow of one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMetrics {
    pub stage: Stage,
    pub latency_ms: u64,
    pub documents_in: usize,
    pub documents_out: usize,
}

/// A recoverable failure that made a stage fall back to its safe default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDegradation {
    pub stage: Stage,
    pub reason: String,
}

/// Metrics gathered while running one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetrics {
    pub started_at: DateTime<Utc>,
    pub total_latency_ms: u64,
    pub stages: Vec<StageMetrics>,
    pub degradations: Vec<StageDegradation>,
    pub watchdog_triggered: bool,
    pub guardrail_triggered: bool,
    pub self_reflection_attempted: bool,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            total_latency_ms: 0,
            stages: Vec::new(),
            degradations: Vec::new(),
            watchdog_triggered: false,
            guardrail_triggered: false,
            self_reflection_attempted: false,
        }
    }

    pub fn record_stage(
        &mut self,
        stage: Stage,
        latency: Duration,
        documents_in: usize,
        documents_out: usize,
    ) {
        self.stages.push(StageMetrics {
            stage,
            latency_ms: latency.as_millis() as u64,
            documents_in,
            documents_out,
        });
    }

    pub fn record_degradation(&mut self, stage: Stage, reason: impl Into<String>) {
        self.degradations.push(StageDegradation {
            stage,
            reason: reason.into(),
        });
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageMetrics> {
        self.stages.iter().find(|m| m.stage == stage)
    }

    pub fn is_degraded(&self, stage: Stage) -> bool {
        self.degradations.iter().any(|d| d.stage == stage)
    }

    pub fn finish(&mut self, elapsed: Duration) {
        self.total_latency_ms = elapsed.as_millis() as u64;
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
