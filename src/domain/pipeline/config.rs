//! Process-wide pipeline defaults

use std::time::Duration;

use serde::Deserialize;

use super::request::RequestOptions;

/// Pipeline defaults applied when a request does not override them
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Token budget of the context window
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
    /// Maximum number of retrieved documents when the request sets no top-k
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Maximum number of answer exemplars added to the prompt
    #[serde(default = "default_max_exemplars")]
    pub max_exemplars: usize,
    /// Capacity of the streaming event buffer
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_token_budget() -> usize {
    3000
}

fn default_top_k() -> usize {
    8
}

fn default_max_exemplars() -> usize {
    2
}

fn default_event_buffer() -> usize {
    64
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            token_budget: default_token_budget(),
            top_k: default_top_k(),
            max_exemplars: default_max_exemplars(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl PipelineConfig {
    pub fn with_token_budget(mut self, budget: usize) -> Self {
        self.token_budget = budget;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Resolve the settings of one request
    pub fn resolve(&self, options: &RequestOptions, watchdog_timeout_ms: u64) -> RequestSettings {
        RequestSettings {
            token_budget: options.token_budget.unwrap_or(self.token_budget),
            top_k: options.top_k.unwrap_or(self.top_k),
            watchdog_timeout: Duration::from_millis(
                options.watchdog_timeout_ms.unwrap_or(watchdog_timeout_ms),
            ),
            max_exemplars: self.max_exemplars,
        }
    }
}

/// Effective settings of a single request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestSettings {
    pub token_budget: usize,
    pub top_k: usize,
    pub watchdog_timeout: Duration,
    pub max_exemplars: usize,
}
