use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::contract::ContractOverride;
use crate::domain::crag::CragConfig;
use crate::domain::pipeline::PipelineConfig;
use crate::domain::retrieval::RetrievalRoute;
use crate::infrastructure::llm::DEFAULT_BASE_URL;
use crate::infrastructure::observability::MetricsConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub crag: CragConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Per-mode contract overrides keyed by `fast`, `auto` or `deep`
    #[serde(default)]
    pub contracts: HashMap<String, ContractOverride>,
    #[serde(default)]
    pub guardrail: GuardrailConfig,
    /// JSON file of answer exemplars
    #[serde(default)]
    pub examples_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Caller-level deadline; cancels the request when exceeded
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// OpenAI-compatible backend used for generation and optional LLM stages
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_llm_timeout_ms")]
    pub timeout_ms: u64,
    /// Model for LLM grading; required by the `llm` and `hybrid` strategies
    #[serde(default)]
    pub grading_model: Option<String>,
    /// Model for rewriting follow-up questions; heuristic rewrite when unset
    #[serde(default)]
    pub decontextualize_model: Option<String>,
    /// Model for self-reflection query refinement; keyword refinement when unset
    #[serde(default)]
    pub refine_model: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout_ms() -> u64 {
    60_000
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// JSON corpus for the keyword strategy
    #[serde(default)]
    pub corpus_path: Option<String>,
    /// Strategies queried concurrently per request
    #[serde(default = "default_strategy_concurrency")]
    pub strategy_concurrency: usize,
    /// Per-mode routes keyed by `fast`, `auto` or `deep`
    #[serde(default)]
    pub routes: HashMap<String, RetrievalRoute>,
}

fn default_strategy_concurrency() -> usize {
    4
}

#[derive(Debug, Clone, Deserialize)]
pub struct GuardrailConfig {
    #[serde(default)]
    pub refusal_text: Option<String>,
    /// Case-insensitive terms that must not appear in answers
    #[serde(default)]
    pub blocked_terms: Vec<String>,
    /// Check answers for personal and secret data patterns
    #[serde(default = "default_true")]
    pub detect_sensitive_data: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_ms: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            temperature: None,
            max_tokens: None,
            timeout_ms: default_llm_timeout_ms(),
            grading_model: None,
            decontextualize_model: None,
            refine_model: None,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            corpus_path: None,
            strategy_concurrency: default_strategy_concurrency(),
            routes: HashMap::new(),
        }
    }
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            refusal_text: None,
            blocked_terms: Vec::new(),
            detect_sensitive_data: default_true(),
        }
    }
}

impl AppConfig {
    /// Load `config/default`, `config/local`, an optional explicit file, then `APP__*` env vars
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
