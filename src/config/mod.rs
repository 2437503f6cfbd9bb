//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, GuardrailConfig, LlmConfig, LogFormat, LoggingConfig, RetrievalConfig,
    ServerConfig,
};
