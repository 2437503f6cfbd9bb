//! LLM provider implementations

mod generator;
mod http_client;
mod openai_compatible;

pub use generator::{GenerationSettings, Generator};
pub use http_client::{ByteStream, HttpClient, HttpClientTrait};
pub use openai_compatible::{OpenAiCompatibleProvider, DEFAULT_BASE_URL};
