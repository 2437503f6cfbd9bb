//! Prompt building and exemplar storage

mod builder;
mod example_store;

pub use builder::{BuiltPrompt, PromptBuilder};
pub use example_store::InMemoryExampleStore;
