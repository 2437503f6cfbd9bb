//! Prompt domain - templates and answer exemplars

mod exemplar;
mod template;

pub use exemplar::{AnswerExemplar, ExampleProvider};
pub use template::{render_template, PromptTemplate, PromptVariable, TemplateError};

#[cfg(test)]
pub use exemplar::mock::MockExampleProvider;
