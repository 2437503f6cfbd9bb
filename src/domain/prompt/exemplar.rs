//! Answer exemplars used to illustrate the expected answer shape

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;
use crate::domain::query::QueryIntent;

/// An illustrative question/answer pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerExemplar {
    pub intent: QueryIntent,
    pub question: String,
    pub answer: String,
}

impl AnswerExemplar {
    pub fn new(intent: QueryIntent, question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            intent,
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Source of exemplars; failures only cost the prompt its examples
#[async_trait]
pub trait ExampleProvider: Send + Sync + Debug {
    async fn examples(
        &self,
        intent: QueryIntent,
        query: &str,
        limit: usize,
    ) -> Result<Vec<AnswerExemplar>, DomainError>;
}
