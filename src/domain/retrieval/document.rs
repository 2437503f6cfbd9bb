//! Retrieved document type

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of source a document comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Article,
    Faq,
    Policy,
    Manual,
    Web,
    #[default]
    #[serde(other)]
    Other,
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Article => "article",
            Self::Faq => "faq",
            Self::Policy => "policy",
            Self::Manual => "manual",
            Self::Web => "web",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// A candidate document returned by a retrieval strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    /// Unique identifier of the document
    pub id: String,
    /// Human-readable source title
    pub title: String,
    #[serde(default)]
    pub doc_type: DocumentType,
    /// Raw text
    pub text: String,
    /// Retrieval score (0.0 - 1.0, higher is more similar)
    pub score: f32,
    /// Name of the strategy that produced the document
    #[serde(default)]
    pub strategy: String,
}

impl RetrievedDocument {
    /// Create a new document; the score is clamped into 0..=1
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
        score: f32,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            doc_type: DocumentType::Other,
            text: text.into(),
            score: score.clamp(0.0, 1.0),
            strategy: String::new(),
        }
    }

    pub fn with_doc_type(mut self, doc_type: DocumentType) -> Self {
        self.doc_type = doc_type;
        self
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = strategy.into();
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score.clamp(0.0, 1.0);
        self
    }
}
