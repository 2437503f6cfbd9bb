//! Query intent and classification result

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::pipeline::RoutingMode;

/// What the user is trying to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    Factual,
    Definition,
    Procedural,
    Comparison,
    Troubleshooting,
    Conversational,
    #[default]
    Unknown,
}

impl QueryIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Factual => "factual",
            Self::Definition => "definition",
            Self::Procedural => "procedural",
            Self::Comparison => "comparison",
            Self::Troubleshooting => "troubleshooting",
            Self::Conversational => "conversational",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QueryIntent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "factual" => Ok(Self::Factual),
            "definition" => Ok(Self::Definition),
            "procedural" => Ok(Self::Procedural),
            "comparison" => Ok(Self::Comparison),
            "troubleshooting" => Ok(Self::Troubleshooting),
            "conversational" => Ok(Self::Conversational),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("Unknown query intent: {}", other)),
        }
    }
}

/// Resolved routing mode and intent of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub mode: RoutingMode,
    pub intent: QueryIntent,
}

impl Classification {
    pub fn new(mode: RoutingMode, intent: QueryIntent) -> Self {
        Self { mode, intent }
    }

    /// Safe default used when classification fails
    pub fn fallback() -> Self {
        Self::new(RoutingMode::Auto, QueryIntent::Unknown)
    }
}
