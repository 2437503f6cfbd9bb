use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::pipeline::RoutingMode;
use crate::domain::prompt::{PromptTemplate, TemplateError};
use crate::domain::query::QueryIntent;

/// System prompt used by contracts without their own template
pub const DEFAULT_SYSTEM_TEMPLATE: &str = "You are a knowledge assistant that answers strictly from the numbered sources provided.
Tone: ${var:tone}.
${var:format}
Keep the answer under ${var:max-words} words.
Cite the sources you use with bracket markers such as [1] that refer to the numbered source entries.
The question was classified as ${var:intent:unknown}.
If the sources do not contain the answer, reply exactly with: ${var:refusal-text}";

/// Per-mode answer template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerContract {
    pub mode: RoutingMode,
    pub name: String,
    pub tone: String,
    pub format_instructions: String,
    pub max_words: usize,
    /// Answer used for REFUSE verdicts
    pub refusal_text: String,
    /// Disclaimer attached when no evidence was available
    pub no_evidence_disclaimer: String,
    /// Disclaimer attached when evidence was weak
    pub low_evidence_disclaimer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_template: Option<String>,
}

impl AnswerContract {
    pub fn for_mode(mode: RoutingMode) -> Self {
        let (name, tone, format, max_words) = match mode {
            RoutingMode::Fast => (
                "concise",
                "direct and plain",
                "Answer in one or two short sentences without headings.",
                80,
            ),
            RoutingMode::Auto => (
                "balanced",
                "clear and helpful",
                "Answer in a short paragraph; use a list only for steps.",
                200,
            ),
            RoutingMode::Deep => (
                "thorough",
                "precise and explanatory",
                "Start with a one-sentence summary, then explain the details. Use numbered steps for procedures and compare options point by point.",
                450,
            ),
        };

        Self {
            mode,
            name: name.to_string(),
            tone: tone.to_string(),
            format_instructions: format.to_string(),
            max_words,
            refusal_text: "I could not find information about this in the available sources, so I cannot answer it reliably.".to_string(),
            no_evidence_disclaimer: "No supporting sources were available; this answer is not backed by the knowledge base.".to_string(),
            low_evidence_disclaimer: "The available sources only partially cover this question; verify the answer before relying on it.".to_string(),
            system_template: None,
        }
    }

    pub fn template(&self) -> &str {
        self.system_template
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_TEMPLATE)
    }

    /// Render the system instructions for a query intent
    pub fn render_system(&self, intent: QueryIntent) -> Result<String, TemplateError> {
        let template = PromptTemplate::parse(self.template())?;

        let mut values = HashMap::new();
        values.insert("tone".to_string(), self.tone.clone());
        values.insert("format".to_string(), self.format_instructions.clone());
        values.insert("max-words".to_string(), self.max_words.to_string());
        values.insert("refusal-text".to_string(), self.refusal_text.clone());
        values.insert("intent".to_string(), intent.to_string());
        values.insert("mode".to_string(), self.mode.to_string());

        template.render(&values)
    }
}

/// Partial contract from configuration, applied over the built-in default
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContractOverride {
    pub name: Option<String>,
    pub tone: Option<String>,
    pub format_instructions: Option<String>,
    pub max_words: Option<usize>,
    pub refusal_text: Option<String>,
    pub no_evidence_disclaimer: Option<String>,
    pub low_evidence_disclaimer: Option<String>,
    pub system_template: Option<String>,
}

impl ContractOverride {
    pub fn apply(self, mut contract: AnswerContract) -> AnswerContract {
        if let Some(name) = self.name {
            contract.name = name;
        }
        if let Some(tone) = self.tone {
            contract.tone = tone;
        }
        if let Some(format) = self.format_instructions {
            contract.format_instructions = format;
        }
        if let Some(max_words) = self.max_words {
            contract.max_words = max_words;
        }
        if let Some(refusal) = self.refusal_text {
            contract.refusal_text = refusal;
        }
        if let Some(disclaimer) = self.no_evidence_disclaimer {
            contract.no_evidence_disclaimer = disclaimer;
        }
        if let Some(disclaimer) = self.low_evidence_disclaimer {
            contract.low_evidence_disclaimer = disclaimer;
        }
        if self.system_template.is_some() {
            contract.system_template = self.system_template;
        }
        contract
    }
}

/// Read-only mapping from routing mode to contract
#[derive(Debug, Clone)]
pub struct AnswerContractRegistry {
    contracts: HashMap<RoutingMode, AnswerContract>,
}

impl AnswerContractRegistry {
    /// Build the registry from the defaults plus overrides, checking every template
    pub fn with_overrides(
        overrides: HashMap<RoutingMode, ContractOverride>,
    ) -> Result<Self, TemplateError> {
        let mut registry = Self::default();
        for (mode, contract_override) in overrides {
            let base = AnswerContract::for_mode(mode);
            registry.contracts.insert(mode, contract_override.apply(base));
        }
        registry.validate()?;
        Ok(registry)
    }

    /// Parse and trial-render every template
    pub fn validate(&self) -> Result<(), TemplateError> {
        for contract in self.contracts.values() {
            contract.render_system(QueryIntent::Unknown)?;
        }
        Ok(())
    }

    pub fn get(&self, mode: RoutingMode) -> &AnswerContract {
        self.contracts
            .get(&mode)
            .or_else(|| self.contracts.get(&RoutingMode::Auto))
            .unwrap_or(&FALLBACK_CONTRACT)
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

static FALLBACK_CONTRACT: once_cell::sync::Lazy<AnswerContract> =
    once_cell::sync::Lazy::new(|| AnswerContract::for_mode(RoutingMode::Auto));

impl Default for AnswerContractRegistry {
    fn default() -> Self {
        let contracts = RoutingMode::all()
            .into_iter()
            .map(|mode| (mode, AnswerContract::for_mode(mode)))
            .collect();

        Self { contracts }
    }
}
