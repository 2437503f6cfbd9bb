//! Context window packing
//!
//! Documents are packed whole, in rank order, until the next one would not
//! fit the token budget. Every later document is excluded.

use serde::Serialize;
use tracing::debug;

use crate::domain::rerank::RankedDocument;

/// Rough token estimate: one token per four characters, rounded up
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// A document placed in the context under its source number
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextEntry {
    /// Source number referenced by `[n]` markers, starting at 1
    pub number: usize,
    pub document: RankedDocument,
    pub rendered: String,
    pub tokens: usize,
}

impl ContextEntry {
    pub fn id(&self) -> &str {
        self.document.id()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuiltContext {
    pub entries: Vec<ContextEntry>,
    /// Ids of documents that did not fit
    pub excluded: Vec<String>,
    pub tokens_used: usize,
    pub token_budget: usize,
}

impl BuiltContext {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn included_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.id().to_string()).collect()
    }

    pub fn entry(&self, number: usize) -> Option<&ContextEntry> {
        number
            .checked_sub(1)
            .and_then(|index| self.entries.get(index))
    }

    /// Source block handed to the prompt
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.rendered.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContextBuilder;

impl ContextBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, documents: Vec<RankedDocument>, token_budget: usize) -> BuiltContext {
        let mut context = BuiltContext {
            token_budget,
            ..Default::default()
        };
        let mut remaining = documents.into_iter();

        for document in remaining.by_ref() {
            let number = context.entries.len() + 1;
            let rendered = render_entry(number, &document);
            let tokens = estimate_tokens(&rendered);

            if context.tokens_used + tokens > token_budget {
                debug!(
                    document_id = %document.id(),
                    tokens,
                    tokens_used = context.tokens_used,
                    token_budget,
                    "Context budget reached"
                );
                context.excluded.push(document.id().to_string());
                break;
            }

            context.tokens_used += tokens;
            context.entries.push(ContextEntry {
                number,
                document,
                rendered,
                tokens,
            });
        }

        context
            .excluded
            .extend(remaining.map(|d| d.id().to_string()));
        context
    }
}

fn render_entry(number: usize, document: &RankedDocument) -> String {
    let source = &document.graded.document;
    format!(
        "[{}] {} ({})\n{}",
        number, source.title, source.doc_type, source.text
    )
}
