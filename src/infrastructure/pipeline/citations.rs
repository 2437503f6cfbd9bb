//! Citation extraction from bracket markers in the validated answer

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::pipeline::{Citation, ConfidenceTier};
use crate::infrastructure::context::{BuiltContext, ContextEntry};

/// `[1]` or `[1, 3]`
static MARKER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(\d{1,4}(?:\s*,\s*\d{1,4})*)\]").expect("marker pattern is a valid regex")
});

/// Cite the context entries the answer refers to, in order of first
/// appearance. Markers pointing outside the context are ignored. An answer
/// without any valid marker cites every included entry in rank order.
pub fn extract_citations(answer: &str, context: &BuiltContext) -> Vec<Citation> {
    let mut seen = HashSet::new();
    let mut citations = Vec::new();

    let numbers = MARKER_PATTERN
        .captures_iter(answer)
        .flat_map(|cap| {
            cap[1]
                .split(',')
                .filter_map(|n| n.trim().parse::<usize>().ok())
                .collect::<Vec<_>>()
        });

    for number in numbers {
        if let Some(entry) = context.entry(number) {
            if seen.insert(number) {
                citations.push(citation(entry));
            }
        }
    }

    if citations.is_empty() {
        return context.entries.iter().map(citation).collect();
    }

    citations
}

fn citation(entry: &ContextEntry) -> Citation {
    let graded = &entry.document.graded;
    Citation {
        document_id: graded.document.id.clone(),
        title: graded.document.title.clone(),
        confidence: ConfidenceTier::from_scores(graded.document.score, graded.grade_score, graded.grade),
    }
}
