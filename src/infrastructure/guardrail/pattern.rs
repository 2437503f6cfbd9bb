//! Pattern-based guardrail
//!
//! Flags answers that leak personal or secret data, or that contain a
//! configured blocked term. Violation reasons never quote the answer.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::guardrail::{GuardrailValidator, GuardrailVerdict};
use crate::domain::DomainError;

static SSN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("ssn pattern is a valid regex")
});

static CARD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d(?:[ -]?\d){12,18}\b").expect("card pattern is a valid regex")
});

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:sk-[A-Za-z0-9_-]{20,}|AKIA[0-9A-Z]{16}|gh[pousr]_[A-Za-z0-9]{36,}|xox[abpr]-[A-Za-z0-9-]{10,})")
        .expect("secret pattern is a valid regex")
});

#[derive(Debug, Clone)]
pub struct PatternGuardrailValidator {
    detect_sensitive_data: bool,
    blocked_terms: Vec<String>,
}

impl Default for PatternGuardrailValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternGuardrailValidator {
    pub fn new() -> Self {
        Self {
            detect_sensitive_data: true,
            blocked_terms: Vec::new(),
        }
    }

    pub fn with_sensitive_data(mut self, detect: bool) -> Self {
        self.detect_sensitive_data = detect;
        self
    }

    pub fn with_blocked_terms(mut self, terms: Vec<String>) -> Self {
        self.blocked_terms = terms
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }

    fn check(&self, answer: &str) -> GuardrailVerdict {
        if self.detect_sensitive_data {
            if SSN_PATTERN.is_match(answer) {
                return GuardrailVerdict::violation(
                    "ssn",
                    "Answer contains a social security number",
                );
            }

            if CARD_PATTERN
                .find_iter(answer)
                .any(|m| passes_luhn(m.as_str()))
            {
                return GuardrailVerdict::violation(
                    "payment_card",
                    "Answer contains a payment card number",
                );
            }

            if SECRET_PATTERN.is_match(answer) {
                return GuardrailVerdict::violation(
                    "secret",
                    "Answer contains an API credential",
                );
            }
        }

        let lowered = answer.to_lowercase();
        if let Some(term) = self.blocked_terms.iter().find(|t| lowered.contains(t.as_str())) {
            return GuardrailVerdict::violation(
                "blocked_term",
                format!("Answer contains the blocked term '{}'", term),
            );
        }

        GuardrailVerdict::Pass
    }
}

/// Luhn checksum over the digits of a candidate card number
fn passes_luhn(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if !(13..=19).contains(&digits.len()) {
        return false;
    }

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}

#[async_trait]
impl GuardrailValidator for PatternGuardrailValidator {
    async fn validate(&self, answer: &str) -> Result<GuardrailVerdict, DomainError> {
        Ok(self.check(answer))
    }

    fn validator_name(&self) -> &'static str {
        "pattern"
    }
}
