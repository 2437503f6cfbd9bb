//! Guardrail implementations

mod pattern;

pub use pattern::PatternGuardrailValidator;
