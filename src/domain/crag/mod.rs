//! CRAG (Corrective RAG) domain
//!
//! Grades, graders and the count-based verdict reduction that decides whether
//! the pipeline answers, refuses or degrades.

mod config;
mod grader;
mod result;

pub use config::{CragConfig, Grade, GradingStrategy};
pub use grader::{DocumentGrader, GradedDocument};
pub use result::{reduce_verdict, CragResult, CragVerdict, GradeTally};

#[cfg(test)]
pub use grader::mock::MockDocumentGrader;
