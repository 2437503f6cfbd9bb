//! CRAG (Corrective RAG) infrastructure
//!
//! Graders and the corrective grading stage.

mod corrective;
mod hybrid_grader;
mod llm_grader;
mod threshold_grader;

pub use corrective::{CorrectiveGrader, ReflectionTarget};
pub use hybrid_grader::HybridGrader;
pub use llm_grader::LlmGrader;
pub use threshold_grader::ThresholdGrader;
