//! Orchestrator wired with mock collaborators, for handler and CLI tests

use std::sync::Arc;

use super::PipelineOrchestrator;
use crate::domain::crag::{CragConfig, Grade, MockDocumentGrader};
use crate::domain::guardrail::mock::MockGuardrailValidator;
use crate::domain::llm::MockLlmProvider;
use crate::domain::query::MockQueryRefiner;
use crate::domain::retrieval::{MockRetrievalStrategy, RetrievalRouting, RetrievedDocument};
use crate::infrastructure::crag::CorrectiveGrader;
use crate::infrastructure::llm::{GenerationSettings, Generator};
use crate::infrastructure::retrieval::FanOutRetriever;

/// Two relevant refund documents and a generator that always answers `answer`
pub fn orchestrator_answering(answer: &str) -> PipelineOrchestrator {
    orchestrator_with(MockLlmProvider::new("mock").with_content(answer))
}

/// Same corpus and grades, generating with `llm`
pub fn orchestrator_with(llm: MockLlmProvider) -> PipelineOrchestrator {
    let strategy = MockRetrievalStrategy::new("keyword").with_documents(vec![
        RetrievedDocument::new(
            "refund-policy",
            "Refund policy",
            "Refunds are accepted within 30 days of purchase.",
            0.9,
        ),
        RetrievedDocument::new(
            "gift-cards",
            "Gift cards",
            "Gift cards cannot be refunded.",
            0.8,
        ),
    ]);
    let retriever =
        FanOutRetriever::new(RetrievalRouting::default()).with_strategy(Arc::new(strategy));
    let grader = CorrectiveGrader::new(
        Arc::new(MockDocumentGrader::new().with_default_grade(Grade::Relevant)),
        Arc::new(MockQueryRefiner::returning("refund rules")),
        CragConfig::default(),
    );
    let generator = Generator::new(
        Arc::new(llm),
        GenerationSettings::new("mock-model"),
    );

    PipelineOrchestrator::new(retriever, grader, generator)
        .with_guardrail(Arc::new(MockGuardrailValidator::passing()))
}
