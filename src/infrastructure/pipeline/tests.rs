use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::domain::crag::{CragConfig, CragVerdict, Grade, MockDocumentGrader};
use crate::domain::guardrail::mock::MockGuardrailValidator;
use crate::domain::guardrail::DEFAULT_GUARDRAIL_REFUSAL;
use crate::domain::llm::MockLlmProvider;
use crate::domain::pipeline::{
    ConversationTurn, EvidenceLevel, FailureKind, PipelineConfig, PipelineEvent, PipelineRequest,
    RequestOptions, RoutingMode, Stage, StagePayload,
};
use crate::domain::query::{
    Classification, MockDecontextualizer, MockQueryClassifier, MockQueryRefiner, QueryIntent,
};
use crate::domain::retrieval::{MockRetrievalStrategy, RetrievalRouting, RetrievedDocument};
use crate::infrastructure::crag::CorrectiveGrader;
use crate::infrastructure::llm::{GenerationSettings, Generator};
use crate::infrastructure::retrieval::FanOutRetriever;

const ANSWER: &str = "Refunds are accepted within 30 days of purchase [1]. Digital goods are excluded [2].";

fn corpus() -> Vec<RetrievedDocument> {
    vec![
        RetrievedDocument::new(
            "refund-policy",
            "Refund policy",
            "Refunds are accepted within 30 days of purchase with a receipt.",
            0.92,
        ),
        RetrievedDocument::new(
            "digital-goods",
            "Digital goods",
            "Digital goods such as gift cards are excluded from refunds.",
            0.81,
        ),
        RetrievedDocument::new(
            "shipping",
            "Shipping times",
            "Standard shipping takes five business days.",
            0.64,
        ),
    ]
}

fn grader() -> MockDocumentGrader {
    MockDocumentGrader::new()
        .with_grade("refund-policy", Grade::Relevant)
        .with_grade("digital-goods", Grade::Relevant)
        .with_grade("shipping", Grade::Irrelevant)
}

fn keyword_strategy() -> MockRetrievalStrategy {
    MockRetrievalStrategy::new("keyword").with_documents(corpus())
}

fn pipeline(
    strategy: MockRetrievalStrategy,
    grader: MockDocumentGrader,
    llm: MockLlmProvider,
) -> PipelineOrchestrator {
    let retriever =
        FanOutRetriever::new(RetrievalRouting::default()).with_strategy(Arc::new(strategy));
    let grader = CorrectiveGrader::new(
        Arc::new(grader),
        Arc::new(MockQueryRefiner::returning("refund rules for purchases")),
        CragConfig::default(),
    );
    let generator = Generator::new(Arc::new(llm), GenerationSettings::new("mock-model"));

    PipelineOrchestrator::new(retriever, grader, generator)
        .with_classifier(Arc::new(MockQueryClassifier::returning(Classification::new(
            RoutingMode::Auto,
            QueryIntent::Factual,
        ))))
        .with_guardrail(Arc::new(MockGuardrailValidator::passing()))
}

fn request() -> PipelineRequest {
    PipelineRequest::new("What is the refund policy?").with_id("req-1")
}

async fn collect(pipeline: &PipelineOrchestrator, request: PipelineRequest) -> Vec<PipelineEvent> {
    pipeline.execute_streaming(request).collect().await
}

fn tokens(events: &[PipelineEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Token { text } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

fn included_ids(events: &[PipelineEvent]) -> HashSet<String> {
    events
        .iter()
        .find_map(|e| match e {
            PipelineEvent::StageCompleted {
                payload: StagePayload::ContextBuilt { included, .. },
                ..
            } => Some(included.iter().cloned().collect()),
            _ => None,
        })
        .unwrap_or_default()
}

fn started_stages(events: &[PipelineEvent]) -> Vec<Stage> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::StageStarted { stage } => Some(*stage),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_batch_and_streaming_results_match() {
    let pipeline = pipeline(
        keyword_strategy(),
        grader(),
        MockLlmProvider::new("mock").with_content(ANSWER),
    );

    let batch = pipeline.execute(request()).await.unwrap();
    let events = collect(&pipeline, request()).await;
    let streamed = events.last().cloned().and_then(PipelineEvent::into_result).unwrap();

    assert!(batch.same_content(&streamed));
    assert_eq!(batch.answer, ANSWER);
    assert_eq!(tokens(&events).concat(), ANSWER);
    assert_eq!(batch.verdict, CragVerdict::Proceed);
    assert_eq!(batch.citations.len(), 2);
    assert!(batch.disclaimer.is_none());
}

#[tokio::test]
async fn test_event_sequence_order() {
    let pipeline = pipeline(
        keyword_strategy(),
        grader(),
        MockLlmProvider::new("mock").with_content(ANSWER),
    );

    let events = collect(&pipeline, request()).await;

    assert_eq!(
        started_stages(&events),
        vec![
            Stage::Classify,
            Stage::Retrieve,
            Stage::Grade,
            Stage::Rerank,
            Stage::Context,
            Stage::Prompt,
            Stage::Generate,
            Stage::Guardrail,
        ]
    );

    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminals, 1);
    assert!(matches!(events.last(), Some(PipelineEvent::Done { .. })));

    // Tokens follow the guardrail verdict; citations follow the tokens
    let validated = events
        .iter()
        .position(|e| matches!(e, PipelineEvent::StageCompleted { stage: Stage::Guardrail, .. }))
        .unwrap();
    let first_token = events
        .iter()
        .position(|e| matches!(e, PipelineEvent::Token { .. }))
        .unwrap();
    let last_token = events
        .iter()
        .rposition(|e| matches!(e, PipelineEvent::Token { .. }))
        .unwrap();
    let first_citation = events
        .iter()
        .position(|e| matches!(e, PipelineEvent::CitationEmitted { .. }))
        .unwrap();

    assert!(validated < first_token);
    assert!(last_token < first_citation);
}

#[tokio::test]
async fn test_citations_only_reference_included_documents() {
    let filler = "Store credit is issued when the original payment method is unavailable. ".repeat(4);
    let documents: Vec<RetrievedDocument> = corpus()
        .into_iter()
        .map(|mut d| {
            d.text = format!("{} {}", d.text, filler);
            d
        })
        .collect();
    let pipeline = pipeline(
        MockRetrievalStrategy::new("keyword").with_documents(documents),
        MockDocumentGrader::new().with_default_grade(Grade::Relevant),
        MockLlmProvider::new("mock").with_content("See [1], [2] and [3]."),
    );
    let request = request().with_options(RequestOptions::default().with_token_budget(200));

    let events = collect(&pipeline, request.clone()).await;
    let included = included_ids(&events);
    let excluded = events.iter().find_map(|e| match e {
        PipelineEvent::StageCompleted {
            payload: StagePayload::ContextBuilt { excluded, .. },
            ..
        } => Some(excluded.clone()),
        _ => None,
    });

    assert!(!included.is_empty());
    assert!(!excluded.unwrap().is_empty());

    let result = pipeline.execute(request).await.unwrap();
    assert!(!result.citations.is_empty());
    for citation in &result.citations {
        assert!(included.contains(&citation.document_id));
    }
}

#[tokio::test]
async fn test_mixed_grades_proceed() {
    let pipeline = pipeline(
        MockRetrievalStrategy::new("keyword").with_documents(vec![
            RetrievedDocument::new("a", "A", "refund window", 0.9),
            RetrievedDocument::new("b", "B", "refund receipt", 0.8),
            RetrievedDocument::new("c", "C", "refund method", 0.7),
            RetrievedDocument::new("d", "D", "shipping", 0.6),
            RetrievedDocument::new("e", "E", "warranty", 0.5),
        ]),
        MockDocumentGrader::new()
            .with_default_grade(Grade::Relevant)
            .with_grade("d", Grade::Irrelevant)
            .with_grade("e", Grade::Irrelevant),
        MockLlmProvider::new("mock").with_content(ANSWER),
    );

    let result = pipeline.execute(request()).await.unwrap();

    assert_eq!(result.verdict, CragVerdict::Proceed);
    assert!(!result.metrics.self_reflection_attempted);
    for citation in &result.citations {
        assert!(["a", "b", "c"].contains(&citation.document_id.as_str()));
    }
}

#[tokio::test]
async fn test_empty_context_gets_no_evidence_disclaimer() {
    let pipeline = pipeline(
        MockRetrievalStrategy::new("keyword").with_documents(vec![RetrievedDocument::new(
            "refund-policy",
            "Refund policy",
            "Refunds are accepted within 30 days of purchase. ".repeat(40),
            0.9,
        )]),
        MockDocumentGrader::new().with_default_grade(Grade::Relevant),
        MockLlmProvider::new("mock").with_content("Refunds are accepted within 30 days."),
    );
    let request = request().with_options(RequestOptions::default().with_token_budget(20));

    let result = pipeline.execute(request).await.unwrap();

    assert_eq!(result.verdict, CragVerdict::Proceed);
    assert!(result.citations.is_empty());
    assert_eq!(
        result.disclaimer.as_deref(),
        Some(
            pipeline
                .contracts()
                .get(RoutingMode::Auto)
                .no_evidence_disclaimer
                .as_str()
        )
    );
}

#[tokio::test]
async fn test_refuse_skips_generation() {
    let llm = MockLlmProvider::new("mock").with_content(ANSWER);
    let pipeline = pipeline(
        keyword_strategy(),
        MockDocumentGrader::new().with_default_grade(Grade::Irrelevant),
        llm.clone(),
    );

    let events = collect(&pipeline, request()).await;

    assert!(tokens(&events).is_empty());
    assert!(!started_stages(&events).contains(&Stage::Generate));
    match events.last() {
        Some(PipelineEvent::Refused { result, .. }) => {
            assert_eq!(result.verdict, CragVerdict::Refuse);
            assert!(result.citations.is_empty());
            assert_eq!(result.evidence_level, EvidenceLevel::Low);
            assert!(result.metrics.self_reflection_attempted);
        }
        other => panic!("expected Refused, got {:?}", other),
    }

    let result = pipeline.execute(request()).await.unwrap();
    assert!(result.is_refusal());
    assert_eq!(llm.call_count(), 0);
    assert_eq!(llm.stream_call_count(), 0);
}

#[tokio::test]
async fn test_retrieval_unavailable_degrades_without_citations() {
    let pipeline = pipeline(
        MockRetrievalStrategy::new("keyword").with_error("index offline"),
        grader(),
        MockLlmProvider::new("mock").with_content("Refunds usually take a month [1]."),
    );

    let result = pipeline.execute(request()).await.unwrap();

    assert_eq!(result.verdict, CragVerdict::Degrade);
    assert!(result.citations.is_empty());
    assert_eq!(result.evidence_level, EvidenceLevel::Low);
    assert!(result.disclaimer.is_some());
    assert!(result.metrics.is_degraded(Stage::Retrieve));
}

#[tokio::test(start_paused = true)]
async fn test_watchdog_keeps_completed_grades() {
    let llm = MockLlmProvider::new("mock").with_content(ANSWER);
    let pipeline = pipeline(
        keyword_strategy(),
        grader().with_delay("shipping", Duration::from_secs(30)),
        llm.clone(),
    );
    let request = request().with_options(RequestOptions::default().with_watchdog_timeout_ms(200));

    let events = collect(&pipeline, request).await;
    let graded = events.iter().find_map(|e| match e {
        PipelineEvent::StageCompleted {
            payload: StagePayload::Graded { relevant, watchdog_triggered, .. },
            ..
        } => Some((*relevant, *watchdog_triggered)),
        _ => None,
    });

    assert_eq!(graded, Some((2, true)));
    let result = events.last().cloned().and_then(PipelineEvent::into_result).unwrap();
    assert_eq!(result.verdict, CragVerdict::Proceed);
    assert!(result.metrics.watchdog_triggered);
    assert_eq!(llm.stream_call_count(), 1);
}

#[tokio::test]
async fn test_guardrail_violation_replaces_answer() {
    let leaked = "Your SSN on file is 123-45-6789 [1].";
    let pipeline = pipeline(
        keyword_strategy(),
        grader(),
        MockLlmProvider::new("mock").with_content(leaked),
    )
    .with_guardrail(Arc::new(MockGuardrailValidator::violating("ssn")));

    let events = collect(&pipeline, request()).await;

    assert_eq!(tokens(&events), vec![DEFAULT_GUARDRAIL_REFUSAL.to_string()]);
    assert!(!events
        .iter()
        .any(|e| matches!(e, PipelineEvent::CitationEmitted { .. })));

    let result = events.last().cloned().and_then(PipelineEvent::into_result).unwrap();
    assert_eq!(result.answer, DEFAULT_GUARDRAIL_REFUSAL);
    assert!(result.citations.is_empty());
    assert!(result.metrics.guardrail_triggered);
    assert!(!serde_json::to_string(&events).unwrap().contains("123-45-6789"));
}

#[tokio::test]
async fn test_guardrail_unavailable_fails() {
    let pipeline = pipeline(
        keyword_strategy(),
        grader(),
        MockLlmProvider::new("mock").with_content(ANSWER),
    )
    .with_guardrail(Arc::new(MockGuardrailValidator::unavailable("moderation timeout")));

    let events = collect(&pipeline, request()).await;

    assert!(tokens(&events).is_empty());
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::Failed {
            kind: FailureKind::GuardrailUnavailable,
            ..
        })
    ));
}

#[tokio::test]
async fn test_generation_failure_fails() {
    let pipeline = pipeline(
        keyword_strategy(),
        grader(),
        MockLlmProvider::new("mock").with_error("connection refused"),
    );

    let error = pipeline.execute(request()).await.unwrap_err();
    assert_eq!(error.kind(), FailureKind::GenerationUnavailable);

    let events = collect(&pipeline, request()).await;
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::Failed {
            kind: FailureKind::GenerationUnavailable,
            ..
        })
    ));
}

#[tokio::test]
async fn test_empty_answer_fails() {
    let pipeline = pipeline(
        keyword_strategy(),
        grader(),
        MockLlmProvider::new("mock").with_content("   "),
    );

    let error = pipeline.execute(request()).await.unwrap_err();
    assert_eq!(error.kind(), FailureKind::GenerationUnavailable);
}

#[tokio::test]
async fn test_invalid_request_fails_before_any_stage() {
    let pipeline = pipeline(
        keyword_strategy(),
        grader(),
        MockLlmProvider::new("mock").with_content(ANSWER),
    );

    let events = collect(&pipeline, PipelineRequest::new("   ")).await;

    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        PipelineEvent::Failed {
            kind: FailureKind::InvalidRequest,
            ..
        }
    ));
}

#[tokio::test]
async fn test_classification_failure_falls_back_to_auto() {
    let pipeline = pipeline(
        keyword_strategy(),
        grader(),
        MockLlmProvider::new("mock").with_content(ANSWER),
    )
    .with_classifier(Arc::new(MockQueryClassifier::failing("model overloaded")));

    let result = pipeline
        .execute(request().with_mode(RoutingMode::Deep))
        .await
        .unwrap();

    assert_eq!(result.routing_mode, RoutingMode::Auto);
    assert_eq!(result.intent, QueryIntent::Unknown);
    assert!(result.metrics.is_degraded(Stage::Classify));
}

#[tokio::test]
async fn test_history_is_decontextualized_before_retrieval() {
    let strategy = keyword_strategy();
    let pipeline = pipeline(
        strategy.clone(),
        grader(),
        MockLlmProvider::new("mock").with_content(ANSWER),
    )
    .with_decontextualizer(Arc::new(MockDecontextualizer::returning(
        "What is the refund policy for digital goods?",
    )));
    let request = PipelineRequest::new("and for digital goods?").with_history(vec![
        ConversationTurn::user("What is the refund policy?"),
        ConversationTurn::assistant("Refunds are accepted within 30 days."),
    ]);

    let events = collect(&pipeline, request).await;

    assert!(started_stages(&events).contains(&Stage::Decontextualize));
    assert_eq!(
        strategy.queries(),
        vec!["What is the refund policy for digital goods?".to_string()]
    );
}

#[tokio::test]
async fn test_decontextualization_failure_uses_original_query() {
    let strategy = keyword_strategy();
    let pipeline = pipeline(
        strategy.clone(),
        grader(),
        MockLlmProvider::new("mock").with_content(ANSWER),
    )
    .with_decontextualizer(Arc::new(MockDecontextualizer::failing("timeout")));
    let request = PipelineRequest::new("and for digital goods?")
        .with_history(vec![ConversationTurn::user("What is the refund policy?")]);

    let result = pipeline.execute(request).await.unwrap();

    assert_eq!(strategy.queries(), vec!["and for digital goods?".to_string()]);
    assert!(result.metrics.is_degraded(Stage::Decontextualize));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_generation_streams_failure() {
    let pipeline = pipeline(
        keyword_strategy(),
        grader(),
        MockLlmProvider::new("mock")
            .with_content(ANSWER)
            .with_chunk_delay(Duration::from_millis(50)),
    );

    let mut stream = pipeline.execute_streaming(request());
    let token = stream.cancellation_token();
    let mut events = Vec::new();

    while let Some(event) = stream.next().await {
        let generating = matches!(
            event,
            PipelineEvent::StageStarted {
                stage: Stage::Generate
            }
        );
        events.push(event);
        if generating {
            token.cancel();
        }
    }

    assert!(tokens(&events).is_empty());
    assert!(!events.iter().any(|e| matches!(e, PipelineEvent::Done { .. })));
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::Failed {
            kind: FailureKind::Cancelled,
            ..
        })
    ));
}

#[tokio::test]
async fn test_cancel_while_releasing_tokens_never_reports_done() {
    let pipeline = pipeline(
        keyword_strategy(),
        grader(),
        MockLlmProvider::new("mock").with_content(ANSWER),
    )
    .with_config(PipelineConfig {
        event_buffer: 1,
        ..PipelineConfig::default()
    });

    let mut stream = pipeline.execute_streaming(request());
    let token = stream.cancellation_token();
    let mut events = Vec::new();

    while let Some(event) = stream.next().await {
        let first_token = matches!(event, PipelineEvent::Token { .. }) && !token.is_cancelled();
        events.push(event);
        if first_token {
            token.cancel();
        }
    }

    assert!(!tokens(&events).is_empty());
    assert!(tokens(&events).len() < ANSWER.split_inclusive(' ').count());
    assert!(!events.iter().any(|e| matches!(e, PipelineEvent::Done { .. })));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::Failed {
            kind: FailureKind::Cancelled,
            ..
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_batch_execution() {
    let pipeline = pipeline(
        keyword_strategy(),
        grader(),
        MockLlmProvider::new("mock")
            .with_content(ANSWER)
            .with_delay(Duration::from_secs(5)),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let error = pipeline
        .execute_with_cancellation(request(), cancel)
        .await
        .unwrap_err();

    assert_eq!(error.kind(), FailureKind::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_stream_releases_generation() {
    let llm = MockLlmProvider::new("mock")
        .with_content(ANSWER)
        .with_chunk_delay(Duration::from_millis(20));
    let pipeline = pipeline(keyword_strategy(), grader(), llm.clone());

    let mut stream = pipeline.execute_streaming(request());
    while let Some(event) = stream.next().await {
        if matches!(
            event,
            PipelineEvent::StageStarted {
                stage: Stage::Generate
            }
        ) {
            break;
        }
    }

    // Let a few chunks arrive, then walk away
    let pending = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
    assert!(pending.is_err());
    let token = stream.cancellation_token();
    drop(stream);

    assert!(token.is_cancelled());
    assert_eq!(llm.stream_call_count(), 1);
    assert_eq!(llm.streams_dropped(), 1);
}

#[tokio::test]
async fn test_stream_is_lazy() {
    let strategy = keyword_strategy();
    let pipeline = pipeline(
        strategy.clone(),
        grader(),
        MockLlmProvider::new("mock").with_content(ANSWER),
    );

    let stream = pipeline.execute_streaming(request());
    tokio::task::yield_now().await;
    assert!(strategy.queries().is_empty());

    drop(stream);
    assert!(strategy.queries().is_empty());
}

#[tokio::test]
async fn test_parent_token_cancels_stream() {
    let pipeline = pipeline(
        keyword_strategy(),
        grader(),
        MockLlmProvider::new("mock").with_content(ANSWER),
    );
    let parent = CancellationToken::new();
    parent.cancel();

    let events: Vec<_> = pipeline
        .execute_streaming_with_cancellation(request(), parent)
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        PipelineEvent::Failed {
            kind: FailureKind::Cancelled,
            ..
        }
    ));
}
