//! Pipeline orchestrator
//!
//! Holds the stage collaborators and exposes batch and streaming execution.
//! Both entry points drive the same stage runner; they only differ in where
//! events go.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use super::runner::StageRunner;
use super::sink::{ChannelSink, DiscardSink};
use super::stream::PipelineEventStream;
use crate::domain::contract::AnswerContractRegistry;
use crate::domain::guardrail::{GuardrailValidator, DEFAULT_GUARDRAIL_REFUSAL};
use crate::domain::pipeline::{PipelineConfig, PipelineError, PipelineRequest, RagResult};
use crate::domain::query::{Decontextualizer, QueryClassifier};
use crate::domain::rerank::Reranker;
use crate::infrastructure::context::ContextBuilder;
use crate::infrastructure::crag::CorrectiveGrader;
use crate::infrastructure::guardrail::PatternGuardrailValidator;
use crate::infrastructure::llm::Generator;
use crate::infrastructure::prompt::PromptBuilder;
use crate::infrastructure::query::{HeuristicDecontextualizer, RuleBasedClassifier};
use crate::infrastructure::rerank::LexicalReranker;
use crate::infrastructure::retrieval::FanOutRetriever;

/// Stage collaborators, injected once and shared read-only by every request
#[derive(Debug, Clone)]
pub struct PipelineOrchestrator {
    pub(super) classifier: Arc<dyn QueryClassifier>,
    pub(super) decontextualizer: Arc<dyn Decontextualizer>,
    pub(super) retriever: Arc<FanOutRetriever>,
    pub(super) grader: Arc<CorrectiveGrader>,
    pub(super) reranker: Arc<dyn Reranker>,
    pub(super) context_builder: ContextBuilder,
    pub(super) prompt_builder: Arc<PromptBuilder>,
    pub(super) generator: Arc<Generator>,
    pub(super) guardrail: Arc<dyn GuardrailValidator>,
    pub(super) contracts: Arc<AnswerContractRegistry>,
    pub(super) config: PipelineConfig,
    pub(super) guardrail_refusal: String,
}

impl PipelineOrchestrator {
    /// Orchestrator with the rule-based classifier, heuristic
    /// decontextualizer, lexical reranker, pattern guardrail and default contracts
    pub fn new(retriever: FanOutRetriever, grader: CorrectiveGrader, generator: Generator) -> Self {
        Self {
            classifier: Arc::new(RuleBasedClassifier::new()),
            decontextualizer: Arc::new(HeuristicDecontextualizer::new()),
            retriever: Arc::new(retriever),
            grader: Arc::new(grader),
            reranker: Arc::new(LexicalReranker::new()),
            context_builder: ContextBuilder::new(),
            prompt_builder: Arc::new(PromptBuilder::new()),
            generator: Arc::new(generator),
            guardrail: Arc::new(PatternGuardrailValidator::new()),
            contracts: Arc::new(AnswerContractRegistry::default()),
            config: PipelineConfig::default(),
            guardrail_refusal: DEFAULT_GUARDRAIL_REFUSAL.to_string(),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn QueryClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_decontextualizer(mut self, decontextualizer: Arc<dyn Decontextualizer>) -> Self {
        self.decontextualizer = decontextualizer;
        self
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = reranker;
        self
    }

    pub fn with_prompt_builder(mut self, prompt_builder: PromptBuilder) -> Self {
        self.prompt_builder = Arc::new(prompt_builder);
        self
    }

    pub fn with_guardrail(mut self, guardrail: Arc<dyn GuardrailValidator>) -> Self {
        self.guardrail = guardrail;
        self
    }

    pub fn with_guardrail_refusal(mut self, refusal: impl Into<String>) -> Self {
        self.guardrail_refusal = refusal.into();
        self
    }

    pub fn with_contracts(mut self, contracts: AnswerContractRegistry) -> Self {
        self.contracts = Arc::new(contracts);
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn contracts(&self) -> &AnswerContractRegistry {
        &self.contracts
    }

    /// Run a request to completion
    pub async fn execute(&self, request: PipelineRequest) -> Result<RagResult, PipelineError> {
        self.execute_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Run a request to completion; cancelling `cancel` aborts the active stage
    pub async fn execute_with_cancellation(
        &self,
        request: PipelineRequest,
        cancel: CancellationToken,
    ) -> Result<RagResult, PipelineError> {
        let span = info_span!(
            "rag_pipeline",
            request_id = %request.id(),
            mode = %request.mode(),
            streaming = false
        );

        let mut sink = DiscardSink;
        StageRunner::new(self, &request, &cancel, &mut sink)
            .run()
            .instrument(span)
            .await
            .into_result()
    }

    /// Lazy event stream for a request. Nothing runs until the first poll,
    /// and dropping the stream cancels the run.
    pub fn execute_streaming(&self, request: PipelineRequest) -> PipelineEventStream {
        self.execute_streaming_with_cancellation(request, CancellationToken::new())
    }

    pub fn execute_streaming_with_cancellation(
        &self,
        request: PipelineRequest,
        cancel: CancellationToken,
    ) -> PipelineEventStream {
        let (sender, receiver) = mpsc::channel(self.config.event_buffer.max(1));
        let cancel = cancel.child_token();
        let span = info_span!(
            "rag_pipeline",
            request_id = %request.id(),
            mode = %request.mode(),
            streaming = true
        );

        let pipeline = self.clone();
        let token = cancel.clone();
        let driver = async move {
            let mut sink = ChannelSink::new(sender);
            StageRunner::new(&pipeline, &request, &token, &mut sink)
                .run()
                .await;
        }
        .instrument(span)
        .boxed();

        PipelineEventStream::new(driver, ReceiverStream::new(receiver), cancel)
    }
}
