//! The stage runner shared by batch and streaming execution
//!
//! Stages run in a fixed order and hand their output to the next stage as
//! plain values. Every collaborator call is raced against the cancellation
//! token; a cancelled run ends in `Failed` and never in `Done`.

use std::future::Future;
use std::time::Instant;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::citations::extract_citations;
use super::orchestrator::PipelineOrchestrator;
use super::sink::EventSink;
use crate::domain::contract::AnswerContract;
use crate::domain::crag::{CragResult, CragVerdict};
use crate::domain::guardrail::GuardrailVerdict;
use crate::domain::llm::Message;
use crate::domain::pipeline::{
    validate_pipeline_request, Citation, EvidenceLevel, PipelineError, PipelineEvent,
    PipelineMetrics, PipelineRequest, RagResult, RequestSettings, RoutingMode, Stage,
    StagePayload,
};
use crate::domain::query::Classification;
use crate::domain::rerank::RankedDocument;
use crate::domain::DomainError;
use crate::infrastructure::context::BuiltContext;
use crate::infrastructure::crag::ReflectionTarget;
use crate::infrastructure::llm::Generator;
use crate::infrastructure::observability::{record_degradation, record_pipeline_outcome, record_stage};
use crate::infrastructure::prompt::BuiltPrompt;
use crate::infrastructure::retrieval::RetrievalOutcome;

/// How a run ended
#[derive(Debug, Clone)]
pub(super) enum Terminal {
    Done(RagResult),
    Refused { reason: String, result: RagResult },
    Failed(PipelineError),
}

impl Terminal {
    fn outcome(&self) -> &'static str {
        match self {
            Self::Done(_) => "done",
            Self::Refused { .. } => "refused",
            Self::Failed(e) if e.is_cancelled() => "cancelled",
            Self::Failed(_) => "failed",
        }
    }

    fn with_metrics(mut self, metrics: &PipelineMetrics) -> Self {
        match &mut self {
            Self::Done(result) | Self::Refused { result, .. } => result.metrics = metrics.clone(),
            Self::Failed(_) => {}
        }
        self
    }

    fn to_event(&self) -> PipelineEvent {
        match self {
            Self::Done(result) => PipelineEvent::Done {
                result: Box::new(result.clone()),
            },
            Self::Refused { reason, result } => PipelineEvent::Refused {
                reason: reason.clone(),
                result: Box::new(result.clone()),
            },
            Self::Failed(error) => PipelineEvent::Failed {
                kind: error.kind(),
                message: error.to_string(),
            },
        }
    }

    pub(super) fn into_result(self) -> Result<RagResult, PipelineError> {
        match self {
            Self::Done(result) | Self::Refused { result, .. } => Ok(result),
            Self::Failed(error) => Err(error),
        }
    }
}

/// Generated answer and the chunks it arrived in
#[derive(Debug, Default)]
struct Generation {
    answer: String,
    chunks: Vec<String>,
}

/// Race a collaborator call against cancellation
async fn guard<F: Future>(
    cancel: &CancellationToken,
    stage: Stage,
    future: F,
) -> Result<F::Output, PipelineError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::cancelled(stage)),
        output = future => Ok(output),
    }
}

async fn collect_stream(
    generator: &Generator,
    messages: Vec<Message>,
) -> Result<Generation, DomainError> {
    let mut stream = generator.generate_stream(messages).await?;
    let mut generation = Generation::default();

    while let Some(chunk) = stream.next().await {
        if let Some(delta) = chunk?.delta.filter(|d| !d.is_empty()) {
            generation.answer.push_str(&delta);
            generation.chunks.push(delta);
        }
    }

    Ok(generation)
}

pub(super) struct StageRunner<'a, S: EventSink> {
    pipeline: &'a PipelineOrchestrator,
    request: &'a PipelineRequest,
    cancel: &'a CancellationToken,
    sink: &'a mut S,
    metrics: PipelineMetrics,
    mode: RoutingMode,
    /// Last stage started; a late cancellation is attributed to it
    stage: Stage,
    started: Instant,
}

impl<'a, S: EventSink> StageRunner<'a, S> {
    pub(super) fn new(
        pipeline: &'a PipelineOrchestrator,
        request: &'a PipelineRequest,
        cancel: &'a CancellationToken,
        sink: &'a mut S,
    ) -> Self {
        Self {
            pipeline,
            request,
            cancel,
            sink,
            metrics: PipelineMetrics::new(),
            mode: request.mode(),
            stage: Stage::Classify,
            started: Instant::now(),
        }
    }

    /// Run every stage and emit exactly one terminal event
    pub(super) async fn run(mut self) -> Terminal {
        let terminal = match self.run_stages().await {
            Ok(terminal) => terminal,
            Err(e) if e.is_cancelled() => {
                warn!(error = %e, "Pipeline cancelled");
                Terminal::Failed(e)
            }
            Err(e) => {
                error!(error = %e, "Pipeline failed");
                Terminal::Failed(e)
            }
        };

        // A run cancelled after its last stage still ends in `Failed`
        let terminal = match terminal {
            Terminal::Failed(_) => terminal,
            _ if self.cancel.is_cancelled() => {
                warn!(stage = %self.stage, "Pipeline cancelled before completion was reported");
                Terminal::Failed(PipelineError::cancelled(self.stage))
            }
            _ => terminal,
        };

        self.metrics.finish(self.started.elapsed());
        let terminal = terminal.with_metrics(&self.metrics);

        info!(
            outcome = terminal.outcome(),
            mode = %self.mode,
            latency_ms = self.metrics.total_latency_ms,
            watchdog_triggered = self.metrics.watchdog_triggered,
            guardrail_triggered = self.metrics.guardrail_triggered,
            "Pipeline finished"
        );
        record_pipeline_outcome(terminal.outcome(), self.mode, &self.metrics);

        self.deliver(terminal).await
    }

    /// Emit the terminal event. A successful terminal still waiting for
    /// channel capacity when the run is cancelled is replaced by `Failed`.
    async fn deliver(&mut self, terminal: Terminal) -> Terminal {
        if let Terminal::Failed(_) = terminal {
            self.sink.emit(terminal.to_event()).await;
            return terminal;
        }

        match guard(self.cancel, self.stage, self.sink.emit(terminal.to_event())).await {
            Ok(()) => terminal,
            Err(cancelled) => {
                warn!(stage = %self.stage, "Pipeline cancelled while reporting completion");
                let failed = Terminal::Failed(cancelled);
                self.sink.emit(failed.to_event()).await;
                failed
            }
        }
    }

    async fn run_stages(&mut self) -> Result<Terminal, PipelineError> {
        validate_pipeline_request(self.request).map_err(PipelineError::invalid_request)?;

        let pipeline = self.pipeline;
        let settings = pipeline.config.resolve(
            self.request.options(),
            pipeline.grader.config().watchdog_timeout_ms,
        );

        let classification = self.classify().await?;
        let contract = pipeline.contracts.get(classification.mode);

        let query = if self.request.has_history() {
            self.decontextualize().await?
        } else {
            self.request.query().to_string()
        };

        let retrieval = self.retrieve(&query, &settings).await?;
        let crag = self.grade(&query, retrieval, &settings).await?;

        if crag.verdict == CragVerdict::Refuse {
            info!(reason = %crag.reason, "Refusing without generation");
            let result = self.result(
                contract.refusal_text.clone(),
                Vec::new(),
                crag.verdict,
                classification,
                None,
            );
            return Ok(Terminal::Refused {
                reason: crag.reason,
                result,
            });
        }

        let ranked = self.rerank(&crag).await?;
        let context = self.build_context(ranked, &settings).await?;
        let prompt = self
            .build_prompt(contract, classification, &query, &context, &settings)
            .await?;
        let generation = self.generate(prompt, &context).await?;

        self.finish(generation, &crag, contract, classification, &context)
            .await
    }

    async fn start(&mut self, stage: Stage) -> Result<Instant, PipelineError> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::cancelled(stage));
        }

        self.stage = stage;
        debug!(stage = %stage, "Stage started");
        self.sink.emit(PipelineEvent::StageStarted { stage }).await;
        Ok(Instant::now())
    }

    async fn complete(
        &mut self,
        stage: Stage,
        started: Instant,
        documents_in: usize,
        documents_out: usize,
        payload: StagePayload,
    ) {
        let latency = started.elapsed();
        self.metrics
            .record_stage(stage, latency, documents_in, documents_out);
        record_stage(stage, latency);

        debug!(
            stage = %stage,
            latency_ms = latency.as_millis() as u64,
            documents_in,
            documents_out,
            "Stage completed"
        );
        self.sink
            .emit(PipelineEvent::StageCompleted { stage, payload })
            .await;
    }

    fn degrade(&mut self, stage: Stage, reason: String) {
        warn!(stage = %stage, reason = %reason, "Stage degraded");
        record_degradation(stage);
        self.metrics.record_degradation(stage, reason);
    }

    async fn classify(&mut self) -> Result<Classification, PipelineError> {
        let started = self.start(Stage::Classify).await?;

        let classified = guard(
            self.cancel,
            Stage::Classify,
            self.pipeline
                .classifier
                .classify(self.request.query(), self.request.mode()),
        )
        .await?;

        let (classification, fallback) = match classified {
            Ok(classification) => (classification, false),
            Err(e) => {
                self.degrade(Stage::Classify, format!("Classification failed: {}", e));
                (Classification::fallback(), true)
            }
        };
        self.mode = classification.mode;

        self.complete(
            Stage::Classify,
            started,
            0,
            0,
            StagePayload::Classified {
                mode: classification.mode,
                intent: classification.intent,
                fallback,
            },
        )
        .await;

        Ok(classification)
    }

    async fn decontextualize(&mut self) -> Result<String, PipelineError> {
        let started = self.start(Stage::Decontextualize).await?;
        let request = self.request;
        let original = request.query();

        let rewritten = guard(
            self.cancel,
            Stage::Decontextualize,
            self.pipeline
                .decontextualizer
                .decontextualize(original, request.history()),
        )
        .await?;

        let query = match rewritten {
            Ok(query) if !query.trim().is_empty() => query,
            Ok(_) => {
                self.degrade(Stage::Decontextualize, "Rewrite was empty".to_string());
                original.to_string()
            }
            Err(e) => {
                self.degrade(
                    Stage::Decontextualize,
                    format!("Decontextualization failed: {}", e),
                );
                original.to_string()
            }
        };

        let rewritten = query != original;
        self.complete(
            Stage::Decontextualize,
            started,
            0,
            0,
            StagePayload::Decontextualized {
                query: query.clone(),
                rewritten,
            },
        )
        .await;

        Ok(query)
    }

    async fn retrieve(
        &mut self,
        query: &str,
        settings: &RequestSettings,
    ) -> Result<RetrievalOutcome, PipelineError> {
        let started = self.start(Stage::Retrieve).await?;

        let outcome = guard(
            self.cancel,
            Stage::Retrieve,
            self.pipeline.retriever.retrieve(query, self.mode, settings.top_k),
        )
        .await?;

        if !outcome.strategies_failed.is_empty() {
            self.degrade(
                Stage::Retrieve,
                format!(
                    "Retrieval strategies failed: {}",
                    outcome.strategies_failed.join(", ")
                ),
            );
        }

        self.complete(
            Stage::Retrieve,
            started,
            0,
            outcome.documents.len(),
            StagePayload::Retrieved {
                documents: outcome.documents.len(),
                strategies_attempted: outcome.strategies_attempted.len(),
                strategies_failed: outcome.strategies_failed.clone(),
            },
        )
        .await;

        Ok(outcome)
    }

    async fn grade(
        &mut self,
        query: &str,
        retrieval: RetrievalOutcome,
        settings: &RequestSettings,
    ) -> Result<CragResult, PipelineError> {
        let started = self.start(Stage::Grade).await?;
        let documents_in = retrieval.documents.len();
        let pipeline = self.pipeline;

        let crag = if retrieval.unavailable() {
            warn!("No retrieval strategy succeeded; degrading without grading");
            CragResult::retrieval_unavailable(query)
        } else {
            let target = ReflectionTarget {
                retriever: &pipeline.retriever,
                mode: self.mode,
                top_k: settings.top_k,
            };
            guard(
                self.cancel,
                Stage::Grade,
                pipeline.grader.evaluate(
                    query,
                    retrieval.documents,
                    settings.watchdog_timeout,
                    target,
                ),
            )
            .await?
        };

        self.metrics.watchdog_triggered = crag.watchdog_triggered;
        self.metrics.self_reflection_attempted = crag.self_reflection_attempted;

        let survivors = crag
            .survivors(pipeline.grader.config().include_ambiguous)
            .len();
        self.complete(
            Stage::Grade,
            started,
            documents_in,
            survivors,
            StagePayload::Graded {
                verdict: crag.verdict,
                reason: crag.reason.clone(),
                relevant: crag.tally.relevant,
                ambiguous: crag.tally.ambiguous,
                irrelevant: crag.tally.irrelevant,
                watchdog_triggered: crag.watchdog_triggered,
                self_reflection_attempted: crag.self_reflection_attempted,
            },
        )
        .await;

        Ok(crag)
    }

    async fn rerank(&mut self, crag: &CragResult) -> Result<Vec<RankedDocument>, PipelineError> {
        let started = self.start(Stage::Rerank).await?;

        let survivors = crag.survivors(self.pipeline.grader.config().include_ambiguous);
        let documents_in = survivors.len();
        let ranked = self
            .pipeline
            .reranker
            .rerank(&crag.evaluated_query, survivors);

        self.complete(
            Stage::Rerank,
            started,
            documents_in,
            ranked.len(),
            StagePayload::Reranked {
                document_ids: ranked.iter().map(|d| d.id().to_string()).collect(),
            },
        )
        .await;

        Ok(ranked)
    }

    async fn build_context(
        &mut self,
        ranked: Vec<RankedDocument>,
        settings: &RequestSettings,
    ) -> Result<BuiltContext, PipelineError> {
        let started = self.start(Stage::Context).await?;
        let documents_in = ranked.len();

        let context = self
            .pipeline
            .context_builder
            .build(ranked, settings.token_budget);

        self.complete(
            Stage::Context,
            started,
            documents_in,
            context.entries.len(),
            StagePayload::ContextBuilt {
                included: context.included_ids(),
                excluded: context.excluded.clone(),
                tokens_used: context.tokens_used,
                token_budget: context.token_budget,
            },
        )
        .await;

        Ok(context)
    }

    async fn build_prompt(
        &mut self,
        contract: &AnswerContract,
        classification: Classification,
        query: &str,
        context: &BuiltContext,
        settings: &RequestSettings,
    ) -> Result<BuiltPrompt, PipelineError> {
        let started = self.start(Stage::Prompt).await?;

        let prompt = guard(
            self.cancel,
            Stage::Prompt,
            self.pipeline.prompt_builder.build(
                contract,
                classification.intent,
                query,
                context,
                settings.max_exemplars,
            ),
        )
        .await?;

        if let Some(reason) = prompt.degradation.clone() {
            self.degrade(Stage::Prompt, reason);
        }

        self.complete(
            Stage::Prompt,
            started,
            context.entries.len(),
            context.entries.len(),
            StagePayload::PromptBuilt {
                contract: prompt.contract.clone(),
                exemplars: prompt.exemplars,
                estimated_tokens: prompt.estimated_tokens,
            },
        )
        .await;

        Ok(prompt)
    }

    async fn generate(
        &mut self,
        prompt: BuiltPrompt,
        context: &BuiltContext,
    ) -> Result<Generation, PipelineError> {
        let started = self.start(Stage::Generate).await?;
        let pipeline = self.pipeline;
        let generator = &pipeline.generator;

        let generated = if self.sink.streaming() {
            guard(
                self.cancel,
                Stage::Generate,
                collect_stream(generator, prompt.messages),
            )
            .await?
        } else {
            guard(self.cancel, Stage::Generate, generator.generate(prompt.messages))
                .await?
                .map(|answer| Generation {
                    chunks: vec![answer.clone()],
                    answer,
                })
        };

        let generation = generated.map_err(|e| PipelineError::generation(e.to_string()))?;
        if generation.answer.trim().is_empty() {
            return Err(PipelineError::generation("Generator returned an empty answer"));
        }

        self.complete(
            Stage::Generate,
            started,
            context.entries.len(),
            context.entries.len(),
            StagePayload::Generated {
                characters: generation.answer.chars().count(),
            },
        )
        .await;

        Ok(generation)
    }

    /// Validate the answer, then release tokens and citations
    async fn finish(
        &mut self,
        generation: Generation,
        crag: &CragResult,
        contract: &AnswerContract,
        classification: Classification,
        context: &BuiltContext,
    ) -> Result<Terminal, PipelineError> {
        let started = self.start(Stage::Guardrail).await?;

        let verdict = guard(
            self.cancel,
            Stage::Guardrail,
            self.pipeline.guardrail.validate(&generation.answer),
        )
        .await?
        .map_err(|e| PipelineError::guardrail(e.to_string()))?;

        self.complete(
            Stage::Guardrail,
            started,
            context.entries.len(),
            context.entries.len(),
            StagePayload::Validated {
                passed: verdict.passed(),
                reason: verdict.reason().map(str::to_string),
            },
        )
        .await;

        // Nothing is released once the caller has cancelled
        if self.cancel.is_cancelled() {
            return Err(PipelineError::cancelled(Stage::Guardrail));
        }

        let (answer, chunks, citations, disclaimer) = match verdict {
            GuardrailVerdict::Pass => {
                let citations = extract_citations(&generation.answer, context);
                // An empty context means the answer had no sources, whatever the verdict
                let disclaimer = if context.is_empty() {
                    Some(contract.no_evidence_disclaimer.clone())
                } else if crag.verdict == CragVerdict::Degrade {
                    Some(contract.low_evidence_disclaimer.clone())
                } else {
                    None
                };
                (generation.answer, generation.chunks, citations, disclaimer)
            }
            GuardrailVerdict::Violation { rule, .. } => {
                warn!(rule = %rule, "Guardrail violation; answer replaced");
                self.metrics.guardrail_triggered = true;
                let refusal = self.pipeline.guardrail_refusal.clone();
                (refusal.clone(), vec![refusal], Vec::new(), None)
            }
        };

        // Each release waits on the consumer, so each one races cancellation
        if self.sink.streaming() {
            for text in chunks {
                guard(
                    self.cancel,
                    Stage::Guardrail,
                    self.sink.emit(PipelineEvent::Token { text }),
                )
                .await?;
            }
            for citation in &citations {
                guard(
                    self.cancel,
                    Stage::Guardrail,
                    self.sink.emit(PipelineEvent::CitationEmitted {
                        citation: citation.clone(),
                    }),
                )
                .await?;
            }
        }

        if self.cancel.is_cancelled() {
            return Err(PipelineError::cancelled(Stage::Guardrail));
        }

        let result = self.result(answer, citations, crag.verdict, classification, disclaimer);
        Ok(Terminal::Done(result))
    }

    fn result(
        &self,
        answer: String,
        citations: Vec<Citation>,
        verdict: CragVerdict,
        classification: Classification,
        disclaimer: Option<String>,
    ) -> RagResult {
        RagResult {
            request_id: self.request.id().to_string(),
            answer,
            evidence_level: EvidenceLevel::derive(verdict, &citations),
            citations,
            verdict,
            routing_mode: classification.mode,
            intent: classification.intent,
            disclaimer,
            metrics: PipelineMetrics::default(),
        }
    }
}
