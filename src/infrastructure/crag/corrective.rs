//! The GRADE stage: bounded concurrent grading, verdict reduction and a single
//! self-reflection retry, all under one watchdog deadline.

use std::sync::Arc;
use std::time::Duration;

use futures::{stream, StreamExt};
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, info, warn};

use super::ThresholdGrader;
use crate::domain::crag::{CragConfig, CragResult, CragVerdict, DocumentGrader, GradedDocument};
use crate::domain::pipeline::RoutingMode;
use crate::domain::query::QueryRefiner;
use crate::domain::retrieval::RetrievedDocument;
use crate::infrastructure::retrieval::FanOutRetriever;

/// Grades of one round, in retrieval order
#[derive(Debug, Clone, Default)]
struct GradingRound {
    documents: Vec<GradedDocument>,
    watchdog_triggered: bool,
}

/// Where self-reflection re-retrieves from
#[derive(Debug, Clone, Copy)]
pub struct ReflectionTarget<'a> {
    pub retriever: &'a FanOutRetriever,
    pub mode: RoutingMode,
    pub top_k: usize,
}

#[derive(Debug, Clone)]
pub struct CorrectiveGrader {
    grader: Arc<dyn DocumentGrader>,
    fallback: ThresholdGrader,
    refiner: Arc<dyn QueryRefiner>,
    config: CragConfig,
}

impl CorrectiveGrader {
    pub fn new(
        grader: Arc<dyn DocumentGrader>,
        refiner: Arc<dyn QueryRefiner>,
        config: CragConfig,
    ) -> Self {
        Self {
            grader,
            fallback: ThresholdGrader::new(config.clone()),
            refiner,
            config,
        }
    }

    pub fn config(&self) -> &CragConfig {
        &self.config
    }

    /// Grade the documents and decide the verdict.
    ///
    /// The watchdog covers grading, query refinement, re-retrieval and
    /// re-grading; when it fires the verdict is reduced from whatever grades
    /// had completed.
    pub async fn evaluate(
        &self,
        query: &str,
        documents: Vec<RetrievedDocument>,
        watchdog: Duration,
        target: ReflectionTarget<'_>,
    ) -> CragResult {
        let deadline = Instant::now() + watchdog;

        let round = self.grade_round(query, documents, deadline).await;
        let first = CragResult::from_graded(round.documents, query, &self.config)
            .with_watchdog_triggered(round.watchdog_triggered);

        debug!(
            verdict = %first.verdict,
            relevant = first.tally.relevant,
            ambiguous = first.tally.ambiguous,
            irrelevant = first.tally.irrelevant,
            watchdog_triggered = first.watchdog_triggered,
            "Grading round complete"
        );

        if first.verdict != CragVerdict::Refuse
            || !self.config.self_reflection_enabled()
            || first.watchdog_triggered
        {
            return first;
        }

        info!(reason = %first.reason, "Verdict would refuse; attempting self-reflection");

        match timeout_at(deadline, self.reflect(query, &first.documents, deadline, target)).await {
            Ok(Some(reflected)) => {
                info!(
                    verdict = %reflected.verdict,
                    query = %reflected.evaluated_query,
                    "Self-reflection replaced grading result"
                );
                let watchdog_triggered = reflected.watchdog_triggered;
                reflected
                    .with_self_reflection_attempted(true)
                    .with_watchdog_triggered(watchdog_triggered)
            }
            Ok(None) => first.with_self_reflection_attempted(true),
            Err(_) => {
                warn!("Watchdog fired during self-reflection");
                first
                    .with_self_reflection_attempted(true)
                    .with_watchdog_triggered(true)
            }
        }
    }

    /// Refine, re-retrieve and re-grade; `None` keeps the first result
    async fn reflect(
        &self,
        query: &str,
        graded: &[GradedDocument],
        deadline: Instant,
        target: ReflectionTarget<'_>,
    ) -> Option<CragResult> {
        let refined = match self.refiner.refine(query, graded).await {
            Ok(refined) => refined,
            Err(e) => {
                warn!(error = %e, "Query refinement failed");
                return None;
            }
        };

        let outcome = target
            .retriever
            .retrieve(&refined, target.mode, target.top_k)
            .await;
        if outcome.documents.is_empty() {
            debug!(query = %refined, "Re-retrieval returned no documents");
            return None;
        }

        let round = self.grade_round(&refined, outcome.documents, deadline).await;
        Some(
            CragResult::from_graded(round.documents, refined, &self.config)
                .with_watchdog_triggered(round.watchdog_triggered),
        )
    }

    async fn grade_round(
        &self,
        query: &str,
        documents: Vec<RetrievedDocument>,
        deadline: Instant,
    ) -> GradingRound {
        let documents: Vec<RetrievedDocument> = documents
            .into_iter()
            .take(self.config.max_documents_to_grade)
            .collect();
        let total = documents.len();

        let mut pending = stream::iter(documents.into_iter().enumerate())
            .map(|(index, document)| async move { (index, self.grade_one(query, document).await) })
            .buffer_unordered(self.config.grading_concurrency.max(1));

        let watchdog = sleep_until(deadline);
        tokio::pin!(watchdog);

        let mut completed = Vec::with_capacity(total);
        let mut watchdog_triggered = false;

        loop {
            tokio::select! {
                biased;
                next = pending.next() => match next {
                    Some(graded) => completed.push(graded),
                    None => break,
                },
                _ = &mut watchdog => {
                    watchdog_triggered = true;
                    warn!(
                        completed = completed.len(),
                        total,
                        "Grading watchdog fired; using partial grades"
                    );
                    break;
                }
            }
        }

        completed.sort_by_key(|(index, _)| *index);

        GradingRound {
            documents: completed.into_iter().map(|(_, graded)| graded).collect(),
            watchdog_triggered,
        }
    }

    async fn grade_one(&self, query: &str, document: RetrievedDocument) -> GradedDocument {
        match self.grader.grade_document(query, &document).await {
            Ok(graded) => graded,
            Err(e) => {
                warn!(
                    document_id = %document.id,
                    grader = self.grader.grader_name(),
                    error = %e,
                    "Grading failed; using retrieval score"
                );
                self.fallback
                    .grade(&document)
                    .with_note(format!("Threshold fallback after grader error: {}", e))
            }
        }
    }
}
