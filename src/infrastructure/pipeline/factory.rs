//! Builds the orchestrator from application configuration

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{info, warn};

use super::orchestrator::PipelineOrchestrator;
use crate::config::AppConfig;
use crate::domain::contract::AnswerContractRegistry;
use crate::domain::crag::{DocumentGrader, GradingStrategy};
use crate::domain::guardrail::DEFAULT_GUARDRAIL_REFUSAL;
use crate::domain::llm::LlmProvider;
use crate::domain::pipeline::RoutingMode;
use crate::domain::query::{Decontextualizer, QueryRefiner};
use crate::domain::retrieval::{RetrievalRouting, KEYWORD_STRATEGY};
use crate::domain::DomainError;
use crate::infrastructure::crag::{CorrectiveGrader, HybridGrader, LlmGrader, ThresholdGrader};
use crate::infrastructure::guardrail::PatternGuardrailValidator;
use crate::infrastructure::llm::{
    GenerationSettings, Generator, HttpClient, OpenAiCompatibleProvider,
};
use crate::infrastructure::prompt::{InMemoryExampleStore, PromptBuilder};
use crate::infrastructure::query::{
    HeuristicDecontextualizer, KeywordQueryRefiner, LlmDecontextualizer, LlmQueryRefiner,
};
use crate::infrastructure::retrieval::{FanOutRetriever, InMemoryKeywordStrategy};

/// Wire every stage from configuration.
///
/// Fails on configuration that cannot serve a single request: unknown routing
/// modes, invalid contract templates, unreadable corpus or exemplar files.
pub fn build_orchestrator(config: &AppConfig) -> Result<PipelineOrchestrator, DomainError> {
    let http = HttpClient::with_timeout(config.llm.timeout())?;
    let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatibleProvider::new(
        http,
        config.llm.api_key.clone(),
        config.llm.base_url.clone(),
    ));

    let retriever = build_retriever(config)?;
    let grader = build_grader(config, &provider);
    let generator = Generator::new(provider.clone(), generation_settings(config));

    let contracts = AnswerContractRegistry::with_overrides(parse_modes(
        config.contracts.clone(),
        "contracts",
    )?)
    .map_err(|e| DomainError::configuration(format!("Invalid answer contract: {}", e)))?;

    let mut prompt_builder = PromptBuilder::new();
    if let Some(path) = &config.examples_path {
        let store = InMemoryExampleStore::from_json_file(path)?;
        info!(path = %path, exemplars = store.len(), "Loaded answer exemplars");
        prompt_builder = prompt_builder.with_examples(Arc::new(store));
    }

    let guardrail = PatternGuardrailValidator::new()
        .with_sensitive_data(config.guardrail.detect_sensitive_data)
        .with_blocked_terms(config.guardrail.blocked_terms.clone());
    let refusal = config
        .guardrail
        .refusal_text
        .clone()
        .unwrap_or_else(|| DEFAULT_GUARDRAIL_REFUSAL.to_string());

    let decontextualizer: Arc<dyn Decontextualizer> = match &config.llm.decontextualize_model {
        Some(model) => Arc::new(LlmDecontextualizer::new(provider.clone(), model.clone())),
        None => Arc::new(HeuristicDecontextualizer::new()),
    };

    Ok(PipelineOrchestrator::new(retriever, grader, generator)
        .with_decontextualizer(decontextualizer)
        .with_prompt_builder(prompt_builder)
        .with_guardrail(Arc::new(guardrail))
        .with_guardrail_refusal(refusal)
        .with_contracts(contracts)
        .with_config(config.pipeline.clone()))
}

fn generation_settings(config: &AppConfig) -> GenerationSettings {
    let mut settings = GenerationSettings::new(config.llm.model.clone());
    if let Some(temperature) = config.llm.temperature {
        settings = settings.with_temperature(temperature);
    }
    if let Some(max_tokens) = config.llm.max_tokens {
        settings = settings.with_max_tokens(max_tokens);
    }
    settings
}

fn build_retriever(config: &AppConfig) -> Result<FanOutRetriever, DomainError> {
    let keyword = match &config.retrieval.corpus_path {
        Some(path) => {
            let strategy = InMemoryKeywordStrategy::from_json_file(KEYWORD_STRATEGY, path)?;
            info!(path = %path, "Loaded keyword corpus");
            strategy
        }
        None => {
            warn!("No corpus configured; keyword retrieval starts empty");
            InMemoryKeywordStrategy::new(KEYWORD_STRATEGY)
        }
    };

    let routes = parse_modes(config.retrieval.routes.clone(), "retrieval.routes")?;

    Ok(FanOutRetriever::new(RetrievalRouting::from_routes(routes))
        .with_strategy(Arc::new(keyword))
        .with_concurrency(config.retrieval.strategy_concurrency))
}

fn build_grader(config: &AppConfig, provider: &Arc<dyn LlmProvider>) -> CorrectiveGrader {
    let crag = config.crag.clone();
    let threshold = ThresholdGrader::new(crag.clone());

    let grader: Arc<dyn DocumentGrader> = match (crag.strategy, &config.llm.grading_model) {
        (GradingStrategy::Threshold, _) => Arc::new(threshold),
        (GradingStrategy::Llm, Some(model)) => {
            Arc::new(LlmGrader::new(provider.clone(), model.clone(), crag.clone()))
        }
        (GradingStrategy::Hybrid, Some(model)) => Arc::new(HybridGrader::new(
            threshold,
            LlmGrader::new(provider.clone(), model.clone(), crag.clone()),
        )),
        (strategy, None) => {
            warn!(
                strategy = ?strategy,
                "No grading model configured; using threshold grading"
            );
            Arc::new(threshold)
        }
    };

    let refiner: Arc<dyn QueryRefiner> = match &config.llm.refine_model {
        Some(model) => Arc::new(LlmQueryRefiner::new(provider.clone(), model.clone())),
        None => Arc::new(KeywordQueryRefiner::new()),
    };

    CorrectiveGrader::new(grader, refiner, crag)
}

/// Convert a map keyed by mode name into one keyed by `RoutingMode`
fn parse_modes<T>(
    entries: HashMap<String, T>,
    section: &str,
) -> Result<HashMap<RoutingMode, T>, DomainError> {
    entries
        .into_iter()
        .map(|(key, value)| {
            RoutingMode::from_str(&key)
                .map(|mode| (mode, value))
                .map_err(|e| DomainError::configuration(format!("{}: {}", section, e)))
        })
        .collect()
}
