//! Ask command - answers one query from the terminal

use std::io::Write;

use anyhow::{anyhow, bail};
use clap::Args;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::domain::pipeline::{
    validate_pipeline_request, Citation, ConversationTurn, PipelineEvent, PipelineRequest,
    RagResult, RoutingMode,
};
use crate::infrastructure::pipeline::{build_orchestrator, PipelineOrchestrator};

#[derive(Args, Debug, Default)]
pub struct AskArgs {
    /// The question to answer
    pub query: String,

    /// Routing mode: auto, fast or deep
    #[arg(long, short)]
    pub mode: Option<String>,

    /// Print tokens as they are generated
    #[arg(long)]
    pub stream: bool,

    /// Prior turn as `user:<text>` or `assistant:<text>`; repeat in order
    #[arg(long = "history")]
    pub history: Vec<String>,

    /// Extra configuration file layered over `config/default`
    #[arg(long, short)]
    pub config: Option<String>,
}

/// Run the pipeline once and print the answer to stdout
pub async fn run(args: AskArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load(args.config.as_deref())?;
    let pipeline = build_orchestrator(&config)?;
    let request = build_request(&args)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut out = std::io::stdout().lock();
    if args.stream {
        stream_answer(&pipeline, request, cancel, &mut out).await
    } else {
        let result = pipeline.execute_with_cancellation(request, cancel).await?;
        print_result(&result, &mut out)
    }
}

fn build_request(args: &AskArgs) -> anyhow::Result<PipelineRequest> {
    let mode = match args.mode.as_deref() {
        Some(mode) => mode.parse::<RoutingMode>().map_err(|e| anyhow!(e))?,
        None => RoutingMode::Auto,
    };
    let history = args
        .history
        .iter()
        .map(|turn| parse_turn(turn))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let request = PipelineRequest::new(args.query.clone())
        .with_history(history)
        .with_mode(mode);
    validate_pipeline_request(&request).map_err(|e| anyhow!(e))?;

    Ok(request)
}

fn parse_turn(raw: &str) -> anyhow::Result<ConversationTurn> {
    match raw.split_once(':') {
        Some((role, content)) if role.trim().eq_ignore_ascii_case("user") => {
            Ok(ConversationTurn::user(content.trim()))
        }
        Some((role, content)) if role.trim().eq_ignore_ascii_case("assistant") => {
            Ok(ConversationTurn::assistant(content.trim()))
        }
        _ => bail!("history turn must start with 'user:' or 'assistant:', got '{}'", raw),
    }
}

async fn stream_answer(
    pipeline: &PipelineOrchestrator,
    request: PipelineRequest,
    cancel: CancellationToken,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut events = pipeline.execute_streaming_with_cancellation(request, cancel);
    let mut citations = Vec::new();

    while let Some(event) = events.next().await {
        match event {
            PipelineEvent::Token { text } => {
                write!(out, "{}", text)?;
                out.flush()?;
            }
            PipelineEvent::CitationEmitted { citation } => citations.push(citation),
            PipelineEvent::Done { result } => {
                writeln!(out)?;
                print_footer(&result, &citations, out)?;
                return Ok(());
            }
            PipelineEvent::Refused { result, .. } => return print_result(&result, out),
            PipelineEvent::Failed { kind, message } => {
                writeln!(out)?;
                bail!("pipeline failed ({:?}): {}", kind, message);
            }
            PipelineEvent::StageStarted { .. } | PipelineEvent::StageCompleted { .. } => {}
        }
    }

    bail!("pipeline ended without a terminal event")
}

fn print_result(result: &RagResult, out: &mut impl Write) -> anyhow::Result<()> {
    writeln!(out, "{}", result.answer)?;
    print_footer(result, &result.citations, out)
}

fn print_footer(result: &RagResult, citations: &[Citation], out: &mut impl Write) -> anyhow::Result<()> {
    if let Some(disclaimer) = &result.disclaimer {
        writeln!(out, "\n{}", disclaimer)?;
    }
    if !citations.is_empty() {
        writeln!(out, "\nSources:")?;
        for citation in citations {
            writeln!(out, "  [{}] {}", citation.document_id, citation.title)?;
        }
    }
    writeln!(
        out,
        "\nverdict: {:?}  evidence: {:?}  mode: {}",
        result.verdict, result.evidence_level, result.routing_mode
    )?;
    Ok(())
}
