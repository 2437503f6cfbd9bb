//! CLI module for the RAG engine
//!
//! - `serve`: HTTP API with batch and SSE endpoints
//! - `ask`: run a single query against the configured pipeline

pub mod ask;
pub mod serve;

use clap::{Parser, Subcommand};

/// PMP RAG Engine - corrective retrieval-augmented answering
#[derive(Parser)]
#[command(name = "pmp-rag-engine")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve(serve::ServeArgs),

    /// Answer a single query and exit
    Ask(ask::AskArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from([
            "pmp-rag-engine",
            "ask",
            "and for gift cards?",
            "--mode",
            "deep",
            "--stream",
            "--history",
            "user:What is the refund policy?",
        ])
        .unwrap();

        match cli.command {
            Command::Ask(args) => {
                assert_eq!(args.query, "and for gift cards?");
                assert_eq!(args.mode.as_deref(), Some("deep"));
                assert!(args.stream);
                assert_eq!(args.history.len(), 1);
            }
            Command::Serve(_) => panic!("expected ask"),
        }
    }

    #[test]
    fn test_parse_serve_with_config() {
        let cli = Cli::try_parse_from(["pmp-rag-engine", "serve", "--config", "config/prod"]).unwrap();

        match cli.command {
            Command::Serve(args) => assert_eq!(args.config.as_deref(), Some("config/prod")),
            Command::Ask(_) => panic!("expected serve"),
        }
    }
}
