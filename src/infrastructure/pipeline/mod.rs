//! RAG pipeline: orchestrator, stage runner, event delivery and citations

mod citations;
mod factory;
mod orchestrator;
mod runner;
mod sink;
mod stream;

#[cfg(test)]
pub mod mock;
#[cfg(test)]
mod tests;

pub use citations::extract_citations;
pub use factory::build_orchestrator;
pub use orchestrator::PipelineOrchestrator;
pub use sink::{ChannelSink, DiscardSink, EventSink};
pub use stream::PipelineEventStream;
