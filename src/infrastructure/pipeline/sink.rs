//! Destinations for pipeline events

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::pipeline::PipelineEvent;

/// Receives the events of one run
#[async_trait]
pub trait EventSink: Send {
    /// Whether generation should stream tokens for this sink
    fn streaming(&self) -> bool;

    async fn emit(&mut self, event: PipelineEvent);
}

/// Batch execution: the runner's return value is the result, events are dropped
#[derive(Debug, Default)]
pub struct DiscardSink;

#[async_trait]
impl EventSink for DiscardSink {
    fn streaming(&self) -> bool {
        false
    }

    async fn emit(&mut self, _event: PipelineEvent) {}
}

/// Streaming execution: events go to a bounded channel
#[derive(Debug)]
pub struct ChannelSink {
    sender: mpsc::Sender<PipelineEvent>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<PipelineEvent>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    fn streaming(&self) -> bool {
        true
    }

    async fn emit(&mut self, event: PipelineEvent) {
        if self.sender.send(event).await.is_err() {
            debug!("Event consumer gone; dropping event");
        }
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;

    /// Records every event; streams like the channel sink
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub events: Vec<PipelineEvent>,
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        fn streaming(&self) -> bool {
            true
        }

        async fn emit(&mut self, event: PipelineEvent) {
            self.events.push(event);
        }
    }
}
