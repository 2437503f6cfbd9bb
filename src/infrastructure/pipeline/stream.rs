//! Lazy event stream returned by streaming execution
//!
//! The stage runner is not spawned. It is polled from `poll_next`, so nothing
//! runs before the first poll and dropping the stream drops the in-flight
//! stage along with any open generation stream.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::domain::pipeline::PipelineEvent;

pub struct PipelineEventStream {
    driver: Option<BoxFuture<'static, ()>>,
    events: ReceiverStream<PipelineEvent>,
    cancel: CancellationToken,
    finished: bool,
}

impl std::fmt::Debug for PipelineEventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineEventStream")
            .field("running", &self.driver.is_some())
            .field("finished", &self.finished)
            .finish()
    }
}

impl PipelineEventStream {
    pub(super) fn new(
        driver: BoxFuture<'static, ()>,
        events: ReceiverStream<PipelineEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            driver: Some(driver),
            events,
            cancel,
            finished: false,
        }
    }

    /// Token that cancels this run; the stream then ends with `Failed`
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Stream for PipelineEventStream {
    type Item = PipelineEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.finished {
            return Poll::Ready(None);
        }

        if let Some(driver) = this.driver.as_mut() {
            if driver.as_mut().poll(cx).is_ready() {
                this.driver = None;
            }
        }

        match Pin::new(&mut this.events).poll_next(cx) {
            Poll::Ready(Some(event)) => {
                if event.is_terminal() {
                    this.finished = true;
                    this.driver = None;
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for PipelineEventStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
