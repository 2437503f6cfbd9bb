//! Retrieval implementations

mod fan_out;
mod keyword;

pub use fan_out::{FanOutRetriever, RetrievalOutcome};
pub use keyword::{CorpusDocument, InMemoryKeywordStrategy};
