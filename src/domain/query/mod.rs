//! Query understanding domain

mod intent;
mod traits;

pub use intent::{Classification, QueryIntent};
pub use traits::{Decontextualizer, QueryClassifier, QueryRefiner};

#[cfg(test)]
pub use traits::mock::{MockDecontextualizer, MockQueryClassifier, MockQueryRefiner};
