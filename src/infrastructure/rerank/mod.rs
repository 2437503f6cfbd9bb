//! Reranker implementations

mod lexical;

pub use lexical::LexicalReranker;
