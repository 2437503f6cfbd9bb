//! API request and error types

pub mod error;
pub mod json;
pub mod rag;

pub use error::{ApiError, ApiErrorResponse, ApiErrorType};
pub use json::Json;
pub use rag::{RagQueryRequest, RagRequestOptions};
