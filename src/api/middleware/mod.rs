//! API middleware components

pub mod logging;
pub mod metrics;

pub use logging::{logging_middleware, request_id, REQUEST_ID_HEADER};
pub use metrics::metrics_middleware;
