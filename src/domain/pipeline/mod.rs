//! Pipeline domain: requests, events, results and the failure taxonomy

mod config;
mod error;
mod event;
mod metrics;
mod request;
mod result;
mod validation;

pub use config::{PipelineConfig, RequestSettings};
pub use error::{FailureKind, PipelineError};
pub use event::{PipelineEvent, Stage, StagePayload};
pub use metrics::{PipelineMetrics, StageDegradation, StageMetrics};
pub use request::{ConversationTurn, PipelineRequest, RequestOptions, RoutingMode, TurnRole};
pub use result::{Citation, ConfidenceTier, EvidenceLevel, RagResult};
pub use validation::validate_pipeline_request;
