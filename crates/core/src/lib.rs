pub mod audit;
pub mod capabilities;
pub mod config;
pub mod errors;
pub mod pipeline;

pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use capabilities::{CompletionService, QueryAgent};
pub use errors::PipelineError;
pub use pipeline::{
    ExecutionOutcome, GuardVerdict, PipelineStage, PipelineState, PipelineStatus,
    PresentedResult, Request, StateTransitionError,
};
