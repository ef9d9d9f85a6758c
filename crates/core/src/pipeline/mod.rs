pub mod engine;
pub mod states;

pub use engine::{PipelineState, StateTransitionError};
pub use states::{
    ExecutionOutcome, GuardVerdict, PipelineStage, PipelineStatus, PresentedResult, Request,
};
