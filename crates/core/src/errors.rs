use thiserror::Error;

use crate::pipeline::{PipelineStatus, StateTransitionError};

/// Every way a question can end without an answer.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("possible injection attempt detected")]
    InjectionSuspectedLexical { token: String },
    #[error("possible injection attempt detected (model-based)")]
    InjectionSuspectedSemantic { verdict: String },
    #[error("error executing query: {0}")]
    ExecutionFailure(String),
    #[error("safety classification unavailable: {0}")]
    CollaboratorUnavailable(String),
    #[error(transparent)]
    StateTransition(#[from] StateTransitionError),
}

impl PipelineError {
    pub fn status(&self) -> PipelineStatus {
        match self {
            Self::InjectionSuspectedLexical { .. } | Self::InjectionSuspectedSemantic { .. } => {
                PipelineStatus::Blocked
            }
            Self::ExecutionFailure(_)
            | Self::CollaboratorUnavailable(_)
            | Self::StateTransition(_) => PipelineStatus::Failed,
        }
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::InjectionSuspectedLexical { .. } => "injection_suspected_lexical",
            Self::InjectionSuspectedSemantic { .. } => "injection_suspected_semantic",
            Self::ExecutionFailure(_) => "execution_failure",
            Self::CollaboratorUnavailable(_) => "collaborator_unavailable",
            Self::StateTransition(_) => "internal",
        }
    }
}
