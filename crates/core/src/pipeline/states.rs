use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;

/// The raw question supplied by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub question: String,
}

impl Request {
    pub fn new(question: impl Into<String>) -> Self {
        Self { question: question.into() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Pending,
    Passed,
    Blocked,
    Failed,
}

impl PipelineStatus {
    pub fn is_terminal_error(self) -> bool {
        matches!(self, Self::Blocked | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Passed => "passed",
            Self::Blocked => "blocked",
            Self::Failed => "failed",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Start,
    LexicalCheck,
    SemanticCheck,
    Execute,
    Present,
    End,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardVerdict {
    Clear,
    Blocked(PipelineError),
}

impl GuardVerdict {
    pub fn is_clear(&self) -> bool {
        matches!(self, Self::Clear)
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Clear => None,
            Self::Blocked(error) => Some(error.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Success(String),
    Failure(PipelineError),
}

/// What the caller gets back from one pass through the pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentedResult {
    pub correlation_id: String,
    pub status: PipelineStatus,
    pub text: String,
}

impl PresentedResult {
    pub fn is_answer(&self) -> bool {
        !self.status.is_terminal_error()
    }
}

#[cfg(test)]
mod tests {
    use super::{GuardVerdict, PipelineStatus};
    use crate::errors::PipelineError;

    #[test]
    fn only_blocked_and_failed_are_terminal_errors() {
        assert!(!PipelineStatus::Pending.is_terminal_error());
        assert!(!PipelineStatus::Passed.is_terminal_error());
        assert!(PipelineStatus::Blocked.is_terminal_error());
        assert!(PipelineStatus::Failed.is_terminal_error());
    }

    #[test]
    fn blocked_verdict_exposes_reason() {
        let verdict = GuardVerdict::Blocked(PipelineError::InjectionSuspectedLexical {
            token: ";".to_owned(),
        });

        assert!(!verdict.is_clear());
        assert_eq!(verdict.reason().as_deref(), Some("possible injection attempt detected"));
        assert_eq!(GuardVerdict::Clear.reason(), None);
    }
}
