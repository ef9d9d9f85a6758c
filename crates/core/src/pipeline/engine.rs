use thiserror::Error;

use crate::pipeline::states::{PipelineStage, PipelineStatus, Request};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StateTransitionError {
    #[error("invalid stage transition from {from:?} to {to:?}")]
    InvalidStage { from: PipelineStage, to: PipelineStage },
    #[error("cannot enter {stage:?} with status {status:?}")]
    PreconditionFailed { stage: PipelineStage, status: PipelineStatus },
    #[error("status {from:?} cannot become {to:?} during {stage:?}")]
    InvalidStatus { stage: PipelineStage, from: PipelineStatus, to: PipelineStatus },
    #[error("terminal state must carry exactly one of message or result")]
    IncompleteTerminalState,
}

/// Per-request record threaded through every stage.
///
/// Fields are private: the only way to change a state is through the
/// transition methods below, which refuse anything that would overwrite a
/// terminal outcome or move the status backwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineState {
    question: String,
    stage: PipelineStage,
    status: PipelineStatus,
    message: Option<String>,
    result: Option<String>,
}

impl PipelineState {
    pub fn new(request: Request) -> Self {
        Self {
            question: request.question,
            stage: PipelineStage::Start,
            status: PipelineStatus::Pending,
            message: None,
            result: None,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    /// True once exactly one of `message`/`result` is set and matches the status.
    pub fn is_complete(&self) -> bool {
        let has_message = self.message.as_deref().is_some_and(|value| !value.is_empty());
        let has_result = self.result.as_deref().is_some_and(|value| !value.is_empty());
        match self.status {
            PipelineStatus::Blocked | PipelineStatus::Failed => has_message && !has_result,
            PipelineStatus::Passed => has_result && !has_message,
            PipelineStatus::Pending => false,
        }
    }

    pub fn advance(&mut self, to: PipelineStage) -> Result<(), StateTransitionError> {
        use PipelineStage::{End, Execute, LexicalCheck, Present, SemanticCheck, Start};

        let known_edge = matches!(
            (self.stage, to),
            (Start, LexicalCheck)
                | (LexicalCheck, SemanticCheck)
                | (LexicalCheck, Present)
                | (SemanticCheck, Execute)
                | (SemanticCheck, Present)
                | (Execute, Present)
                | (Present, End)
        );
        if !known_edge {
            return Err(StateTransitionError::InvalidStage { from: self.stage, to });
        }

        match to {
            SemanticCheck | Execute if self.status != PipelineStatus::Passed => {
                return Err(StateTransitionError::PreconditionFailed {
                    stage: to,
                    status: self.status,
                });
            }
            Present | End if !self.is_complete() => {
                return Err(StateTransitionError::IncompleteTerminalState);
            }
            _ => {}
        }

        self.stage = to;
        Ok(())
    }

    /// A guard cleared the question.
    pub fn pass(&mut self) -> Result<(), StateTransitionError> {
        self.change_status(
            &[PipelineStage::LexicalCheck, PipelineStage::SemanticCheck],
            PipelineStatus::Passed,
        )
    }

    pub fn block(&mut self, reason: impl Into<String>) -> Result<(), StateTransitionError> {
        self.change_status(
            &[PipelineStage::LexicalCheck, PipelineStage::SemanticCheck],
            PipelineStatus::Blocked,
        )?;
        self.message = Some(reason.into());
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), StateTransitionError> {
        self.change_status(
            &[PipelineStage::SemanticCheck, PipelineStage::Execute],
            PipelineStatus::Failed,
        )?;
        self.message = Some(reason.into());
        Ok(())
    }

    pub fn succeed(&mut self, result: impl Into<String>) -> Result<(), StateTransitionError> {
        if self.status != PipelineStatus::Passed || self.result.is_some() {
            return Err(StateTransitionError::InvalidStatus {
                stage: self.stage,
                from: self.status,
                to: PipelineStatus::Passed,
            });
        }
        self.change_status(&[PipelineStage::Execute], PipelineStatus::Passed)?;
        self.result = Some(result.into());
        Ok(())
    }

    fn change_status(
        &mut self,
        stages: &[PipelineStage],
        to: PipelineStatus,
    ) -> Result<(), StateTransitionError> {
        let from_open = matches!(self.status, PipelineStatus::Pending | PipelineStatus::Passed);
        if !from_open || !stages.contains(&self.stage) {
            return Err(StateTransitionError::InvalidStatus {
                stage: self.stage,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
