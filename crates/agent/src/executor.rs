use std::sync::Arc;
use std::time::Duration;

use querygate_core::{ExecutionOutcome, PipelineError, QueryAgent};

use crate::bounded::{call_bounded, BoundedCallError};

/// Hands a cleared question to the query agent. Never lets an agent error escape.
#[derive(Clone)]
pub struct QueryExecutor {
    agent: Arc<dyn QueryAgent>,
    timeout: Duration,
}

impl QueryExecutor {
    pub fn new(agent: Arc<dyn QueryAgent>, timeout: Duration) -> Self {
        Self { agent, timeout }
    }

    pub async fn run(&self, question: &str) -> ExecutionOutcome {
        let agent = Arc::clone(&self.agent);
        let question = question.to_string();
        let call = async move { agent.run(&question).await };

        match call_bounded(self.timeout, call).await {
            Ok(answer) if answer.trim().is_empty() => ExecutionOutcome::Failure(
                PipelineError::ExecutionFailure("query agent returned an empty answer".to_string()),
            ),
            Ok(answer) => ExecutionOutcome::Success(answer),
            Err(BoundedCallError::TimedOut(limit)) => {
                let detail = format!("query agent gave no answer within {limit:?}");
                ExecutionOutcome::Failure(PipelineError::ExecutionFailure(detail))
            }
            Err(error) => {
                ExecutionOutcome::Failure(PipelineError::ExecutionFailure(error.to_string()))
            }
        }
    }
}
