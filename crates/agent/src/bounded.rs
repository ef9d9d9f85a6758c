use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoundedCallError {
    #[error("{0:#}")]
    Failed(anyhow::Error),
    #[error("no response within {0:?}")]
    TimedOut(Duration),
    #[error("collaborator task aborted: {0}")]
    Aborted(String),
}

/// Runs one collaborator call on its own task with a deadline.
///
/// The call is spawned so that a panic inside the collaborator surfaces as
/// `Aborted` instead of unwinding through the pipeline. On timeout the task
/// is aborted.
pub async fn call_bounded<F, T>(limit: Duration, call: F) -> Result<T, BoundedCallError>
where
    F: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let mut handle = tokio::spawn(call);
    match tokio::time::timeout(limit, &mut handle).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(error))) => Err(BoundedCallError::Failed(error)),
        Ok(Err(join_error)) => Err(BoundedCallError::Aborted(join_error.to_string())),
        Err(_) => {
            handle.abort();
            Err(BoundedCallError::TimedOut(limit))
        }
    }
}
