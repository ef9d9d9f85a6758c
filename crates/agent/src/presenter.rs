use querygate_core::{PipelineState, PresentedResult};

/// Receives the single text produced for each question (console, HTTP body, ...).
pub trait ResultSink: Send + Sync {
    fn emit(&self, result: &PresentedResult);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ResultPresenter;

impl ResultPresenter {
    pub fn new() -> Self {
        Self
    }

    pub fn present(&self, state: &PipelineState, correlation_id: &str) -> PresentedResult {
        let status = state.status();
        let text = if status.is_terminal_error() { state.message() } else { state.result() };

        PresentedResult {
            correlation_id: correlation_id.to_string(),
            status,
            text: text.unwrap_or_default().to_string(),
        }
    }
}
