use std::sync::Arc;
use std::time::Duration;

use querygate_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, NoopAuditSink};
use querygate_core::config::PipelineConfig;
use querygate_core::{
    CompletionService, ExecutionOutcome, GuardVerdict, PipelineError, PipelineStage,
    PipelineState, PipelineStatus, PresentedResult, QueryAgent, Request, StateTransitionError,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::executor::QueryExecutor;
use crate::guardrails::{LexicalGuard, SemanticGuard};
use crate::presenter::{ResultPresenter, ResultSink};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineTimeouts {
    pub classification: Duration,
    pub execution: Duration,
}

impl Default for PipelineTimeouts {
    fn default() -> Self {
        Self { classification: Duration::from_secs(60), execution: Duration::from_secs(180) }
    }
}

impl From<&PipelineConfig> for PipelineTimeouts {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            classification: Duration::from_secs(config.classification_timeout_secs),
            execution: Duration::from_secs(config.execution_timeout_secs),
        }
    }
}

/// Sequences lexical guard, semantic guard, execution and presentation for one
/// question at a time. Collaborator handles are shared, per-question state is not.
pub struct PipelineController {
    lexical: LexicalGuard,
    semantic: SemanticGuard,
    executor: QueryExecutor,
    presenter: ResultPresenter,
    audit: Arc<dyn AuditSink>,
    result_sink: Option<Arc<dyn ResultSink>>,
}

impl PipelineController {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        agent: Arc<dyn QueryAgent>,
        timeouts: PipelineTimeouts,
    ) -> Self {
        Self {
            lexical: LexicalGuard::new(),
            semantic: SemanticGuard::new(completion, timeouts.classification),
            executor: QueryExecutor::new(agent, timeouts.execution),
            presenter: ResultPresenter::new(),
            audit: Arc::new(NoopAuditSink),
            result_sink: None,
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_result_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.result_sink = Some(sink);
        self
    }

    /// Runs one question through the pipeline. Every failure mode ends up in the
    /// returned text; this never errors.
    pub async fn answer(&self, question: impl Into<String>) -> PresentedResult {
        let correlation_id = Uuid::new_v4().to_string();
        let request = Request::new(question);
        debug!(
            event_name = "pipeline.request.received",
            correlation_id = %correlation_id,
            question = %request.question,
            "question received"
        );

        let presented = match self.run_stages(request, &correlation_id).await {
            Ok(presented) => presented,
            Err(transition_error) => {
                let error = PipelineError::from(transition_error);
                error!(
                    event_name = "pipeline.internal_error",
                    correlation_id = %correlation_id,
                    error = %error,
                    "pipeline rejected a state transition"
                );
                PresentedResult {
                    correlation_id: correlation_id.clone(),
                    status: error.status(),
                    text: error.to_string(),
                }
            }
        };

        if let Some(sink) = &self.result_sink {
            sink.emit(&presented);
        }
        presented
    }

    async fn run_stages(
        &self,
        request: Request,
        correlation_id: &str,
    ) -> Result<PresentedResult, StateTransitionError> {
        let mut state = PipelineState::new(request);
        let mut presented = None;

        loop {
            match state.stage() {
                PipelineStage::Start => state.advance(PipelineStage::LexicalCheck)?,
                PipelineStage::LexicalCheck => {
                    let verdict = self.lexical.inspect(state.question());
                    self.apply_verdict(&mut state, verdict, "lexical", correlation_id)?;
                    state.advance(next_after_guard(&state, PipelineStage::SemanticCheck))?;
                }
                PipelineStage::SemanticCheck => {
                    match self.semantic.inspect(state.question()).await {
                        Ok(verdict) => {
                            self.apply_verdict(&mut state, verdict, "semantic", correlation_id)?
                        }
                        Err(error) => {
                            warn!(
                                event_name = "pipeline.semantic.unavailable",
                                correlation_id = %correlation_id,
                                error = %error,
                                "semantic guard could not classify the question"
                            );
                            self.record(
                                AuditEvent::new(
                                    correlation_id,
                                    "pipeline.semantic.unavailable",
                                    AuditCategory::Guard,
                                    AuditOutcome::Failed,
                                )
                                .with_metadata("error_class", error.error_class()),
                            );
                            state.fail(error.to_string())?;
                        }
                    }
                    state.advance(next_after_guard(&state, PipelineStage::Execute))?;
                }
                PipelineStage::Execute => {
                    match self.executor.run(state.question()).await {
                        ExecutionOutcome::Success(result) => {
                            info!(
                                event_name = "pipeline.execute.succeeded",
                                correlation_id = %correlation_id,
                                answer_len = result.len(),
                                "query agent answered"
                            );
                            self.record(AuditEvent::new(
                                correlation_id,
                                "pipeline.execute.succeeded",
                                AuditCategory::Execution,
                                AuditOutcome::Success,
                            ));
                            state.succeed(result)?;
                        }
                        ExecutionOutcome::Failure(error) => {
                            warn!(
                                event_name = "pipeline.execute.failed",
                                correlation_id = %correlation_id,
                                error = %error,
                                "query agent failed"
                            );
                            self.record(
                                AuditEvent::new(
                                    correlation_id,
                                    "pipeline.execute.failed",
                                    AuditCategory::Execution,
                                    AuditOutcome::Failed,
                                )
                                .with_metadata("error_class", error.error_class()),
                            );
                            state.fail(error.to_string())?;
                        }
                    }
                    state.advance(PipelineStage::Present)?;
                }
                PipelineStage::Present => {
                    let result = self.presenter.present(&state, correlation_id);
                    self.record(
                        AuditEvent::new(
                            correlation_id,
                            "pipeline.result.presented",
                            AuditCategory::Presentation,
                            if result.is_answer() {
                                AuditOutcome::Success
                            } else {
                                AuditOutcome::Rejected
                            },
                        )
                        .with_metadata("status", result.status.as_str()),
                    );
                    presented = Some(result);
                    state.advance(PipelineStage::End)?;
                }
                PipelineStage::End => break,
            }
        }

        presented.ok_or(StateTransitionError::IncompleteTerminalState)
    }

    fn apply_verdict(
        &self,
        state: &mut PipelineState,
        verdict: GuardVerdict,
        guard: &'static str,
        correlation_id: &str,
    ) -> Result<(), StateTransitionError> {
        match verdict {
            GuardVerdict::Clear => {
                debug!(
                    event_name = "pipeline.guard.cleared",
                    correlation_id = %correlation_id,
                    guard,
                    "guard cleared the question"
                );
                self.record(
                    AuditEvent::new(
                        correlation_id,
                        format!("pipeline.{guard}.cleared"),
                        AuditCategory::Guard,
                        AuditOutcome::Success,
                    )
                    .with_metadata("guard", guard),
                );
                state.pass()
            }
            GuardVerdict::Blocked(error) => {
                warn!(
                    event_name = "pipeline.guard.blocked",
                    correlation_id = %correlation_id,
                    guard,
                    error_class = error.error_class(),
                    "guard blocked the question"
                );
                let mut event = AuditEvent::new(
                    correlation_id,
                    format!("pipeline.{guard}.blocked"),
                    AuditCategory::Guard,
                    AuditOutcome::Rejected,
                )
                .with_metadata("guard", guard)
                .with_metadata("error_class", error.error_class());
                match &error {
                    PipelineError::InjectionSuspectedLexical { token } => {
                        event = event.with_metadata("token", token.as_str());
                    }
                    PipelineError::InjectionSuspectedSemantic { verdict } => {
                        event = event.with_metadata("verdict", verdict.as_str());
                    }
                    _ => {}
                }
                self.record(event);
                state.block(error.to_string())
            }
        }
    }

    fn record(&self, event: AuditEvent) {
        self.audit.emit(event);
    }
}

fn next_after_guard(state: &PipelineState, on_pass: PipelineStage) -> PipelineStage {
    if state.status() == PipelineStatus::Passed {
        on_pass
    } else {
        PipelineStage::Present
    }
}
