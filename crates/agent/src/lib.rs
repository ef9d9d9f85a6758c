//! Guarded question answering over a SQL database.
//!
//! A question passes through a fixed sequence of stages:
//! 1. **Lexical guard** (`guardrails`) - denylist scan for mutation keywords and
//!    statement-injection markers
//! 2. **Semantic guard** (`guardrails`) - one model call classifying mutation intent
//! 3. **Execution** (`executor`) - delegation to a `QueryAgent`
//! 4. **Presentation** (`presenter`) - one user-visible text, answer or explanation
//!
//! `runtime::PipelineController` wires the stages together and is the only entry
//! point integrations need.
//!
//! # Safety Principle
//!
//! Both guards fail closed. A question reaches the query agent only when the
//! lexical scan finds nothing and the classifier answers a plain `NO`.

pub mod bounded;
pub mod executor;
pub mod guardrails;
pub mod llm;
pub mod presenter;
pub mod runtime;

pub use llm::ChatCompletionClient;
pub use presenter::{ResultPresenter, ResultSink};
pub use runtime::{PipelineController, PipelineTimeouts};
