pub mod ask;
pub mod config;
pub mod demo;
pub mod migrate;
pub mod seed;

use std::sync::Arc;

use querygate_agent::{ChatCompletionClient, PipelineController, PipelineTimeouts};
use querygate_core::config::{AppConfig, LoadOptions};
use querygate_db::{connect_with_settings, DbPool, SqlAgentOptions, SqlDatabaseAgent};
use serde::Serialize;
use tokio::runtime::Runtime;

/// `(error_class, message, exit_code)` for a failed command step.
pub(crate) type StepFailure = (&'static str, String, u8);

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    fn from_step(command: &str, (error_class, message, exit_code): StepFailure) -> Self {
        Self::failure(command, error_class, message, exit_code)
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Loads config, installs logging and builds the single-threaded runtime every
/// database-backed command runs on.
pub(crate) fn prepare(command: &str) -> Result<(AppConfig, Runtime), CommandResult> {
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })?;
    crate::logging::init(&config);

    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            )
        })?;

    Ok((config, runtime))
}

pub(crate) async fn open_database(config: &AppConfig) -> Result<DbPool, StepFailure> {
    connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| ("db_connectivity", error.to_string(), 4))
}

/// Wires the chat model and the sqlite agent into a pipeline. The same model
/// handle serves the safety classifier and the agent.
pub(crate) fn build_controller(
    config: &AppConfig,
    pool: DbPool,
) -> Result<PipelineController, StepFailure> {
    let completion = Arc::new(
        ChatCompletionClient::from_config(config)
            .map_err(|error| ("llm_client", error.to_string(), 3))?,
    );
    let agent = SqlDatabaseAgent::new(
        pool,
        completion.clone(),
        SqlAgentOptions {
            max_rows: config.agent.max_rows,
            max_sql_attempts: config.agent.max_sql_attempts,
        },
    );

    Ok(PipelineController::new(
        completion,
        Arc::new(agent),
        PipelineTimeouts::from(&config.pipeline),
    ))
}
