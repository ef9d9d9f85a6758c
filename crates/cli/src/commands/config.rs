use std::fs;
use std::path::{Path, PathBuf};

use querygate_core::config::{env_source, AppConfig, LoadOptions};
use toml::Value;

use crate::commands::CommandResult;

struct ConfigFile {
    path: PathBuf,
    doc: Value,
}

/// Prints the effective configuration, one `key = value (source: ...)` line per
/// field. The API key is shown only as set or unset.
pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let file = detect_config_path().and_then(|path| load_config_file(&path));
    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        effective_values(&config)
            .into_iter()
            .map(|(key, value)| render_line(key, &value, field_source(key, file.as_ref()))),
    );

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, String)> {
    let api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };

    vec![
        ("database.url", config.database.url.clone()),
        ("database.max_connections", config.database.max_connections.to_string()),
        ("database.timeout_secs", config.database.timeout_secs.to_string()),
        ("llm.provider", config.llm.provider.as_str().to_string()),
        ("llm.model", config.llm.model.clone()),
        ("llm.base_url", config.llm_base_url().to_string()),
        ("llm.api_key", api_key.to_string()),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string()),
        ("llm.temperature", config.llm.temperature.to_string()),
        (
            "pipeline.classification_timeout_secs",
            config.pipeline.classification_timeout_secs.to_string(),
        ),
        ("pipeline.execution_timeout_secs", config.pipeline.execution_timeout_secs.to_string()),
        ("agent.max_rows", config.agent.max_rows.to_string()),
        ("agent.max_sql_attempts", config.agent.max_sql_attempts.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", config.logging.format.as_str().to_string()),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("querygate.toml"), PathBuf::from("config/querygate.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file(path: &Path) -> Option<ConfigFile> {
    let raw = fs::read_to_string(path).ok()?;
    let doc = raw.parse::<Value>().ok()?;
    Some(ConfigFile { path: path.to_path_buf(), doc })
}

fn field_source(key_path: &str, file: Option<&ConfigFile>) -> String {
    if let Some(env_key) = env_source(key_path) {
        return format!("env ({env_key})");
    }

    match file {
        Some(file) if contains_path(&file.doc, key_path) => {
            format!("file ({})", file.path.display())
        }
        _ => "default".to_string(),
    }
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
