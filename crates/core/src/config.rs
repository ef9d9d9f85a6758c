use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
}

/// Time budgets applied around the two external calls of the pipeline.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub classification_timeout_secs: u64,
    pub execution_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub max_rows: usize,
    /// Statements the SQL agent may generate for one question, the first
    /// included, before it gives up.
    pub max_sql_attempts: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com",
            Self::Ollama => "http://localhost:11434",
        }
    }

    /// Spelling accepted both in the config file and in `QUERYGATE_LLM_PROVIDER`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "open_ai",
            Self::Ollama => "ollama",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://querygate.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: None,
                model: "llama3.1".to_string(),
                timeout_secs: 60,
                temperature: 0.0,
            },
            pipeline: PipelineConfig {
                classification_timeout_secs: 60,
                execution_timeout_secs: 180,
            },
            agent: AgentConfig { max_rows: 50, max_sql_attempts: 3 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("querygate.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Base URL the completion client talks to, falling back to the provider default.
    pub fn llm_base_url(&self) -> &str {
        self.llm
            .base_url
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.llm.provider.default_base_url())
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
        }

        if let Some(pipeline) = patch.pipeline {
            if let Some(classification_timeout_secs) = pipeline.classification_timeout_secs {
                self.pipeline.classification_timeout_secs = classification_timeout_secs;
            }
            if let Some(execution_timeout_secs) = pipeline.execution_timeout_secs {
                self.pipeline.execution_timeout_secs = execution_timeout_secs;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(max_rows) = agent.max_rows {
                self.agent.max_rows = max_rows;
            }
            if let Some(max_sql_attempts) = agent.max_sql_attempts {
                self.agent.max_sql_attempts = max_sql_attempts;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("QUERYGATE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("QUERYGATE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("QUERYGATE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("QUERYGATE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("QUERYGATE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("QUERYGATE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("QUERYGATE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("QUERYGATE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("QUERYGATE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("QUERYGATE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("QUERYGATE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("QUERYGATE_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("QUERYGATE_LLM_TEMPERATURE", &value)?;
        }

        if let Some(value) = read_env("QUERYGATE_PIPELINE_CLASSIFICATION_TIMEOUT_SECS") {
            self.pipeline.classification_timeout_secs =
                parse_u64("QUERYGATE_PIPELINE_CLASSIFICATION_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("QUERYGATE_PIPELINE_EXECUTION_TIMEOUT_SECS") {
            self.pipeline.execution_timeout_secs =
                parse_u64("QUERYGATE_PIPELINE_EXECUTION_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("QUERYGATE_AGENT_MAX_ROWS") {
            self.agent.max_rows = parse_usize("QUERYGATE_AGENT_MAX_ROWS", &value)?;
        }
        if let Some(value) = read_env("QUERYGATE_AGENT_MAX_SQL_ATTEMPTS") {
            self.agent.max_sql_attempts =
                parse_u32("QUERYGATE_AGENT_MAX_SQL_ATTEMPTS", &value)?;
        }

        if let Some(value) = read_field_env("logging.level") {
            self.logging.level = value;
        }
        if let Some(value) = read_field_env("logging.format") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(llm_base_url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_pipeline(&self.pipeline)?;
        validate_agent(&self.agent)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("querygate.toml"), PathBuf::from("config/querygate.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if llm.provider == LlmProvider::OpenAi {
        let missing = llm
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "llm.api_key is required for the openai provider".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_pipeline(pipeline: &PipelineConfig) -> Result<(), ConfigError> {
    if pipeline.classification_timeout_secs == 0 || pipeline.classification_timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "pipeline.classification_timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    if pipeline.execution_timeout_secs == 0 || pipeline.execution_timeout_secs > 1800 {
        return Err(ConfigError::Validation(
            "pipeline.execution_timeout_secs must be in range 1..=1800".to_string(),
        ));
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.max_rows == 0 || agent.max_rows > 1000 {
        return Err(ConfigError::Validation(
            "agent.max_rows must be in range 1..=1000".to_string(),
        ));
    }

    if agent.max_sql_attempts == 0 || agent.max_sql_attempts > 10 {
        return Err(ConfigError::Validation(
            "agent.max_sql_attempts must be in range 1..=10".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Environment variables consulted for a `section.field` key, highest
/// precedence first. `logging.*` also answers to the shorter `QUERYGATE_LOG_*`.
pub fn env_keys(key_path: &str) -> Vec<String> {
    let primary = format!("QUERYGATE_{}", key_path.replace('.', "_").to_ascii_uppercase());
    let mut keys = vec![primary];
    if let Some(field) = key_path.strip_prefix("logging.") {
        keys.push(format!("QUERYGATE_LOG_{}", field.to_ascii_uppercase()));
    }
    keys
}

/// The variable that currently supplies `key_path`, if any. Blank values are
/// ignored the same way loading ignores them.
pub fn env_source(key_path: &str) -> Option<String> {
    env_keys(key_path).into_iter().find(|key| read_env(key).is_some())
}

fn read_field_env(key_path: &str) -> Option<String> {
    env_source(key_path).and_then(|key| read_env(&key))
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.parse::<f32>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    pipeline: Option<PipelinePatch>,
    agent: Option<AgentPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelinePatch {
    classification_timeout_secs: Option<u64>,
    execution_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    max_rows: Option<usize>,
    max_sql_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        env_keys, env_source, AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions,
        LogFormat,
    };

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_and_deterministic() -> Result<(), String> {
        let config = AppConfig::default();
        config.validate().map_err(|err| format!("default config should validate: {err}"))?;

        ensure(config.llm.temperature == 0.0, "classification model should run at temperature 0")?;
        ensure(config.llm_base_url() == "http://localhost:11434", "ollama default base url")?;
        ensure(matches!(config.logging.format, LogFormat::Compact), "compact logs by default")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_QUERYGATE_API_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("querygate.toml");
            fs::write(
                &path,
                r#"
[llm]
provider = "open_ai"
api_key = "${TEST_QUERYGATE_API_KEY}"
model = "gpt-4o-mini"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.llm.provider == LlmProvider::OpenAi, "provider should come from file")?;
            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "sk-from-env")
                    == Some(true),
                "api key should be interpolated from environment",
            )?;
            ensure(
                config.llm_base_url() == "https://api.openai.com",
                "openai default base url should apply when unset",
            )
        })();

        clear_vars(&["TEST_QUERYGATE_API_KEY"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&["TEST_QUERYGATE_UNSET"]);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("querygate.toml");
        fs::write(&path, "[llm]\nmodel = \"${TEST_QUERYGATE_UNSET}\"\n")
            .map_err(|err| err.to_string())?;

        match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() }) {
            Err(ConfigError::MissingEnvInterpolation { var }) => {
                ensure(var == "TEST_QUERYGATE_UNSET", "error should name the missing variable")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
            Ok(_) => Err("expected interpolation failure".to_string()),
        }
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("QUERYGATE_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("QUERYGATE_PIPELINE_EXECUTION_TIMEOUT_SECS", "45");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("querygate.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[pipeline]
classification_timeout_secs = 12
execution_timeout_secs = 90

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.database.url == "sqlite://from-env.db", "env database url should win")?;
            ensure(
                config.pipeline.classification_timeout_secs == 12,
                "file value should win over default",
            )?;
            ensure(
                config.pipeline.execution_timeout_secs == 45,
                "env value should win over file",
            )?;
            ensure(config.logging.level == "debug", "override should win over file")
        })();

        clear_vars(&["QUERYGATE_DATABASE_URL", "QUERYGATE_PIPELINE_EXECUTION_TIMEOUT_SECS"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("QUERYGATE_AGENT_MAX_ROWS", "lots");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                ensure(key == "QUERYGATE_AGENT_MAX_ROWS", "error should name the env var")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
            Ok(_) => Err("expected invalid override failure".to_string()),
        };

        clear_vars(&["QUERYGATE_AGENT_MAX_ROWS"]);
        result
    }

    #[test]
    fn openai_provider_requires_api_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let error = match AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                llm_provider: Some(LlmProvider::OpenAi),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }) {
            Ok(_) => return Err("expected validation failure".to_string()),
            Err(error) => error,
        };

        ensure(
            matches!(error, ConfigError::Validation(ref message) if message.contains("llm.api_key")),
            "validation failure should mention llm.api_key",
        )
    }

    #[test]
    fn zero_timeouts_fail_validation() -> Result<(), String> {
        let mut config = AppConfig::default();
        config.pipeline.classification_timeout_secs = 0;

        match config.validate() {
            Err(ConfigError::Validation(message)) => ensure(
                message.contains("pipeline.classification_timeout_secs"),
                "message should name the offending field",
            ),
            other => Err(format!("unexpected validation result: {other:?}")),
        }
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                llm_provider: Some(LlmProvider::OpenAi),
                llm_api_key: Some("sk-secret-value".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;
        let debug = format!("{config:?}");

        ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")
    }

    #[test]
    fn log_aliases_and_blank_values_resolve_like_loading() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        let vars = ["QUERYGATE_LOGGING_LEVEL", "QUERYGATE_LOG_LEVEL", "QUERYGATE_AGENT_MAX_ROWS"];
        clear_vars(&vars);

        env::set_var("QUERYGATE_LOGGING_LEVEL", "   ");
        env::set_var("QUERYGATE_LOG_LEVEL", "warn");
        env::set_var("QUERYGATE_AGENT_MAX_ROWS", "");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.logging.level == "warn", "alias should supply the log level")?;
            ensure(
                env_source("logging.level").as_deref() == Some("QUERYGATE_LOG_LEVEL"),
                "source should name the alias that was read",
            )?;
            ensure(config.agent.max_rows == 50, "blank value should leave the default")?;
            ensure(env_source("agent.max_rows").is_none(), "blank value is not a source")?;
            ensure(
                env_keys("logging.format") == ["QUERYGATE_LOGGING_FORMAT", "QUERYGATE_LOG_FORMAT"],
                "logging keys should list the alias after the full name",
            )
        })();

        clear_vars(&vars);
        result
    }

    #[test]
    fn printed_enum_spellings_parse_back() -> Result<(), String> {
        for provider in [LlmProvider::OpenAi, LlmProvider::Ollama] {
            let from_env = provider.as_str().parse::<LlmProvider>().map_err(|e| e.to_string())?;
            ensure(from_env == provider, "env parser should accept the printed provider")?;
            let doc = format!("[llm]\nprovider = \"{}\"\n", provider.as_str());
            let from_file: super::ConfigPatch = toml::from_str(&doc).map_err(|e| e.to_string())?;
            ensure(
                from_file.llm.and_then(|llm| llm.provider) == Some(provider),
                "file parser should accept the printed provider",
            )?;
        }

        for format in [LogFormat::Compact, LogFormat::Pretty, LogFormat::Json] {
            let parsed = format.as_str().parse::<LogFormat>().map_err(|e| e.to_string())?;
            ensure(parsed == format, "env parser should accept the printed log format")?;
        }
        Ok(())
    }

    #[test]
    fn sql_attempts_must_stay_bounded() -> Result<(), String> {
        let mut config = AppConfig::default();
        ensure(config.agent.max_sql_attempts == 3, "default should allow two repairs")?;

        config.agent.max_sql_attempts = 0;
        match config.validate() {
            Err(ConfigError::Validation(message)) => ensure(
                message.contains("agent.max_sql_attempts"),
                "message should name the offending field",
            ),
            other => Err(format!("unexpected validation result: {other:?}")),
        }
    }
}
