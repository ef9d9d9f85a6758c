use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use querygate_core::{CompletionService, QueryAgent};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, ValueRef};
use thiserror::Error;
use tracing::{info, warn};

use crate::connection::DbPool;
use crate::read_only::ReadOnlyLease;

/// Keywords that never belong in a generated read query, matched as whole words.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "REPLACE", "ATTACH", "DETACH",
    "PRAGMA", "VACUUM", "REINDEX", "TRUNCATE", "GRANT",
];

#[derive(Debug, Error)]
pub enum SqlAgentError {
    #[error("schema introspection failed: {0}")]
    Schema(#[source] sqlx::Error),
    #[error("model did not return a SQL statement")]
    EmptyStatement,
    #[error("refusing to run a statement that is not a single read-only query: `{0}`")]
    NonReadOnlyStatement(String),
    #[error("query `{sql}` failed: {source}")]
    Query {
        sql: String,
        #[source]
        source: sqlx::Error,
    },
}

impl SqlAgentError {
    /// Whether another statement from the model could succeed where this one failed.
    pub fn is_repairable(&self) -> bool {
        match self {
            Self::EmptyStatement | Self::NonReadOnlyStatement(_) => true,
            Self::Query { source, .. } => matches!(source, sqlx::Error::Database(_)),
            Self::Schema(_) => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SqlAgentOptions {
    pub max_rows: usize,
    /// Statements generated per question, the first one included.
    pub max_sql_attempts: u32,
}

impl Default for SqlAgentOptions {
    fn default() -> Self {
        Self { max_rows: 50, max_sql_attempts: 3 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub omitted: usize,
}

impl QueryRows {
    pub fn render(&self) -> String {
        if self.rows.is_empty() {
            return "(no rows)".to_string();
        }

        let mut lines = Vec::with_capacity(self.rows.len() + 2);
        lines.push(self.columns.join(" | "));
        lines.extend(self.rows.iter().map(|row| row.join(" | ")));
        if self.omitted > 0 {
            lines.push(format!("({} more rows omitted)", self.omitted));
        }
        lines.join("\n")
    }
}

/// Answers questions by having the model write one SELECT against the live
/// schema, running it, and having the model phrase the rows as an answer.
pub struct SqlDatabaseAgent {
    pool: DbPool,
    completion: Arc<dyn CompletionService>,
    options: SqlAgentOptions,
}

impl SqlDatabaseAgent {
    pub fn new(
        pool: DbPool,
        completion: Arc<dyn CompletionService>,
        options: SqlAgentOptions,
    ) -> Self {
        Self { pool, completion, options }
    }

    pub async fn describe_schema(&self) -> Result<String, SqlAgentError> {
        let rows = sqlx::query(
            "SELECT sql FROM sqlite_master
             WHERE type = 'table'
               AND sql IS NOT NULL
               AND name NOT LIKE 'sqlite_%'
               AND name NOT LIKE '_sqlx_%'
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(SqlAgentError::Schema)?;

        Ok(rows
            .iter()
            .map(|row| format!("{};", row.get::<String, _>("sql").trim()))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Runs a statement that already passed `extract_statement`, on a connection
    /// switched to `query_only` for the duration of the call.
    pub async fn fetch_rows(&self, sql: &str) -> Result<QueryRows, SqlAgentError> {
        let query_error = |source| SqlAgentError::Query { sql: sql.to_string(), source };

        let mut lease = ReadOnlyLease::acquire(&self.pool).await.map_err(query_error)?;
        let fetched = lease.fetch_all(sql).await;
        lease.release().await;

        let rows = fetched.map_err(query_error)?;
        Ok(collect_rows(&rows, self.options.max_rows))
    }

    /// Asks for a statement and runs it. Refused or failing statements are sent
    /// back to the model with the error, up to `max_sql_attempts` statements.
    async fn query_with_repair(
        &self,
        question: &str,
        schema: &str,
    ) -> anyhow::Result<(String, QueryRows)> {
        let mut prompt = sql_prompt(question, schema);
        let mut attempt = 1;

        loop {
            let generated =
                self.completion.complete(&prompt).await.context("sql generation failed")?;
            let outcome = match extract_statement(&generated) {
                Ok(sql) => {
                    info!(
                        event_name = "sql_agent.query.generated",
                        attempt,
                        sql = %sql,
                        "generated read-only query"
                    );
                    self.fetch_rows(&sql).await.map(|rows| (sql, rows))
                }
                Err(error) => Err(error),
            };

            match outcome {
                Ok(found) => return Ok(found),
                Err(error) if error.is_repairable() && attempt < self.options.max_sql_attempts => {
                    warn!(
                        event_name = "sql_agent.query.rejected",
                        attempt,
                        error = %error,
                        "asking the model for a corrected query"
                    );
                    prompt = repair_prompt(question, schema, generated.trim(), &error.to_string());
                    attempt += 1;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }
}

#[async_trait]
impl QueryAgent for SqlDatabaseAgent {
    async fn run(&self, question: &str) -> anyhow::Result<String> {
        let schema = self.describe_schema().await?;
        let (sql, rows) = self.query_with_repair(question, &schema).await?;
        info!(
            event_name = "sql_agent.query.executed",
            rows = rows.rows.len(),
            omitted = rows.omitted,
            "query executed"
        );

        let answer = self
            .completion
            .complete(&answer_prompt(question, &sql, &rows.render()))
            .await
            .context("answer synthesis failed")?;
        Ok(answer.trim().to_string())
    }
}

pub fn sql_prompt(question: &str, schema: &str) -> String {
    format!(
        "You are a SQLite expert. Write one SQLite SELECT statement that answers the \
question using the schema below. Only read data, never modify it. Return only the SQL, \
without explanation or markdown.\n\n\
Schema:\n{schema}\n\n\
Question: {question}\n\
SQL:"
    )
}

pub fn repair_prompt(question: &str, schema: &str, previous: &str, error: &str) -> String {
    format!(
        "Your previous SQL for this question could not be used. Write a corrected SQLite \
SELECT statement. Only read data, never modify it. Return only the SQL, without \
explanation or markdown.\n\n\
Schema:\n{schema}\n\n\
Question: {question}\n\
Previous SQL: {previous}\n\
Error: {error}\n\
SQL:"
    )
}

pub fn answer_prompt(question: &str, sql: &str, result: &str) -> String {
    format!(
        "Answer the question using only the SQL result below. Reply in the same language \
as the question, in one or two sentences.\n\n\
Question: {question}\n\
SQL: {sql}\n\
Result:\n{result}\n\
Answer:"
    )
}

/// Pulls the SQL out of a model reply (fenced or bare) and checks it is a single
/// read-only statement.
pub fn extract_statement(reply: &str) -> Result<String, SqlAgentError> {
    let body = match reply.split("```").nth(1) {
        Some(fenced) => match fenced.split_once('\n') {
            Some((tag, rest)) if tag.trim().chars().all(|ch| ch.is_ascii_alphanumeric()) => rest,
            _ => fenced,
        },
        None => reply,
    };
    let sql = body.trim().trim_end_matches(|ch: char| ch == ';' || ch.is_whitespace()).trim();

    if sql.is_empty() {
        return Err(SqlAgentError::EmptyStatement);
    }
    ensure_read_only(sql)?;
    Ok(sql.to_string())
}

fn ensure_read_only(sql: &str) -> Result<(), SqlAgentError> {
    let normalized = sql.to_uppercase();
    let mut words = normalized
        .split(|ch: char| !(ch.is_alphanumeric() || ch == '_'))
        .filter(|word| !word.is_empty());

    let leading_ok = matches!(words.next(), Some("SELECT" | "WITH"));
    let single_statement = !normalized.contains(';');
    let forbidden = words.any(|word| FORBIDDEN_KEYWORDS.contains(&word));

    if leading_ok && single_statement && !forbidden {
        Ok(())
    } else {
        Err(SqlAgentError::NonReadOnlyStatement(sql.to_string()))
    }
}

fn collect_rows(rows: &[SqliteRow], max_rows: usize) -> QueryRows {
    let columns = rows
        .first()
        .map(|row| row.columns().iter().map(|column| column.name().to_string()).collect())
        .unwrap_or_default();

    let kept = rows
        .iter()
        .take(max_rows)
        .map(|row| (0..row.len()).map(|index| cell_text(row, index)).collect())
        .collect();

    QueryRows { columns, rows: kept, omitted: rows.len().saturating_sub(max_rows) }
}

fn cell_text(row: &SqliteRow, index: usize) -> String {
    match row.try_get_raw(index) {
        Ok(value) if value.is_null() => return "NULL".to_string(),
        Ok(_) => {}
        Err(_) => return "?".to_string(),
    }

    if let Ok(value) = row.try_get::<i64, _>(index) {
        return value.to_string();
    }
    if let Ok(value) = row.try_get::<f64, _>(index) {
        return value.to_string();
    }
    if let Ok(value) = row.try_get::<String, _>(index) {
        return value;
    }
    if let Ok(value) = row.try_get::<Vec<u8>, _>(index) {
        return format!("<{} bytes>", value.len());
    }
    "?".to_string()
}
