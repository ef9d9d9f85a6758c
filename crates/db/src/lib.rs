pub mod connection;
pub mod fixtures;
pub mod migrations;
mod read_only;
pub mod sql_agent;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{DemoDataset, SeedResult, VerificationResult};
pub use sql_agent::{QueryRows, SqlAgentError, SqlAgentOptions, SqlDatabaseAgent};
