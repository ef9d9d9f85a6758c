use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Sqlite;
use tracing::warn;

use crate::connection::DbPool;

/// SQLite VM instructions between two cancellation checks.
const PROGRESS_CHECK_OPS: i32 = 1_000;

/// A pooled connection held in `PRAGMA query_only` mode.
///
/// `release` restores the connection before it goes back to the pool. When the
/// lease is dropped instead (the caller's future was cancelled), the running
/// statement is interrupted and the reset happens on a background task; a
/// connection that cannot be reset is closed, never pooled.
pub(crate) struct ReadOnlyLease {
    conn: Option<PoolConnection<Sqlite>>,
    cancelled: Arc<AtomicBool>,
}

impl ReadOnlyLease {
    pub(crate) async fn acquire(pool: &DbPool) -> Result<Self, sqlx::Error> {
        let mut lease = Self { conn: Some(pool.acquire().await?), cancelled: Arc::default() };

        let cancelled = Arc::clone(&lease.cancelled);
        let conn = lease.connection()?;
        conn.lock_handle()
            .await?
            .set_progress_handler(PROGRESS_CHECK_OPS, move || !cancelled.load(Ordering::Relaxed));
        sqlx::query("PRAGMA query_only = ON").execute(&mut *conn).await?;

        Ok(lease)
    }

    pub(crate) async fn fetch_all(&mut self, sql: &str) -> Result<Vec<SqliteRow>, sqlx::Error> {
        sqlx::query(sql).fetch_all(self.connection()?).await
    }

    pub(crate) async fn release(mut self) {
        let reset = match self.conn.as_deref_mut() {
            Some(conn) => leave_query_only(conn).await,
            None => return,
        };

        let Some(mut conn) = self.conn.take() else {
            return;
        };
        if let Err(error) = reset {
            warn!(
                event_name = "sql_agent.connection.reset_failed",
                error = %error,
                "could not leave query_only mode; discarding connection"
            );
            conn.close_on_drop();
        }
    }

    fn connection(&mut self) -> Result<&mut SqliteConnection, sqlx::Error> {
        self.conn.as_deref_mut().ok_or(sqlx::Error::PoolClosed)
    }
}

impl Drop for ReadOnlyLease {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        self.cancelled.store(true, Ordering::Relaxed);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(error) = leave_query_only(&mut conn).await {
                        warn!(
                            event_name = "sql_agent.connection.reset_failed",
                            error = %error,
                            "could not reset an abandoned query_only connection; discarding it"
                        );
                        conn.close_on_drop();
                    }
                });
            }
            Err(_) => conn.close_on_drop(),
        }
    }
}

async fn leave_query_only(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    conn.lock_handle().await?.remove_progress_handler();
    sqlx::query("PRAGMA query_only = OFF").execute(&mut *conn).await?;
    Ok(())
}
