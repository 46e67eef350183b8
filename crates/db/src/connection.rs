use std::time::Duration;

use classcover_core::config::DatabaseConfig;
use sqlx::sqlite::SqlitePoolOptions;

pub type DbPool = sqlx::SqlitePool;

/// Opens the workflow pool. Every connection enforces foreign keys, runs
/// in WAL mode, and waits out short write locks for the configured busy
/// timeout instead of surfacing SQLITE_BUSY to the approval transactions.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let busy_timeout = format!("PRAGMA busy_timeout = {}", config.busy_timeout_ms);
    SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(config.timeout_secs.max(1)))
        .after_connect(move |conn, _meta| {
            let busy_timeout = busy_timeout.clone();
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query(&busy_timeout).execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(&config.url)
        .await
}

#[cfg(test)]
mod tests {
    use classcover_core::config::DatabaseConfig;

    use super::connect;

    #[tokio::test]
    async fn pragmas_follow_the_database_config() {
        let config = DatabaseConfig { busy_timeout_ms: 2_500, ..DatabaseConfig::ephemeral() };
        let pool = connect(&config).await.expect("connect");

        let busy_timeout: i64 =
            sqlx::query_scalar("PRAGMA busy_timeout").fetch_one(&pool).await.expect("pragma");
        assert_eq!(busy_timeout, 2_500);

        let foreign_keys: i64 =
            sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(&pool).await.expect("pragma");
        assert_eq!(foreign_keys, 1);
    }
}
