use crate::error::{AppError, AppResult};
use bb8::Pool;
use bb8_tiberius::ConnectionManager;
use std::time::Duration;
use tiberius::Config;

pub type DbPool = Pool<ConnectionManager>;

/// A checked-out SQL Server client, as produced by the pool.
pub type DbConn = tiberius::Client<tokio_util::compat::Compat<tokio::net::TcpStream>>;

pub async fn create_pool(
    connection_string: &str,
    max_connections: u32,
    min_connections: u32,
    connection_timeout_secs: u64,
) -> Result<DbPool, Box<dyn std::error::Error>> {
    // Parse connection string into Config
    let config = Config::from_ado_string(connection_string)?;

    // Create connection manager
    let manager = ConnectionManager::new(config);

    // Build connection pool with configuration. Checked-out connections are
    // health-probed first so a stale socket is replaced instead of reused.
    let pool = Pool::builder()
        .max_size(max_connections)
        .min_idle(Some(min_connections))
        .connection_timeout(Duration::from_secs(connection_timeout_secs))
        .test_on_check_out(true)
        .build(manager)
        .await?;

    // Test connection
    {
        let mut conn = pool.get().await?;
        let row = conn
            .query("SELECT @@VERSION as version", &[])
            .await?
            .into_row()
            .await?
            .ok_or("No version returned")?;

        let version: &str = row.get("version").ok_or("Version column not found")?;
        tracing::info!(
            "Connected to SQL Server: {}",
            version.lines().next().unwrap_or(version)
        );
    }

    Ok(pool)
}

/// Open an explicit serializable transaction on this connection. Every
/// ledger operation runs inside one of these; effects across transactions
/// are serializable with respect to the lots they touch.
pub async fn begin_serializable(conn: &mut DbConn) -> AppResult<()> {
    conn.simple_query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE; BEGIN TRAN")
        .await
        .map_err(|e| AppError::TransactionFailed(format!("BEGIN TRAN failed: {}", e)))?;
    Ok(())
}

pub async fn commit(conn: &mut DbConn) -> AppResult<()> {
    conn.simple_query("COMMIT")
        .await
        .map_err(|e| AppError::TransactionFailed(format!("COMMIT failed: {}", e)))?;
    Ok(())
}

/// Best-effort rollback of an open explicit transaction. Used on every
/// failure path inside multi-statement units of work; errors here are
/// swallowed because the connection may already be dead (the server
/// aborts the transaction with it).
pub async fn rollback_quietly(conn: &mut DbConn) {
    if let Err(e) = conn.simple_query("IF @@TRANCOUNT > 0 ROLLBACK TRAN").await {
        tracing::warn!(error = %e, "Rollback after failed transaction did not complete");
    }
}
