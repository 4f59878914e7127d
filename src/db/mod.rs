pub mod connection;

pub use connection::{begin_serializable, commit, create_pool, rollback_quietly, DbConn, DbPool};

use crate::error::{AppError, AppResult};
use std::future::Future;
use std::time::Duration;

/// Bounded-retry policy for ledger operations, sourced from configuration.
#[derive(Debug, Clone, Copy)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub delay_base: Duration,
    pub operation_timeout: Duration,
}

/// Run a database operation under the per-operation deadline, retrying it
/// with exponential backoff when it fails in a retryable way (transient
/// connection faults, identifier mint races).
///
/// The operation must be a self-contained unit of work: every attempt
/// checks a fresh connection out of the pool and either commits or rolls
/// back before returning, so re-running it is safe. Deadline expiry is not
/// retried; the transaction is abandoned and rolled back server-side when
/// the connection is dropped.
pub async fn with_retry<T, F, Fut>(
    settings: &RetrySettings,
    operation: &str,
    mut run: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        if attempt > 0 {
            let delay = settings.delay_base * 2u32.saturating_pow(attempt - 1);
            tracing::warn!(
                operation = operation,
                attempt = attempt + 1,
                max_attempts = settings.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Retrying operation after retryable failure"
            );
            tokio::time::sleep(delay).await;
        }

        match tokio::time::timeout(settings.operation_timeout, run()).await {
            Err(_elapsed) => {
                tracing::error!(
                    operation = operation,
                    timeout_secs = settings.operation_timeout.as_secs(),
                    "Operation exceeded deadline, transaction abandoned"
                );
                return Err(AppError::Timeout(operation.to_string()));
            }
            Ok(Ok(value)) => {
                if attempt > 0 {
                    tracing::info!(
                        operation = operation,
                        attempt = attempt + 1,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Ok(Err(error)) if error.is_retryable() && attempt + 1 < settings.max_attempts => {
                attempt += 1;
            }
            Ok(Err(error)) => return Err(error),
        }
    }
}
