use crate::db::{DbConn, DbPool};
use crate::error::AppResult;
use crate::models::audit::AuditEntry;
use chrono::NaiveDateTime;
use tiberius::Query;

/// Append one audit row on the caller's connection.
///
/// Called from inside the document services' transactions, just before
/// COMMIT, so a rolled-back operation leaves no audit trace and a committed
/// one leaves exactly the rows its operation wrote.
pub async fn log_audit_event(
    conn: &mut DbConn,
    action: &str,
    entity_type: &str,
    entity_id: i32,
    user_id: i32,
    details: serde_json::Value,
) -> AppResult<()> {
    let sql = r#"
        INSERT INTO audit_log (action, entity_type, entity_id, user_id, timestamp, details)
        VALUES (@P1, @P2, @P3, @P4, GETUTCDATE(), @P5)
    "#;

    let entity_id = entity_id.to_string();
    let details = details.to_string();

    let mut query = Query::new(sql);
    query.bind(action);
    query.bind(entity_type);
    query.bind(entity_id.as_str());
    query.bind(user_id);
    query.bind(details.as_str());

    query.execute(&mut *conn).await?;

    Ok(())
}

/// Most recent audit entries, newest first.
pub async fn get_audit_logs(pool: &DbPool, limit: i32) -> AppResult<Vec<AuditEntry>> {
    let mut conn = pool.get().await?;

    let sql = r#"
        SELECT TOP (@P1) id, action, entity_type, entity_id, user_id, timestamp, details
        FROM audit_log
        ORDER BY id DESC
    "#;

    let mut query = Query::new(sql);
    query.bind(limit);

    let rows = query.query(&mut *conn).await?.into_first_result().await?;

    let entries = rows
        .iter()
        .map(|row| {
            let details_raw: &str = row.get(6).unwrap_or("{}");
            AuditEntry {
                id: row.get::<i32, _>(0).unwrap_or(0),
                action: row.get::<&str, _>(1).unwrap_or("").to_string(),
                entity_type: row.get::<&str, _>(2).unwrap_or("").to_string(),
                entity_id: row.get::<&str, _>(3).unwrap_or("").to_string(),
                user_id: row.get::<i32, _>(4).unwrap_or(0),
                timestamp: row.try_get::<NaiveDateTime, _>(5).ok().flatten(),
                details: serde_json::from_str(details_raw)
                    .unwrap_or(serde_json::Value::Null),
            }
        })
        .collect();

    Ok(entries)
}
