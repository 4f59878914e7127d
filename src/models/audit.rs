use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One audit trail row. Every committed coordinator operation writes exactly
/// one (conversion writes one for the order and one for the challan it
/// creates); a rolled-back operation writes none.
/// Database table: audit_log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i32,

    /// CREATE, UPDATE, DELETE, CONVERT, ...
    pub action: String,

    #[serde(rename = "entityType")]
    pub entity_type: String,

    #[serde(rename = "entityId")]
    pub entity_id: String,

    #[serde(rename = "userId")]
    pub user_id: i32,

    pub timestamp: Option<NaiveDateTime>,

    pub details: serde_json::Value,
}
