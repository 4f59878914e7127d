use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Movement kind on the transaction log.
/// Database column: inventory_transactions.transaction_type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Stock entering the system from a GRN item
    Inbound,
    /// Stock leaving the system on a dispatch
    Outbound,
    /// Zero-sum movement between the available and committed counters
    Adjustment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Inbound => "INBOUND",
            TransactionType::Outbound => "OUTBOUND",
            TransactionType::Adjustment => "ADJUSTMENT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INBOUND" => Some(TransactionType::Inbound),
            "OUTBOUND" => Some(TransactionType::Outbound),
            "ADJUSTMENT" => Some(TransactionType::Adjustment),
            _ => None,
        }
    }
}

/// Auxiliary label on an ADJUSTMENT transaction distinguishing the two
/// directions of a reservation. A RESERVE/UNRESERVE pair for the same sales
/// order carries the same reference and opposite tags, which is how the
/// release path locates the lots to credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationType {
    Reserve,
    Unreserve,
}

impl ReservationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationType::Reserve => "RESERVE",
            ReservationType::Unreserve => "UNRESERVE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "RESERVE" => Some(ReservationType::Reserve),
            "UNRESERVE" => Some(ReservationType::Unreserve),
            _ => None,
        }
    }
}

/// One row of the append-only transaction log.
/// Database table: inventory_transactions
///
/// `balance_quantity` is the lot's available quantity immediately after the
/// movement, which makes the log self-verifying: replaying entries in order
/// reproduces the lot state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: i32,

    #[serde(rename = "lotId")]
    pub lot_id: i32,

    #[serde(rename = "transactionType")]
    pub transaction_type: TransactionType,

    #[serde(rename = "transactionDate")]
    pub transaction_date: Option<NaiveDateTime>,

    pub quantity: Decimal,

    #[serde(rename = "weightKg")]
    pub weight_kg: Decimal,

    #[serde(rename = "locationId")]
    pub location_id: i32,

    #[serde(rename = "referenceType")]
    pub reference_type: Option<String>,

    #[serde(rename = "referenceId")]
    pub reference_id: Option<i32>,

    #[serde(rename = "reservationType")]
    pub reservation_type: Option<ReservationType>,

    pub description: Option<String>,

    #[serde(rename = "balanceQuantity")]
    pub balance_quantity: Decimal,

    #[serde(rename = "createdBy")]
    pub created_by: i32,

    #[serde(rename = "createdAt")]
    pub created_at: Option<NaiveDateTime>,
}
