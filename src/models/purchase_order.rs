use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Purchase order status. The PO workflow never touches the inventory
/// ledger; its state machine exists to guard editability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderStatus {
    #[serde(rename = "Order Placed")]
    OrderPlaced,
    #[serde(rename = "Order Received")]
    OrderReceived,
    #[serde(rename = "Order Cancelled")]
    OrderCancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::OrderPlaced => "Order Placed",
            PurchaseOrderStatus::OrderReceived => "Order Received",
            PurchaseOrderStatus::OrderCancelled => "Order Cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Order Placed" => Some(PurchaseOrderStatus::OrderPlaced),
            "Order Received" => Some(PurchaseOrderStatus::OrderReceived),
            "Order Cancelled" => Some(PurchaseOrderStatus::OrderCancelled),
            _ => None,
        }
    }
}

/// Actions a caller may attempt on a purchase order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderAction {
    Edit,
    Delete,
    ConvertToGrn,
    MarkReceived,
    MarkCancelled,
}

/// Fixed table of allowed actions per (status, converted_to_grn) state.
/// States missing from the table allow nothing.
pub fn allowed_actions(
    status: PurchaseOrderStatus,
    converted_to_grn: bool,
) -> &'static [PurchaseOrderAction] {
    use PurchaseOrderAction::*;
    use PurchaseOrderStatus::*;

    match (status, converted_to_grn) {
        (OrderPlaced, false) => &[Edit, Delete, ConvertToGrn, MarkReceived, MarkCancelled],
        (OrderReceived, false) => &[Edit, Delete, ConvertToGrn, MarkCancelled],
        (OrderReceived, true) => &[],
        (OrderCancelled, _) => &[Delete],
        (OrderPlaced, true) => &[],
    }
}

pub fn validate_action(
    status: PurchaseOrderStatus,
    converted_to_grn: bool,
    action: PurchaseOrderAction,
) -> bool {
    allowed_actions(status, converted_to_grn).contains(&action)
}

/// User-readable reason for a disallowed action.
pub fn lifecycle_error_message(
    status: PurchaseOrderStatus,
    converted_to_grn: bool,
    action: PurchaseOrderAction,
) -> String {
    if converted_to_grn && status == PurchaseOrderStatus::OrderReceived {
        "Order has been converted to GRN and can no longer be modified".to_string()
    } else if status == PurchaseOrderStatus::OrderCancelled
        && action != PurchaseOrderAction::Delete
    {
        "Only deletion is allowed for cancelled orders".to_string()
    } else {
        format!(
            "Action '{:?}' is not allowed for orders with status '{}'",
            action,
            status.as_str()
        )
    }
}

/// Purchase order header.
/// Database table: purchase_orders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: i32,

    /// Unique document number, format PO/YYYY/MON/DD/N
    #[serde(rename = "poNumber")]
    pub po_number: String,

    #[serde(rename = "supplierId")]
    pub supplier_id: i32,

    #[serde(rename = "supplierName")]
    pub supplier_name: Option<String>,

    #[serde(rename = "orderDate")]
    pub order_date: NaiveDate,

    pub status: PurchaseOrderStatus,

    #[serde(rename = "convertedToGrn")]
    pub converted_to_grn: bool,

    #[serde(rename = "isDeleted")]
    pub is_deleted: bool,

    #[serde(rename = "createdAt")]
    pub created_at: Option<NaiveDateTime>,

    #[serde(rename = "createdBy")]
    pub created_by: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePurchaseOrderRequest {
    #[serde(default)]
    pub status: Option<String>,

    #[serde(rename = "convertedToGrn", default)]
    pub converted_to_grn: Option<bool>,

    #[serde(rename = "orderDate", default)]
    pub order_date: Option<NaiveDate>,

    #[serde(default)]
    pub notes: Option<String>,
}
