use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sales challan (dispatch note) header. Created either standalone, drawing
/// directly on available stock, or by converting a sales order, in which
/// case `source_so_id` records the origin.
/// Database table: sales_challans
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesChallan {
    pub id: i32,

    /// Unique document number, format SC/YYYY/MON/DD/N
    #[serde(rename = "scNumber")]
    pub sc_number: String,

    #[serde(rename = "customerId")]
    pub customer_id: i32,

    #[serde(rename = "customerName")]
    pub customer_name: Option<String>,

    #[serde(rename = "challanDate")]
    pub challan_date: NaiveDate,

    pub status: String,

    #[serde(rename = "sourceSoId")]
    pub source_so_id: Option<i32>,

    #[serde(rename = "isDeleted")]
    pub is_deleted: bool,

    #[serde(rename = "totalItems")]
    pub total_items: i32,

    pub notes: Option<String>,

    #[serde(rename = "createdAt")]
    pub created_at: Option<NaiveDateTime>,

    #[serde(rename = "createdBy")]
    pub created_by: i32,
}

/// Database table: sales_challan_items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesChallanItem {
    pub id: i32,

    #[serde(rename = "scId")]
    pub sc_id: i32,

    #[serde(rename = "categoryId")]
    pub category_id: i32,

    #[serde(rename = "productId")]
    pub product_id: i32,

    #[serde(rename = "productName")]
    pub product_name: Option<String>,

    #[serde(rename = "quantityBags")]
    pub quantity_bags: i32,

    #[serde(rename = "weightKg")]
    pub weight_kg: Decimal,

    /// First OUTBOUND transaction recorded for this line
    #[serde(rename = "inventoryTransactionId")]
    pub inventory_transaction_id: Option<i32>,

    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChallanItemInput {
    #[serde(rename = "categoryId")]
    pub category_id: i32,

    #[serde(rename = "productId")]
    pub product_id: i32,

    #[serde(rename = "quantityBags")]
    pub quantity_bags: i32,

    #[serde(rename = "weightKg")]
    pub weight_kg: Decimal,

    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateChallanRequest {
    #[serde(rename = "customerId")]
    pub customer_id: i32,

    #[serde(rename = "challanDate")]
    pub challan_date: NaiveDate,

    /// Dispatch location; standalone challans always draw on one location.
    #[serde(rename = "locationId")]
    pub location_id: i32,

    pub items: Vec<ChallanItemInput>,
}

/// One slice of dispatched stock, as planned by FIFO allocation.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchedLotSummary {
    #[serde(rename = "productId")]
    pub product_id: i32,

    #[serde(rename = "lotId")]
    pub lot_id: i32,

    #[serde(rename = "lotNumber")]
    pub lot_number: String,

    #[serde(rename = "locationId")]
    pub location_id: i32,

    #[serde(rename = "dispatchedQuantity")]
    pub dispatched_quantity: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateChallanResponse {
    pub id: i32,

    #[serde(rename = "scNumber")]
    pub sc_number: String,

    pub allocations: Vec<DispatchedLotSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateChallanStatusRequest {
    pub status: String,
}
