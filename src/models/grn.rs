use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Goods Receipt Note header.
/// Database table: goods_receipts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoodsReceipt {
    pub id: i32,

    /// Unique document number, format GRN/YYYY/MON/DD/N
    #[serde(rename = "grnNumber")]
    pub grn_number: String,

    #[serde(rename = "supplierId")]
    pub supplier_id: i32,

    #[serde(rename = "supplierName")]
    pub supplier_name: Option<String>,

    #[serde(rename = "locationId")]
    pub location_id: i32,

    #[serde(rename = "locationName")]
    pub location_name: Option<String>,

    #[serde(rename = "receiptDate")]
    pub receipt_date: NaiveDate,

    #[serde(rename = "createdAt")]
    pub created_at: Option<NaiveDateTime>,

    #[serde(rename = "createdBy")]
    pub created_by: i32,
}

/// GRN line item. Each item spawns exactly one inventory lot on creation;
/// `inventory_lot_id` links back to it.
/// Database table: goods_receipt_items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoodsReceiptItem {
    pub id: i32,

    #[serde(rename = "grnId")]
    pub grn_id: i32,

    #[serde(rename = "categoryId")]
    pub category_id: i32,

    #[serde(rename = "categoryName")]
    pub category_name: Option<String>,

    #[serde(rename = "productId")]
    pub product_id: i32,

    #[serde(rename = "productName")]
    pub product_name: Option<String>,

    #[serde(rename = "quantityBags")]
    pub quantity_bags: i32,

    #[serde(rename = "weightKg")]
    pub weight_kg: Decimal,

    pub remarks: Option<String>,

    #[serde(rename = "inventoryLotId")]
    pub inventory_lot_id: Option<i32>,
}

/// One inbound line of a GRN creation request.
#[derive(Debug, Clone, Deserialize)]
pub struct GrnItemInput {
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
pub struct CreateGrnRequest {
    #[serde(rename = "receiptDate")]
    pub receipt_date: NaiveDate,

    #[serde(rename = "supplierId")]
    pub supplier_id: i32,

    #[serde(rename = "locationId")]
    pub location_id: i32,

    pub items: Vec<GrnItemInput>,
}

/// Lot materialized by one GRN item.
#[derive(Debug, Clone, Serialize)]
pub struct InboundLotResult {
    #[serde(rename = "lotId")]
    pub lot_id: i32,

    #[serde(rename = "lotNumber")]
    pub lot_number: String,

    #[serde(rename = "availableQuantity")]
    pub available_quantity: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateGrnResponse {
    pub id: i32,

    #[serde(rename = "grnNumber")]
    pub grn_number: String,

    pub lots: Vec<InboundLotResult>,
}
