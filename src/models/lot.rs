use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A lot as read under its row lock, just before a quantity delta.
///
/// Lots are immutable apart from the two counters, which change only under
/// this lock; a drained lot is never deleted, it stays behind as history
/// for its transactions.
#[derive(Debug, Clone)]
pub struct LockedLot {
    pub id: i32,
    pub lot_number: String,
    pub product_id: i32,
    pub location_id: i32,
    pub available_quantity: Decimal,
    pub committed_quantity: Decimal,
}

/// Lot-level stock row with master-data names resolved, for stock listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLevelRow {
    pub id: i32,

    #[serde(rename = "lotNumber")]
    pub lot_number: String,

    #[serde(rename = "productId")]
    pub product_id: i32,

    #[serde(rename = "productName")]
    pub product_name: Option<String>,

    #[serde(rename = "categoryId")]
    pub category_id: i32,

    #[serde(rename = "categoryName")]
    pub category_name: Option<String>,

    #[serde(rename = "locationId")]
    pub location_id: i32,

    #[serde(rename = "locationName")]
    pub location_name: Option<String>,

    #[serde(rename = "supplierId")]
    pub supplier_id: i32,

    #[serde(rename = "supplierName")]
    pub supplier_name: Option<String>,

    #[serde(rename = "availableQuantity")]
    pub available_quantity: Decimal,

    #[serde(rename = "committedQuantity")]
    pub committed_quantity: Decimal,

    #[serde(rename = "createdAt")]
    pub created_at: Option<NaiveDateTime>,
}

/// Per-product slice of a category stock summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductStockSummary {
    #[serde(rename = "productId")]
    pub product_id: i32,

    #[serde(rename = "productName")]
    pub product_name: Option<String>,

    #[serde(rename = "availableQuantity")]
    pub available_quantity: Decimal,

    #[serde(rename = "committedQuantity")]
    pub committed_quantity: Decimal,

    #[serde(rename = "totalQuantity")]
    pub total_quantity: Decimal,

    #[serde(rename = "lotCount")]
    pub lot_count: i32,
}

/// Category aggregate with product breakdown, for the category stock view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryStockSummary {
    #[serde(rename = "categoryId")]
    pub category_id: i32,

    #[serde(rename = "categoryName")]
    pub category_name: Option<String>,

    #[serde(rename = "totalAvailable")]
    pub total_available: Decimal,

    #[serde(rename = "totalCommitted")]
    pub total_committed: Decimal,

    #[serde(rename = "totalQuantity")]
    pub total_quantity: Decimal,

    #[serde(rename = "productCount")]
    pub product_count: i32,

    pub products: Vec<ProductStockSummary>,
}
