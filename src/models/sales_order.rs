use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sales order status machine.
///
/// ```text
///           create
///             |
///             v
///            New ----------> Cancelled    (releases reserved stock)
///             |
///             +--convert---> Delivered    (release + dispatch, conversion only)
/// ```
///
/// Delivered and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalesOrderStatus {
    New,
    Delivered,
    Cancelled,
}

impl SalesOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SalesOrderStatus::New => "New",
            SalesOrderStatus::Delivered => "Delivered",
            SalesOrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "New" => Some(SalesOrderStatus::New),
            "Delivered" => Some(SalesOrderStatus::Delivered),
            "Cancelled" => Some(SalesOrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Transitions out of New only; Delivered is reachable through
    /// conversion alone, never by a bare status update.
    pub fn can_transition_to(&self, next: SalesOrderStatus) -> bool {
        matches!(
            (self, next),
            (SalesOrderStatus::New, SalesOrderStatus::Cancelled)
                | (SalesOrderStatus::New, SalesOrderStatus::Delivered)
        )
    }
}

/// Sales order header.
/// Database table: sales_orders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrder {
    pub id: i32,

    /// Unique document number, format SO/YYYY/MON/DD/N
    #[serde(rename = "soNumber")]
    pub so_number: String,

    #[serde(rename = "customerId")]
    pub customer_id: i32,

    #[serde(rename = "customerName")]
    pub customer_name: Option<String>,

    #[serde(rename = "orderDate")]
    pub order_date: NaiveDate,

    pub status: SalesOrderStatus,

    #[serde(rename = "convertedToChallan")]
    pub converted_to_challan: bool,

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

/// Database table: sales_order_items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrderItem {
    pub id: i32,

    #[serde(rename = "soId")]
    pub so_id: i32,

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

    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SalesOrderItemInput {
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
pub struct CreateSalesOrderRequest {
    #[serde(rename = "customerId")]
    pub customer_id: i32,

    #[serde(rename = "orderDate")]
    pub order_date: NaiveDate,

    /// When absent, reservation spans all active locations (FIFO across the
    /// whole stock); when present, only lots at this location are eligible.
    #[serde(rename = "locationId", default)]
    pub location_id: Option<i32>,

    pub items: Vec<SalesOrderItemInput>,
}

/// Where one reserved slice of stock came from.
#[derive(Debug, Clone, Serialize)]
pub struct ReservedLotSummary {
    #[serde(rename = "productId")]
    pub product_id: i32,

    #[serde(rename = "lotNumber")]
    pub lot_number: String,

    #[serde(rename = "locationId")]
    pub location_id: i32,

    #[serde(rename = "reservedQuantity")]
    pub reserved_quantity: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSalesOrderResponse {
    pub id: i32,

    #[serde(rename = "soNumber")]
    pub so_number: String,

    #[serde(rename = "totalReserved")]
    pub total_reserved: Decimal,

    /// The reservation footprint: which lots, where, how much.
    pub reservations: Vec<ReservedLotSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSalesOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateSalesOrderStatusResponse {
    pub id: i32,
    pub status: SalesOrderStatus,

    /// Quantity returned to available stock, when the update released a
    /// reservation (zero otherwise).
    #[serde(rename = "releasedQuantity")]
    pub released_quantity: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertSalesOrderResponse {
    #[serde(rename = "salesOrderId")]
    pub sales_order_id: i32,

    #[serde(rename = "soNumber")]
    pub so_number: String,

    #[serde(rename = "salesChallanId")]
    pub sales_challan_id: i32,

    #[serde(rename = "scNumber")]
    pub sc_number: String,
}
