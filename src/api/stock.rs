use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::db::DbPool;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::models::audit::AuditEntry;
use crate::models::lot::{CategoryStockSummary, StockLevelRow};
use crate::models::transaction::InventoryTransaction;
use crate::services::{audit_service, stock_service, transaction_service};

#[derive(Debug, Deserialize)]
pub struct StockFilter {
    #[serde(rename = "locationId")]
    pub location_id: Option<i32>,

    #[serde(rename = "productId")]
    pub product_id: Option<i32>,
}

/// GET /api/stock
/// Lot-level stock in FIFO order, optionally filtered by location/product.
pub async fn list_stock_endpoint(
    State(pool): State<DbPool>,
    AuthUser(_claims): AuthUser,
    Query(filter): Query<StockFilter>,
) -> AppResult<Json<Vec<StockLevelRow>>> {
    let stock =
        stock_service::get_stock_levels(&pool, filter.location_id, filter.product_id).await?;
    Ok(Json(stock))
}

/// GET /api/stock/by-category
/// Per-category aggregates with product breakdown.
pub async fn list_stock_by_category_endpoint(
    State(pool): State<DbPool>,
    AuthUser(_claims): AuthUser,
    Query(filter): Query<StockFilter>,
) -> AppResult<Json<Vec<CategoryStockSummary>>> {
    let stock = stock_service::get_stock_levels_by_category(&pool, filter.location_id).await?;
    Ok(Json(stock))
}

/// GET /api/stock/lots/:lotId/transactions
/// One lot's slice of the append-only transaction log, oldest first.
pub async fn list_lot_transactions_endpoint(
    State(pool): State<DbPool>,
    AuthUser(_claims): AuthUser,
    Path(lot_id): Path<i32>,
) -> AppResult<Json<Vec<InventoryTransaction>>> {
    let transactions = transaction_service::transactions_for_lot(&pool, lot_id).await?;
    Ok(Json(transactions))
}

#[derive(Debug, Deserialize)]
pub struct AuditFilter {
    pub limit: Option<i32>,
}

/// GET /api/audit-logs
pub async fn list_audit_logs_endpoint(
    State(pool): State<DbPool>,
    AuthUser(_claims): AuthUser,
    Query(filter): Query<AuditFilter>,
) -> AppResult<Json<Vec<AuditEntry>>> {
    let limit = filter.limit.unwrap_or(100).clamp(1, 1000);
    let entries = audit_service::get_audit_logs(&pool, limit).await?;
    Ok(Json(entries))
}
