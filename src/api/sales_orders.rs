use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;

use crate::db::{self, DbPool};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{AppConfig, AuthUser};
use crate::models::sales_order::{
    ConvertSalesOrderResponse, CreateSalesOrderRequest, CreateSalesOrderResponse, SalesOrder,
    SalesOrderItem, UpdateSalesOrderStatusRequest, UpdateSalesOrderStatusResponse,
};
use crate::services::sales_order_service;

/// POST /api/sales-orders
/// Create a sales order and reserve stock for every line (FIFO across lots;
/// across locations when no location is given).
///
/// # Response
/// - 201 Created: order created, stock committed
/// - 400 Bad Request: validation failure
/// - 409 Conflict: insufficient stock, with every failing product listed
pub async fn create_sales_order_endpoint(
    State(pool): State<DbPool>,
    AppConfig(config): AppConfig,
    AuthUser(claims): AuthUser,
    Json(request): Json<CreateSalesOrderRequest>,
) -> AppResult<(StatusCode, Json<CreateSalesOrderResponse>)> {
    if request.items.is_empty() {
        return Err(AppError::ValidationError(
            "Sales order must contain at least one item".to_string(),
        ));
    }
    for item in &request.items {
        if item.weight_kg <= Decimal::ZERO {
            return Err(AppError::ValidationError(format!(
                "Weight must be greater than 0 for product {}",
                item.product_id
            )));
        }
    }

    let user_id = claims.user_id()?;
    let settings = config.retry_settings();

    let response = db::with_retry(&settings, "create_sales_order", || {
        sales_order_service::create_sales_order(&pool, &request, user_id)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/sales-orders
pub async fn list_sales_orders_endpoint(
    State(pool): State<DbPool>,
    AuthUser(_claims): AuthUser,
) -> AppResult<Json<Vec<SalesOrder>>> {
    let orders = sales_order_service::get_sales_orders(&pool).await?;
    Ok(Json(orders))
}

/// GET /api/sales-orders/:soId/items
pub async fn get_sales_order_items_endpoint(
    State(pool): State<DbPool>,
    AuthUser(_claims): AuthUser,
    Path(so_id): Path<i32>,
) -> AppResult<Json<Vec<SalesOrderItem>>> {
    let items = sales_order_service::get_sales_order_items(&pool, so_id).await?;
    Ok(Json(items))
}

/// PUT /api/sales-orders/:soId/status
/// Move an order along its state machine. Cancelling releases the reserved
/// stock; delivering is only possible through conversion.
pub async fn update_sales_order_status_endpoint(
    State(pool): State<DbPool>,
    AppConfig(config): AppConfig,
    AuthUser(claims): AuthUser,
    Path(so_id): Path<i32>,
    Json(request): Json<UpdateSalesOrderStatusRequest>,
) -> AppResult<Json<UpdateSalesOrderStatusResponse>> {
    let user_id = claims.user_id()?;
    let settings = config.retry_settings();

    let response = db::with_retry(&settings, "update_sales_order_status", || {
        sales_order_service::update_sales_order_status(&pool, so_id, &request.status, user_id)
    })
    .await?;

    Ok(Json(response))
}

/// POST /api/sales-orders/:soId/convert
/// Convert an open order into a sales challan: release the reservation and
/// dispatch the same lots in one transaction.
///
/// # Response
/// - 200 OK: challan created, order delivered
/// - 400 Bad Request: order is not open for conversion
/// - 409 Conflict: insufficient stock on the reserved lots
pub async fn convert_sales_order_endpoint(
    State(pool): State<DbPool>,
    AppConfig(config): AppConfig,
    AuthUser(claims): AuthUser,
    Path(so_id): Path<i32>,
) -> AppResult<Json<ConvertSalesOrderResponse>> {
    let user_id = claims.user_id()?;
    let settings = config.retry_settings();

    let response = db::with_retry(&settings, "convert_sales_order", || {
        sales_order_service::convert_to_challan(&pool, so_id, user_id)
    })
    .await?;

    Ok(Json(response))
}

/// DELETE /api/sales-orders/:soId
/// Soft delete; any outstanding reservation is released first.
pub async fn delete_sales_order_endpoint(
    State(pool): State<DbPool>,
    AppConfig(config): AppConfig,
    AuthUser(claims): AuthUser,
    Path(so_id): Path<i32>,
) -> AppResult<Json<serde_json::Value>> {
    let user_id = claims.user_id()?;
    let settings = config.retry_settings();

    let released = db::with_retry(&settings, "delete_sales_order", || {
        sales_order_service::delete_sales_order(&pool, so_id, user_id)
    })
    .await?;

    Ok(Json(serde_json::json!({
        "message": "Sales order deleted successfully",
        "releasedQuantity": released,
    })))
}
