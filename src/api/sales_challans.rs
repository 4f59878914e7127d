use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;

use crate::db::{self, DbPool};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{AppConfig, AuthUser};
use crate::models::sales_challan::{
    CreateChallanRequest, CreateChallanResponse, SalesChallan, SalesChallanItem,
    UpdateChallanStatusRequest,
};
use crate::services::sales_challan_service;

/// POST /api/sales-challans
/// Create a standalone challan dispatching directly from available stock at
/// one location.
///
/// # Response
/// - 201 Created: challan created, stock deducted
/// - 400 Bad Request: validation failure
/// - 409 Conflict: insufficient stock at the location
pub async fn create_challan_endpoint(
    State(pool): State<DbPool>,
    AppConfig(config): AppConfig,
    AuthUser(claims): AuthUser,
    Json(request): Json<CreateChallanRequest>,
) -> AppResult<(StatusCode, Json<CreateChallanResponse>)> {
    if request.items.is_empty() {
        return Err(AppError::ValidationError(
            "Sales challan must contain at least one item".to_string(),
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

    let response = db::with_retry(&settings, "create_sales_challan", || {
        sales_challan_service::create_challan(&pool, &request, user_id)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/sales-challans
pub async fn list_challans_endpoint(
    State(pool): State<DbPool>,
    AuthUser(_claims): AuthUser,
) -> AppResult<Json<Vec<SalesChallan>>> {
    let challans = sales_challan_service::get_sales_challans(&pool).await?;
    Ok(Json(challans))
}

/// GET /api/sales-challans/:scId/items
pub async fn get_challan_items_endpoint(
    State(pool): State<DbPool>,
    AuthUser(_claims): AuthUser,
    Path(sc_id): Path<i32>,
) -> AppResult<Json<Vec<SalesChallanItem>>> {
    let items = sales_challan_service::get_challan_items(&pool, sc_id).await?;
    Ok(Json(items))
}

/// PUT /api/sales-challans/:scId/status
/// Display status only; stock moved when the challan was created.
pub async fn update_challan_status_endpoint(
    State(pool): State<DbPool>,
    AppConfig(config): AppConfig,
    AuthUser(claims): AuthUser,
    Path(sc_id): Path<i32>,
    Json(request): Json<UpdateChallanStatusRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let user_id = claims.user_id()?;
    let settings = config.retry_settings();

    let sc_number = db::with_retry(&settings, "update_challan_status", || {
        sales_challan_service::update_challan_status(&pool, sc_id, &request.status, user_id)
    })
    .await?;

    Ok(Json(serde_json::json!({
        "message": "Sales challan status updated successfully",
        "scNumber": sc_number,
        "status": request.status,
    })))
}

/// DELETE /api/sales-challans/:scId
pub async fn delete_challan_endpoint(
    State(pool): State<DbPool>,
    AppConfig(config): AppConfig,
    AuthUser(claims): AuthUser,
    Path(sc_id): Path<i32>,
) -> AppResult<Json<serde_json::Value>> {
    let user_id = claims.user_id()?;
    let settings = config.retry_settings();

    db::with_retry(&settings, "delete_sales_challan", || {
        sales_challan_service::delete_sales_challan(&pool, sc_id, user_id)
    })
    .await?;

    Ok(Json(serde_json::json!({
        "message": "Sales challan deleted successfully",
    })))
}
