use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;

use crate::db::{self, DbPool};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{AppConfig, AuthUser};
use crate::models::grn::{CreateGrnRequest, CreateGrnResponse, GoodsReceipt, GoodsReceiptItem};
use crate::services::grn_service;

/// POST /api/grns
/// Create a GRN; every item materializes one inventory lot with an INBOUND
/// transaction. The whole receipt commits atomically.
///
/// # Response
/// - 201 Created: GRN and lots created
/// - 400 Bad Request: validation failure
/// - 500 Internal Server Error: persistence failure (rollback performed)
pub async fn create_grn_endpoint(
    State(pool): State<DbPool>,
    AppConfig(config): AppConfig,
    AuthUser(claims): AuthUser,
    Json(request): Json<CreateGrnRequest>,
) -> AppResult<(StatusCode, Json<CreateGrnResponse>)> {
    if request.items.is_empty() {
        return Err(AppError::ValidationError(
            "GRN must contain at least one item".to_string(),
        ));
    }
    for item in &request.items {
        if item.weight_kg <= Decimal::ZERO {
            return Err(AppError::ValidationError(format!(
                "Weight must be greater than 0 for product {}",
                item.product_id
            )));
        }
        if item.quantity_bags <= 0 {
            return Err(AppError::ValidationError(format!(
                "Bag count must be greater than 0 for product {}",
                item.product_id
            )));
        }
    }

    let user_id = claims.user_id()?;
    let settings = config.retry_settings();

    let response = db::with_retry(&settings, "create_grn", || {
        grn_service::create_grn(&pool, &request, user_id)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/grns
pub async fn list_grns_endpoint(
    State(pool): State<DbPool>,
    AuthUser(_claims): AuthUser,
) -> AppResult<Json<Vec<GoodsReceipt>>> {
    let receipts = grn_service::get_grns(&pool).await?;
    Ok(Json(receipts))
}

/// GET /api/grns/:grnId/items
pub async fn get_grn_items_endpoint(
    State(pool): State<DbPool>,
    AuthUser(_claims): AuthUser,
    Path(grn_id): Path<i32>,
) -> AppResult<Json<Vec<GoodsReceiptItem>>> {
    let items = grn_service::get_grn_items(&pool, grn_id).await?;
    Ok(Json(items))
}

/// DELETE /api/grns/:grnId
/// Remove a GRN and its items. Lots spawned by the receipt remain.
pub async fn delete_grn_endpoint(
    State(pool): State<DbPool>,
    AppConfig(config): AppConfig,
    AuthUser(claims): AuthUser,
    Path(grn_id): Path<i32>,
) -> AppResult<Json<serde_json::Value>> {
    let user_id = claims.user_id()?;
    let settings = config.retry_settings();

    let grn_number = db::with_retry(&settings, "delete_grn", || {
        grn_service::delete_grn(&pool, grn_id, user_id)
    })
    .await?;

    Ok(Json(serde_json::json!({
        "message": "GRN deleted successfully",
        "grnNumber": grn_number,
    })))
}
