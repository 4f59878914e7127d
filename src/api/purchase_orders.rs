use axum::{
    extract::{Path, State},
    Json,
};

use crate::db::{self, DbPool};
use crate::error::AppResult;
use crate::middleware::auth::{AppConfig, AuthUser};
use crate::models::purchase_order::{PurchaseOrder, UpdatePurchaseOrderRequest};
use crate::services::purchase_order_service;

/// GET /api/purchase-orders
pub async fn list_purchase_orders_endpoint(
    State(pool): State<DbPool>,
    AuthUser(_claims): AuthUser,
) -> AppResult<Json<Vec<PurchaseOrder>>> {
    let orders = purchase_order_service::get_purchase_orders(&pool).await?;
    Ok(Json(orders))
}

/// PUT /api/purchase-orders/:poId
/// Update a purchase order. Every requested change is checked against the
/// lifecycle action table first; a disallowed action fails with a
/// user-readable reason and nothing is applied.
pub async fn update_purchase_order_endpoint(
    State(pool): State<DbPool>,
    AppConfig(config): AppConfig,
    AuthUser(claims): AuthUser,
    Path(po_id): Path<i32>,
    Json(request): Json<UpdatePurchaseOrderRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let user_id = claims.user_id()?;
    let settings = config.retry_settings();

    db::with_retry(&settings, "update_purchase_order", || {
        purchase_order_service::update_purchase_order(&pool, po_id, &request, user_id)
    })
    .await?;

    Ok(Json(serde_json::json!({
        "message": "Purchase order updated successfully",
        "id": po_id,
    })))
}
