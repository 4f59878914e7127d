use crate::db::{self, DbConn, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::purchase_order::{
    self, PurchaseOrder, PurchaseOrderAction, PurchaseOrderStatus, UpdatePurchaseOrderRequest,
};
use crate::services::audit_service;
use chrono::{NaiveDate, NaiveDateTime};
use tiberius::Query;

/// All purchase order headers, newest first.
pub async fn get_purchase_orders(pool: &DbPool) -> AppResult<Vec<PurchaseOrder>> {
    let mut conn = pool.get().await?;

    let sql = r#"
        SELECT po.id, po.po_number, po.supplier_id, s.name AS supplier_name,
               po.order_date, po.status, po.converted_to_grn, po.is_deleted,
               po.created_at, po.created_by
        FROM purchase_orders po
        LEFT JOIN suppliers s ON s.id = po.supplier_id
        WHERE po.is_deleted = 0
        ORDER BY po.created_at DESC
    "#;

    let rows = Query::new(sql)
        .query(&mut *conn)
        .await?
        .into_first_result()
        .await?;

    let orders = rows
        .iter()
        .filter_map(|row| {
            let status_raw: &str = row.get(5).unwrap_or("Order Placed");
            let status = PurchaseOrderStatus::parse(status_raw)?;

            Some(PurchaseOrder {
                id: row.get::<i32, _>(0).unwrap_or(0),
                po_number: row.get::<&str, _>(1).unwrap_or("").to_string(),
                supplier_id: row.get::<i32, _>(2).unwrap_or(0),
                supplier_name: row.get::<&str, _>(3).map(|s| s.to_string()),
                order_date: row
                    .try_get::<NaiveDate, _>(4)
                    .ok()
                    .flatten()
                    .unwrap_or_default(),
                status,
                converted_to_grn: row.get::<bool, _>(6).unwrap_or(false),
                is_deleted: row.get::<bool, _>(7).unwrap_or(false),
                created_at: row.try_get::<NaiveDateTime, _>(8).ok().flatten(),
                created_by: row.get::<i32, _>(9).unwrap_or(0),
            })
        })
        .collect();

    Ok(orders)
}

/// Update a purchase order under its lifecycle rules.
///
/// The PO workflow never touches the inventory ledger; this exists because
/// the allowed-action table guards editability, and a disallowed action must
/// fail with a reason a user can act on.
pub async fn update_purchase_order(
    pool: &DbPool,
    po_id: i32,
    request: &UpdatePurchaseOrderRequest,
    user_id: i32,
) -> AppResult<()> {
    let mut conn = pool.get().await?;

    db::begin_serializable(&mut conn).await?;

    let result = update_in_txn(&mut conn, po_id, request, user_id).await;

    match result {
        Ok(()) => db::commit(&mut conn).await,
        Err(e) => {
            db::rollback_quietly(&mut conn).await;
            Err(e)
        }
    }
}

async fn update_in_txn(
    conn: &mut DbConn,
    po_id: i32,
    request: &UpdatePurchaseOrderRequest,
    user_id: i32,
) -> AppResult<()> {
    let lookup_sql = r#"
        SELECT po_number, status, converted_to_grn
        FROM purchase_orders WITH (UPDLOCK, ROWLOCK)
        WHERE id = @P1 AND is_deleted = 0
    "#;
    let mut lookup = Query::new(lookup_sql);
    lookup.bind(po_id);

    let row = lookup
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::RecordNotFound(format!("Purchase order {}", po_id)))?;

    let po_number: String = row.get::<&str, _>(0).unwrap_or("").to_string();
    let status_raw: &str = row.get(1).unwrap_or("Order Placed");
    let current_status = PurchaseOrderStatus::parse(status_raw).ok_or_else(|| {
        AppError::DatabaseError(format!("Unknown purchase order status '{}'", status_raw))
    })?;
    let converted_to_grn: bool = row.get::<bool, _>(2).unwrap_or(false);

    // Map the requested change onto lifecycle actions and validate each.
    let mut attempted: Vec<PurchaseOrderAction> = Vec::new();

    if request.converted_to_grn == Some(true) && !converted_to_grn {
        attempted.push(PurchaseOrderAction::ConvertToGrn);
    }
    if let Some(new_status) = request.status.as_deref() {
        let new_status = PurchaseOrderStatus::parse(new_status).ok_or_else(|| {
            AppError::ValidationError(format!("Invalid purchase order status '{}'", new_status))
        })?;
        match new_status {
            PurchaseOrderStatus::OrderReceived => {
                attempted.push(PurchaseOrderAction::MarkReceived)
            }
            PurchaseOrderStatus::OrderCancelled => {
                attempted.push(PurchaseOrderAction::MarkCancelled)
            }
            PurchaseOrderStatus::OrderPlaced => {}
        }
    }
    if request.order_date.is_some() || request.notes.is_some() {
        attempted.push(PurchaseOrderAction::Edit);
    }

    for action in &attempted {
        if !purchase_order::validate_action(current_status, converted_to_grn, *action) {
            return Err(AppError::LifecycleViolation(
                purchase_order::lifecycle_error_message(current_status, converted_to_grn, *action),
            ));
        }
    }

    // Apply the changes that were requested.
    if let Some(new_status) = request.status.as_deref() {
        let mut query = Query::new(
            "UPDATE purchase_orders SET status = @P1, updated_by = @P2, updated_at = GETUTCDATE() WHERE id = @P3",
        );
        query.bind(new_status);
        query.bind(user_id);
        query.bind(po_id);
        query.execute(&mut *conn).await?;
    }
    if let Some(converted) = request.converted_to_grn {
        let mut query = Query::new(
            "UPDATE purchase_orders SET converted_to_grn = @P1, updated_by = @P2, updated_at = GETUTCDATE() WHERE id = @P3",
        );
        query.bind(converted);
        query.bind(user_id);
        query.bind(po_id);
        query.execute(&mut *conn).await?;
    }
    if let Some(order_date) = request.order_date {
        let mut query = Query::new(
            "UPDATE purchase_orders SET order_date = @P1, updated_by = @P2, updated_at = GETUTCDATE() WHERE id = @P3",
        );
        query.bind(order_date);
        query.bind(user_id);
        query.bind(po_id);
        query.execute(&mut *conn).await?;
    }
    if let Some(notes) = request.notes.as_deref() {
        let mut query = Query::new(
            "UPDATE purchase_orders SET notes = @P1, updated_by = @P2, updated_at = GETUTCDATE() WHERE id = @P3",
        );
        query.bind(notes);
        query.bind(user_id);
        query.bind(po_id);
        query.execute(&mut *conn).await?;
    }

    audit_service::log_audit_event(
        conn,
        "UPDATE",
        "PURCHASE_ORDER",
        po_id,
        user_id,
        serde_json::json!({
            "po_number": po_number,
            "status": request.status,
            "converted_to_grn": request.converted_to_grn,
        }),
    )
    .await?;

    Ok(())
}
