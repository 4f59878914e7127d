use crate::db::{self, DbConn, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::sales_challan::ChallanItemInput;
use crate::models::sales_order::{
    ConvertSalesOrderResponse, CreateSalesOrderRequest, CreateSalesOrderResponse, SalesOrder,
    SalesOrderItem, SalesOrderStatus, UpdateSalesOrderStatusResponse,
};
use crate::services::audit_service;
use crate::services::document_number_service::{self, DocumentKind};
use crate::services::ledger_service::{self, OutboundRequest, ReserveLine};
use crate::services::sales_challan_service;
use crate::services::transaction_service;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tiberius::Query;

/// Create a sales order and reserve stock for every line.
///
/// All lines reserve together or the whole order rolls back; the error for
/// an unsatisfiable order lists every failing product with its available
/// and required quantities.
pub async fn create_sales_order(
    pool: &DbPool,
    request: &CreateSalesOrderRequest,
    user_id: i32,
) -> AppResult<CreateSalesOrderResponse> {
    let mut conn = pool.get().await?;

    db::begin_serializable(&mut conn).await?;

    let response = match create_sales_order_in_txn(&mut conn, request, user_id).await {
        Ok(response) => response,
        Err(e) => {
            db::rollback_quietly(&mut conn).await;
            return Err(e);
        }
    };

    db::commit(&mut conn).await?;

    tracing::info!(
        so_id = response.id,
        so_number = %response.so_number,
        customer_id = request.customer_id,
        total_reserved = %response.total_reserved,
        "Sales order created with stock reservation"
    );

    Ok(response)
}

async fn create_sales_order_in_txn(
    conn: &mut DbConn,
    request: &CreateSalesOrderRequest,
    user_id: i32,
) -> AppResult<CreateSalesOrderResponse> {
    let so_number =
        document_number_service::mint(conn, DocumentKind::SalesOrder, Utc::now().date_naive())
            .await?;

    let header_sql = r#"
        INSERT INTO sales_orders (
            so_number, customer_id, order_date, status, total_items,
            created_at, updated_at, created_by, updated_by
        )
        OUTPUT INSERTED.id
        VALUES (@P1, @P2, @P3, 'New', @P4, GETUTCDATE(), GETUTCDATE(), @P5, @P5)
    "#;

    let mut header_query = Query::new(header_sql);
    header_query.bind(so_number.as_str());
    header_query.bind(request.customer_id);
    header_query.bind(request.order_date);
    header_query.bind(request.items.len() as i32);
    header_query.bind(user_id);

    let header_row = header_query
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::DatabaseError("Sales order insert returned no id".to_string()))?;

    let so_id: i32 = header_row
        .get(0)
        .ok_or_else(|| AppError::DatabaseError("Sales order id column not found".to_string()))?;

    // Insert line items
    for item in &request.items {
        let item_sql = r#"
            INSERT INTO sales_order_items (
                so_id, category_id, product_id, quantity_bags, weight_kg, remarks, created_at
            )
            VALUES (@P1, @P2, @P3, @P4, @P5, @P6, GETUTCDATE())
        "#;

        let remarks = item.remarks.clone().unwrap_or_default();
        let mut item_query = Query::new(item_sql);
        item_query.bind(so_id);
        item_query.bind(item.category_id);
        item_query.bind(item.product_id);
        item_query.bind(item.quantity_bags);
        item_query.bind(crate::utils::decimal_to_numeric(item.weight_kg));
        item_query.bind(remarks.as_str());
        item_query.execute(&mut *conn).await?;
    }

    // Reserve stock per line. Names ride along so a shortage reads well.
    let mut lines = Vec::with_capacity(request.items.len());
    for item in &request.items {
        let product_name = sales_challan_service::product_name(conn, item.product_id).await?;
        lines.push(ReserveLine {
            product_id: item.product_id,
            product_name,
            required: item.weight_kg,
        });
    }

    let outcome = ledger_service::reserve_for_sales_order(
        conn,
        so_id,
        &lines,
        request.location_id,
        user_id,
    )
    .await?;

    audit_service::log_audit_event(
        conn,
        "CREATE",
        "SALES_ORDER",
        so_id,
        user_id,
        serde_json::json!({
            "so_number": so_number,
            "customer_id": request.customer_id,
            "items_count": request.items.len(),
            "total_reserved": outcome.total_reserved,
        }),
    )
    .await?;

    Ok(CreateSalesOrderResponse {
        id: so_id,
        so_number,
        total_reserved: outcome.total_reserved,
        reservations: outcome.reservations,
    })
}

/// Sales order header row, read under its row lock for state transitions.
#[derive(Debug, Clone)]
struct LockedSalesOrder {
    id: i32,
    so_number: String,
    customer_id: i32,
    order_date: NaiveDate,
    status: SalesOrderStatus,
    converted_to_challan: bool,
}

async fn lock_sales_order(conn: &mut DbConn, so_id: i32) -> AppResult<LockedSalesOrder> {
    let sql = r#"
        SELECT id, so_number, customer_id, order_date, status, converted_to_challan
        FROM sales_orders WITH (UPDLOCK, ROWLOCK)
        WHERE id = @P1 AND is_deleted = 0
    "#;

    let mut query = Query::new(sql);
    query.bind(so_id);

    let row = query
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::RecordNotFound(format!("Sales order {}", so_id)))?;

    let status_raw: &str = row.get(4).unwrap_or("New");
    let status = SalesOrderStatus::parse(status_raw).ok_or_else(|| {
        AppError::DatabaseError(format!("Unknown sales order status '{}'", status_raw))
    })?;

    Ok(LockedSalesOrder {
        id: row.get::<i32, _>(0).unwrap_or(so_id),
        so_number: row.get::<&str, _>(1).unwrap_or("").to_string(),
        customer_id: row.get::<i32, _>(2).unwrap_or(0),
        order_date: row
            .try_get::<NaiveDate, _>(3)
            .ok()
            .flatten()
            .unwrap_or_default(),
        status,
        converted_to_challan: row.get::<bool, _>(5).unwrap_or(false),
    })
}

/// Update a sales order's status. Cancellation releases the reservation;
/// Delivered is unreachable here, only conversion delivers an order.
pub async fn update_sales_order_status(
    pool: &DbPool,
    so_id: i32,
    new_status: &str,
    user_id: i32,
) -> AppResult<UpdateSalesOrderStatusResponse> {
    let new_status = SalesOrderStatus::parse(new_status).ok_or_else(|| {
        AppError::ValidationError(format!("Invalid sales order status '{}'", new_status))
    })?;

    let mut conn = pool.get().await?;

    db::begin_serializable(&mut conn).await?;

    let response = match update_status_in_txn(&mut conn, so_id, new_status, user_id).await {
        Ok(response) => response,
        Err(e) => {
            db::rollback_quietly(&mut conn).await;
            return Err(e);
        }
    };

    db::commit(&mut conn).await?;

    tracing::info!(
        so_id = so_id,
        status = new_status.as_str(),
        released_quantity = %response.released_quantity,
        "Sales order status updated"
    );

    Ok(response)
}

async fn update_status_in_txn(
    conn: &mut DbConn,
    so_id: i32,
    new_status: SalesOrderStatus,
    user_id: i32,
) -> AppResult<UpdateSalesOrderStatusResponse> {
    let order = lock_sales_order(conn, so_id).await?;

    if new_status == SalesOrderStatus::Delivered {
        return Err(AppError::LifecycleViolation(format!(
            "Sales order {} can only be delivered by converting it to a challan",
            order.so_number
        )));
    }

    if !order.status.can_transition_to(new_status) {
        return Err(AppError::LifecycleViolation(format!(
            "Sales order {} cannot move from '{}' to '{}'",
            order.so_number,
            order.status.as_str(),
            new_status.as_str()
        )));
    }

    // New -> Cancelled: give the reserved stock back before flipping state.
    let released_quantity =
        ledger_service::unreserve_for_sales_order(conn, so_id, user_id).await?;

    let update_sql = r#"
        UPDATE sales_orders
        SET status = @P1, updated_by = @P2, updated_at = GETUTCDATE()
        WHERE id = @P3 AND is_deleted = 0
    "#;

    let mut update_query = Query::new(update_sql);
    update_query.bind(new_status.as_str());
    update_query.bind(user_id);
    update_query.bind(so_id);
    update_query.execute(&mut *conn).await?;

    audit_service::log_audit_event(
        conn,
        "UPDATE",
        "SALES_ORDER",
        so_id,
        user_id,
        serde_json::json!({
            "so_number": order.so_number,
            "from_status": order.status.as_str(),
            "to_status": new_status.as_str(),
            "released_quantity": released_quantity,
        }),
    )
    .await?;

    Ok(UpdateSalesOrderStatusResponse {
        id: so_id,
        status: new_status,
        released_quantity,
    })
}

/// Convert a sales order into a sales challan.
///
/// The reservation is released and the same lots are immediately dispatched
/// within one transaction, so nothing can claim the stock in between. The
/// dispatch location per product is the location of the first lot reserved
/// for it, which pins the consumption to the stock previously set aside.
pub async fn convert_to_challan(
    pool: &DbPool,
    so_id: i32,
    user_id: i32,
) -> AppResult<ConvertSalesOrderResponse> {
    let mut conn = pool.get().await?;

    db::begin_serializable(&mut conn).await?;

    let response = match convert_in_txn(&mut conn, so_id, user_id).await {
        Ok(response) => response,
        Err(e) => {
            db::rollback_quietly(&mut conn).await;
            return Err(e);
        }
    };

    db::commit(&mut conn).await?;

    tracing::info!(
        so_id = response.sales_order_id,
        so_number = %response.so_number,
        sc_id = response.sales_challan_id,
        sc_number = %response.sc_number,
        "Sales order converted to challan"
    );

    Ok(response)
}

async fn convert_in_txn(
    conn: &mut DbConn,
    so_id: i32,
    user_id: i32,
) -> AppResult<ConvertSalesOrderResponse> {
    let order = lock_sales_order(conn, so_id).await?;

    if order.status != SalesOrderStatus::New || order.converted_to_challan {
        return Err(AppError::LifecycleViolation(format!(
            "Sales order {} is not open for conversion (status '{}', converted: {})",
            order.so_number,
            order.status.as_str(),
            order.converted_to_challan
        )));
    }

    let items = sales_order_items_in_txn(conn, so_id).await?;
    if items.is_empty() {
        return Err(AppError::ValidationError(format!(
            "Sales order {} has no items to convert",
            order.so_number
        )));
    }

    // Release the committed stock; the RESERVE rows stay on the log and
    // still tell us where each product was set aside.
    let released_quantity =
        ledger_service::unreserve_for_sales_order(conn, so_id, user_id).await?;

    let (sc_id, sc_number) = sales_challan_service::insert_challan_header(
        conn,
        order.customer_id,
        order.order_date,
        Some(so_id),
        user_id,
    )
    .await?;

    for item in &items {
        let location_id =
            match transaction_service::reserved_location_for_product(conn, so_id, item.product_id)
                .await?
            {
                Some(location_id) => location_id,
                None => sales_challan_service::first_active_location(conn).await?,
            };

        let challan_item = ChallanItemInput {
            category_id: item.category_id,
            product_id: item.product_id,
            quantity_bags: item.quantity_bags,
            weight_kg: item.weight_kg,
            remarks: item.remarks.clone(),
        };
        let sc_item_id =
            sales_challan_service::insert_challan_item(conn, sc_id, &challan_item, user_id).await?;

        let records = ledger_service::dispatch_outbound(
            conn,
            &OutboundRequest {
                product_id: item.product_id,
                product_name: item.product_name.clone(),
                location_id,
                required: item.weight_kg,
                reference_type: "SALES_CHALLAN",
                reference_id: sc_item_id,
                description: format!("Sales dispatch - {} bags", item.quantity_bags),
            },
            user_id,
        )
        .await?;

        sales_challan_service::link_first_transaction(conn, sc_item_id, &records).await?;
    }

    // Flip the order into its terminal state.
    let flip_sql = r#"
        UPDATE sales_orders
        SET converted_to_challan = 1, status = 'Delivered',
            updated_by = @P1, updated_at = GETUTCDATE()
        WHERE id = @P2
    "#;
    let mut flip_query = Query::new(flip_sql);
    flip_query.bind(user_id);
    flip_query.bind(so_id);
    flip_query.execute(&mut *conn).await?;

    audit_service::log_audit_event(
        conn,
        "CONVERT",
        "SALES_ORDER",
        so_id,
        user_id,
        serde_json::json!({
            "so_number": order.so_number,
            "sc_number": sc_number,
            "released_quantity": released_quantity,
        }),
    )
    .await?;

    audit_service::log_audit_event(
        conn,
        "CREATE",
        "SALES_CHALLAN",
        sc_id,
        user_id,
        serde_json::json!({
            "sc_number": sc_number,
            "source_so_number": order.so_number,
        }),
    )
    .await?;

    Ok(ConvertSalesOrderResponse {
        sales_order_id: order.id,
        so_number: order.so_number,
        sales_challan_id: sc_id,
        sc_number,
    })
}

/// Soft delete a sales order, releasing anything still reserved so the
/// committed counters cannot leak stock for an order nobody can see.
pub async fn delete_sales_order(pool: &DbPool, so_id: i32, user_id: i32) -> AppResult<Decimal> {
    let mut conn = pool.get().await?;

    db::begin_serializable(&mut conn).await?;

    let released = match delete_in_txn(&mut conn, so_id, user_id).await {
        Ok(released) => released,
        Err(e) => {
            db::rollback_quietly(&mut conn).await;
            return Err(e);
        }
    };

    db::commit(&mut conn).await?;

    tracing::info!(so_id = so_id, released_quantity = %released, "Sales order deleted");

    Ok(released)
}

async fn delete_in_txn(conn: &mut DbConn, so_id: i32, user_id: i32) -> AppResult<Decimal> {
    let order = lock_sales_order(conn, so_id).await?;

    let released = if order.status == SalesOrderStatus::New {
        ledger_service::unreserve_for_sales_order(conn, so_id, user_id).await?
    } else {
        Decimal::ZERO
    };

    let sql = r#"
        UPDATE sales_orders
        SET is_deleted = 1, updated_by = @P1, updated_at = GETUTCDATE()
        WHERE id = @P2
    "#;
    let mut query = Query::new(sql);
    query.bind(user_id);
    query.bind(so_id);
    query.execute(&mut *conn).await?;

    audit_service::log_audit_event(
        conn,
        "DELETE",
        "SALES_ORDER",
        so_id,
        user_id,
        serde_json::json!({
            "so_number": order.so_number,
            "released_quantity": released,
        }),
    )
    .await?;

    Ok(released)
}

/// All order headers, newest first.
pub async fn get_sales_orders(pool: &DbPool) -> AppResult<Vec<SalesOrder>> {
    let mut conn = pool.get().await?;

    let sql = r#"
        SELECT so.id, so.so_number, so.customer_id, c.name AS customer_name,
               so.order_date, so.status, so.converted_to_challan, so.is_deleted,
               so.total_items, so.notes, so.created_at, so.created_by
        FROM sales_orders so
        LEFT JOIN customers c ON c.id = so.customer_id
        WHERE so.is_deleted = 0
        ORDER BY so.created_at DESC
    "#;

    let rows = Query::new(sql)
        .query(&mut *conn)
        .await?
        .into_first_result()
        .await?;

    let orders = rows
        .iter()
        .filter_map(|row| {
            let status_raw: &str = row.get(5).unwrap_or("New");
            let status = SalesOrderStatus::parse(status_raw)?;

            Some(SalesOrder {
                id: row.get::<i32, _>(0).unwrap_or(0),
                so_number: row.get::<&str, _>(1).unwrap_or("").to_string(),
                customer_id: row.get::<i32, _>(2).unwrap_or(0),
                customer_name: row.get::<&str, _>(3).map(|s| s.to_string()),
                order_date: row
                    .try_get::<NaiveDate, _>(4)
                    .ok()
                    .flatten()
                    .unwrap_or_default(),
                status,
                converted_to_challan: row.get::<bool, _>(6).unwrap_or(false),
                is_deleted: row.get::<bool, _>(7).unwrap_or(false),
                total_items: row.get::<i32, _>(8).unwrap_or(0),
                notes: row.get::<&str, _>(9).map(|s| s.to_string()),
                created_at: row.try_get::<NaiveDateTime, _>(10).ok().flatten(),
                created_by: row.get::<i32, _>(11).unwrap_or(0),
            })
        })
        .collect();

    Ok(orders)
}

/// Items of one order.
pub async fn get_sales_order_items(pool: &DbPool, so_id: i32) -> AppResult<Vec<SalesOrderItem>> {
    let mut conn = pool.get().await?;
    sales_order_items_in_txn(&mut conn, so_id).await
}

async fn sales_order_items_in_txn(
    conn: &mut DbConn,
    so_id: i32,
) -> AppResult<Vec<SalesOrderItem>> {
    let sql = r#"
        SELECT soi.id, soi.so_id, soi.category_id, soi.product_id, p.product_name,
               soi.quantity_bags, soi.weight_kg, soi.remarks
        FROM sales_order_items soi
        LEFT JOIN products p ON p.id = soi.product_id
        WHERE soi.so_id = @P1
        ORDER BY soi.id
    "#;

    let mut query = Query::new(sql);
    query.bind(so_id);

    let rows = query.query(&mut *conn).await?.into_first_result().await?;

    let items = rows
        .iter()
        .map(|row| SalesOrderItem {
            id: row.get::<i32, _>(0).unwrap_or(0),
            so_id: row.get::<i32, _>(1).unwrap_or(0),
            category_id: row.get::<i32, _>(2).unwrap_or(0),
            product_id: row.get::<i32, _>(3).unwrap_or(0),
            product_name: row.get::<&str, _>(4).map(|s| s.to_string()),
            quantity_bags: row.get::<i32, _>(5).unwrap_or(0),
            weight_kg: row
                .try_get::<Decimal, _>(6)
                .ok()
                .flatten()
                .unwrap_or(Decimal::ZERO),
            remarks: row.get::<&str, _>(7).map(|s| s.to_string()),
        })
        .collect();

    Ok(items)
}
