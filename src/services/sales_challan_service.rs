use crate::db::{self, DbConn, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::sales_challan::{
    ChallanItemInput, CreateChallanRequest, CreateChallanResponse, DispatchedLotSummary,
    SalesChallan, SalesChallanItem,
};
use crate::services::audit_service;
use crate::services::document_number_service::{self, DocumentKind};
use crate::services::ledger_service::{self, OutboundRequest};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tiberius::Query;

/// Create a standalone sales challan dispatching directly from available
/// stock at one location. Header, items and OUTBOUND transactions commit
/// together; an unsatisfiable line rolls back the whole challan.
pub async fn create_challan(
    pool: &DbPool,
    request: &CreateChallanRequest,
    user_id: i32,
) -> AppResult<CreateChallanResponse> {
    let mut conn = pool.get().await?;

    db::begin_serializable(&mut conn).await?;

    let response = match create_challan_in_txn(&mut conn, request, user_id).await {
        Ok(response) => response,
        Err(e) => {
            db::rollback_quietly(&mut conn).await;
            return Err(e);
        }
    };

    db::commit(&mut conn).await?;

    tracing::info!(
        sc_id = response.id,
        sc_number = %response.sc_number,
        customer_id = request.customer_id,
        location_id = request.location_id,
        items = request.items.len(),
        "Sales challan created"
    );

    Ok(response)
}

async fn create_challan_in_txn(
    conn: &mut DbConn,
    request: &CreateChallanRequest,
    user_id: i32,
) -> AppResult<CreateChallanResponse> {
    let (sc_id, sc_number) = insert_challan_header(
        conn,
        request.customer_id,
        request.challan_date,
        None,
        user_id,
    )
    .await?;

    let mut allocations: Vec<DispatchedLotSummary> = Vec::new();

    for item in &request.items {
        let product_name = product_name(conn, item.product_id).await?;
        let sc_item_id = insert_challan_item(conn, sc_id, item, user_id).await?;

        let records = ledger_service::dispatch_outbound(
            conn,
            &OutboundRequest {
                product_id: item.product_id,
                product_name,
                location_id: request.location_id,
                required: item.weight_kg,
                reference_type: "SALES_CHALLAN",
                reference_id: sc_item_id,
                description: format!("Sales dispatch - {} bags", item.quantity_bags),
            },
            user_id,
        )
        .await?;

        link_first_transaction(conn, sc_item_id, &records).await?;

        allocations.extend(records.into_iter().map(|record| DispatchedLotSummary {
            product_id: item.product_id,
            lot_id: record.allocation.lot_id,
            lot_number: record.allocation.lot_number,
            location_id: record.allocation.location_id,
            dispatched_quantity: record.allocation.allocated_quantity,
        }));
    }

    audit_service::log_audit_event(
        conn,
        "CREATE",
        "SALES_CHALLAN",
        sc_id,
        user_id,
        serde_json::json!({
            "sc_number": sc_number,
            "customer_id": request.customer_id,
            "items_count": request.items.len(),
        }),
    )
    .await?;

    Ok(CreateChallanResponse {
        id: sc_id,
        sc_number,
        allocations,
    })
}

/// Insert a challan header with a freshly minted number. Shared by the
/// standalone path and sales order conversion, which passes `source_so_id`.
pub async fn insert_challan_header(
    conn: &mut DbConn,
    customer_id: i32,
    challan_date: NaiveDate,
    source_so_id: Option<i32>,
    user_id: i32,
) -> AppResult<(i32, String)> {
    let sc_number =
        document_number_service::mint(conn, DocumentKind::SalesChallan, Utc::now().date_naive())
            .await?;

    let sql = r#"
        INSERT INTO sales_challans (
            sc_number, customer_id, challan_date, status, source_so_id,
            created_at, updated_at, created_by, updated_by
        )
        OUTPUT INSERTED.id
        VALUES (@P1, @P2, @P3, 'New', @P4, GETUTCDATE(), GETUTCDATE(), @P5, @P5)
    "#;

    let mut query = Query::new(sql);
    query.bind(sc_number.as_str());
    query.bind(customer_id);
    query.bind(challan_date);
    query.bind(source_so_id);
    query.bind(user_id);

    let row = query
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::DatabaseError("Challan insert returned no id".to_string()))?;

    let sc_id: i32 = row
        .get(0)
        .ok_or_else(|| AppError::DatabaseError("Challan id column not found".to_string()))?;

    Ok((sc_id, sc_number))
}

/// Insert one challan line. Shared with conversion.
pub async fn insert_challan_item(
    conn: &mut DbConn,
    sc_id: i32,
    item: &ChallanItemInput,
    user_id: i32,
) -> AppResult<i32> {
    let sql = r#"
        INSERT INTO sales_challan_items (
            sc_id, category_id, product_id, quantity_bags, weight_kg, remarks,
            created_at, created_by
        )
        OUTPUT INSERTED.id
        VALUES (@P1, @P2, @P3, @P4, @P5, @P6, GETUTCDATE(), @P7)
    "#;

    let remarks = item.remarks.clone().unwrap_or_default();
    let mut query = Query::new(sql);
    query.bind(sc_id);
    query.bind(item.category_id);
    query.bind(item.product_id);
    query.bind(item.quantity_bags);
    query.bind(crate::utils::decimal_to_numeric(item.weight_kg));
    query.bind(remarks.as_str());
    query.bind(user_id);

    let row = query
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::DatabaseError("Challan item insert returned no id".to_string()))?;

    row.get(0)
        .ok_or_else(|| AppError::DatabaseError("Challan item id column not found".to_string()))
}

/// Tie the line to the first OUTBOUND transaction that served it, so the
/// dispatch can be traced from the document side as well as the ledger side.
pub async fn link_first_transaction(
    conn: &mut DbConn,
    sc_item_id: i32,
    records: &[ledger_service::DispatchRecord],
) -> AppResult<()> {
    let Some(first) = records.first() else {
        return Ok(());
    };

    let sql = r#"
        UPDATE sales_challan_items
        SET inventory_transaction_id = @P1
        WHERE id = @P2
    "#;
    let mut query = Query::new(sql);
    query.bind(first.transaction_id);
    query.bind(sc_item_id);
    query.execute(&mut *conn).await?;

    Ok(())
}

pub async fn product_name(conn: &mut DbConn, product_id: i32) -> AppResult<Option<String>> {
    let mut query = Query::new("SELECT product_name FROM products WHERE id = @P1");
    query.bind(product_id);

    let row = query.query(&mut *conn).await?.into_row().await?;
    Ok(row.and_then(|row| row.get::<&str, _>(0).map(|s| s.to_string())))
}

/// First active location, used as the dispatch fallback when a conversion
/// finds no reserved location for a product.
pub async fn first_active_location(conn: &mut DbConn) -> AppResult<i32> {
    let sql = "SELECT TOP 1 id FROM locations WHERE is_active = 1 ORDER BY id";
    let row = Query::new(sql)
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::RecordNotFound("No active locations".to_string()))?;

    row.get(0)
        .ok_or_else(|| AppError::DatabaseError("Location id column not found".to_string()))
}

/// All challan headers, newest first.
pub async fn get_sales_challans(pool: &DbPool) -> AppResult<Vec<SalesChallan>> {
    let mut conn = pool.get().await?;

    let sql = r#"
        SELECT sc.id, sc.sc_number, sc.customer_id, c.name AS customer_name,
               sc.challan_date, sc.status, sc.source_so_id, sc.is_deleted,
               sc.notes, sc.created_at, sc.created_by
        FROM sales_challans sc
        LEFT JOIN customers c ON c.id = sc.customer_id
        WHERE sc.is_deleted = 0
        ORDER BY sc.created_at DESC
    "#;

    let rows = Query::new(sql)
        .query(&mut *conn)
        .await?
        .into_first_result()
        .await?;

    let mut challans = Vec::with_capacity(rows.len());
    for row in rows.iter() {
        let id: i32 = row.get::<i32, _>(0).unwrap_or(0);
        let total_items = count_challan_items(&mut conn, id).await?;

        challans.push(SalesChallan {
            id,
            sc_number: row.get::<&str, _>(1).unwrap_or("").to_string(),
            customer_id: row.get::<i32, _>(2).unwrap_or(0),
            customer_name: row.get::<&str, _>(3).map(|s| s.to_string()),
            challan_date: row
                .try_get::<NaiveDate, _>(4)
                .ok()
                .flatten()
                .unwrap_or_default(),
            status: row.get::<&str, _>(5).unwrap_or("New").to_string(),
            source_so_id: row.get::<i32, _>(6),
            is_deleted: row.get::<bool, _>(7).unwrap_or(false),
            total_items,
            notes: row.get::<&str, _>(8).map(|s| s.to_string()),
            created_at: row.try_get::<NaiveDateTime, _>(9).ok().flatten(),
            created_by: row.get::<i32, _>(10).unwrap_or(0),
        });
    }

    Ok(challans)
}

async fn count_challan_items(conn: &mut DbConn, sc_id: i32) -> AppResult<i32> {
    let mut query = Query::new("SELECT COUNT(*) FROM sales_challan_items WHERE sc_id = @P1");
    query.bind(sc_id);

    let row = query.query(&mut *conn).await?.into_row().await?;
    Ok(row.and_then(|row| row.get::<i32, _>(0)).unwrap_or(0))
}

/// Items of one challan.
pub async fn get_challan_items(pool: &DbPool, sc_id: i32) -> AppResult<Vec<SalesChallanItem>> {
    let mut conn = pool.get().await?;

    let sql = r#"
        SELECT sci.id, sci.sc_id, sci.category_id, sci.product_id, p.product_name,
               sci.quantity_bags, sci.weight_kg, sci.inventory_transaction_id, sci.remarks
        FROM sales_challan_items sci
        LEFT JOIN products p ON p.id = sci.product_id
        WHERE sci.sc_id = @P1
        ORDER BY sci.id
    "#;

    let mut query = Query::new(sql);
    query.bind(sc_id);

    let rows = query.query(&mut *conn).await?.into_first_result().await?;

    let items = rows
        .iter()
        .map(|row| SalesChallanItem {
            id: row.get::<i32, _>(0).unwrap_or(0),
            sc_id: row.get::<i32, _>(1).unwrap_or(0),
            category_id: row.get::<i32, _>(2).unwrap_or(0),
            product_id: row.get::<i32, _>(3).unwrap_or(0),
            product_name: row.get::<&str, _>(4).map(|s| s.to_string()),
            quantity_bags: row.get::<i32, _>(5).unwrap_or(0),
            weight_kg: row
                .try_get::<Decimal, _>(6)
                .ok()
                .flatten()
                .unwrap_or(Decimal::ZERO),
            inventory_transaction_id: row.get::<i32, _>(7),
            remarks: row.get::<&str, _>(8).map(|s| s.to_string()),
        })
        .collect();

    Ok(items)
}

/// Update a challan's display status. This never moves stock; the ledger
/// already recorded the dispatch when the challan was created.
pub async fn update_challan_status(
    pool: &DbPool,
    sc_id: i32,
    new_status: &str,
    user_id: i32,
) -> AppResult<String> {
    const VALID_STATUSES: [&str; 3] = ["New", "Delivered", "Cancelled"];
    if !VALID_STATUSES.contains(&new_status) {
        return Err(AppError::ValidationError(format!(
            "Invalid challan status '{}'",
            new_status
        )));
    }

    let mut conn = pool.get().await?;

    db::begin_serializable(&mut conn).await?;

    let result = async {
        let sql = r#"
            UPDATE sales_challans
            SET status = @P1, updated_by = @P2, updated_at = GETUTCDATE()
            OUTPUT INSERTED.sc_number
            WHERE id = @P3 AND is_deleted = 0
        "#;

        let mut query = Query::new(sql);
        query.bind(new_status);
        query.bind(user_id);
        query.bind(sc_id);

        let row = query
            .query(&mut *conn)
            .await?
            .into_row()
            .await?
            .ok_or_else(|| AppError::RecordNotFound(format!("Sales challan {}", sc_id)))?;

        let sc_number: String = row.get::<&str, _>(0).unwrap_or("").to_string();

        audit_service::log_audit_event(
            &mut conn,
            "UPDATE",
            "SALES_CHALLAN",
            sc_id,
            user_id,
            serde_json::json!({ "sc_number": sc_number, "status": new_status }),
        )
        .await?;

        Ok::<String, AppError>(sc_number)
    }
    .await;

    match result {
        Ok(sc_number) => {
            db::commit(&mut conn).await?;
            Ok(sc_number)
        }
        Err(e) => {
            db::rollback_quietly(&mut conn).await;
            Err(e)
        }
    }
}

/// Soft delete a challan. Dispatched stock is not returned; the challan
/// simply disappears from listings.
pub async fn delete_sales_challan(pool: &DbPool, sc_id: i32, user_id: i32) -> AppResult<()> {
    let mut conn = pool.get().await?;

    db::begin_serializable(&mut conn).await?;

    let result = async {
        let sql = r#"
            UPDATE sales_challans
            SET is_deleted = 1, updated_by = @P1, updated_at = GETUTCDATE()
            OUTPUT INSERTED.sc_number
            WHERE id = @P2 AND is_deleted = 0
        "#;

        let mut query = Query::new(sql);
        query.bind(user_id);
        query.bind(sc_id);

        let row = query
            .query(&mut *conn)
            .await?
            .into_row()
            .await?
            .ok_or_else(|| {
                AppError::RecordNotFound(format!("Sales challan {} (or already deleted)", sc_id))
            })?;

        let sc_number: String = row.get::<&str, _>(0).unwrap_or("").to_string();

        audit_service::log_audit_event(
            &mut conn,
            "DELETE",
            "SALES_CHALLAN",
            sc_id,
            user_id,
            serde_json::json!({ "sc_number": sc_number }),
        )
        .await?;

        Ok::<(), AppError>(())
    }
    .await;

    match result {
        Ok(()) => db::commit(&mut conn).await,
        Err(e) => {
            db::rollback_quietly(&mut conn).await;
            Err(e)
        }
    }
}
