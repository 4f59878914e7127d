use crate::db::{self, DbConn, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::grn::{
    CreateGrnRequest, CreateGrnResponse, GoodsReceipt, GoodsReceiptItem, InboundLotResult,
};
use crate::services::audit_service;
use crate::services::document_number_service::{self, DocumentKind};
use crate::services::ledger_service;
use crate::services::lot_service::NewLot;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tiberius::Query;

/// Create a GRN with its items and materialize one inventory lot per item.
///
/// Header, items, lots and INBOUND transactions commit together or not at
/// all; there is no partial receipt. Exactly one audit entry is written for
/// the whole operation.
pub async fn create_grn(
    pool: &DbPool,
    request: &CreateGrnRequest,
    user_id: i32,
) -> AppResult<CreateGrnResponse> {
    let mut conn = pool.get().await?;

    db::begin_serializable(&mut conn).await?;

    let response = match create_grn_in_txn(&mut conn, request, user_id).await {
        Ok(response) => response,
        Err(e) => {
            db::rollback_quietly(&mut conn).await;
            return Err(e);
        }
    };

    db::commit(&mut conn).await?;

    tracing::info!(
        grn_id = response.id,
        grn_number = %response.grn_number,
        supplier_id = request.supplier_id,
        location_id = request.location_id,
        items = request.items.len(),
        "GRN created"
    );

    Ok(response)
}

async fn create_grn_in_txn(
    conn: &mut DbConn,
    request: &CreateGrnRequest,
    user_id: i32,
) -> AppResult<CreateGrnResponse> {
    let grn_number =
        document_number_service::mint(conn, DocumentKind::Grn, Utc::now().date_naive()).await?;

    // Insert GRN header
    let header_sql = r#"
        INSERT INTO goods_receipts (
            grn_number, supplier_id, location_id, receipt_date,
            created_at, updated_at, created_by, updated_by
        )
        OUTPUT INSERTED.id
        VALUES (@P1, @P2, @P3, @P4, GETUTCDATE(), GETUTCDATE(), @P5, @P5)
    "#;

    let mut header_query = Query::new(header_sql);
    header_query.bind(grn_number.as_str());
    header_query.bind(request.supplier_id);
    header_query.bind(request.location_id);
    header_query.bind(request.receipt_date);
    header_query.bind(user_id);

    let header_row = header_query
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::DatabaseError("GRN insert returned no id".to_string()))?;

    let grn_id: i32 = header_row
        .get(0)
        .ok_or_else(|| AppError::DatabaseError("GRN id column not found".to_string()))?;

    // Insert items and spawn one lot each
    let mut lots: Vec<InboundLotResult> = Vec::with_capacity(request.items.len());

    for item in &request.items {
        let item_sql = r#"
            INSERT INTO goods_receipt_items (
                grn_id, category_id, product_id, quantity_bags, weight_kg, remarks,
                created_at, created_by, updated_at, updated_by
            )
            OUTPUT INSERTED.id
            VALUES (@P1, @P2, @P3, @P4, @P5, @P6, GETUTCDATE(), @P7, GETUTCDATE(), @P7)
        "#;

        let remarks = item.remarks.clone().unwrap_or_default();
        let mut item_query = Query::new(item_sql);
        item_query.bind(grn_id);
        item_query.bind(item.category_id);
        item_query.bind(item.product_id);
        item_query.bind(item.quantity_bags);
        item_query.bind(crate::utils::decimal_to_numeric(item.weight_kg));
        item_query.bind(remarks.as_str());
        item_query.bind(user_id);

        let item_row = item_query
            .query(&mut *conn)
            .await?
            .into_row()
            .await?
            .ok_or_else(|| AppError::DatabaseError("GRN item insert returned no id".to_string()))?;

        let grn_item_id: i32 = item_row
            .get(0)
            .ok_or_else(|| AppError::DatabaseError("GRN item id column not found".to_string()))?;

        let lot = ledger_service::inbound_lot(
            conn,
            &NewLot {
                product_id: item.product_id,
                category_id: item.category_id,
                location_id: request.location_id,
                supplier_id: request.supplier_id,
                grn_item_id,
                quantity_kg: item.weight_kg,
            },
            item.quantity_bags,
            user_id,
        )
        .await?;

        lots.push(lot);
    }

    audit_service::log_audit_event(
        conn,
        "CREATE",
        "GRN",
        grn_id,
        user_id,
        serde_json::json!({
            "grn_number": grn_number,
            "supplier_id": request.supplier_id,
            "items_count": request.items.len(),
        }),
    )
    .await?;

    Ok(CreateGrnResponse {
        id: grn_id,
        grn_number,
        lots,
    })
}

/// All GRN headers, newest first.
pub async fn get_grns(pool: &DbPool) -> AppResult<Vec<GoodsReceipt>> {
    let mut conn = pool.get().await?;

    let sql = r#"
        SELECT gr.id, gr.grn_number, gr.supplier_id, s.name AS supplier_name,
               gr.location_id, l.name AS location_name, gr.receipt_date,
               gr.created_at, gr.created_by
        FROM goods_receipts gr
        LEFT JOIN suppliers s ON s.id = gr.supplier_id
        LEFT JOIN locations l ON l.id = gr.location_id
        ORDER BY gr.created_at DESC
    "#;

    let rows = Query::new(sql)
        .query(&mut *conn)
        .await?
        .into_first_result()
        .await?;

    let receipts = rows
        .iter()
        .map(|row| GoodsReceipt {
            id: row.get::<i32, _>(0).unwrap_or(0),
            grn_number: row.get::<&str, _>(1).unwrap_or("").to_string(),
            supplier_id: row.get::<i32, _>(2).unwrap_or(0),
            supplier_name: row.get::<&str, _>(3).map(|s| s.to_string()),
            location_id: row.get::<i32, _>(4).unwrap_or(0),
            location_name: row.get::<&str, _>(5).map(|s| s.to_string()),
            receipt_date: row
                .try_get::<NaiveDate, _>(6)
                .ok()
                .flatten()
                .unwrap_or_default(),
            created_at: row.try_get::<NaiveDateTime, _>(7).ok().flatten(),
            created_by: row.get::<i32, _>(8).unwrap_or(0),
        })
        .collect();

    Ok(receipts)
}

/// Items of one GRN, with the lots they spawned.
pub async fn get_grn_items(pool: &DbPool, grn_id: i32) -> AppResult<Vec<GoodsReceiptItem>> {
    let mut conn = pool.get().await?;

    let sql = r#"
        SELECT gri.id, gri.grn_id, gri.category_id, c.name AS category_name,
               gri.product_id, p.product_name, gri.quantity_bags, gri.weight_kg,
               gri.remarks, gri.inventory_lot_id
        FROM goods_receipt_items gri
        LEFT JOIN categories c ON c.id = gri.category_id
        LEFT JOIN products p ON p.id = gri.product_id
        WHERE gri.grn_id = @P1
        ORDER BY gri.id
    "#;

    let mut query = Query::new(sql);
    query.bind(grn_id);

    let rows = query.query(&mut *conn).await?.into_first_result().await?;

    let items = rows
        .iter()
        .map(|row| GoodsReceiptItem {
            id: row.get::<i32, _>(0).unwrap_or(0),
            grn_id: row.get::<i32, _>(1).unwrap_or(0),
            category_id: row.get::<i32, _>(2).unwrap_or(0),
            category_name: row.get::<&str, _>(3).map(|s| s.to_string()),
            product_id: row.get::<i32, _>(4).unwrap_or(0),
            product_name: row.get::<&str, _>(5).map(|s| s.to_string()),
            quantity_bags: row.get::<i32, _>(6).unwrap_or(0),
            weight_kg: row
                .try_get::<Decimal, _>(7)
                .ok()
                .flatten()
                .unwrap_or(Decimal::ZERO),
            remarks: row.get::<&str, _>(8).map(|s| s.to_string()),
            inventory_lot_id: row.get::<i32, _>(9),
        })
        .collect();

    Ok(items)
}

/// Delete a GRN and its items. The lots the items spawned stay behind; the
/// transaction log keeps the full history of where their stock came from.
pub async fn delete_grn(pool: &DbPool, grn_id: i32, user_id: i32) -> AppResult<String> {
    let mut conn = pool.get().await?;

    db::begin_serializable(&mut conn).await?;

    let grn_number = match delete_grn_in_txn(&mut conn, grn_id, user_id).await {
        Ok(number) => number,
        Err(e) => {
            db::rollback_quietly(&mut conn).await;
            return Err(e);
        }
    };

    db::commit(&mut conn).await?;

    tracing::info!(grn_id = grn_id, grn_number = %grn_number, "GRN deleted");

    Ok(grn_number)
}

async fn delete_grn_in_txn(conn: &mut DbConn, grn_id: i32, user_id: i32) -> AppResult<String> {
    let lookup_sql = "SELECT grn_number FROM goods_receipts WHERE id = @P1";
    let mut lookup = Query::new(lookup_sql);
    lookup.bind(grn_id);

    let row = lookup
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::RecordNotFound(format!("GRN {}", grn_id)))?;

    let grn_number: String = row.get::<&str, _>(0).unwrap_or("").to_string();

    let mut delete_items = Query::new("DELETE FROM goods_receipt_items WHERE grn_id = @P1");
    delete_items.bind(grn_id);
    delete_items.execute(&mut *conn).await?;

    let mut delete_header = Query::new("DELETE FROM goods_receipts WHERE id = @P1");
    delete_header.bind(grn_id);
    delete_header.execute(&mut *conn).await?;

    audit_service::log_audit_event(
        conn,
        "DELETE",
        "GRN",
        grn_id,
        user_id,
        serde_json::json!({ "grn_number": grn_number }),
    )
    .await?;

    Ok(grn_number)
}
