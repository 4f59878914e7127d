use crate::db::DbConn;
use crate::error::{AppError, AppResult, StockShortage};
use crate::models::lot::LockedLot;
use crate::services::document_number_service::{self, DocumentKind};
use crate::utils::decimal_to_numeric;
use chrono::Utc;
use rust_decimal::Decimal;
use tiberius::Query;

/// Fields needed to materialize a lot from a GRN item.
#[derive(Debug, Clone)]
pub struct NewLot {
    pub product_id: i32,
    pub category_id: i32,
    pub location_id: i32,
    pub supplier_id: i32,
    pub grn_item_id: i32,
    pub quantity_kg: Decimal,
}

/// Insert a new lot with the full inbound quantity available and nothing
/// committed. The lot number is minted on the caller's connection so it
/// participates in the caller's transaction.
///
/// # Returns
/// * `Ok((lot_id, lot_number))` on success
pub async fn create_lot(conn: &mut DbConn, new: &NewLot, user_id: i32) -> AppResult<(i32, String)> {
    let lot_number =
        document_number_service::mint(conn, DocumentKind::Lot, Utc::now().date_naive()).await?;

    let sql = r#"
        INSERT INTO inventory_lots (
            lot_number, product_id, category_id, location_id, supplier_id,
            grn_item_id, available_quantity, committed_quantity,
            created_at, updated_at, created_by, updated_by
        )
        OUTPUT INSERTED.id
        VALUES (@P1, @P2, @P3, @P4, @P5, @P6, @P7, 0, GETUTCDATE(), GETUTCDATE(), @P8, @P8)
    "#;

    let mut query = Query::new(sql);
    query.bind(lot_number.as_str());
    query.bind(new.product_id);
    query.bind(new.category_id);
    query.bind(new.location_id);
    query.bind(new.supplier_id);
    query.bind(new.grn_item_id);
    query.bind(decimal_to_numeric(new.quantity_kg));
    query.bind(user_id);

    let row = query
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::DatabaseError("Lot insert returned no id".to_string()))?;

    let lot_id: i32 = row
        .get(0)
        .ok_or_else(|| AppError::DatabaseError("Lot id column not found".to_string()))?;

    tracing::info!(
        lot_id = lot_id,
        lot_number = %lot_number,
        product_id = new.product_id,
        location_id = new.location_id,
        quantity_kg = %new.quantity_kg,
        "Created inventory lot"
    );

    Ok((lot_id, lot_number))
}

/// Read a lot under its row lock. The lock is held until the enclosing
/// transaction commits or rolls back; every quantity mutation goes through
/// this read first.
pub async fn lock_lot(conn: &mut DbConn, lot_id: i32) -> AppResult<LockedLot> {
    let sql = r#"
        SELECT id, lot_number, product_id, location_id,
               available_quantity, committed_quantity
        FROM inventory_lots WITH (UPDLOCK, ROWLOCK)
        WHERE id = @P1
    "#;

    let mut query = Query::new(sql);
    query.bind(lot_id);

    let row = query
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::RecordNotFound(format!("Inventory lot {}", lot_id)))?;

    Ok(LockedLot {
        id: row.get::<i32, _>(0).unwrap_or(lot_id),
        lot_number: row.get::<&str, _>(1).unwrap_or("").to_string(),
        product_id: row.get::<i32, _>(2).unwrap_or(0),
        location_id: row.get::<i32, _>(3).unwrap_or(0),
        available_quantity: row
            .try_get::<Decimal, _>(4)
            .ok()
            .flatten()
            .unwrap_or(Decimal::ZERO),
        committed_quantity: row
            .try_get::<Decimal, _>(5)
            .ok()
            .flatten()
            .unwrap_or(Decimal::ZERO),
    })
}

/// Apply a `(Δavailable, Δcommitted)` pair to a locked lot.
///
/// The predicate repeats the non-negativity check inside the UPDATE, so a
/// lost update (another writer slipping between our read and write) is
/// detected at write time and surfaces as insufficient stock instead of a
/// silently negative counter.
///
/// # Returns
/// * `Ok((available, committed))` - the counters after the delta
pub async fn apply_delta(
    conn: &mut DbConn,
    lot: &LockedLot,
    delta_available: Decimal,
    delta_committed: Decimal,
    user_id: i32,
) -> AppResult<(Decimal, Decimal)> {
    let sql = r#"
        UPDATE inventory_lots
        SET available_quantity = available_quantity + @P2,
            committed_quantity = committed_quantity + @P3,
            updated_at = GETUTCDATE(),
            updated_by = @P4
        OUTPUT INSERTED.available_quantity, INSERTED.committed_quantity
        WHERE id = @P1
          AND available_quantity + @P2 >= 0
          AND committed_quantity + @P3 >= 0
    "#;

    let mut query = Query::new(sql);
    query.bind(lot.id);
    query.bind(decimal_to_numeric(delta_available));
    query.bind(decimal_to_numeric(delta_committed));
    query.bind(user_id);

    let row = query.query(&mut *conn).await?.into_row().await?;

    match row {
        Some(row) => {
            let available = row
                .try_get::<Decimal, _>(0)
                .ok()
                .flatten()
                .unwrap_or(Decimal::ZERO);
            let committed = row
                .try_get::<Decimal, _>(1)
                .ok()
                .flatten()
                .unwrap_or(Decimal::ZERO);
            Ok((available, committed))
        }
        None => {
            // Predicate rejected the delta: one of the counters would have
            // gone negative.
            let (available, required) = if delta_available < Decimal::ZERO {
                (lot.available_quantity, -delta_available)
            } else {
                (lot.committed_quantity, -delta_committed)
            };

            tracing::warn!(
                lot_id = lot.id,
                lot_number = %lot.lot_number,
                available = %available,
                required = %required,
                "Quantity delta rejected by non-negativity predicate"
            );

            Err(AppError::InsufficientStock {
                shortages: vec![StockShortage {
                    product_id: lot.product_id,
                    product_name: None,
                    available,
                    required,
                }],
            })
        }
    }
}
