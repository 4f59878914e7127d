use crate::db::{DbConn, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::transaction::{InventoryTransaction, ReservationType, TransactionType};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tiberius::Query;

/// One entry to append to the transaction log.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub lot_id: i32,
    pub transaction_type: TransactionType,
    pub quantity: Decimal,
    pub weight_kg: Decimal,
    pub location_id: i32,
    pub reference_type: Option<&'static str>,
    pub reference_id: Option<i32>,
    pub reservation_type: Option<ReservationType>,
    pub description: String,
    /// Lot's available quantity immediately after this movement
    pub balance_quantity: Decimal,
}

/// Append one transaction to the log.
///
/// The log is append-only; nothing ever updates or deletes a row here. The
/// recorded balance makes the log self-verifying: replaying INBOUND and
/// OUTBOUND deltas, with RESERVE/UNRESERVE applied as their signed effect
/// on available, reproduces the lot's current state.
pub async fn record(conn: &mut DbConn, txn: &NewTransaction, user_id: i32) -> AppResult<i32> {
    let sql = r#"
        INSERT INTO inventory_transactions (
            lot_id, transaction_type, transaction_date, quantity, weight_kg,
            location_id, reference_type, reference_id, reservation_type,
            description, balance_quantity, created_by, created_at
        )
        OUTPUT INSERTED.id
        VALUES (@P1, @P2, GETUTCDATE(), @P3, @P4, @P5, @P6, @P7, @P8, @P9, @P10, @P11, GETUTCDATE())
    "#;

    let mut query = Query::new(sql);
    query.bind(txn.lot_id);
    query.bind(txn.transaction_type.as_str());
    query.bind(crate::utils::decimal_to_numeric(txn.quantity));
    query.bind(crate::utils::decimal_to_numeric(txn.weight_kg));
    query.bind(txn.location_id);
    query.bind(txn.reference_type);
    query.bind(txn.reference_id);
    query.bind(txn.reservation_type.map(|r| r.as_str()));
    query.bind(txn.description.as_str());
    query.bind(crate::utils::decimal_to_numeric(txn.balance_quantity));
    query.bind(user_id);

    let row = query
        .query(&mut *conn)
        .await?
        .into_row()
        .await?
        .ok_or_else(|| AppError::DatabaseError("Transaction insert returned no id".to_string()))?;

    let transaction_id: i32 = row
        .get(0)
        .ok_or_else(|| AppError::DatabaseError("Transaction id column not found".to_string()))?;

    tracing::debug!(
        transaction_id = transaction_id,
        lot_id = txn.lot_id,
        transaction_type = txn.transaction_type.as_str(),
        reservation_type = ?txn.reservation_type.map(|r| r.as_str()),
        quantity = %txn.quantity,
        balance_quantity = %txn.balance_quantity,
        "Recorded inventory transaction"
    );

    Ok(transaction_id)
}

/// A reservation slice still held for a sales order: the RESERVE quantity
/// on a lot minus any later UNRESERVE against the same order.
#[derive(Debug, Clone)]
pub struct OutstandingReservation {
    pub lot_id: i32,
    pub location_id: i32,
    pub quantity: Decimal,
}

/// Net per-lot reservations for a sales order that have not been offset by
/// a release. An order that was never reserved, or already fully released,
/// yields an empty list, which is what makes a repeated release a no-op.
pub async fn outstanding_reservations(
    conn: &mut DbConn,
    so_id: i32,
) -> AppResult<Vec<OutstandingReservation>> {
    let sql = r#"
        SELECT t.lot_id, il.location_id,
               SUM(CASE WHEN t.reservation_type = 'RESERVE'
                        THEN t.quantity ELSE -t.quantity END) AS net_reserved
        FROM inventory_transactions t
        JOIN inventory_lots il ON il.id = t.lot_id
        WHERE t.reference_type = 'SALES_ORDER'
          AND t.reference_id = @P1
          AND t.transaction_type = 'ADJUSTMENT'
          AND t.reservation_type IN ('RESERVE', 'UNRESERVE')
        GROUP BY t.lot_id, il.location_id
        HAVING SUM(CASE WHEN t.reservation_type = 'RESERVE'
                        THEN t.quantity ELSE -t.quantity END) > 0
        ORDER BY t.lot_id ASC
    "#;

    let mut query = Query::new(sql);
    query.bind(so_id);

    let rows = query.query(&mut *conn).await?.into_first_result().await?;

    let reservations = rows
        .iter()
        .map(|row| OutstandingReservation {
            lot_id: row.get::<i32, _>(0).unwrap_or(0),
            location_id: row.get::<i32, _>(1).unwrap_or(0),
            quantity: row
                .try_get::<Decimal, _>(2)
                .ok()
                .flatten()
                .unwrap_or(Decimal::ZERO),
        })
        .collect();

    Ok(reservations)
}

/// The full log for one lot, oldest first. Replaying these entries in
/// order reproduces the lot's available quantity; each row's
/// balance_quantity is the checkpoint after that movement.
pub async fn transactions_for_lot(
    pool: &DbPool,
    lot_id: i32,
) -> AppResult<Vec<InventoryTransaction>> {
    let mut conn = pool.get().await?;

    let sql = r#"
        SELECT id, lot_id, transaction_type, transaction_date, quantity, weight_kg,
               location_id, reference_type, reference_id, reservation_type,
               description, balance_quantity, created_by, created_at
        FROM inventory_transactions
        WHERE lot_id = @P1
        ORDER BY created_at ASC, id ASC
    "#;

    let mut query = Query::new(sql);
    query.bind(lot_id);

    let rows = query.query(&mut *conn).await?.into_first_result().await?;

    let transactions = rows
        .iter()
        .filter_map(|row| {
            let type_raw: &str = row.get(2).unwrap_or("");
            let transaction_type = TransactionType::parse(type_raw)?;
            let reservation_type = row
                .get::<&str, _>(9)
                .and_then(ReservationType::parse);

            Some(InventoryTransaction {
                id: row.get::<i32, _>(0).unwrap_or(0),
                lot_id: row.get::<i32, _>(1).unwrap_or(0),
                transaction_type,
                transaction_date: row.try_get::<NaiveDateTime, _>(3).ok().flatten(),
                quantity: row
                    .try_get::<Decimal, _>(4)
                    .ok()
                    .flatten()
                    .unwrap_or(Decimal::ZERO),
                weight_kg: row
                    .try_get::<Decimal, _>(5)
                    .ok()
                    .flatten()
                    .unwrap_or(Decimal::ZERO),
                location_id: row.get::<i32, _>(6).unwrap_or(0),
                reference_type: row.get::<&str, _>(7).map(|s| s.to_string()),
                reference_id: row.get::<i32, _>(8),
                reservation_type,
                description: row.get::<&str, _>(10).map(|s| s.to_string()),
                balance_quantity: row
                    .try_get::<Decimal, _>(11)
                    .ok()
                    .flatten()
                    .unwrap_or(Decimal::ZERO),
                created_by: row.get::<i32, _>(12).unwrap_or(0),
                created_at: row.try_get::<NaiveDateTime, _>(13).ok().flatten(),
            })
        })
        .collect();

    Ok(transactions)
}

/// Location of the first lot reserved for a product under a sales order.
/// Conversion dispatches each product from here, which guarantees the stock
/// consumed is the stock previously set aside.
pub async fn reserved_location_for_product(
    conn: &mut DbConn,
    so_id: i32,
    product_id: i32,
) -> AppResult<Option<i32>> {
    let sql = r#"
        SELECT TOP 1 il.location_id
        FROM inventory_transactions t
        JOIN inventory_lots il ON il.id = t.lot_id
        WHERE t.reference_type = 'SALES_ORDER'
          AND t.reference_id = @P1
          AND t.reservation_type = 'RESERVE'
          AND il.product_id = @P2
        ORDER BY t.id ASC
    "#;

    let mut query = Query::new(sql);
    query.bind(so_id);
    query.bind(product_id);

    let row = query.query(&mut *conn).await?.into_row().await?;

    Ok(row.and_then(|row| row.get::<i32, _>(0)))
}
