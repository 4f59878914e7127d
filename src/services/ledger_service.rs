use crate::db::DbConn;
use crate::error::{AppError, AppResult, StockShortage};
use crate::models::grn::InboundLotResult;
use crate::models::sales_order::ReservedLotSummary;
use crate::models::transaction::{ReservationType, TransactionType};
use crate::services::allocation_service::{self, LotAllocation};
use crate::services::lot_service::{self, NewLot};
use crate::services::transaction_service::{self, NewTransaction};
use rust_decimal::Decimal;
use tiberius::Query;

// The five stock transitions, as primitives that run on the caller's
// connection inside the caller's transaction. The document services own
// BEGIN TRAN / COMMIT, audit emission and document rows; everything that
// moves quantity between states or across the system boundary lives here.

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Materialize a lot from a GRN item: create the lot with the full quantity
/// available, append the INBOUND transaction, link the lot back onto the
/// GRN item row. Never fails on stock grounds.
pub async fn inbound_lot(
    conn: &mut DbConn,
    new: &NewLot,
    quantity_bags: i32,
    user_id: i32,
) -> AppResult<InboundLotResult> {
    let (lot_id, lot_number) = lot_service::create_lot(conn, new, user_id).await?;

    transaction_service::record(
        conn,
        &NewTransaction {
            lot_id,
            transaction_type: TransactionType::Inbound,
            quantity: new.quantity_kg,
            weight_kg: new.quantity_kg,
            location_id: new.location_id,
            reference_type: Some("GRN"),
            reference_id: Some(new.grn_item_id),
            reservation_type: None,
            description: format!("Initial stock from GRN - {} bags", quantity_bags),
            balance_quantity: new.quantity_kg,
        },
        user_id,
    )
    .await?;

    let link_sql = r#"
        UPDATE goods_receipt_items
        SET inventory_lot_id = @P1
        WHERE id = @P2
    "#;
    let mut link_query = Query::new(link_sql);
    link_query.bind(lot_id);
    link_query.bind(new.grn_item_id);
    link_query.execute(&mut *conn).await?;

    Ok(InboundLotResult {
        lot_id,
        lot_number,
        available_quantity: new.quantity_kg,
    })
}

// ---------------------------------------------------------------------------
// Reserve
// ---------------------------------------------------------------------------

/// One line of demand to reserve against a sales order.
#[derive(Debug, Clone)]
pub struct ReserveLine {
    pub product_id: i32,
    pub product_name: Option<String>,
    pub required: Decimal,
}

#[derive(Debug, Clone)]
pub struct ReserveOutcome {
    pub total_reserved: Decimal,
    pub reservations: Vec<ReservedLotSummary>,
}

/// Move demand from available to committed across lots, FIFO per line.
///
/// Planning runs first for every line so a failure reports the complete
/// set of shortages; only when all lines are satisfiable are the deltas
/// applied. Any failure leaves the caller to roll the transaction back,
/// so either the whole order reserves or nothing does.
pub async fn reserve_for_sales_order(
    conn: &mut DbConn,
    so_id: i32,
    lines: &[ReserveLine],
    location_id: Option<i32>,
    user_id: i32,
) -> AppResult<ReserveOutcome> {
    // Plan every line before touching any counter.
    let mut plans: Vec<(&ReserveLine, Vec<LotAllocation>)> = Vec::with_capacity(lines.len());
    let mut shortages: Vec<StockShortage> = Vec::new();

    for line in lines {
        match allocation_service::allocate(conn, line.product_id, location_id, line.required)
            .await?
        {
            Ok(allocations) => plans.push((line, allocations)),
            Err(shortfall) => shortages.push(StockShortage {
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                available: shortfall.available,
                required: shortfall.required,
            }),
        }
    }

    if !shortages.is_empty() {
        return Err(AppError::InsufficientStock { shortages });
    }

    // Apply the plans lot by lot under row locks.
    let mut total_reserved = Decimal::ZERO;
    let mut reservations = Vec::new();

    for (line, allocations) in plans {
        for allocation in allocations {
            let lot = lot_service::lock_lot(conn, allocation.lot_id).await?;
            let quantity = allocation.allocated_quantity;

            let (available_after, _committed_after) =
                lot_service::apply_delta(conn, &lot, -quantity, quantity, user_id).await?;

            transaction_service::record(
                conn,
                &NewTransaction {
                    lot_id: lot.id,
                    transaction_type: TransactionType::Adjustment,
                    quantity,
                    weight_kg: quantity,
                    location_id: lot.location_id,
                    reference_type: Some("SALES_ORDER"),
                    reference_id: Some(so_id),
                    reservation_type: Some(ReservationType::Reserve),
                    description: format!("Stock reserved for sales order {}", so_id),
                    balance_quantity: available_after,
                },
                user_id,
            )
            .await?;

            total_reserved += quantity;
            reservations.push(ReservedLotSummary {
                product_id: line.product_id,
                lot_number: lot.lot_number,
                location_id: lot.location_id,
                reserved_quantity: quantity,
            });
        }
    }

    tracing::info!(
        so_id = so_id,
        total_reserved = %total_reserved,
        lots = reservations.len(),
        "Reserved stock for sales order"
    );

    Ok(ReserveOutcome {
        total_reserved,
        reservations,
    })
}

// ---------------------------------------------------------------------------
// Unreserve
// ---------------------------------------------------------------------------

/// Return every outstanding reserved slice of a sales order to available
/// stock. A second release finds nothing outstanding and returns zero.
pub async fn unreserve_for_sales_order(
    conn: &mut DbConn,
    so_id: i32,
    user_id: i32,
) -> AppResult<Decimal> {
    let outstanding = transaction_service::outstanding_reservations(conn, so_id).await?;

    let mut total_released = Decimal::ZERO;

    for reservation in outstanding {
        let lot = lot_service::lock_lot(conn, reservation.lot_id).await?;
        let quantity = reservation.quantity;

        let (available_after, _committed_after) =
            lot_service::apply_delta(conn, &lot, quantity, -quantity, user_id).await?;

        transaction_service::record(
            conn,
            &NewTransaction {
                lot_id: lot.id,
                transaction_type: TransactionType::Adjustment,
                quantity,
                weight_kg: quantity,
                location_id: lot.location_id,
                reference_type: Some("SALES_ORDER"),
                reference_id: Some(so_id),
                reservation_type: Some(ReservationType::Unreserve),
                description: format!("Stock released from sales order {}", so_id),
                balance_quantity: available_after,
            },
            user_id,
        )
        .await?;

        total_released += quantity;
    }

    tracing::info!(
        so_id = so_id,
        total_released = %total_released,
        "Released reserved stock for sales order"
    );

    Ok(total_released)
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// One line of demand to dispatch from available stock.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub product_id: i32,
    pub product_name: Option<String>,
    pub location_id: i32,
    pub required: Decimal,
    pub reference_type: &'static str,
    pub reference_id: i32,
    pub description: String,
}

/// A dispatched slice with the OUTBOUND transaction that recorded it.
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub allocation: LotAllocation,
    pub transaction_id: i32,
}

/// Deduct demand permanently from available stock at one location, FIFO.
pub async fn dispatch_outbound(
    conn: &mut DbConn,
    request: &OutboundRequest,
    user_id: i32,
) -> AppResult<Vec<DispatchRecord>> {
    let allocations = allocation_service::allocate(
        conn,
        request.product_id,
        Some(request.location_id),
        request.required,
    )
    .await?
    .map_err(|shortfall| AppError::InsufficientStock {
        shortages: vec![StockShortage {
            product_id: request.product_id,
            product_name: request.product_name.clone(),
            available: shortfall.available,
            required: shortfall.required,
        }],
    })?;

    let mut records = Vec::with_capacity(allocations.len());

    for allocation in allocations {
        let lot = lot_service::lock_lot(conn, allocation.lot_id).await?;
        let quantity = allocation.allocated_quantity;

        let (available_after, _committed_after) =
            lot_service::apply_delta(conn, &lot, -quantity, Decimal::ZERO, user_id).await?;

        let transaction_id = transaction_service::record(
            conn,
            &NewTransaction {
                lot_id: lot.id,
                transaction_type: TransactionType::Outbound,
                quantity,
                weight_kg: quantity,
                location_id: lot.location_id,
                reference_type: Some(request.reference_type),
                reference_id: Some(request.reference_id),
                reservation_type: None,
                description: request.description.clone(),
                balance_quantity: available_after,
            },
            user_id,
        )
        .await?;

        records.push(DispatchRecord {
            allocation,
            transaction_id,
        });
    }

    Ok(records)
}
