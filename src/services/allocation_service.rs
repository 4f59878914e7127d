use crate::db::DbConn;
use crate::error::AppResult;
use rust_decimal::Decimal;
use tiberius::Query;

/// A lot eligible for allocation, as read inside the caller's transaction.
#[derive(Debug, Clone)]
pub struct LotStock {
    pub lot_id: i32,
    pub lot_number: String,
    pub location_id: i32,
    pub available_quantity: Decimal,
}

/// One planned slice of an allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct LotAllocation {
    pub lot_id: i32,
    pub lot_number: String,
    pub allocated_quantity: Decimal,
    pub location_id: i32,
}

/// Demand that could not be met. `available` is the total across all
/// eligible lots, so "no stock at all" (zero) reads differently from
/// "not enough stock".
#[derive(Debug, Clone, PartialEq)]
pub struct Shortfall {
    pub available: Decimal,
    pub required: Decimal,
}

/// Plan a FIFO allocation over `lots`, which must already be ordered oldest
/// first (created_at ASC, id ASC). Greedy walk: each lot contributes
/// min(remaining, lot.available) until the demand is covered.
pub fn plan_fifo(lots: &[LotStock], required: Decimal) -> Result<Vec<LotAllocation>, Shortfall> {
    let total_available: Decimal = lots.iter().map(|lot| lot.available_quantity).sum();

    if total_available < required {
        return Err(Shortfall {
            available: total_available,
            required,
        });
    }

    let mut allocations = Vec::new();
    let mut remaining = required;

    for lot in lots {
        if remaining <= Decimal::ZERO {
            break;
        }

        let take = remaining.min(lot.available_quantity);
        if take <= Decimal::ZERO {
            continue;
        }

        allocations.push(LotAllocation {
            lot_id: lot.lot_id,
            lot_number: lot.lot_number.clone(),
            allocated_quantity: take,
            location_id: lot.location_id,
        });
        remaining -= take;
    }

    Ok(allocations)
}

/// Fetch the lots eligible to satisfy demand for a product, FIFO-ordered.
///
/// Two variants behind one query: location-bound (dispatches, and reserves
/// that name a location) restricts to that location; any-location (reserves
/// without one) spans the whole stock and the resulting location set becomes
/// the order's reserved footprint.
pub async fn eligible_lots(
    conn: &mut DbConn,
    product_id: i32,
    location_id: Option<i32>,
) -> AppResult<Vec<LotStock>> {
    let rows = match location_id {
        Some(location_id) => {
            let sql = r#"
                SELECT id, lot_number, location_id, available_quantity
                FROM inventory_lots
                WHERE product_id = @P1
                  AND location_id = @P2
                  AND available_quantity > 0
                ORDER BY created_at ASC, id ASC
            "#;
            let mut query = Query::new(sql);
            query.bind(product_id);
            query.bind(location_id);
            query.query(&mut *conn).await?.into_first_result().await?
        }
        None => {
            let sql = r#"
                SELECT il.id, il.lot_number, il.location_id, il.available_quantity
                FROM inventory_lots il
                JOIN locations l ON l.id = il.location_id
                WHERE il.product_id = @P1
                  AND il.available_quantity > 0
                  AND l.is_active = 1
                ORDER BY il.created_at ASC, il.id ASC
            "#;
            let mut query = Query::new(sql);
            query.bind(product_id);
            query.query(&mut *conn).await?.into_first_result().await?
        }
    };

    let lots = rows
        .iter()
        .map(|row| LotStock {
            lot_id: row.get::<i32, _>(0).unwrap_or(0),
            lot_number: row.get::<&str, _>(1).unwrap_or("").to_string(),
            location_id: row.get::<i32, _>(2).unwrap_or(0),
            available_quantity: row
                .try_get::<Decimal, _>(3)
                .ok()
                .flatten()
                .unwrap_or(Decimal::ZERO),
        })
        .collect();

    Ok(lots)
}

/// Query eligible lots and plan against them in one step.
pub async fn allocate(
    conn: &mut DbConn,
    product_id: i32,
    location_id: Option<i32>,
    required: Decimal,
) -> AppResult<Result<Vec<LotAllocation>, Shortfall>> {
    let lots = eligible_lots(conn, product_id, location_id).await?;
    Ok(plan_fifo(&lots, required))
}
