// Unit tests for the FIFO allocation algorithm.
//
// Tests verify:
// 1. Lots are consumed oldest first (created_at ASC, id ASC)
// 2. Demand spills across lots greedily
// 3. Insufficient totals report available vs required
// 4. Location-bound and any-location variants filter correctly

use rust_decimal::Decimal;
use std::str::FromStr;

/// Mock inventory lot for exercising the allocation algorithm
#[derive(Debug, Clone, PartialEq)]
struct InventoryLotRecord {
    id: i32,
    lot_number: String,
    product_id: i32,
    location_id: i32,
    /// Stand-in for created_at; smaller is older
    created_seq: u32,
    available_quantity: Decimal,
}

/// One planned slice of an allocation
#[derive(Debug, Clone, PartialEq)]
struct PlannedAllocation {
    lot_id: i32,
    lot_number: String,
    allocated_quantity: Decimal,
    location_id: i32,
}

/// FIFO ordering matching the production query:
/// ORDER BY created_at ASC, id ASC
fn apply_fifo_sort(mut lots: Vec<InventoryLotRecord>) -> Vec<InventoryLotRecord> {
    lots.sort_by(|a, b| match a.created_seq.cmp(&b.created_seq) {
        std::cmp::Ordering::Equal => a.id.cmp(&b.id),
        other => other,
    });
    lots
}

/// Eligibility filter matching the production WHERE clause
fn filter_eligible_lots(
    lots: Vec<InventoryLotRecord>,
    product_id: i32,
    location_id: Option<i32>,
) -> Vec<InventoryLotRecord> {
    lots.into_iter()
        .filter(|lot| {
            lot.product_id == product_id
                && lot.available_quantity > Decimal::ZERO
                && location_id.map_or(true, |location| lot.location_id == location)
        })
        .collect()
}

/// Greedy FIFO walk matching the production planner
fn plan_fifo(
    lots: &[InventoryLotRecord],
    required: Decimal,
) -> Result<Vec<PlannedAllocation>, (Decimal, Decimal)> {
    let total_available: Decimal = lots.iter().map(|lot| lot.available_quantity).sum();
    if total_available < required {
        return Err((total_available, required));
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
        allocations.push(PlannedAllocation {
            lot_id: lot.id,
            lot_number: lot.lot_number.clone(),
            allocated_quantity: take,
            location_id: lot.location_id,
        });
        remaining -= take;
    }

    Ok(allocations)
}

fn lot(
    id: i32,
    lot_number: &str,
    product_id: i32,
    location_id: i32,
    created_seq: u32,
    available: &str,
) -> InventoryLotRecord {
    InventoryLotRecord {
        id,
        lot_number: lot_number.to_string(),
        product_id,
        location_id,
        created_seq,
        available_quantity: Decimal::from_str(available).unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: lots are consumed in creation order, not insertion order
    #[test]
    fn test_fifo_sort_by_creation_ascending() {
        // Arrange: three lots received out of order
        let lots = vec![
            lot(3, "LOT/2025/07/22/1", 9, 1, 30, "100.0"),
            lot(1, "LOT/2025/07/20/1", 9, 1, 10, "100.0"),
            lot(2, "LOT/2025/07/21/1", 9, 1, 20, "100.0"),
        ];

        // Act
        let sorted = apply_fifo_sort(lots);

        // Assert: oldest first
        assert_eq!(sorted[0].lot_number, "LOT/2025/07/20/1");
        assert_eq!(sorted[1].lot_number, "LOT/2025/07/21/1");
        assert_eq!(sorted[2].lot_number, "LOT/2025/07/22/1");
    }

    /// Test: creation-time ties break by ascending lot id
    #[test]
    fn test_fifo_ties_break_by_lot_id() {
        // Arrange: two lots received in the same instant
        let lots = vec![
            lot(12, "LOT/2025/07/20/2", 9, 1, 10, "50.0"),
            lot(11, "LOT/2025/07/20/1", 9, 1, 10, "50.0"),
        ];

        // Act
        let sorted = apply_fifo_sort(lots);

        // Assert
        assert_eq!(sorted[0].id, 11);
        assert_eq!(sorted[1].id, 12);
    }

    /// Test: scenario from production data - 150 kg over two 100 kg lots
    #[test]
    fn test_demand_spills_into_next_lot() {
        // Arrange: lot A (2025-07-20, 100 kg), lot B (2025-07-21, 100 kg)
        let lots = apply_fifo_sort(vec![
            lot(1, "LOT/2025/07/20/1", 9, 1, 10, "100.0"),
            lot(2, "LOT/2025/07/21/1", 9, 1, 20, "100.0"),
        ]);

        // Act: reserve 150 kg
        let plan = plan_fifo(&lots, Decimal::from_str("150.0").unwrap()).unwrap();

        // Assert: [A:100, B:50]
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].lot_number, "LOT/2025/07/20/1");
        assert_eq!(plan[0].allocated_quantity, Decimal::from_str("100.0").unwrap());
        assert_eq!(plan[1].lot_number, "LOT/2025/07/21/1");
        assert_eq!(plan[1].allocated_quantity, Decimal::from_str("50.0").unwrap());
    }

    /// Test: demand equal to one lot's stock never touches the next lot
    #[test]
    fn test_exact_demand_stays_in_oldest_lot() {
        let lots = apply_fifo_sort(vec![
            lot(1, "LOT/2025/07/20/1", 9, 1, 10, "100.0"),
            lot(2, "LOT/2025/07/21/1", 9, 1, 20, "100.0"),
        ]);

        let plan = plan_fifo(&lots, Decimal::from_str("100.0").unwrap()).unwrap();

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].lot_id, 1);
    }

    /// Test: shortfall carries the exact available/required pair
    #[test]
    fn test_insufficient_stock_reports_totals() {
        // Arrange: 200 kg on hand in total
        let lots = apply_fifo_sort(vec![
            lot(1, "LOT/2025/07/20/1", 7, 1, 10, "120.0"),
            lot(2, "LOT/2025/07/21/1", 7, 2, 20, "80.0"),
        ]);

        // Act: demand 300 kg
        let err = plan_fifo(&lots, Decimal::from_str("300.0").unwrap()).unwrap_err();

        // Assert
        assert_eq!(err.0, Decimal::from_str("200.0").unwrap());
        assert_eq!(err.1, Decimal::from_str("300.0").unwrap());
    }

    /// Test: no eligible lots reads as zero available, distinct from
    /// "some but not enough"
    #[test]
    fn test_no_stock_reports_zero_available() {
        let err = plan_fifo(&[], Decimal::from_str("10.0").unwrap()).unwrap_err();
        assert_eq!(err.0, Decimal::ZERO);
    }

    /// Test: location-bound variant only sees lots at that location
    #[test]
    fn test_location_bound_filter() {
        // Arrange: stock at two locations
        let lots = vec![
            lot(1, "LOT/2025/07/20/1", 7, 1, 10, "100.0"),
            lot(2, "LOT/2025/07/20/2", 7, 2, 20, "500.0"),
        ];

        // Act: dispatch from location 1 only
        let eligible = filter_eligible_lots(lots, 7, Some(1));

        // Assert: the larger lot at location 2 is invisible
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].location_id, 1);
    }

    /// Test: any-location variant spans locations in lot age order
    #[test]
    fn test_any_location_spans_locations() {
        // Arrange: the oldest stock sits at location 2
        let lots = apply_fifo_sort(filter_eligible_lots(
            vec![
                lot(5, "LOT/2025/07/18/1", 7, 2, 5, "40.0"),
                lot(9, "LOT/2025/07/19/1", 7, 1, 15, "40.0"),
                lot(12, "LOT/2025/07/20/1", 7, 2, 25, "40.0"),
            ],
            7,
            None,
        ));

        // Act
        let plan = plan_fifo(&lots, Decimal::from_str("100.0").unwrap()).unwrap();

        // Assert: allocation walks age order across locations
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].location_id, 2);
        assert_eq!(plan[1].location_id, 1);
        assert_eq!(plan[2].allocated_quantity, Decimal::from_str("20.0").unwrap());
    }

    /// Test: drained and other-product lots are excluded
    #[test]
    fn test_filter_excludes_drained_and_foreign_lots() {
        let lots = vec![
            lot(1, "LOT/2025/07/20/1", 7, 1, 10, "0.0"),
            lot(2, "LOT/2025/07/20/2", 8, 1, 20, "100.0"),
            lot(3, "LOT/2025/07/20/3", 7, 1, 30, "25.0"),
        ];

        let eligible = filter_eligible_lots(lots, 7, None);

        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, 3);
    }
}
