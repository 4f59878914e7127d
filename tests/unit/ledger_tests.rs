// Unit tests for the ledger transition rules.
//
// The model below mirrors the production semantics: immutable lots with an
// (available, committed) pair, an append-only transaction log carrying the
// post-movement available balance, FIFO planning, conditional-predicate
// deltas, and all-or-nothing operations that write one audit entry when
// they commit and nothing when they roll back.
//
// Tests verify:
// 1. Non-negativity and conservation across operation sequences
// 2. Reserve followed by release restores the pre-reserve state exactly
// 3. Racing reserves resolve to one winner and one insufficient-stock loser
// 4. Conversion consumes stock from the exact lots previously reserved
// 5. Replaying the log reproduces every lot's available quantity

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TxnType {
    Inbound,
    Outbound,
    Adjustment,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tag {
    Reserve,
    Unreserve,
}

#[derive(Debug, Clone)]
struct Txn {
    lot_id: i32,
    txn_type: TxnType,
    tag: Option<Tag>,
    quantity: Decimal,
    reference: Option<(&'static str, i32)>,
    balance_after: Decimal,
}

#[derive(Debug, Clone)]
struct Lot {
    id: i32,
    lot_number: String,
    product_id: i32,
    location_id: i32,
    /// Stand-in for created_at; smaller is older
    created_seq: u32,
    available: Decimal,
    committed: Decimal,
    inbound_total: Decimal,
}

#[derive(Debug, Clone, Default)]
struct Ledger {
    lots: Vec<Lot>,
    txns: Vec<Txn>,
    audit: Vec<(&'static str, &'static str, i32)>,
    converted_orders: Vec<i32>,
    next_lot_id: i32,
    next_seq: u32,
}

impl Ledger {
    fn new() -> Self {
        Ledger::default()
    }

    fn lot(&self, lot_id: i32) -> &Lot {
        self.lots.iter().find(|l| l.id == lot_id).unwrap()
    }

    fn lot_mut(&mut self, lot_id: i32) -> &mut Lot {
        self.lots.iter_mut().find(|l| l.id == lot_id).unwrap()
    }

    /// Inbound: materialize a lot from a GRN item. One INBOUND transaction,
    /// one audit entry for the receipt.
    fn inbound(&mut self, lot_number: &str, product_id: i32, location_id: i32, qty: Decimal) -> i32 {
        self.next_lot_id += 1;
        self.next_seq += 1;
        let lot_id = self.next_lot_id;

        self.lots.push(Lot {
            id: lot_id,
            lot_number: lot_number.to_string(),
            product_id,
            location_id,
            created_seq: self.next_seq,
            available: qty,
            committed: Decimal::ZERO,
            inbound_total: qty,
        });
        self.txns.push(Txn {
            lot_id,
            txn_type: TxnType::Inbound,
            tag: None,
            quantity: qty,
            reference: Some(("GRN", lot_id)),
            balance_after: qty,
        });
        self.audit.push(("CREATE", "GRN", lot_id));

        lot_id
    }

    /// FIFO plan over eligible lots: created ascending, id ascending.
    fn plan(
        &self,
        product_id: i32,
        location_id: Option<i32>,
        required: Decimal,
    ) -> Result<Vec<(i32, Decimal)>, (Decimal, Decimal)> {
        let mut eligible: Vec<&Lot> = self
            .lots
            .iter()
            .filter(|lot| {
                lot.product_id == product_id
                    && lot.available > Decimal::ZERO
                    && location_id.map_or(true, |loc| lot.location_id == loc)
            })
            .collect();
        eligible.sort_by_key(|lot| (lot.created_seq, lot.id));

        let total: Decimal = eligible.iter().map(|lot| lot.available).sum();
        if total < required {
            return Err((total, required));
        }

        let mut plan = Vec::new();
        let mut remaining = required;
        for lot in eligible {
            if remaining <= Decimal::ZERO {
                break;
            }
            let take = remaining.min(lot.available);
            plan.push((lot.id, take));
            remaining -= take;
        }
        Ok(plan)
    }

    /// Conditional delta matching the production UPDATE predicate: either
    /// counter going negative rejects the write.
    fn apply_delta(
        &mut self,
        lot_id: i32,
        d_available: Decimal,
        d_committed: Decimal,
    ) -> Result<Decimal, (Decimal, Decimal)> {
        let lot = self.lot_mut(lot_id);
        let new_available = lot.available + d_available;
        let new_committed = lot.committed + d_committed;

        if new_available < Decimal::ZERO {
            return Err((lot.available, -d_available));
        }
        if new_committed < Decimal::ZERO {
            return Err((lot.committed, -d_committed));
        }

        lot.available = new_available;
        lot.committed = new_committed;
        Ok(new_available)
    }

    /// Reserve with a caller-supplied plan. Separated from `reserve` so a
    /// race can be staged: a plan computed against a stale snapshot runs
    /// into the delta predicate and the whole operation rolls back.
    fn reserve_with_plan(
        &mut self,
        so_id: i32,
        plan: &[(i32, Decimal)],
    ) -> Result<(), (Decimal, Decimal)> {
        let backup = self.clone();

        for &(lot_id, qty) in plan {
            match self.apply_delta(lot_id, -qty, qty) {
                Ok(balance_after) => self.txns.push(Txn {
                    lot_id,
                    txn_type: TxnType::Adjustment,
                    tag: Some(Tag::Reserve),
                    quantity: qty,
                    reference: Some(("SALES_ORDER", so_id)),
                    balance_after,
                }),
                Err(shortage) => {
                    *self = backup;
                    return Err(shortage);
                }
            }
        }

        self.audit.push(("CREATE", "SALES_ORDER", so_id));
        Ok(())
    }

    /// Reserve: plan FIFO, then move available -> committed per lot.
    fn reserve(
        &mut self,
        so_id: i32,
        product_id: i32,
        location_id: Option<i32>,
        required: Decimal,
    ) -> Result<(), (Decimal, Decimal)> {
        let plan = self.plan(product_id, location_id, required)?;
        self.reserve_with_plan(so_id, &plan)
    }

    /// Outstanding reservations for an order: RESERVE minus UNRESERVE per lot.
    fn outstanding(&self, so_id: i32) -> Vec<(i32, Decimal)> {
        let mut per_lot: HashMap<i32, Decimal> = HashMap::new();
        for txn in &self.txns {
            if txn.reference != Some(("SALES_ORDER", so_id)) {
                continue;
            }
            match txn.tag {
                Some(Tag::Reserve) => *per_lot.entry(txn.lot_id).or_default() += txn.quantity,
                Some(Tag::Unreserve) => *per_lot.entry(txn.lot_id).or_default() -= txn.quantity,
                None => {}
            }
        }
        let mut outstanding: Vec<(i32, Decimal)> = per_lot
            .into_iter()
            .filter(|(_, qty)| *qty > Decimal::ZERO)
            .collect();
        outstanding.sort_by_key(|(lot_id, _)| *lot_id);
        outstanding
    }

    /// Release without audit; cancel and convert wrap this.
    fn release(&mut self, so_id: i32) -> Decimal {
        let outstanding = self.outstanding(so_id);
        let mut released = Decimal::ZERO;

        for (lot_id, qty) in outstanding {
            let balance_after = self.apply_delta(lot_id, qty, -qty).unwrap();
            self.txns.push(Txn {
                lot_id,
                txn_type: TxnType::Adjustment,
                tag: Some(Tag::Unreserve),
                quantity: qty,
                reference: Some(("SALES_ORDER", so_id)),
                balance_after,
            });
            released += qty;
        }

        released
    }

    /// Cancel: release the reservation, one audit entry.
    fn cancel(&mut self, so_id: i32) -> Decimal {
        let released = self.release(so_id);
        self.audit.push(("UPDATE", "SALES_ORDER", so_id));
        released
    }

    /// Outbound from one location, FIFO, permanent deduction.
    fn outbound(
        &mut self,
        sc_id: i32,
        product_id: i32,
        location_id: i32,
        required: Decimal,
    ) -> Result<Vec<(i32, Decimal)>, (Decimal, Decimal)> {
        let plan = self.plan(product_id, Some(location_id), required)?;
        let backup = self.clone();

        for &(lot_id, qty) in &plan {
            match self.apply_delta(lot_id, -qty, Decimal::ZERO) {
                Ok(balance_after) => self.txns.push(Txn {
                    lot_id,
                    txn_type: TxnType::Outbound,
                    tag: None,
                    quantity: qty,
                    reference: Some(("SALES_CHALLAN", sc_id)),
                    balance_after,
                }),
                Err(shortage) => {
                    *self = backup;
                    return Err(shortage);
                }
            }
        }

        Ok(plan)
    }

    /// First reserved location per product for an order.
    fn reserved_location(&self, so_id: i32, product_id: i32) -> Option<i32> {
        self.txns.iter().find_map(|txn| {
            if txn.reference == Some(("SALES_ORDER", so_id)) && txn.tag == Some(Tag::Reserve) {
                let lot = self.lot(txn.lot_id);
                (lot.product_id == product_id).then_some(lot.location_id)
            } else {
                None
            }
        })
    }

    /// Convert an order into a challan: release, then dispatch the same
    /// stock from the reserved locations, all within one unit of work.
    /// Two audit entries: the conversion and the challan it creates.
    fn convert(
        &mut self,
        so_id: i32,
        sc_id: i32,
        items: &[(i32, Decimal)],
    ) -> Result<(), (Decimal, Decimal)> {
        assert!(
            !self.converted_orders.contains(&so_id),
            "order already converted"
        );
        let backup = self.clone();

        self.release(so_id);

        for &(product_id, qty) in items {
            let location_id = self
                .reserved_location(so_id, product_id)
                .expect("conversion requires a reserved location");
            if let Err(shortage) = self.outbound(sc_id, product_id, location_id, qty) {
                *self = backup;
                return Err(shortage);
            }
        }

        self.converted_orders.push(so_id);
        self.audit.push(("CONVERT", "SALES_ORDER", so_id));
        self.audit.push(("CREATE", "SALES_CHALLAN", sc_id));
        Ok(())
    }

    /// Replay the log for one lot and check every recorded balance along
    /// the way. Returns the reconstructed available quantity.
    fn replay_available(&self, lot_id: i32) -> Decimal {
        let mut running = Decimal::ZERO;
        for txn in self.txns.iter().filter(|t| t.lot_id == lot_id) {
            match (txn.txn_type, txn.tag) {
                (TxnType::Inbound, _) => running += txn.quantity,
                (TxnType::Outbound, _) => running -= txn.quantity,
                (TxnType::Adjustment, Some(Tag::Reserve)) => running -= txn.quantity,
                (TxnType::Adjustment, Some(Tag::Unreserve)) => running += txn.quantity,
                (TxnType::Adjustment, None) => running += txn.quantity,
            }
            assert_eq!(
                txn.balance_after, running,
                "recorded balance diverges from replay for lot {}",
                lot_id
            );
        }
        running
    }

    /// Conservation check: available + committed equals inbound minus the
    /// sum of outbound movements, for every lot.
    fn assert_invariants(&self) {
        for lot in &self.lots {
            assert!(lot.available >= Decimal::ZERO, "negative available");
            assert!(lot.committed >= Decimal::ZERO, "negative committed");

            let outbound_total: Decimal = self
                .txns
                .iter()
                .filter(|t| t.lot_id == lot.id && t.txn_type == TxnType::Outbound)
                .map(|t| t.quantity)
                .sum();
            assert_eq!(
                lot.available + lot.committed,
                lot.inbound_total - outbound_total,
                "conservation violated for lot {}",
                lot.lot_number
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scenario: single inbound of 500 kg
    #[test]
    fn test_single_inbound() {
        // Arrange + Act
        let mut ledger = Ledger::new();
        let lot_id = ledger.inbound("LOT/2025/07/20/1", 7, 1, dec("500"));

        // Assert: lot state and the INBOUND transaction
        let lot = ledger.lot(lot_id);
        assert_eq!(lot.available, dec("500"));
        assert_eq!(lot.committed, Decimal::ZERO);

        assert_eq!(ledger.txns.len(), 1);
        assert_eq!(ledger.txns[0].txn_type, TxnType::Inbound);
        assert_eq!(ledger.txns[0].balance_after, dec("500"));

        ledger.assert_invariants();
    }

    /// Scenario: reserve 120 of 500, then cancel; lot returns to (500, 0)
    #[test]
    fn test_reserve_then_cancel_restores_lot() {
        // Arrange
        let mut ledger = Ledger::new();
        let lot_id = ledger.inbound("LOT/2025/07/20/1", 7, 1, dec("500"));

        // Act: reserve for sales order 11
        ledger.reserve(11, 7, None, dec("120")).unwrap();

        // Assert: available 380, committed 120
        assert_eq!(ledger.lot(lot_id).available, dec("380"));
        assert_eq!(ledger.lot(lot_id).committed, dec("120"));

        // Act: cancel releases the reservation
        let released = ledger.cancel(11);

        // Assert: back to the pre-reserve state, with both movements logged
        assert_eq!(released, dec("120"));
        assert_eq!(ledger.lot(lot_id).available, dec("500"));
        assert_eq!(ledger.lot(lot_id).committed, Decimal::ZERO);

        let tags: Vec<Option<Tag>> = ledger.txns.iter().map(|t| t.tag).collect();
        assert_eq!(tags, vec![None, Some(Tag::Reserve), Some(Tag::Unreserve)]);

        ledger.assert_invariants();
    }

    /// A second release of the same order finds nothing and moves nothing
    #[test]
    fn test_release_is_idempotent() {
        let mut ledger = Ledger::new();
        let lot_id = ledger.inbound("LOT/2025/07/20/1", 7, 1, dec("500"));
        ledger.reserve(11, 7, None, dec("120")).unwrap();

        let first = ledger.cancel(11);
        let txns_after_first = ledger.txns.len();
        let second = ledger.release(11);

        assert_eq!(first, dec("120"));
        assert_eq!(second, Decimal::ZERO);
        assert_eq!(ledger.txns.len(), txns_after_first, "no extra log entries");
        assert_eq!(ledger.lot(lot_id).available, dec("500"));
    }

    /// Scenario: two racing reserves of 300 against 500 available; the
    /// loser planned on a stale snapshot and the delta predicate stops it
    #[test]
    fn test_concurrent_reserves_one_winner() {
        // Arrange
        let mut ledger = Ledger::new();
        let lot_id = ledger.inbound("LOT/2025/07/20/1", 7, 1, dec("500"));

        // Both requests plan against the same snapshot
        let plan_a = ledger.plan(7, None, dec("300")).unwrap();
        let plan_b = ledger.plan(7, None, dec("300")).unwrap();

        // Act: first commits, second runs into the predicate
        ledger.reserve_with_plan(21, &plan_a).unwrap();
        let txns_before_loser = ledger.txns.len();
        let audit_before_loser = ledger.audit.len();
        let loss = ledger.reserve_with_plan(22, &plan_b).unwrap_err();

        // Assert: winner holds 300, loser saw 200 available
        assert_eq!(ledger.lot(lot_id).available, dec("200"));
        assert_eq!(ledger.lot(lot_id).committed, dec("300"));
        assert_eq!(loss, (dec("200"), dec("300")));

        // The failed operation wrote nothing: no transactions, no audit
        assert_eq!(ledger.txns.len(), txns_before_loser);
        assert_eq!(ledger.audit.len(), audit_before_loser);

        ledger.assert_invariants();
    }

    /// Scenario: FIFO across two lots; A(100 kg, older) then B(100 kg)
    #[test]
    fn test_fifo_reservation_across_lots() {
        // Arrange
        let mut ledger = Ledger::new();
        let lot_a = ledger.inbound("LOT/2025/07/20/1", 9, 1, dec("100"));
        let lot_b = ledger.inbound("LOT/2025/07/21/1", 9, 1, dec("100"));

        // Act: reserve 150 for sales order 22
        ledger.reserve(22, 9, None, dec("150")).unwrap();

        // Assert: allocations [A:100, B:50]
        assert_eq!(ledger.lot(lot_a).available, Decimal::ZERO);
        assert_eq!(ledger.lot(lot_a).committed, dec("100"));
        assert_eq!(ledger.lot(lot_b).available, dec("50"));
        assert_eq!(ledger.lot(lot_b).committed, dec("50"));

        ledger.assert_invariants();
    }

    /// Scenario: converting the order dispatches from the reserved lots
    /// and drains exactly what was set aside
    #[test]
    fn test_conversion_consumes_reserved_lots() {
        // Arrange: the FIFO scenario above
        let mut ledger = Ledger::new();
        let lot_a = ledger.inbound("LOT/2025/07/20/1", 9, 1, dec("100"));
        let lot_b = ledger.inbound("LOT/2025/07/21/1", 9, 1, dec("100"));
        ledger.reserve(22, 9, None, dec("150")).unwrap();

        // Act
        ledger.convert(22, 1, &[(9, dec("150"))]).unwrap();

        // Assert: A is drained, B keeps its free 50, nothing is committed
        assert_eq!(ledger.lot(lot_a).available, Decimal::ZERO);
        assert_eq!(ledger.lot(lot_a).committed, Decimal::ZERO);
        assert_eq!(ledger.lot(lot_b).available, dec("50"));
        assert_eq!(ledger.lot(lot_b).committed, Decimal::ZERO);

        // Per-lot log reads INBOUND, RESERVE, UNRESERVE, OUTBOUND
        let types_a: Vec<(TxnType, Option<Tag>)> = ledger
            .txns
            .iter()
            .filter(|t| t.lot_id == lot_a)
            .map(|t| (t.txn_type, t.tag))
            .collect();
        assert_eq!(
            types_a,
            vec![
                (TxnType::Inbound, None),
                (TxnType::Adjustment, Some(Tag::Reserve)),
                (TxnType::Adjustment, Some(Tag::Unreserve)),
                (TxnType::Outbound, None),
            ]
        );

        // Balances track available after each movement
        let balances_b: Vec<Decimal> = ledger
            .txns
            .iter()
            .filter(|t| t.lot_id == lot_b)
            .map(|t| t.balance_after)
            .collect();
        assert_eq!(balances_b, vec![dec("100"), dec("50"), dec("100"), dec("50")]);

        ledger.assert_invariants();
    }

    /// Conversion never pulls stock from a lot the order did not reserve
    #[test]
    fn test_conversion_ignores_unreserved_stock() {
        // Arrange: reserved lot at location 1, fresher unreserved stock at 2
        let mut ledger = Ledger::new();
        let reserved_lot = ledger.inbound("LOT/2025/07/20/1", 9, 1, dec("80"));
        let other_lot = ledger.inbound("LOT/2025/07/20/2", 9, 2, dec("500"));
        ledger.reserve(30, 9, Some(1), dec("80")).unwrap();

        // Act
        ledger.convert(30, 2, &[(9, dec("80"))]).unwrap();

        // Assert: only the reserved lot moved
        assert_eq!(ledger.lot(reserved_lot).available, Decimal::ZERO);
        assert_eq!(ledger.lot(other_lot).available, dec("500"));

        ledger.assert_invariants();
    }

    /// Direct dispatch deducts available stock without touching committed
    #[test]
    fn test_standalone_outbound() {
        let mut ledger = Ledger::new();
        let lot_id = ledger.inbound("LOT/2025/07/20/1", 7, 1, dec("200"));

        let plan = ledger.outbound(5, 7, 1, dec("75")).unwrap();

        assert_eq!(plan, vec![(lot_id, dec("75"))]);
        assert_eq!(ledger.lot(lot_id).available, dec("125"));
        assert_eq!(ledger.lot(lot_id).committed, Decimal::ZERO);

        ledger.assert_invariants();
    }

    /// Committed stock is not available: outbound cannot take it
    #[test]
    fn test_outbound_cannot_touch_committed_stock() {
        let mut ledger = Ledger::new();
        ledger.inbound("LOT/2025/07/20/1", 7, 1, dec("100"));
        ledger.reserve(40, 7, None, dec("80")).unwrap();

        let shortage = ledger.outbound(6, 7, 1, dec("50")).unwrap_err();

        assert_eq!(shortage, (dec("20"), dec("50")));
        ledger.assert_invariants();
    }

    /// Property: a mixed operation sequence preserves the invariants and
    /// the log replays to the live state
    #[test]
    fn test_mixed_sequence_preserves_invariants_and_replay() {
        let mut ledger = Ledger::new();
        let lot_a = ledger.inbound("LOT/2025/07/18/1", 7, 1, dec("250.50"));
        let lot_b = ledger.inbound("LOT/2025/07/19/1", 7, 1, dec("100.25"));
        let lot_c = ledger.inbound("LOT/2025/07/20/1", 8, 2, dec("75.00"));

        ledger.reserve(50, 7, None, dec("300")).unwrap();
        ledger.cancel(50);
        ledger.reserve(51, 7, Some(1), dec("120.75")).unwrap();
        ledger.outbound(7, 7, 1, dec("60")).unwrap();
        ledger.reserve(52, 8, None, dec("75")).unwrap();
        ledger.convert(52, 8, &[(8, dec("75"))]).unwrap();

        ledger.assert_invariants();

        for lot_id in [lot_a, lot_b, lot_c] {
            assert_eq!(
                ledger.replay_available(lot_id),
                ledger.lot(lot_id).available,
                "replay mismatch for lot {}",
                lot_id
            );
        }
    }

    /// Every committed operation leaves its audit entries; conversion
    /// leaves one for the order and one for the challan
    #[test]
    fn test_audit_entries_per_operation() {
        let mut ledger = Ledger::new();
        ledger.inbound("LOT/2025/07/20/1", 7, 1, dec("500"));
        assert_eq!(ledger.audit.len(), 1);

        ledger.reserve(60, 7, None, dec("100")).unwrap();
        assert_eq!(ledger.audit.len(), 2);

        ledger.convert(60, 3, &[(7, dec("100"))]).unwrap();
        assert_eq!(ledger.audit.len(), 4);
        assert_eq!(ledger.audit[2], ("CONVERT", "SALES_ORDER", 60));
        assert_eq!(ledger.audit[3], ("CREATE", "SALES_CHALLAN", 3));

        // A failed reserve adds nothing
        let before = ledger.audit.len();
        assert!(ledger.reserve(61, 7, None, dec("9999")).is_err());
        assert_eq!(ledger.audit.len(), before);
    }

    /// A failed conversion rolls everything back, including its release
    #[test]
    fn test_failed_conversion_rolls_back_release() {
        // Arrange: reserve 80, then drain the lot's free stock so the
        // post-release dispatch of a larger amount cannot succeed
        let mut ledger = Ledger::new();
        let lot_id = ledger.inbound("LOT/2025/07/20/1", 7, 1, dec("100"));
        ledger.reserve(70, 7, None, dec("80")).unwrap();
        ledger.outbound(9, 7, 1, dec("20")).unwrap();

        let state_before: (Decimal, Decimal) =
            (ledger.lot(lot_id).available, ledger.lot(lot_id).committed);
        let txns_before = ledger.txns.len();

        // Act: convert demands more than release can provide
        let result = ledger.convert(70, 4, &[(7, dec("90"))]);

        // Assert: nothing changed, not even the release half
        assert!(result.is_err());
        assert_eq!(
            (ledger.lot(lot_id).available, ledger.lot(lot_id).committed),
            state_before
        );
        assert_eq!(ledger.txns.len(), txns_before);

        ledger.assert_invariants();
    }
}
