//! In-memory FIFO lot queues with a LIFO consumption stack per product.
//!
//! Sales draw from the oldest remaining lot first. Every (sale, lot) draw is
//! remembered on a stack so a later return can undo the most recent draws.
//! Returns restore supplier balances only; they never re-open a lot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use supplytrace_core::{SupplierId, ValueObject};
use supplytrace_products::ProductKey;

/// Quantity of one product received from one supplier on one receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub supplier_id: SupplierId,
    pub product_key: ProductKey,
    pub remaining_quantity: u64,
    pub unit: String,
    pub product_code: String,
    pub product_name: String,
}

impl ValueObject for Lot {}

/// One attributed draw from a lot, kept until a return reverses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub supplier_id: SupplierId,
    pub product_key: ProductKey,
    pub quantity: u64,
    pub unit: String,
    pub product_code: String,
    pub product_name: String,
}

/// Quantity attributed to (or restored to) a supplier, with the lot's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub supplier_id: SupplierId,
    pub quantity: u64,
    pub unit: String,
    pub product_code: String,
    pub product_name: String,
}

/// Result of a consume or reverse call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Drawdown {
    pub allocations: Vec<Allocation>,
    /// Requested quantity nothing could be attributed to.
    pub shortfall: u64,
}

impl Drawdown {
    pub fn attributed(&self) -> u64 {
        self.allocations
            .iter()
            .fold(0u64, |total, a| total.saturating_add(a.quantity))
    }
}

#[derive(Debug, Default)]
struct ProductLots {
    lots: Vec<Lot>,
    /// Lots before the cursor are exhausted; they are skipped, never removed.
    cursor: usize,
    consumed: Vec<ConsumptionRecord>,
}

/// Lot ledger for every product touched by one replay.
#[derive(Debug, Default)]
pub struct LotLedger {
    products: HashMap<ProductKey, ProductLots>,
}

impl LotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_lot(
        &mut self,
        product_key: &ProductKey,
        supplier_id: SupplierId,
        quantity: u64,
        unit: &str,
        product_code: &str,
        product_name: &str,
    ) {
        self.products
            .entry(product_key.clone())
            .or_default()
            .lots
            .push(Lot {
                supplier_id,
                product_key: product_key.clone(),
                remaining_quantity: quantity,
                unit: unit.to_string(),
                product_code: product_code.to_string(),
                product_name: product_name.to_string(),
            });
    }

    /// Attribute `quantity` to the oldest remaining lots.
    pub fn consume(&mut self, product_key: &ProductKey, quantity: u64) -> Drawdown {
        let Some(state) = self.products.get_mut(product_key) else {
            return Drawdown {
                allocations: Vec::new(),
                shortfall: quantity,
            };
        };

        let mut demand = quantity;
        let mut allocations = Vec::new();

        while demand > 0 && state.cursor < state.lots.len() {
            let lot = &mut state.lots[state.cursor];
            let take = demand.min(lot.remaining_quantity);

            if take > 0 {
                lot.remaining_quantity -= take;
                demand -= take;

                state.consumed.push(ConsumptionRecord {
                    supplier_id: lot.supplier_id,
                    product_key: lot.product_key.clone(),
                    quantity: take,
                    unit: lot.unit.clone(),
                    product_code: lot.product_code.clone(),
                    product_name: lot.product_name.clone(),
                });
                allocations.push(Allocation {
                    supplier_id: lot.supplier_id,
                    quantity: take,
                    unit: lot.unit.clone(),
                    product_code: lot.product_code.clone(),
                    product_name: lot.product_name.clone(),
                });
            }

            if lot.remaining_quantity == 0 {
                state.cursor += 1;
            }
        }

        Drawdown {
            allocations,
            shortfall: demand,
        }
    }

    /// Undo up to `quantity` of the most recent draws, newest first.
    ///
    /// A partially reversed draw keeps its remainder on the stack.
    pub fn reverse(&mut self, product_key: &ProductKey, quantity: u64) -> Drawdown {
        let Some(state) = self.products.get_mut(product_key) else {
            return Drawdown {
                allocations: Vec::new(),
                shortfall: quantity,
            };
        };

        let mut demand = quantity;
        let mut allocations = Vec::new();

        while demand > 0 {
            let Some(top) = state.consumed.last_mut() else {
                break;
            };
            let take = demand.min(top.quantity);
            top.quantity -= take;
            demand -= take;

            allocations.push(Allocation {
                supplier_id: top.supplier_id,
                quantity: take,
                unit: top.unit.clone(),
                product_code: top.product_code.clone(),
                product_name: top.product_name.clone(),
            });

            if top.quantity == 0 {
                state.consumed.pop();
            }
        }

        Drawdown {
            allocations,
            shortfall: demand,
        }
    }

    /// Quantity still sitting in unconsumed lots for a product.
    pub fn on_hand(&self, product_key: &ProductKey) -> u64 {
        self.products
            .get(product_key)
            .map(|s| {
                s.lots[s.cursor..]
                    .iter()
                    .fold(0u64, |total, l| total.saturating_add(l.remaining_quantity))
            })
            .unwrap_or(0)
    }

    /// Remaining lots in FIFO order.
    pub fn open_lots(&self, product_key: &ProductKey) -> &[Lot] {
        self.products
            .get(product_key)
            .map(|s| &s.lots[s.cursor..])
            .unwrap_or(&[])
    }

    /// Consumption stack, oldest first (the top is the last element).
    pub fn consumption_stack(&self, product_key: &ProductKey) -> &[ConsumptionRecord] {
        self.products
            .get(product_key)
            .map(|s| s.consumed.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use supplytrace_core::ProductId;

    fn key() -> ProductKey {
        ProductKey::Catalog(ProductId::new(1))
    }

    fn supplier(n: i64) -> SupplierId {
        SupplierId::new(n)
    }

    fn split(d: &Drawdown) -> Vec<(i64, u64)> {
        d.allocations
            .iter()
            .map(|a| (a.supplier_id.get(), a.quantity))
            .collect()
    }

    fn ledger_with_two_lots() -> LotLedger {
        let mut ledger = LotLedger::new();
        ledger.push_lot(&key(), supplier(1), 5, "pcs", "P", "Pump");
        ledger.push_lot(&key(), supplier(2), 5, "pcs", "P", "Pump");
        ledger
    }

    #[test]
    fn consume_draws_oldest_lot_first_and_splits() {
        let mut ledger = ledger_with_two_lots();

        let d = ledger.consume(&key(), 7);

        assert_eq!(split(&d), vec![(1, 5), (2, 2)]);
        assert_eq!(d.shortfall, 0);
        assert_eq!(ledger.on_hand(&key()), 3);
        assert_eq!(ledger.open_lots(&key()).len(), 1);
    }

    #[test]
    fn cursor_stays_on_partially_consumed_lot() {
        let mut ledger = ledger_with_two_lots();

        ledger.consume(&key(), 2);
        let d = ledger.consume(&key(), 4);

        assert_eq!(split(&d), vec![(1, 3), (2, 1)]);
    }

    #[test]
    fn oversold_portion_is_reported_as_shortfall() {
        let mut ledger = ledger_with_two_lots();

        let d = ledger.consume(&key(), 12);

        assert_eq!(d.attributed(), 10);
        assert_eq!(d.shortfall, 2);
        assert_eq!(ledger.on_hand(&key()), 0);
    }

    #[test]
    fn consume_unknown_product_is_all_shortfall() {
        let mut ledger = LotLedger::new();
        let d = ledger.consume(&key(), 3);
        assert!(d.allocations.is_empty());
        assert_eq!(d.shortfall, 3);
    }

    #[test]
    fn reverse_restores_most_recent_draw_first() {
        let mut ledger = ledger_with_two_lots();
        ledger.consume(&key(), 7);

        let d = ledger.reverse(&key(), 2);

        assert_eq!(split(&d), vec![(2, 2)]);
        assert_eq!(ledger.consumption_stack(&key()).len(), 1);
    }

    #[test]
    fn partial_reverse_leaves_remainder_on_stack() {
        let mut ledger = ledger_with_two_lots();
        ledger.consume(&key(), 7);

        let d = ledger.reverse(&key(), 3);

        assert_eq!(split(&d), vec![(2, 2), (1, 1)]);
        let stack = ledger.consumption_stack(&key());
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].quantity, 4);
    }

    #[test]
    fn reverse_never_reopens_lots() {
        let mut ledger = ledger_with_two_lots();
        ledger.consume(&key(), 7);
        ledger.reverse(&key(), 7);

        assert_eq!(ledger.on_hand(&key()), 3);
        let d = ledger.consume(&key(), 3);
        assert_eq!(split(&d), vec![(2, 3)]);
    }

    #[test]
    fn reverse_beyond_stack_reports_shortfall() {
        let mut ledger = ledger_with_two_lots();
        ledger.consume(&key(), 1);

        let d = ledger.reverse(&key(), 4);

        assert_eq!(d.attributed(), 1);
        assert_eq!(d.shortfall, 3);
    }
}
