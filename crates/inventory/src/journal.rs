use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use supplytrace_core::{ProductId, ReferenceId, SupplierId, ValueObject};
use supplytrace_products::ProductKey;

use crate::event::MovementKind;

/// One attributed stock movement with the supplier balance right after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRow {
    pub supplier_id: SupplierId,
    pub product_id: Option<ProductId>,
    pub product_key: ProductKey,
    pub product_code: String,
    pub product_name: String,
    pub unit: String,
    pub event_date: NaiveDate,
    pub kind: MovementKind,
    pub reference_number: String,
    pub reference_id: ReferenceId,
    pub description: String,
    pub qty_in: u64,
    pub qty_out: u64,
    /// Running balance of `(supplier_id, product_key)` after this row.
    pub balance_after: i64,
    /// `<event_date>#<emission sequence>`; stable display tie-break.
    pub sort_key: String,
}

impl ValueObject for MovementRow {}

impl MovementRow {
    pub fn sort_key_for(event_date: NaiveDate, sequence: u64) -> String {
        format!("{event_date}#{sequence:012}")
    }

    /// Link back to the originating document, e.g. `purchases/42`.
    pub fn reference_route(&self) -> String {
        format!("{}/{}", self.kind.route_segment(), self.reference_id)
    }

    /// Signed quantity change of this row, saturating at the `i64` bounds.
    pub fn delta(&self) -> i64 {
        signed(self.qty_in).saturating_sub(signed(self.qty_out))
    }
}

/// Per (supplier, product) totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub supplier_id: SupplierId,
    pub product_id: Option<ProductId>,
    pub product_key: ProductKey,
    pub product_code: String,
    pub product_name: String,
    pub unit: String,
    pub qty_in: u64,
    pub qty_out: u64,
    pub balance: i64,
}

impl ValueObject for SummaryRow {}

/// Movement rows in replay order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementJournal {
    rows: Vec<MovementRow>,
}

impl MovementJournal {
    pub fn new(rows: Vec<MovementRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[MovementRow] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &MovementRow> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<MovementRow> {
        self.rows
    }
}

/// Summary rows ordered by supplier, then product key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BalanceSummary {
    rows: Vec<SummaryRow>,
}

impl BalanceSummary {
    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn get(&self, supplier_id: SupplierId, product_key: &ProductKey) -> Option<&SummaryRow> {
        self.rows
            .iter()
            .find(|r| r.supplier_id == supplier_id && &r.product_key == product_key)
    }

    /// Balance across all suppliers for one product.
    pub fn product_total(&self, product_key: &ProductKey) -> i64 {
        self.rows
            .iter()
            .filter(|r| &r.product_key == product_key)
            .fold(0i64, |total, r| total.saturating_add(r.balance))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fold rows (in replay order) into a summary.
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a MovementRow>) -> Self {
        let mut builder = SummaryBuilder::default();
        for row in rows {
            builder.record(row);
        }
        builder.finish()
    }
}

/// Quantity as a signed amount; anything past `i64::MAX` pins to it.
pub(crate) fn signed(quantity: u64) -> i64 {
    i64::try_from(quantity).unwrap_or(i64::MAX)
}

/// Accumulates summary totals alongside row emission.
#[derive(Debug, Default)]
pub struct SummaryBuilder {
    pairs: BTreeMap<(SupplierId, ProductKey), SummaryRow>,
}

impl SummaryBuilder {
    pub fn record(&mut self, row: &MovementRow) {
        let entry = self
            .pairs
            .entry((row.supplier_id, row.product_key.clone()))
            .or_insert_with(|| SummaryRow {
                supplier_id: row.supplier_id,
                product_id: row.product_id,
                product_key: row.product_key.clone(),
                product_code: row.product_code.clone(),
                product_name: row.product_name.clone(),
                unit: String::new(),
                qty_in: 0,
                qty_out: 0,
                balance: 0,
            });

        if entry.unit.is_empty() {
            entry.unit.clone_from(&row.unit);
        }
        entry.qty_in = entry.qty_in.saturating_add(row.qty_in);
        entry.qty_out = entry.qty_out.saturating_add(row.qty_out);
        entry.balance = row.balance_after;
    }

    pub fn finish(self) -> BalanceSummary {
        BalanceSummary {
            rows: self.pairs.into_values().collect(),
        }
    }
}
