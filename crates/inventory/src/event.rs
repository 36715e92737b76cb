use core::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use supplytrace_core::{ProductId, ReferenceId, SupplierId};
use supplytrace_products::ProductKey;

/// The five stock movement behaviors replayed by the engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    ReceiptIn,
    SaleOut,
    ReturnIn,
    ManualIn,
    ManualOut,
}

impl MovementKind {
    /// Same-day tie-break: receipts, then sales, then returns, then manual entries.
    pub const fn priority(self) -> u8 {
        match self {
            MovementKind::ReceiptIn => 1,
            MovementKind::SaleOut => 2,
            MovementKind::ReturnIn => 3,
            MovementKind::ManualIn | MovementKind::ManualOut => 4,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            MovementKind::ReceiptIn => "receipt_in",
            MovementKind::SaleOut => "sale_out",
            MovementKind::ReturnIn => "return_in",
            MovementKind::ManualIn => "manual_in",
            MovementKind::ManualOut => "manual_out",
        }
    }

    pub const fn is_inbound(self) -> bool {
        matches!(
            self,
            MovementKind::ReceiptIn | MovementKind::ReturnIn | MovementKind::ManualIn
        )
    }

    /// Path segment of the screen that owns the originating document.
    pub const fn route_segment(self) -> &'static str {
        match self {
            MovementKind::ReceiptIn => "purchases",
            MovementKind::SaleOut => "sales",
            MovementKind::ReturnIn => "sales-returns",
            MovementKind::ManualIn | MovementKind::ManualOut => "stock-adjustments",
        }
    }

    pub fn describe(self, reference_number: &str) -> String {
        match self {
            MovementKind::ReceiptIn => format!("Purchase receipt {reference_number}"),
            MovementKind::SaleOut => format!("Sale {reference_number}"),
            MovementKind::ReturnIn => format!("Sales return {reference_number}"),
            MovementKind::ManualIn => format!("Manual adjustment (in) {reference_number}"),
            MovementKind::ManualOut => format!("Manual adjustment (out) {reference_number}"),
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// One normalized historical movement, before attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEvent {
    pub kind: MovementKind,
    pub event_date: NaiveDate,
    pub reference_id: ReferenceId,
    pub reference_number: String,
    pub supplier_id: Option<SupplierId>,
    pub product_key: ProductKey,
    pub product_id: Option<ProductId>,
    pub product_code: String,
    pub product_name: String,
    pub unit: String,
    pub quantity: u64,
    /// Position in normalizer output; last-resort tie-break for rows that
    /// share date, kind and reference (several lines of one document).
    pub ordinal: u64,
}

impl StockEvent {
    pub fn priority(&self) -> u8 {
        self.kind.priority()
    }
}

/// Canonical replay order: `(event_date, priority, reference_id)`, then
/// normalizer emission order.
pub fn canonical_cmp(a: &StockEvent, b: &StockEvent) -> Ordering {
    a.event_date
        .cmp(&b.event_date)
        .then_with(|| a.priority().cmp(&b.priority()))
        .then_with(|| a.reference_id.cmp(&b.reference_id))
        .then_with(|| a.ordinal.cmp(&b.ordinal))
}

pub fn sort_canonical(events: &mut [StockEvent]) {
    events.sort_by(canonical_cmp);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: MovementKind, day: u32, reference: i64, ordinal: u64) -> StockEvent {
        StockEvent {
            kind,
            event_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            reference_id: ReferenceId::new(reference),
            reference_number: format!("DOC-{reference}"),
            supplier_id: None,
            product_key: ProductKey::Catalog(ProductId::new(1)),
            product_id: Some(ProductId::new(1)),
            product_code: "P".to_string(),
            product_name: "Product".to_string(),
            unit: String::new(),
            quantity: 1,
            ordinal,
        }
    }

    #[test]
    fn same_day_orders_by_kind_priority() {
        let mut events = vec![
            event(MovementKind::ManualOut, 5, 1, 0),
            event(MovementKind::ReturnIn, 5, 1, 1),
            event(MovementKind::SaleOut, 5, 1, 2),
            event(MovementKind::ReceiptIn, 5, 1, 3),
        ];
        sort_canonical(&mut events);

        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MovementKind::ReceiptIn,
                MovementKind::SaleOut,
                MovementKind::ReturnIn,
                MovementKind::ManualOut,
            ]
        );
    }

    #[test]
    fn same_kind_same_day_orders_by_reference_id() {
        let mut events = vec![
            event(MovementKind::SaleOut, 5, 30, 0),
            event(MovementKind::SaleOut, 5, 4, 1),
            event(MovementKind::SaleOut, 4, 99, 2),
        ];
        sort_canonical(&mut events);

        let refs: Vec<_> = events.iter().map(|e| e.reference_id.get()).collect();
        assert_eq!(refs, vec![99, 4, 30]);
    }

    #[test]
    fn date_dominates_kind() {
        let mut events = vec![
            event(MovementKind::ReceiptIn, 6, 1, 0),
            event(MovementKind::ManualIn, 5, 1, 1),
        ];
        sort_canonical(&mut events);
        assert_eq!(events[0].kind, MovementKind::ManualIn);
    }

    #[test]
    fn kind_serializes_as_label() {
        let json = serde_json::to_string(&MovementKind::ReturnIn).unwrap();
        assert_eq!(json, "\"return_in\"");
        assert_eq!(MovementKind::ManualOut.to_string(), "manual_out");
    }
}
