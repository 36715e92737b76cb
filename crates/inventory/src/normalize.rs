//! Event normalization: four raw streams into one list of [`StockEvent`].
//!
//! The output is unordered as far as replay is concerned; ordering is the
//! replay engine's job. Rows that cannot take part in replay are dropped here
//! and counted in [`NormalizeReport`] so callers can monitor data quality.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use supplytrace_core::{ProductId, ReferenceId, SupplierId};
use supplytrace_products::{CatalogSnapshot, ProductKey, Resolution, ResolvedProduct, resolve};

use crate::event::{MovementKind, StockEvent};
use crate::records::{AdjustmentDirection, RawStockRecords};

/// Optional narrowing applied while normalizing.
///
/// `as_of` bounds the maximum date only; history always starts at the
/// beginning of time. The product and supplier filters only prune whole
/// products, which keeps every surviving product's FIFO history intact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeScope {
    /// Keep only products this supplier ever received or manually corrected.
    pub supplier_id: Option<SupplierId>,
    /// Keep only this catalog product.
    pub product_id: Option<ProductId>,
    /// Drop events dated after this day.
    pub as_of: Option<NaiveDate>,
}

/// Data-quality counters for one normalization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub accepted: usize,
    pub non_positive_quantity: usize,
    pub empty_identity: usize,
    pub missing_supplier: usize,
    /// Accepted events that resolved only to a `manual:` key.
    pub fallback_keys: usize,
    /// Rows outside the scope (after `as_of`, or pruned product). Not a data-quality issue.
    pub out_of_scope: usize,
}

impl NormalizeReport {
    /// Rows rejected as malformed.
    pub fn dropped(&self) -> usize {
        self.non_positive_quantity + self.empty_identity + self.missing_supplier
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub events: Vec<StockEvent>,
    pub report: NormalizeReport,
}

enum Rejection {
    NonPositiveQuantity,
    EmptyIdentity,
    MissingSupplier,
}

struct Normalizer<'a> {
    catalog: &'a CatalogSnapshot,
    as_of: Option<NaiveDate>,
    events: Vec<StockEvent>,
    report: NormalizeReport,
}

struct Line<'r> {
    kind: MovementKind,
    date: NaiveDate,
    reference_id: ReferenceId,
    reference_number: String,
    supplier_id: Option<i64>,
    product_id: Option<i64>,
    product_code: &'r str,
    product_name: &'r str,
    unit: &'r str,
    quantity: i64,
}

impl Normalizer<'_> {
    fn push(&mut self, line: Line<'_>) {
        if self.as_of.is_some_and(|bound| line.date > bound) {
            self.report.out_of_scope += 1;
            return;
        }

        match self.build(line) {
            Ok(event) => {
                self.report.accepted += 1;
                self.events.push(event);
            }
            Err(Rejection::NonPositiveQuantity) => self.report.non_positive_quantity += 1,
            Err(Rejection::EmptyIdentity) => self.report.empty_identity += 1,
            Err(Rejection::MissingSupplier) => self.report.missing_supplier += 1,
        }
    }

    fn build(&mut self, line: Line<'_>) -> Result<StockEvent, Rejection> {
        let quantity = u64::try_from(line.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or(Rejection::NonPositiveQuantity)?;

        let supplier_id = line.supplier_id.and_then(SupplierId::positive);
        let needs_supplier = matches!(
            line.kind,
            MovementKind::ReceiptIn | MovementKind::ManualIn | MovementKind::ManualOut
        );
        if needs_supplier && supplier_id.is_none() {
            return Err(Rejection::MissingSupplier);
        }

        let ResolvedProduct {
            product_id,
            product_code,
            product_name,
            key,
            resolution,
        } = resolve(
            line.product_id,
            line.product_code,
            line.product_name,
            self.catalog,
        )
        .ok_or(Rejection::EmptyIdentity)?;

        if resolution == Resolution::Fallback {
            self.report.fallback_keys += 1;
        }

        Ok(StockEvent {
            kind: line.kind,
            event_date: line.date,
            reference_id: line.reference_id,
            reference_number: line.reference_number,
            supplier_id,
            product_key: key,
            product_id,
            product_code,
            product_name,
            unit: line.unit.trim().to_string(),
            quantity,
            ordinal: self.events.len() as u64,
        })
    }
}

/// Normalize the four raw streams into replayable events.
///
/// Streams are emitted in a fixed order (receipts, sales, returns, manual
/// corrections), preserving input order within each stream; `ordinal` records
/// that position.
pub fn normalize(
    records: &RawStockRecords,
    catalog: &CatalogSnapshot,
    scope: &NormalizeScope,
) -> Normalized {
    let mut n = Normalizer {
        catalog,
        as_of: scope.as_of,
        events: Vec::with_capacity(records.len()),
        report: NormalizeReport::default(),
    };

    for r in &records.receipts {
        n.push(Line {
            kind: MovementKind::ReceiptIn,
            date: r.date,
            reference_id: r.reference_id,
            reference_number: r.reference_number.clone(),
            supplier_id: r.supplier_id,
            product_id: r.product_id,
            product_code: &r.product_code,
            product_name: &r.product_name,
            unit: &r.unit,
            quantity: r.quantity,
        });
    }

    for (kind, lines) in [
        (MovementKind::SaleOut, &records.sales),
        (MovementKind::ReturnIn, &records.returns),
    ] {
        for r in lines {
            n.push(Line {
                kind,
                date: r.date,
                reference_id: r.reference_id,
                reference_number: r.reference_number.clone(),
                supplier_id: None,
                product_id: r.product_id,
                product_code: &r.product_code,
                product_name: &r.product_name,
                unit: "",
                quantity: r.quantity,
            });
        }
    }

    for r in &records.manual {
        let kind = match r.direction {
            AdjustmentDirection::In => MovementKind::ManualIn,
            AdjustmentDirection::Out => MovementKind::ManualOut,
        };
        n.push(Line {
            kind,
            date: r.date,
            reference_id: r.reference_id,
            reference_number: format!("ADJ-{}", r.reference_id),
            supplier_id: r.supplier_id,
            product_id: r.product_id,
            product_code: "",
            product_name: "",
            unit: "",
            quantity: r.quantity,
        });
    }

    let Normalizer {
        mut events,
        mut report,
        ..
    } = n;

    let before = events.len();
    if let Some(product_id) = scope.product_id {
        let wanted = ProductKey::Catalog(product_id);
        events.retain(|e| e.product_key == wanted);
    }
    if let Some(supplier_id) = scope.supplier_id {
        let touched: BTreeSet<ProductKey> = events
            .iter()
            .filter(|e| e.supplier_id == Some(supplier_id))
            .map(|e| e.product_key.clone())
            .collect();
        events.retain(|e| touched.contains(&e.product_key));
    }
    let pruned = before - events.len();
    report.accepted -= pruned;
    report.out_of_scope += pruned;

    Normalized { events, report }
}
