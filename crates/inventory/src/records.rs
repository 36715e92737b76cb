//! Raw record shapes consumed from the transactional store.
//!
//! These mirror the persisted document lines as they are, including the
//! legacy quirks: ids may be zero or missing, product code/name are snapshots
//! from when the document was written, quantities are signed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use supplytrace_core::ReferenceId;

/// Purchase receipt line (goods received from a supplier).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    pub date: NaiveDate,
    pub reference_id: ReferenceId,
    pub reference_number: String,
    pub supplier_id: Option<i64>,
    pub product_id: Option<i64>,
    pub product_code: String,
    pub product_name: String,
    pub unit: String,
    pub quantity: i64,
}

/// Customer sale line or sales-return line; both streams share this shape
/// and carry no supplier attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesLineRecord {
    pub date: NaiveDate,
    pub reference_id: ReferenceId,
    pub reference_number: String,
    pub product_id: Option<i64>,
    pub product_code: String,
    pub product_name: String,
    pub quantity: i64,
}

/// Direction flag recorded on a manual stock correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentDirection {
    In,
    Out,
}

/// Manual correction of a supplier-attributed balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualCorrectionRecord {
    pub date: NaiveDate,
    pub reference_id: ReferenceId,
    pub supplier_id: Option<i64>,
    pub product_id: Option<i64>,
    pub quantity: i64,
    pub direction: AdjustmentDirection,
}

/// The four historical streams, as fetched for one reconstruction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawStockRecords {
    pub receipts: Vec<ReceiptRecord>,
    pub sales: Vec<SalesLineRecord>,
    pub returns: Vec<SalesLineRecord>,
    pub manual: Vec<ManualCorrectionRecord>,
}

impl RawStockRecords {
    pub fn len(&self) -> usize {
        self.receipts.len() + self.sales.len() + self.returns.len() + self.manual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
