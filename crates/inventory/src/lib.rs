//! Supplier-attributed inventory reconstruction.
//!
//! The catalog keeps one shared stock counter per product. This crate answers
//! which supplier's goods are still on hand, and which sale consumed which
//! supplier's goods, by replaying the historical streams (receipts, sales,
//! returns, manual corrections) on every query:
//!
//! raw records → [`normalize`] → [`replay`] → [`MovementJournal`] +
//! [`BalanceSummary`] → [`QueryView`]
//!
//! Everything here is deterministic domain logic (no IO, no storage) and
//! read-only with respect to the shared stock counter.

pub mod event;
pub mod journal;
pub mod lot_ledger;
pub mod normalize;
pub mod query;
pub mod records;
pub mod replay;

pub use event::{MovementKind, StockEvent, canonical_cmp, sort_canonical};
pub use journal::{BalanceSummary, MovementJournal, MovementRow, SummaryBuilder, SummaryRow};
pub use lot_ledger::{Allocation, ConsumptionRecord, Drawdown, Lot, LotLedger};
pub use normalize::{NormalizeReport, NormalizeScope, Normalized, normalize};
pub use query::{Page, Pagination, QueryScope, QueryView};
pub use records::{
    AdjustmentDirection, ManualCorrectionRecord, RawStockRecords, ReceiptRecord, SalesLineRecord,
};
pub use replay::{ReplayDiagnostics, ReplayOutcome, ReplayScope, Shortfall, replay};
