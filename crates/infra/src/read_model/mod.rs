//! Read-only access to the durable records the engine replays.

pub mod source;

pub use source::{InMemoryStockRecordSource, SourceError, StockRecordSource};
