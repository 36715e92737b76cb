//! Infrastructure layer: record sources, config, and the per-request query
//! service that wires them to the reconstruction engine.

pub mod config;
pub mod read_model;
pub mod service;


pub use config::QueryConfig;
pub use read_model::{InMemoryStockRecordSource, SourceError, StockRecordSource};
pub use service::{StockQuery, StockQueryError, StockReport, SupplierStockService};
