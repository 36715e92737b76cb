use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use thiserror::Error;

use supplytrace_core::TenantId;
use supplytrace_inventory::{
    ManualCorrectionRecord, RawStockRecords, ReceiptRecord, SalesLineRecord,
};
use supplytrace_products::CatalogProduct;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("record source unavailable: {0}")]
    Unavailable(String),
}

/// Tenant-isolated, read-only access to the durable records the engine replays.
pub trait StockRecordSource: Send + Sync {
    /// Current catalog snapshot.
    fn catalog(&self, tenant_id: TenantId) -> Result<Vec<CatalogProduct>, SourceError>;

    /// All four streams from the beginning of time, bounded above by `until`
    /// (inclusive) when given. Never bounded below.
    fn records(
        &self,
        tenant_id: TenantId,
        until: Option<NaiveDate>,
    ) -> Result<RawStockRecords, SourceError>;
}

impl<S> StockRecordSource for Arc<S>
where
    S: StockRecordSource + ?Sized,
{
    fn catalog(&self, tenant_id: TenantId) -> Result<Vec<CatalogProduct>, SourceError> {
        (**self).catalog(tenant_id)
    }

    fn records(
        &self,
        tenant_id: TenantId,
        until: Option<NaiveDate>,
    ) -> Result<RawStockRecords, SourceError> {
        (**self).records(tenant_id, until)
    }
}

#[derive(Debug, Default)]
struct TenantRecords {
    catalog: Vec<CatalogProduct>,
    records: RawStockRecords,
}

/// In-memory record source for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryStockRecordSource {
    inner: RwLock<HashMap<TenantId, TenantRecords>>,
}

impl InMemoryStockRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tenant(&self, tenant_id: TenantId, f: impl FnOnce(&mut TenantRecords)) {
        if let Ok(mut map) = self.inner.write() {
            f(map.entry(tenant_id).or_default());
        }
    }

    /// Insert or replace a catalog entry (by id).
    pub fn upsert_product(&self, tenant_id: TenantId, product: CatalogProduct) {
        self.with_tenant(tenant_id, |t| {
            match t.catalog.iter_mut().find(|p| p.id == product.id) {
                Some(existing) => *existing = product,
                None => t.catalog.push(product),
            }
        });
    }

    pub fn add_receipt(&self, tenant_id: TenantId, record: ReceiptRecord) {
        self.with_tenant(tenant_id, |t| t.records.receipts.push(record));
    }

    pub fn add_sale(&self, tenant_id: TenantId, record: SalesLineRecord) {
        self.with_tenant(tenant_id, |t| t.records.sales.push(record));
    }

    pub fn add_return(&self, tenant_id: TenantId, record: SalesLineRecord) {
        self.with_tenant(tenant_id, |t| t.records.returns.push(record));
    }

    pub fn add_manual_correction(&self, tenant_id: TenantId, record: ManualCorrectionRecord) {
        self.with_tenant(tenant_id, |t| t.records.manual.push(record));
    }

    pub fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(&tenant_id);
        }
    }
}

fn until_filter<T: Clone>(rows: &[T], until: Option<NaiveDate>, date: impl Fn(&T) -> NaiveDate) -> Vec<T> {
    rows.iter()
        .filter(|r| until.is_none_or(|u| date(r) <= u))
        .cloned()
        .collect()
}

impl StockRecordSource for InMemoryStockRecordSource {
    fn catalog(&self, tenant_id: TenantId) -> Result<Vec<CatalogProduct>, SourceError> {
        let map = self
            .inner
            .read()
            .map_err(|_| SourceError::Unavailable("lock poisoned".to_string()))?;
        Ok(map.get(&tenant_id).map(|t| t.catalog.clone()).unwrap_or_default())
    }

    fn records(
        &self,
        tenant_id: TenantId,
        until: Option<NaiveDate>,
    ) -> Result<RawStockRecords, SourceError> {
        let map = self
            .inner
            .read()
            .map_err(|_| SourceError::Unavailable("lock poisoned".to_string()))?;
        let Some(t) = map.get(&tenant_id) else {
            return Ok(RawStockRecords::default());
        };

        Ok(RawStockRecords {
            receipts: until_filter(&t.records.receipts, until, |r| r.date),
            sales: until_filter(&t.records.sales, until, |r| r.date),
            returns: until_filter(&t.records.returns, until, |r| r.date),
            manual: until_filter(&t.records.manual, until, |r| r.date),
        })
    }
}
