//! Per-request stock query: fetch, normalize, replay, project.
//!
//! Nothing is cached between calls; every query rebuilds the ledger from the
//! full history so the answer always reflects current records.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use supplytrace_core::{DomainError, TenantId};
use supplytrace_inventory::{
    MovementRow, NormalizeReport, NormalizeScope, Page, Pagination, QueryScope, QueryView,
    ReplayDiagnostics, ReplayScope, SummaryRow, normalize, replay,
};
use supplytrace_products::CatalogSnapshot;

use crate::config::QueryConfig;
use crate::read_model::{SourceError, StockRecordSource};

#[derive(Debug, Error)]
pub enum StockQueryError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Usage(#[from] DomainError),
}

/// Incoming request: filters plus raw paging parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockQuery {
    #[serde(flatten)]
    pub scope: QueryScope,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl StockQuery {
    pub fn new(scope: QueryScope) -> Self {
        Self {
            scope,
            limit: None,
            offset: None,
        }
    }

    pub fn page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }
}

/// Everything the supplier stock screen renders for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReport {
    pub run_id: Uuid,
    pub movements: Page<MovementRow>,
    pub balances: Vec<SummaryRow>,
    pub normalize: NormalizeReport,
    pub diagnostics: ReplayDiagnostics,
}

impl StockReport {
    fn empty(run_id: Uuid, pagination: Pagination) -> Self {
        Self {
            run_id,
            movements: Page::empty(pagination),
            balances: Vec::new(),
            normalize: NormalizeReport::default(),
            diagnostics: ReplayDiagnostics::default(),
        }
    }
}

pub struct SupplierStockService<S> {
    source: S,
    config: QueryConfig,
}

impl<S> SupplierStockService<S>
where
    S: StockRecordSource,
{
    pub fn new(source: S) -> Self {
        Self::with_config(source, QueryConfig::default())
    }

    pub fn with_config(source: S, config: QueryConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn query(&self, tenant_id: TenantId, request: &StockQuery) -> Result<StockReport, StockQueryError> {
        let scope = &request.scope;
        scope.validate()?;

        let pagination = Pagination::bounded(
            request.limit,
            request.offset,
            self.config.default_page_size,
            self.config.max_page_size,
        );
        let run_id = Uuid::now_v7();

        // The screen shows nothing until a supplier is picked.
        let Some(supplier_id) = scope.supplier_id else {
            return Ok(StockReport::empty(run_id, pagination));
        };

        let span = tracing::info_span!(
            "stock_query",
            %run_id,
            tenant_id = %tenant_id,
            supplier_id = %supplier_id,
        );
        let _enter = span.enter();

        let catalog = CatalogSnapshot::new(self.source.catalog(tenant_id)?);
        let records = self.source.records(tenant_id, scope.date_to)?;

        let normalized = normalize(
            &records,
            &catalog,
            &NormalizeScope {
                as_of: scope.date_to,
                ..NormalizeScope::default()
            },
        );
        let report = normalized.report;
        if report.dropped() > 0 {
            tracing::warn!(
                non_positive_quantity = report.non_positive_quantity,
                empty_identity = report.empty_identity,
                missing_supplier = report.missing_supplier,
                "dropped unusable stock records"
            );
        }
        if report.fallback_keys > 0 {
            tracing::warn!(
                fallback_keys = report.fallback_keys,
                "stock records matched no catalog product"
            );
        }

        let outcome = replay(normalized.events, &ReplayScope::supplier(supplier_id));
        for shortfall in &outcome.diagnostics.oversold {
            tracing::warn!(
                product = %shortfall.product_key,
                reference_id = %shortfall.reference_id,
                requested = shortfall.requested,
                unattributed = shortfall.unattributed,
                "sale exceeds attributable stock"
            );
        }
        for shortfall in &outcome.diagnostics.unmatched_returns {
            tracing::warn!(
                product = %shortfall.product_key,
                reference_id = %shortfall.reference_id,
                unattributed = shortfall.unattributed,
                "return has no consumption left to reverse"
            );
        }
        if outcome.diagnostics.clamped_adjustments > 0 {
            tracing::warn!(
                clamped = outcome.diagnostics.clamped_adjustments,
                "manual corrections floored at zero balance"
            );
        }

        let view = QueryView::new(&outcome.journal, &outcome.summary);
        let movements = view.movements(scope, pagination)?;
        let balances = view.supplier_balances(scope)?;

        tracing::info!(
            events = outcome.diagnostics.events_replayed,
            rows = outcome.journal.len(),
            matched = movements.total,
            "stock query complete"
        );

        Ok(StockReport {
            run_id,
            movements,
            balances,
            normalize: report,
            diagnostics: outcome.diagnostics,
        })
    }
}
