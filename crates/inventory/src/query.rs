//! Filtered, paginated projections over a finished replay.
//!
//! Nothing here feeds back into replay: filters only choose which rows are
//! shown, never what their balances are.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use supplytrace_core::{DomainError, DomainResult, ProductId, SupplierId};

use crate::journal::{BalanceSummary, MovementJournal, MovementRow, SummaryRow};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Request scope as received from the screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryScope {
    pub supplier_id: Option<SupplierId>,
    pub product_id: Option<ProductId>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
}

impl QueryScope {
    pub fn for_supplier(supplier_id: SupplierId) -> Self {
        Self {
            supplier_id: Some(supplier_id),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(DomainError::validation(format!(
                    "date_from ({from}) is after date_to ({to})"
                )));
            }
        }
        Ok(())
    }

    fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
    }

    fn matches_movement(&self, row: &MovementRow, needle: Option<&str>) -> bool {
        self.supplier_id.is_none_or(|s| row.supplier_id == s)
            && self.product_id.is_none_or(|p| row.product_id == Some(p))
            && self.date_from.is_none_or(|d| row.event_date >= d)
            && self.date_to.is_none_or(|d| row.event_date <= d)
            && needle.is_none_or(|n| {
                contains(&row.product_code, n)
                    || contains(&row.product_name, n)
                    || contains(&row.reference_number, n)
                    || contains(&row.description, n)
            })
    }

    fn matches_summary(&self, row: &SummaryRow, needle: Option<&str>) -> bool {
        self.supplier_id.is_none_or(|s| row.supplier_id == s)
            && self.product_id.is_none_or(|p| row.product_id == Some(p))
            && needle.is_none_or(|n| contains(&row.product_code, n) || contains(&row.product_name, n))
    }
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Offset/limit pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self::bounded(limit, offset, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE)
    }

    /// Like [`Pagination::new`] with caller-provided default and cap.
    pub fn bounded(limit: Option<u32>, offset: Option<u32>, default_limit: u32, max_limit: u32) -> Self {
        Self {
            limit: limit.unwrap_or(default_limit).clamp(1, max_limit.max(1)),
            offset: offset.unwrap_or(0),
        }
    }

    fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

/// One page of a filtered, sorted collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matching items across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn empty(pagination: Pagination) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            pagination,
            has_more: false,
        }
    }
}

fn paginate<T: Clone>(items: Vec<T>, pagination: Pagination) -> Page<T> {
    let total = items.len() as u64;
    let page = pagination.slice(&items);
    let has_more = u64::from(pagination.offset) + (page.len() as u64) < total;
    Page {
        items: page,
        total,
        pagination,
        has_more,
    }
}

/// Read-only view over one replay's outputs.
#[derive(Debug, Clone, Copy)]
pub struct QueryView<'a> {
    journal: &'a MovementJournal,
    summary: &'a BalanceSummary,
}

impl<'a> QueryView<'a> {
    pub fn new(journal: &'a MovementJournal, summary: &'a BalanceSummary) -> Self {
        Self { journal, summary }
    }

    /// Matching movement rows, most recent first.
    pub fn movements(&self, scope: &QueryScope, pagination: Pagination) -> DomainResult<Page<MovementRow>> {
        scope.validate()?;
        let needle = scope.needle();

        let mut rows: Vec<MovementRow> = self
            .journal
            .iter()
            .filter(|r| scope.matches_movement(r, needle.as_deref()))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.event_date
                .cmp(&a.event_date)
                .then_with(|| b.sort_key.cmp(&a.sort_key))
        });

        Ok(paginate(rows, pagination))
    }

    /// Matching summary rows. With `date_to`, balances are as of that day,
    /// folded from the journal; `date_from` does not apply to balances.
    pub fn balances(&self, scope: &QueryScope, pagination: Pagination) -> DomainResult<Page<SummaryRow>> {
        scope.validate()?;
        Ok(paginate(self.matching_balances(scope), pagination))
    }

    /// Balances of the scoped supplier; the supplier is mandatory here.
    pub fn supplier_balances(&self, scope: &QueryScope) -> DomainResult<Vec<SummaryRow>> {
        if scope.supplier_id.is_none() {
            return Err(DomainError::missing_scope("supplier_id"));
        }
        scope.validate()?;
        Ok(self.matching_balances(scope))
    }

    fn matching_balances(&self, scope: &QueryScope) -> Vec<SummaryRow> {
        let needle = scope.needle();
        let as_of;
        let summary = match scope.date_to {
            Some(to) => {
                as_of = BalanceSummary::from_rows(self.journal.iter().filter(|r| r.event_date <= to));
                &as_of
            }
            None => self.summary,
        };

        summary
            .rows()
            .iter()
            .filter(|r| scope.matches_summary(r, needle.as_deref()))
            .cloned()
            .collect()
    }
}
