//! Product identity resolution.
//!
//! Older transactional rows only carry denormalized code/name snapshots taken
//! when the document was written. Resolution maps any row to a canonical
//! [`ProductKey`] using the live catalog as a fallback dictionary:
//!
//! 1. a positive numeric id wins outright (`id:<N>`), gaps in code/name are
//!    back-filled from the catalog;
//! 2. otherwise the normalized code is looked up, then the normalized name;
//! 3. otherwise the key falls back to `manual:<code>|<name>` with no id.
//!
//! Resolution is a pure function of the row and the catalog snapshot.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use supplytrace_core::{DomainError, ProductId, ValueObject};

use crate::product::{CatalogProduct, CatalogSnapshot};

/// Canonical identity of a product for the duration of one replay.
///
/// Two events reference the same product iff their keys are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ProductKey {
    /// `id:<N>`
    Catalog(ProductId),
    /// `manual:<normalized-code>|<normalized-name>`; holds the part after the prefix.
    Manual(String),
}

impl ProductKey {
    pub fn catalog(id: ProductId) -> Self {
        Self::Catalog(id)
    }

    /// Build a fallback key from raw text; both halves are normalized here.
    ///
    /// `|` and `\\` inside either half are backslash-escaped so the separator
    /// stays unambiguous.
    pub fn manual(code: &str, name: &str) -> Self {
        Self::Manual(format!(
            "{}|{}",
            escape_key_part(&normalize_text(code)),
            escape_key_part(&normalize_text(name))
        ))
    }

    pub fn product_id(&self) -> Option<ProductId> {
        match self {
            Self::Catalog(id) => Some(*id),
            Self::Manual(_) => None,
        }
    }
}

impl ValueObject for ProductKey {}

fn escape_key_part(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars() {
        if matches!(c, '|' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl core::fmt::Display for ProductKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Catalog(id) => write!(f, "id:{id}"),
            Self::Manual(text) => write!(f, "manual:{text}"),
        }
    }
}

impl FromStr for ProductKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix("id:") {
            return Ok(Self::Catalog(id.parse()?));
        }
        if let Some(text) = s.strip_prefix("manual:") {
            if text.contains('|') {
                return Ok(Self::Manual(text.to_string()));
            }
        }
        Err(DomainError::invalid_id(format!("ProductKey: {s:?}")))
    }
}

impl From<ProductKey> for String {
    fn from(value: ProductKey) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for ProductKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// How a row's identity was established.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    ById,
    ByCode,
    ByName,
    /// No catalog match; the row is tracked under a `manual:` key.
    Fallback,
}

/// Outcome of resolving one row's product reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedProduct {
    pub product_id: Option<ProductId>,
    pub product_code: String,
    pub product_name: String,
    pub key: ProductKey,
    pub resolution: Resolution,
}

impl ResolvedProduct {
    fn from_catalog(product: &CatalogProduct, resolution: Resolution) -> Self {
        Self {
            product_id: Some(product.id),
            product_code: product.code.clone(),
            product_name: product.name.clone(),
            key: ProductKey::Catalog(product.id),
            resolution,
        }
    }
}

/// Case-fold and trim, the comparison form for codes and names.
pub fn normalize_text(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Resolve a row's product reference against the catalog.
///
/// Returns `None` when the row has no usable identity at all (no positive id,
/// blank code and blank name); such rows are dropped before replay.
pub fn resolve(
    raw_id: Option<i64>,
    raw_code: &str,
    raw_name: &str,
    catalog: &CatalogSnapshot,
) -> Option<ResolvedProduct> {
    let code = raw_code.trim();
    let name = raw_name.trim();

    if let Some(id) = raw_id.and_then(ProductId::positive) {
        let entry = catalog.get(id);
        let back_fill = |raw: &str, pick: fn(&CatalogProduct) -> &str| -> String {
            match entry {
                Some(p) if raw.is_empty() => pick(p).to_string(),
                _ => raw.to_string(),
            }
        };
        return Some(ResolvedProduct {
            product_id: Some(id),
            product_code: back_fill(code, |p| p.code.as_str()),
            product_name: back_fill(name, |p| p.name.as_str()),
            key: ProductKey::Catalog(id),
            resolution: Resolution::ById,
        });
    }

    if code.is_empty() && name.is_empty() {
        return None;
    }

    let normalized_code = normalize_text(code);
    if !normalized_code.is_empty() {
        if let Some(p) = catalog.find_by_code(&normalized_code) {
            return Some(ResolvedProduct::from_catalog(p, Resolution::ByCode));
        }
    }

    let normalized_name = normalize_text(name);
    if !normalized_name.is_empty() {
        if let Some(p) = catalog.find_by_name(&normalized_name) {
            return Some(ResolvedProduct::from_catalog(p, Resolution::ByName));
        }
    }

    Some(ResolvedProduct {
        product_id: None,
        product_code: code.to_string(),
        product_name: name.to_string(),
        key: ProductKey::manual(code, name),
        resolution: Resolution::Fallback,
    })
}
