use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use supplytrace_core::{Entity, ProductId};

use crate::identity::normalize_text;

/// Catalog entry as seen by the reconstruction engine: id plus the *current*
/// code and name. Historical rows may carry older snapshots of both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub code: String,
    pub name: String,
}

impl CatalogProduct {
    pub fn new(id: ProductId, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            name: name.into(),
        }
    }
}

impl Entity for CatalogProduct {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Point-in-time copy of the catalog with lookup indexes.
///
/// Built once per replay. Code and name indexes are keyed by the normalized
/// text; when two products normalize to the same code (or name) the lowest id
/// wins, so lookups stay independent of the order the catalog was loaded in.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    products: Vec<CatalogProduct>,
    by_id: HashMap<ProductId, usize>,
    by_code: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl CatalogSnapshot {
    pub fn new(products: impl IntoIterator<Item = CatalogProduct>) -> Self {
        let mut products: Vec<CatalogProduct> = products.into_iter().collect();
        products.sort_by_key(|p| p.id);
        products.dedup_by_key(|p| p.id);

        let mut by_id = HashMap::with_capacity(products.len());
        let mut by_code = HashMap::with_capacity(products.len());
        let mut by_name = HashMap::with_capacity(products.len());

        for (idx, product) in products.iter().enumerate() {
            by_id.insert(product.id, idx);

            let code = normalize_text(&product.code);
            if !code.is_empty() {
                by_code.entry(code).or_insert(idx);
            }

            let name = normalize_text(&product.name);
            if !name.is_empty() {
                by_name.entry(name).or_insert(idx);
            }
        }

        Self {
            products,
            by_id,
            by_code,
            by_name,
        }
    }

    pub fn get(&self, id: ProductId) -> Option<&CatalogProduct> {
        self.by_id.get(&id).map(|&idx| &self.products[idx])
    }

    /// Lookup by an already-normalized code.
    pub fn find_by_code(&self, normalized_code: &str) -> Option<&CatalogProduct> {
        self.by_code.get(normalized_code).map(|&idx| &self.products[idx])
    }

    /// Lookup by an already-normalized name.
    pub fn find_by_name(&self, normalized_name: &str) -> Option<&CatalogProduct> {
        self.by_name.get(normalized_name).map(|&idx| &self.products[idx])
    }

    pub fn products(&self) -> &[CatalogProduct] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
