//! Configuration loading and representation.

use serde::{Deserialize, Serialize};

use supplytrace_inventory::query::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

pub const DEFAULT_PAGE_SIZE_VAR: &str = "SUPPLYTRACE_DEFAULT_PAGE_SIZE";
pub const MAX_PAGE_SIZE_VAR: &str = "SUPPLYTRACE_MAX_PAGE_SIZE";

/// Paging limits for the stock query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl QueryConfig {
    /// Read overrides from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`QueryConfig::from_env`] but with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let max_page_size = parse_size(&lookup, MAX_PAGE_SIZE_VAR, defaults.max_page_size);
        let default_page_size = parse_size(&lookup, DEFAULT_PAGE_SIZE_VAR, defaults.default_page_size);

        Self {
            default_page_size: default_page_size.min(max_page_size),
            max_page_size,
        }
    }
}

fn parse_size(lookup: &impl Fn(&str) -> Option<String>, key: &str, fallback: u32) -> u32 {
    let Some(raw) = lookup(key) else {
        return fallback;
    };
    match raw.trim().parse::<u32>() {
        Ok(0) | Err(_) => {
            tracing::warn!("{key}={raw:?} is not a positive integer, using {fallback}");
            fallback
        }
        Ok(v) => v,
    }
}
