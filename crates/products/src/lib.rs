//! Product catalog boundary.
//!
//! The catalog itself is maintained elsewhere; this crate holds the read-only
//! snapshot the reconstruction engine consumes and the identity rules that map
//! historical rows onto it.

pub mod identity;
pub mod product;

pub use identity::{ProductKey, Resolution, ResolvedProduct, normalize_text, resolve};
pub use product::{CatalogProduct, CatalogSnapshot};
