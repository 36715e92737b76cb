//! Entity trait: identity that survives edits to the record's attributes.

/// Entity marker + minimal interface.
///
/// Catalog products are entities: a renamed product is still the same product,
/// which is why historical movement rows resolve by id first.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
