//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. Product
/// keys, lots, and movement rows are all value objects: two rows with the same
/// fields describe the same movement, regardless of which replay produced them.
///
/// The trait requires:
/// - **Clone**: values are copied freely between the ledger and its outputs
/// - **PartialEq**: values are compared by attributes (determinism checks rely on it)
/// - **Debug**: values show up in logs and test failures
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
