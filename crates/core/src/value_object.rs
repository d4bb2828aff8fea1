//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: a package reference,
/// a destination or an output row has no identity beyond its attributes. To
/// "modify" one, build a new one.
///
/// The trait requires:
/// - **Clone**: values are copied freely between the mapper, the client and the store
/// - **PartialEq**: compared by their attribute values (handy in tests)
/// - **Debug**: loggable
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
