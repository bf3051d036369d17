//! Overload resolution over metadata signatures.
//!
//! [`Binder`] picks the method or property that best matches a list of argument types, deciding
//! class relationships through a [`TypeHierarchy`]. [`crate::metadata::image::MetadataImage`]
//! implements the hierarchy from its TypeDef and InterfaceImpl tables. [`InMemoryHierarchy`]
//! covers types assembled by hand.
//!
//! Primitive arguments only convert along [`widens`]: no narrowing and no boxing.

mod hierarchy;
mod select;
mod widening;

pub use hierarchy::{InMemoryHierarchy, TypeHierarchy, MAX_HIERARCHY_DEPTH};
pub use select::{Binder, MethodCandidate, PropertyCandidate};
pub use widening::widens;
