//! Vet types - nominal hierarchy and variance checking.
//!
//! - `Hierarchy`: which nominal types are subclasses of which, plus optional
//!   subclass hooks
//! - `canonicalize`: normal form used before any comparison
//! - `compatible`: the pure variance checker
//!
//! Everything here is side-effect free apart from class registration.

mod hierarchy;
mod variance;

pub use hierarchy::{Hierarchy, HierarchyError, SubclassHook};
pub use variance::{canonicalize, compatible, compatible_canonical, Variance};
