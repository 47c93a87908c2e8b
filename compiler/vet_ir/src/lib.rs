//! Vet IR - descriptor vocabulary for runtime contracts.
//!
//! This crate holds the declarative side of a contract:
//! - `Name` for shared identifiers
//! - `Descriptor` and its parts (`TypeVar`, `RecordDescriptor`,
//!   `GenericDef`) describing expected shapes
//! - `DefinitionError` for malformed descriptors
//! - the built-in nominal names the hierarchy is seeded with
//!
//! Nothing here knows about values or validation. Subtyping lives in
//! `vet_types`; compilation and evaluation live in `vet_check`.

mod descriptor;
mod error;
mod name;
mod stack;
pub mod well_known;

pub use descriptor::{
    CallableParams, Descriptor, ForwardRef, GenericApplication, GenericDef, RecordDescriptor,
    TypeVar,
};
pub use error::DefinitionError;
pub use name::Name;
pub use stack::ensure_sufficient_stack;
