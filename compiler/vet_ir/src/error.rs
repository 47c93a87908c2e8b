//! Descriptor definition errors.
//!
//! These are programmer errors in a contract's declaration, never data
//! errors. They surface eagerly from descriptor constructors (and, for
//! generic arguments, from contract compilation).

use crate::Name;

/// A malformed descriptor.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    /// A union collapsed to fewer than two distinct members.
    #[error("a union needs at least two distinct members, found {found}")]
    DegenerateUnion { found: usize },

    /// `TypeVar("T", int)`: a single constraint is a bound in disguise.
    #[error("type variable `{name}` has a single constraint; use a bound instead")]
    SingleConstraint { name: Name },

    /// The bound is not one of the declared constraints.
    #[error("type variable `{name}` is bound to `{bound}`, which contradicts its constraints")]
    BoundContradictsConstraints { name: Name, bound: String },

    /// A variadic tuple must carry exactly one element descriptor.
    #[error("a variadic tuple takes exactly one element descriptor, found {found}")]
    VariadicTupleArity { found: usize },

    /// A record declared the same field twice.
    #[error("record `{record}` declares field `{field}` more than once")]
    DuplicateField { record: Name, field: Name },

    /// A contract declared the same slot twice.
    #[error("slot `{slot}` is declared more than once")]
    DuplicateSlot { slot: Name },

    /// A generic definition without type parameters.
    #[error("generic `{name}` declares no type parameters")]
    GenericWithoutParameters { name: Name },

    /// A generic applied to the wrong number of type arguments.
    #[error("generic `{name}` takes {expected} type arguments but {found} were given")]
    GenericArity {
        name: Name,
        expected: usize,
        found: usize,
    },

    /// A generic applied to an argument its parameter does not accept.
    #[error("generic `{name}` does not accept `{argument}` for parameter `{param}`")]
    GenericArgumentRejected {
        name: Name,
        param: Name,
        argument: String,
    },
}
