//! Contract errors.
//!
//! `ValidationFailure` is the expected, recoverable outcome of bad data.
//! Everything else in `ContractError` is a caller or definition mistake and
//! propagates immediately.

use std::fmt;

use vet_ir::{DefinitionError, Descriptor, Name};

/// Slot name used for return values.
pub const RETURN_SLOT: &str = "return";

/// One slot whose value did not match its descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotFailure {
    pub slot: Name,
    pub expected: Descriptor,
    /// Description of the shape actually found.
    pub actual: String,
}

impl SlotFailure {
    pub fn is_return(&self) -> bool {
        self.slot == RETURN_SLOT
    }
}

impl fmt::Display for SlotFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_return() {
            write!(
                f,
                "Return value was not of type {}. Actual type was {}.",
                self.expected, self.actual
            )
        } else {
            write!(
                f,
                "Argument '{}' was not of type {}. Actual type was {}.",
                self.slot, self.expected, self.actual
            )
        }
    }
}

/// Every slot that failed in one validation call.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("The following runtime type errors were encountered:{}", report(.failures))]
pub struct ValidationFailure {
    pub failures: Vec<SlotFailure>,
}

/// One indented line per failure.
fn report(failures: &[SlotFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("\n       {failure}"))
        .collect()
}

/// Ways a call can fail to bind to a signature.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("takes {expected} positional arguments but {given} were given")]
    TooManyPositional { expected: usize, given: usize },

    #[error("got an unexpected keyword argument: '{name}'")]
    UnexpectedKeyword { name: Name },

    #[error("got multiple values for argument '{name}'")]
    MultipleValues { name: Name },

    #[error("missing {} required positional arguments: {}", .names.len(), quoted(.names))]
    MissingPositional { names: Vec<Name> },

    #[error("missing {} keyword arguments: {}", .names.len(), quoted(.names))]
    MissingKeyword { names: Vec<Name> },

    /// A record value whose fields differ from its declaration.
    #[error("expected fields ({}) but found ({})", joined(.expected), joined(.found))]
    RecordFields { expected: Vec<Name>, found: Vec<Name> },
}

fn quoted(names: &[Name]) -> String {
    names
        .iter()
        .map(|name| format!("'{name}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn joined(names: &[Name]) -> String {
    names
        .iter()
        .map(Name::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Everything that can go wrong when a contract is compiled or checked.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("{callee}() {reason}")]
    Arguments { callee: Name, reason: ArgumentError },

    #[error("forward reference '{name}' is not defined in the supplied scopes")]
    UnresolvableForwardReference { name: Name },

    #[error("no slot named '{slot}'")]
    UnknownSlot { slot: Name },
}

impl ContractError {
    /// The validation report, if this is a data error.
    pub fn as_validation(&self) -> Option<&ValidationFailure> {
        match self {
            ContractError::Validation(failure) => Some(failure),
            _ => None,
        }
    }
}
