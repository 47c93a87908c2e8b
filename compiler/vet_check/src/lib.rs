//! Vet check - runtime contracts over dynamic values.
//!
//! Compiles `vet_ir` descriptors into matcher node trees and evaluates
//! values against them:
//! - `BindingContext`: compiled slots plus the state of one validation pass
//! - `Enforcer` / `Contract`: argument binding and input/output validation
//!   for a callable
//! - `GenericSignature`: user generics whose type parameters are shared with
//!   their method contracts
//! - `Config` / `Settings`: enable flags, groups and variance mode
//!
//! # Evaluation
//!
//! Evaluation is a trampoline over an explicit frame stack, so deeply nested
//! values and self-referential shapes never recurse on the native stack.
//! Compilation recurses on descriptors, which are written by hand and
//! shallow, and grows the stack on demand when they are not.

mod compile;
mod config;
mod context;
mod enforcer;
mod error;
mod eval;
mod function;
mod generic;
mod node;
mod value;

pub use config::{
    Config, ConfigError, ConfigUpdate, GroupsUpdate, Mode, Settings, SharedConfig, DEFAULT_GROUP,
};
pub use context::{BindingContext, Scope, SharedContext};
pub use enforcer::{
    compile_contract, record_contract, Arguments, Contract, Enforcer, Param, ParamKind,
    RecordConstructor, Signature,
};
pub use error::{ArgumentError, ContractError, SlotFailure, ValidationFailure, RETURN_SLOT};
pub use function::FunctionValue;
pub use generic::GenericSignature;
pub use node::ValidationResult;
pub use value::{Heap, Value};
