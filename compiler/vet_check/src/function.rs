//! Native callables that carry their own contract.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use vet_ir::Name;

use crate::{Arguments, Contract, ContractError, Enforcer, Settings, Signature, Value};

type Body = dyn Fn(Arguments) -> Value + Send + Sync;

/// A named function value with a declared signature.
///
/// The contract is compiled on first use, with the settings of whoever needs
/// it first: a call, or a context checking this function against a callable
/// descriptor.
#[derive(Clone)]
pub struct FunctionValue {
    inner: Arc<FunctionInner>,
}

struct FunctionInner {
    name: Name,
    signature: Signature,
    body: Box<Body>,
    contract: OnceCell<Contract>,
}

impl FunctionValue {
    pub fn new(
        name: impl Into<Name>,
        signature: Signature,
        body: impl Fn(Arguments) -> Value + Send + Sync + 'static,
    ) -> Self {
        FunctionValue {
            inner: Arc::new(FunctionInner {
                name: name.into(),
                signature,
                body: Box::new(body),
                contract: OnceCell::new(),
            }),
        }
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.inner.name
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.inner.signature
    }

    /// The function's contract, compiling it with `settings` if needed.
    pub fn contract(&self, settings: &Settings) -> Result<&Contract, ContractError> {
        self.inner.contract.get_or_try_init(|| {
            let enforcer = Enforcer::new(
                self.inner.name.as_str(),
                self.inner.signature.clone(),
                None,
                settings.clone(),
            )?;
            Ok(Contract::new(enforcer))
        })
    }

    /// Call through the contract, using the global settings if it has not
    /// been compiled yet.
    pub fn call(&self, args: Arguments) -> Result<Value, ContractError> {
        self.call_with(&Settings::global(), args)
    }

    pub fn call_with(&self, settings: &Settings, args: Arguments) -> Result<Value, ContractError> {
        let body = &self.inner.body;
        self.contract(settings)?.call(args, |bound| body(bound))
    }
}

impl PartialEq for FunctionValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionValue")
            .field("name", &self.inner.name)
            .field("compiled", &self.inner.contract.get().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
