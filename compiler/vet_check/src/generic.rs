//! Generic classes and their instances.
//!
//! A `GenericSignature` is a user generic, open (`Box`) or applied
//! (`Box[int]`). It owns a binding context whose slots are the generic's type
//! parameters, so method contracts compiled below it share those variables.

use std::fmt;
use std::sync::Arc;

use vet_ir::{DefinitionError, Descriptor, GenericApplication, GenericDef, Name, TypeVar};
use vet_types::{compatible, Hierarchy, Variance};

use crate::{BindingContext, ContractError, Settings, SharedContext, Value};

/// Check each argument of `app` against its parameter and bind it.
///
/// An open application returns the parameters unchanged.
pub(crate) fn bind_params(
    app: &GenericApplication,
    hierarchy: &Hierarchy,
) -> Result<Vec<TypeVar>, DefinitionError> {
    let def = app.def();
    let Some(args) = app.args() else {
        return Ok(def.params().to_vec());
    };
    def.params()
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let expected = Descriptor::type_var(param.clone());
            if compatible(hierarchy, arg, &expected, Variance::INVARIANT) {
                Ok(param.bound_to(arg.clone()))
            } else {
                Err(DefinitionError::GenericArgumentRejected {
                    name: def.name().clone(),
                    param: param.name().clone(),
                    argument: arg.to_string(),
                })
            }
        })
        .collect()
}

/// A user generic, open or applied, with its own binding context.
pub struct GenericSignature {
    descriptor: Descriptor,
    app: Arc<GenericApplication>,
    hints: Vec<TypeVar>,
    context: SharedContext,
}

impl GenericSignature {
    /// Apply `def` to `args` (or leave it open) and compile its parameters.
    ///
    /// # Errors
    ///
    /// Fails when the argument count is wrong or an argument does not satisfy
    /// its parameter.
    pub fn new(
        def: Arc<GenericDef>,
        args: Option<Vec<Descriptor>>,
        settings: &Settings,
    ) -> Result<Arc<Self>, ContractError> {
        let app = Arc::new(GenericApplication::new(def, args)?);
        let hints = bind_params(&app, settings.hierarchy())?;
        let slots = hints
            .iter()
            .map(|hint| (hint.name().clone(), Descriptor::type_var(hint.clone())));
        let context = BindingContext::new(slots, settings.clone(), None)?.into_shared();
        tracing::debug!(generic = %app.def().name(), bound = app.args().is_some(), "generic signature created");
        Ok(Arc::new(GenericSignature {
            descriptor: Descriptor::Generic(Arc::clone(&app)),
            app,
            hints,
            context,
        }))
    }

    /// The same generic applied to `args`.
    pub fn apply(&self, args: Vec<Descriptor>, settings: &Settings) -> Result<Arc<Self>, ContractError> {
        GenericSignature::new(Arc::clone(self.app.def()), Some(args), settings)
    }

    /// A value that is an instance of this generic.
    pub fn instance(self: &Arc<Self>) -> Value {
        Value::Instance {
            class: self.name().clone(),
            generic: Some(Arc::clone(self)),
        }
    }

    #[inline]
    pub fn name(&self) -> &Name {
        self.app.def().name()
    }

    #[inline]
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Whether type arguments were supplied.
    pub fn is_bound(&self) -> bool {
        self.app.args().is_some()
    }

    /// Parameters, bound to their arguments when applied.
    pub fn hints(&self) -> &[TypeVar] {
        &self.hints
    }

    /// Context that method contracts of this generic compile under.
    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    /// Whether an instance of `self` may stand where `expected` (with
    /// parameters bound to `expected_hints`) is declared.
    ///
    /// Origins must be nominally compatible and in the same bound state with
    /// the same parameter count. Each parameter that differs must have a
    /// constraint compatible with the expected one.
    pub(crate) fn matches(
        &self,
        expected: &GenericApplication,
        expected_hints: &[TypeVar],
        hierarchy: &Hierarchy,
        variance: Variance,
    ) -> bool {
        let origin = Descriptor::named(self.name().clone());
        let expected_origin = Descriptor::named(expected.def().name().clone());
        if !compatible(hierarchy, &origin, &expected_origin, variance) {
            return false;
        }
        if self.is_bound() != expected.args().is_some() || self.hints.len() != expected_hints.len() {
            return false;
        }
        self.hints.iter().zip(expected_hints).all(|(mine, theirs)| {
            mine == theirs || {
                let theirs = Descriptor::type_var(theirs.clone());
                mine.effective_constraints()
                    .iter()
                    .any(|constraint| compatible(hierarchy, constraint, &theirs, variance))
            }
        })
    }
}

impl PartialEq for GenericSignature {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor == other.descriptor
    }
}

impl fmt::Debug for GenericSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericSignature")
            .field("descriptor", &self.descriptor.to_string())
            .field("hints", &self.hints)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
