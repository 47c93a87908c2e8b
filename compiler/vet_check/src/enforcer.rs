//! Enforcers: a compiled contract for one callable.
//!
//! An `Enforcer` binds call arguments to a `Signature`, validates every typed
//! parameter in one pass, and validates the return value in the same binding
//! context so type variables agree across inputs and output. A `Contract`
//! wraps an enforcer for shared use.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use vet_ir::{Descriptor, Name, RecordDescriptor};

use crate::error::ArgumentError;
use crate::{
    BindingContext, ContractError, Scope, Settings, SharedContext, ValidationFailure, Value,
    RETURN_SLOT,
};

/// How a parameter may be supplied.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// By position or by name.
    Positional,
    /// By name only.
    KeywordOnly,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: Name,
    /// `None` leaves the parameter unchecked.
    pub descriptor: Option<Descriptor>,
    pub kind: ParamKind,
}

/// Parameters and result of a guarded callable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<Param>,
    pub returns: Option<Descriptor>,
    /// Surplus positional arguments are accepted unchecked.
    pub variadic: bool,
}

impl Signature {
    pub fn new() -> Self {
        Signature::default()
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<Name>, descriptor: Descriptor) -> Self {
        self.params.push(Param {
            name: name.into(),
            descriptor: Some(descriptor),
            kind: ParamKind::Positional,
        });
        self
    }

    #[must_use]
    pub fn untyped(mut self, name: impl Into<Name>) -> Self {
        self.params.push(Param {
            name: name.into(),
            descriptor: None,
            kind: ParamKind::Positional,
        });
        self
    }

    #[must_use]
    pub fn keyword(mut self, name: impl Into<Name>, descriptor: Descriptor) -> Self {
        self.params.push(Param {
            name: name.into(),
            descriptor: Some(descriptor),
            kind: ParamKind::KeywordOnly,
        });
        self
    }

    #[must_use]
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    #[must_use]
    pub fn returns(mut self, descriptor: Descriptor) -> Self {
        self.returns = Some(descriptor);
        self
    }

    fn positional(&self) -> impl Iterator<Item = &Param> {
        self.params
            .iter()
            .filter(|param| param.kind == ParamKind::Positional)
    }

    fn keyword_only(&self) -> impl Iterator<Item = &Param> {
        self.params
            .iter()
            .filter(|param| param.kind == ParamKind::KeywordOnly)
    }
}

/// Arguments of one call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arguments {
    pub positional: Vec<Value>,
    pub named: Vec<(Name, Value)>,
}

impl Arguments {
    pub fn new() -> Self {
        Arguments::default()
    }

    pub fn positional(values: impl IntoIterator<Item = Value>) -> Self {
        Arguments {
            positional: values.into_iter().collect(),
            named: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_named(mut self, name: impl Into<Name>, value: Value) -> Self {
        self.named.push((name.into(), value));
        self
    }

    /// Value of a named argument.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.named
            .iter()
            .find(|(key, _)| key.as_str() == name)
            .map(|(_, value)| value)
    }
}

/// Arguments assigned to parameters.
struct Bound {
    /// Parameter name to value.
    values: FxHashMap<Name, Value>,
    /// Surplus positional arguments of a variadic signature.
    extras: Vec<Value>,
}

/// A compiled contract and the state of its current call.
pub struct Enforcer {
    name: Name,
    signature: Signature,
    context: BindingContext,
    settings: Settings,
    callable: OnceCell<Descriptor>,
}

impl Enforcer {
    /// Compile `signature` into a new binding context below `parent`.
    #[tracing::instrument(level = "debug", skip_all, fields(contract = %name.as_ref()))]
    pub fn new(
        name: impl AsRef<str>,
        signature: Signature,
        parent: Option<SharedContext>,
        settings: Settings,
    ) -> Result<Self, ContractError> {
        let slots = signature
            .params
            .iter()
            .filter_map(|param| {
                param
                    .descriptor
                    .clone()
                    .map(|descriptor| (param.name.clone(), descriptor))
            })
            .chain(
                signature
                    .returns
                    .clone()
                    .map(|descriptor| (Name::new(RETURN_SLOT), descriptor)),
            );
        let context = BindingContext::new(slots, settings.clone(), parent)?;
        Ok(Enforcer {
            name: Name::new(name),
            signature,
            context,
            settings,
            callable: OnceCell::new(),
        })
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    #[inline]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn context(&self) -> &BindingContext {
        &self.context
    }

    pub fn reset(&mut self) {
        self.context.reset();
    }

    /// A copy whose binding context and enclosing contexts are all copied.
    #[must_use]
    pub fn detached(&self) -> Self {
        Enforcer {
            context: self.context.detached(),
            ..self.clone()
        }
    }

    pub fn set_scope(&mut self, scope: Scope) {
        self.context.set_scope(scope);
    }

    /// Bind and validate a call's arguments.
    ///
    /// Every typed parameter is checked before failing, so the error lists
    /// all mismatched slots. The returned arguments carry the coerced values.
    #[tracing::instrument(level = "debug", skip_all, fields(contract = %self.name))]
    pub fn validate_inputs(&mut self, args: Arguments) -> Result<Arguments, ContractError> {
        if !self.settings.enabled() {
            return Ok(args);
        }
        let Bound { mut values, extras } = self.bind(args)?;

        for param in &self.signature.params {
            if param.descriptor.is_none() {
                continue;
            }
            if let Some(value) = values.get(&param.name) {
                self.context.validate(param.name.as_str(), value.clone())?;
            }
        }
        let failures: Vec<_> = self
            .context
            .errors()
            .iter()
            .filter(|failure| !failure.is_return())
            .cloned()
            .collect();
        if !failures.is_empty() {
            tracing::debug!(count = failures.len(), "inputs failed validation");
            return Err(ValidationFailure { failures }.into());
        }

        let mut take = |param: &Param| {
            let value = values.remove(&param.name).unwrap_or(Value::None);
            match self.context.output(param.name.as_str()) {
                Some(output) if param.descriptor.is_some() => output.clone(),
                _ => value,
            }
        };
        let mut positional: Vec<Value> = self.signature.positional().map(&mut take).collect();
        positional.extend(extras);
        let named = self
            .signature
            .keyword_only()
            .map(|param| (param.name.clone(), take(param)))
            .collect();
        Ok(Arguments { positional, named })
    }

    /// Validate a return value against the `return` slot.
    #[tracing::instrument(level = "debug", skip_all, fields(contract = %self.name))]
    pub fn validate_outputs(&mut self, value: Value) -> Result<Value, ContractError> {
        if !self.settings.enabled() || !self.context.has_slot(RETURN_SLOT) {
            return Ok(value);
        }
        if self.context.validate(RETURN_SLOT, value.clone())? {
            return Ok(self.context.output(RETURN_SLOT).cloned().unwrap_or(value));
        }
        let failures: Vec<_> = self
            .context
            .errors()
            .iter()
            .filter(|failure| failure.is_return())
            .cloned()
            .collect();
        tracing::debug!("return value failed validation");
        Err(ValidationFailure { failures }.into())
    }

    /// The callable descriptor this contract presents when passed as a value.
    pub fn signature_descriptor(&self) -> Descriptor {
        if !self.settings.enabled() {
            return Descriptor::bare_callable();
        }
        self.callable
            .get_or_init(|| {
                let params: Vec<Descriptor> = self
                    .signature
                    .positional()
                    .map(|param| param.descriptor.clone().unwrap_or(Descriptor::Any))
                    .collect();
                let result = self.signature.returns.clone().unwrap_or(Descriptor::Any);
                if self.signature.variadic && params.is_empty() {
                    Descriptor::callable_any_arity(result)
                } else {
                    Descriptor::callable(params, result)
                }
            })
            .clone()
    }

    /// Assign arguments to parameters the way a call would.
    fn bind(&self, args: Arguments) -> Result<Bound, ContractError> {
        let caller_error = |reason| ContractError::Arguments {
            callee: self.name.clone(),
            reason,
        };
        let positional: Vec<&Param> = self.signature.positional().collect();
        let given = args.positional.len();
        if given > positional.len() && !self.signature.variadic {
            return Err(caller_error(ArgumentError::TooManyPositional {
                expected: positional.len(),
                given,
            }));
        }

        let mut values: FxHashMap<Name, Value> = FxHashMap::default();
        let mut items = args.positional.into_iter();
        for (param, value) in positional.iter().zip(items.by_ref()) {
            values.insert(param.name.clone(), value);
        }
        let extras: Vec<Value> = items.collect();

        for (name, value) in args.named {
            if !self.signature.params.iter().any(|param| param.name == name) {
                return Err(caller_error(ArgumentError::UnexpectedKeyword { name }));
            }
            if values.contains_key(&name) {
                return Err(caller_error(ArgumentError::MultipleValues { name }));
            }
            values.insert(name, value);
        }

        let names = missing(self.signature.positional(), &values);
        if !names.is_empty() {
            return Err(caller_error(ArgumentError::MissingPositional { names }));
        }
        let names = missing(self.signature.keyword_only(), &values);
        if !names.is_empty() {
            return Err(caller_error(ArgumentError::MissingKeyword { names }));
        }
        Ok(Bound { values, extras })
    }
}

fn missing<'p>(params: impl Iterator<Item = &'p Param>, values: &FxHashMap<Name, Value>) -> Vec<Name> {
    params
        .filter(|param| !values.contains_key(&param.name))
        .map(|param| param.name.clone())
        .collect()
}

impl Clone for Enforcer {
    /// Same compiled contract, independent per-call state.
    fn clone(&self) -> Self {
        Enforcer {
            name: self.name.clone(),
            signature: self.signature.clone(),
            context: self.context.clone(),
            settings: self.settings.clone(),
            callable: self.callable.clone(),
        }
    }
}

impl fmt::Debug for Enforcer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enforcer")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Compile a contract from parameter descriptors in declaration order.
pub fn compile_contract(
    name: impl AsRef<str>,
    params: impl IntoIterator<Item = (Name, Descriptor)>,
    returns: Option<Descriptor>,
    parent: Option<SharedContext>,
    settings: Settings,
) -> Result<Enforcer, ContractError> {
    let signature = Signature {
        params: params
            .into_iter()
            .map(|(name, descriptor)| Param {
                name,
                descriptor: Some(descriptor),
                kind: ParamKind::Positional,
            })
            .collect(),
        returns,
        variadic: false,
    };
    Enforcer::new(name, signature, parent, settings)
}

/// A contract shared between callers.
///
/// One caller at a time runs a full pass on the shared enforcer, holding the
/// pass locks of its enclosing contexts until the result is validated. A
/// caller that finds the enforcer or an enclosing context busy (another
/// thread, or a re-entrant call from inside a body) runs on a detached copy
/// of the whole chain instead, so no pass sees another's bindings.
#[derive(Clone)]
pub struct Contract {
    inner: Arc<ContractInner>,
}

struct ContractInner {
    active: Mutex<Enforcer>,
    template: Enforcer,
    signature: Descriptor,
    settings: Settings,
}

impl Contract {
    pub fn new(enforcer: Enforcer) -> Self {
        let signature = enforcer.signature_descriptor();
        let settings = enforcer.settings().clone();
        Contract {
            inner: Arc::new(ContractInner {
                template: enforcer.clone(),
                active: Mutex::new(enforcer),
                signature,
                settings,
            }),
        }
    }

    /// The callable descriptor, without taking the lock.
    pub fn signature_descriptor(&self) -> Descriptor {
        if self.inner.settings.enabled() {
            self.inner.signature.clone()
        } else {
            Descriptor::bare_callable()
        }
    }

    pub fn name(&self) -> &Name {
        self.inner.template.name()
    }

    /// Run one guarded call: reset, validate inputs, run `body`, validate its
    /// result.
    pub fn call(
        &self,
        args: Arguments,
        body: impl FnOnce(Arguments) -> Value,
    ) -> Result<Value, ContractError> {
        self.call_in(Scope::new(), args, body)
    }

    /// [`call`](Self::call) with a scope for forward references.
    pub fn call_in(
        &self,
        scope: Scope,
        args: Arguments,
        body: impl FnOnce(Arguments) -> Value,
    ) -> Result<Value, ContractError> {
        let run = move |enforcer: &mut Enforcer| {
            enforcer.reset();
            enforcer.set_scope(scope);
            let args = enforcer.validate_inputs(args)?;
            enforcer.validate_outputs(body(args))
        };
        if let Some(mut enforcer) = self.inner.active.try_lock() {
            if let Some(_claim) = enforcer.context().claim_ancestors() {
                return run(&mut enforcer);
            }
        }
        tracing::trace!(contract = %self.name(), "contract busy, running on a detached copy");
        let mut enforcer = self.inner.template.detached();
        run(&mut enforcer)
    }
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("name", self.name())
            .field("signature", &self.inner.signature.to_string())
            .finish_non_exhaustive()
    }
}

/// Constructor contract of a record: one positional parameter per field.
#[derive(Clone, Debug)]
pub struct RecordConstructor {
    record: Arc<RecordDescriptor>,
    contract: Contract,
}

impl RecordConstructor {
    /// Build a record value, validating every field.
    pub fn construct(&self, args: Arguments) -> Result<Value, ContractError> {
        let record = Arc::clone(&self.record);
        self.contract.call(args, move |bound| {
            Value::record(
                record.name().clone(),
                record
                    .fields()
                    .iter()
                    .map(|(field, _)| field.clone())
                    .zip(bound.positional),
            )
        })
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }
}

/// The constructor contract for `record`.
pub fn record_contract(
    record: &Arc<RecordDescriptor>,
    settings: Settings,
) -> Result<RecordConstructor, ContractError> {
    let enforcer = compile_contract(
        record.name().as_str(),
        record.fields().iter().cloned(),
        None,
        None,
        settings,
    )?;
    Ok(RecordConstructor {
        record: Arc::clone(record),
        contract: Contract::new(enforcer),
    })
}
