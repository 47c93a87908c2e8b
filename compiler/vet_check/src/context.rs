//! Binding contexts: compiled slots plus per-pass state.
//!
//! A context owns the nodes compiled from its slot descriptors, the type
//! variable bindings made while validating, and the outputs and failures of
//! the current call. Contexts form a parent chain: a method's context points
//! at the context of the generic instance it belongs to, and type variables
//! are shared along that chain.
//!
//! Locks along the chain are always taken child first, then parent.
//!
//! Besides its state lock, every context carries a pass lock. A caller
//! claims the pass locks of a context's ancestors for the length of a whole
//! call, so two calls never bind the same enclosing type variables at once.

use std::sync::Arc;

use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use rustc_hash::FxHashMap;
use vet_ir::{DefinitionError, Descriptor, Name};

use crate::compile::Compiler;
use crate::eval::Evaluator;
use crate::node::{Node, NodeRef, PassEnv, ValidationResult};
use crate::{ContractError, Settings, SlotFailure, Value};

/// A context shared between contracts.
pub type SharedContext = Arc<Mutex<BindingContext>>;

/// Held pass locks of an ancestor chain. Released on drop.
pub(crate) type PassClaim = Vec<ArcMutexGuard<RawMutex, ()>>;

/// Names forward references resolve against, locals first.
#[derive(Clone, Debug, Default)]
pub struct Scope {
    locals: FxHashMap<Name, Descriptor>,
    globals: FxHashMap<Name, Descriptor>,
}

impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }

    #[must_use]
    pub fn with_local(mut self, name: impl Into<Name>, descriptor: Descriptor) -> Self {
        self.locals.insert(name.into(), descriptor);
        self
    }

    #[must_use]
    pub fn with_global(mut self, name: impl Into<Name>, descriptor: Descriptor) -> Self {
        self.globals.insert(name.into(), descriptor);
        self
    }

    pub fn lookup(&self, name: &str) -> Option<&Descriptor> {
        self.locals.get(name).or_else(|| self.globals.get(name))
    }
}

/// Everything a context owns that the compiler and evaluator touch.
#[derive(Debug, Default)]
pub(crate) struct ContextState {
    pub(crate) arena: Vec<Node>,
    pub(crate) roots: FxHashMap<Name, NodeRef>,
    /// Declared slots in declaration order.
    pub(crate) slots: Vec<(Name, Descriptor)>,
    pub(crate) type_vars: FxHashMap<Name, NodeRef>,
    pub(crate) forward_refs: FxHashMap<Name, NodeRef>,
    pub(crate) scope: Scope,
    pub(crate) errors: Vec<SlotFailure>,
    /// Type variable name to the concrete type it committed to.
    pub(crate) bindings: FxHashMap<Name, Descriptor>,
    pub(crate) outputs: FxHashMap<Name, Value>,
}

impl ContextState {
    fn reset(&mut self) {
        for node in &mut self.arena {
            node.reset();
        }
        self.scope = Scope::default();
        self.errors.clear();
        self.bindings.clear();
        self.outputs.clear();
    }

    fn expected(&self, slot: &str) -> Option<&Descriptor> {
        self.slots
            .iter()
            .find(|(name, _)| name.as_str() == slot)
            .map(|(_, descriptor)| descriptor)
    }
}

/// Compiled slots of one contract and the state of its current call.
pub struct BindingContext {
    state: ContextState,
    parent: Option<SharedContext>,
    settings: Settings,
    /// Held by a caller for the length of a call made below this context.
    pass: Arc<Mutex<()>>,
}

impl BindingContext {
    /// Compile `slots` into a new context below `parent`.
    ///
    /// # Errors
    ///
    /// Returns a definition error for a repeated slot name or a malformed
    /// descriptor.
    pub fn new(
        slots: impl IntoIterator<Item = (Name, Descriptor)>,
        settings: Settings,
        parent: Option<SharedContext>,
    ) -> Result<Self, ContractError> {
        let mut context = BindingContext {
            state: ContextState::default(),
            parent,
            settings,
            pass: Arc::default(),
        };
        let hierarchy = Arc::clone(context.settings.shared_hierarchy());
        let slots: Vec<(Name, Descriptor)> = slots.into_iter().collect();
        context.with_levels(|levels| -> Result<(), DefinitionError> {
            let Some((state, above)) = levels.split_first_mut() else {
                return Ok(());
            };
            let ancestors: Vec<&ContextState> = above.iter().map(|level| &**level).collect();
            for (slot, descriptor) in slots {
                if state.roots.contains_key(&slot) {
                    return Err(DefinitionError::DuplicateSlot { slot });
                }
                let root = Compiler::new(state, &ancestors, &hierarchy).compile(&descriptor)?;
                state.roots.insert(slot.clone(), root);
                state.slots.push((slot, descriptor));
            }
            Ok(())
        })?;
        Ok(context)
    }

    pub fn into_shared(self) -> SharedContext {
        Arc::new(Mutex::new(self))
    }

    #[inline]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn parent(&self) -> Option<&SharedContext> {
        self.parent.as_ref()
    }

    pub fn set_scope(&mut self, scope: Scope) {
        self.state.scope = scope;
    }

    /// Declared descriptor of `slot`.
    pub fn expected(&self, slot: &str) -> Option<&Descriptor> {
        self.state.expected(slot)
    }

    pub fn has_slot(&self, slot: &str) -> bool {
        self.state.roots.contains_key(slot)
    }

    /// Validate `value` against `slot`, recording the output or the failure.
    ///
    /// # Errors
    ///
    /// Data mismatches are reported through the returned flag and
    /// [`errors`](Self::errors). Errors are reserved for unknown slots,
    /// caller mistakes and unresolvable forward references.
    pub fn validate(&mut self, slot: &str, value: Value) -> Result<bool, ContractError> {
        self.evaluate(slot, value).map(|result| result.valid)
    }

    /// Like [`validate`](Self::validate), returning the full result.
    pub fn evaluate(&mut self, slot: &str, value: Value) -> Result<ValidationResult, ContractError> {
        let Some(&root) = self.state.roots.get(slot) else {
            return Err(ContractError::UnknownSlot { slot: slot.into() });
        };
        let settings = self.settings.clone();
        let env = PassEnv {
            settings: &settings,
            mode: settings.variance(),
        };
        let result = self.with_levels(|levels| Evaluator::new(levels, &env).run(root, value))?;

        let slot = Name::new(slot);
        if result.valid {
            self.state.outputs.insert(slot, result.value.clone());
        } else {
            tracing::debug!(%slot, actual = %result.actual_shape, "slot failed validation");
            let expected = self
                .state
                .expected(slot.as_str())
                .cloned()
                .unwrap_or(Descriptor::Any);
            self.state.errors.push(SlotFailure {
                slot,
                expected,
                actual: result.actual_shape.clone(),
            });
        }
        Ok(result)
    }

    /// Output of the last successful validation of `slot`.
    pub fn output(&self, slot: &str) -> Option<&Value> {
        self.state.outputs.get(slot)
    }

    /// Failures recorded since the last reset.
    pub fn errors(&self) -> &[SlotFailure] {
        &self.state.errors
    }

    /// What type variable `name` committed to, here or in an enclosing
    /// context.
    pub fn binding(&self, name: &str) -> Option<Descriptor> {
        if let Some(bound) = self.state.bindings.get(name) {
            return Some(bound.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lock().binding(name))
    }

    /// Clear per-pass state here and in every enclosing context.
    pub fn reset(&mut self) {
        self.with_levels(|levels| {
            for level in levels.iter_mut() {
                level.reset();
            }
        });
    }

    /// Claim the pass lock of every enclosing context.
    ///
    /// `None` when one of them is already claimed, by another thread or by a
    /// call further up this one.
    pub(crate) fn claim_ancestors(&self) -> Option<PassClaim> {
        let mut claim = PassClaim::new();
        let mut next = self.parent.clone();
        while let Some(context) = next {
            let (pass, parent) = {
                let guard = context.lock();
                (Arc::clone(&guard.pass), guard.parent.clone())
            };
            claim.push(pass.try_lock_arc()?);
            next = parent;
        }
        Some(claim)
    }

    /// A copy whose enclosing contexts are copied as well.
    ///
    /// A pass on the copy shares no bindings with any other context.
    #[must_use]
    pub fn detached(&self) -> Self {
        let mut copy = self.clone();
        copy.parent = self
            .parent
            .as_ref()
            .map(|parent| parent.lock().detached().into_shared());
        copy
    }

    /// Run `f` over this context's state followed by each ancestor's,
    /// innermost first, holding every lock on the chain.
    fn with_levels<R>(&mut self, f: impl FnOnce(&mut [&mut ContextState]) -> R) -> R {
        let mut guards = Vec::new();
        let mut next = self.parent.clone();
        while let Some(context) = next {
            let guard = context.lock_arc();
            next = guard.parent.clone();
            guards.push(guard);
        }
        let mut levels: Vec<&mut ContextState> = Vec::with_capacity(guards.len() + 1);
        levels.push(&mut self.state);
        levels.extend(guards.iter_mut().map(|guard| &mut guard.state));
        f(&mut levels)
    }
}

impl Clone for BindingContext {
    /// A copy with the same compiled nodes and fresh per-pass state.
    fn clone(&self) -> Self {
        let mut state = ContextState {
            arena: self.state.arena.clone(),
            roots: self.state.roots.clone(),
            slots: self.state.slots.clone(),
            type_vars: self.state.type_vars.clone(),
            forward_refs: self.state.forward_refs.clone(),
            scope: self.state.scope.clone(),
            ..ContextState::default()
        };
        state.reset();
        BindingContext {
            state,
            parent: self.parent.clone(),
            settings: self.settings.clone(),
            pass: Arc::default(),
        }
    }
}

impl std::fmt::Debug for BindingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingContext")
            .field("slots", &self.state.slots)
            .field("nodes", &self.state.arena.len())
            .field("errors", &self.state.errors)
            .field("has_parent", &self.parent.is_some())
            .finish_non_exhaustive()
    }
}
