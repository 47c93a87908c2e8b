//! Type descriptors: the declarative schema a contract is compiled from.
//!
//! A `Descriptor` is a closed set of shapes. Composite shapes own their
//! children; shapes that are referenced from many places (type variables,
//! records, generic applications) sit behind an `Arc` so cloning a descriptor
//! never deep-copies them.
//!
//! Constructors that can violate an invariant return
//! `Result<_, DefinitionError>`:
//! - a union has at least two distinct members (nested unions are flattened)
//! - a type variable never has exactly one constraint, and a bound must be one
//!   of its constraints when both are given
//! - record field names are unique
//! - a generic definition has parameters and is applied to exactly that many
//!   arguments

mod format;

use std::sync::Arc;

use crate::{well_known, DefinitionError, Name};

/// Declarative description of an expected shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Descriptor {
    /// Matches every value.
    Any,
    /// Matches only `None`.
    NoneType,
    /// A nominal type, built-in or registered in the hierarchy.
    Primitive(Name),
    /// At least one member must match.
    Union(Vec<Descriptor>),
    /// One concrete type per validation pass.
    TypeVar(Arc<TypeVar>),
    /// Fixed arity, or `variadic` with exactly one element descriptor.
    Tuple {
        elements: Vec<Descriptor>,
        variadic: bool,
    },
    /// Named record whose fields are checked by name.
    Record(Arc<RecordDescriptor>),
    /// Homogeneous list.
    Sequence(Box<Descriptor>),
    /// Homogeneous set.
    SetOf(Box<Descriptor>),
    /// Homogeneous dictionary.
    Mapping {
        key: Box<Descriptor>,
        value: Box<Descriptor>,
    },
    /// A callable with positional parameters and a result.
    Callable {
        params: CallableParams,
        result: Box<Descriptor>,
    },
    /// A user-defined generic, optionally applied to type arguments.
    Generic(Arc<GenericApplication>),
    /// A name resolved lazily against caller-supplied scopes.
    ForwardRef(ForwardRef),
}

/// Parameter list of a callable descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CallableParams {
    /// `...`: any arity.
    Any,
    /// Exactly these positional parameters.
    Exact(Vec<Descriptor>),
}

impl Descriptor {
    /// A nominal type by name.
    pub fn named(name: impl Into<Name>) -> Self {
        Descriptor::Primitive(name.into())
    }

    pub fn int() -> Self {
        Descriptor::named(well_known::INT)
    }

    pub fn float() -> Self {
        Descriptor::named(well_known::FLOAT)
    }

    pub fn complex() -> Self {
        Descriptor::named(well_known::COMPLEX)
    }

    pub fn bool() -> Self {
        Descriptor::named(well_known::BOOL)
    }

    pub fn str() -> Self {
        Descriptor::named(well_known::STR)
    }

    pub fn bytes() -> Self {
        Descriptor::named(well_known::BYTES)
    }

    /// Build a union, flattening nested unions and dropping duplicates.
    pub fn union(members: impl IntoIterator<Item = Descriptor>) -> Result<Self, DefinitionError> {
        let mut flat: Vec<Descriptor> = Vec::new();
        for member in members {
            match member {
                Descriptor::Union(inner) => {
                    for nested in inner {
                        push_unique(&mut flat, nested);
                    }
                }
                other => push_unique(&mut flat, other),
            }
        }
        if flat.len() < 2 {
            return Err(DefinitionError::DegenerateUnion { found: flat.len() });
        }
        Ok(Descriptor::Union(flat))
    }

    /// `Union[inner, None]`.
    pub fn optional(inner: Descriptor) -> Result<Self, DefinitionError> {
        Descriptor::union([inner, Descriptor::NoneType])
    }

    /// Fixed-arity tuple.
    pub fn tuple(elements: impl IntoIterator<Item = Descriptor>) -> Self {
        Descriptor::Tuple {
            elements: elements.into_iter().collect(),
            variadic: false,
        }
    }

    /// `Tuple[element, ...]`.
    pub fn variadic_tuple(element: Descriptor) -> Self {
        Descriptor::Tuple {
            elements: vec![element],
            variadic: true,
        }
    }

    pub fn list(element: Descriptor) -> Self {
        Descriptor::Sequence(Box::new(element))
    }

    pub fn set(element: Descriptor) -> Self {
        Descriptor::SetOf(Box::new(element))
    }

    pub fn dict(key: Descriptor, value: Descriptor) -> Self {
        Descriptor::Mapping {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    /// `Callable[[params...], result]`.
    pub fn callable(params: impl IntoIterator<Item = Descriptor>, result: Descriptor) -> Self {
        Descriptor::Callable {
            params: CallableParams::Exact(params.into_iter().collect()),
            result: Box::new(result),
        }
    }

    /// `Callable[..., result]`.
    pub fn callable_any_arity(result: Descriptor) -> Self {
        Descriptor::Callable {
            params: CallableParams::Any,
            result: Box::new(result),
        }
    }

    /// Bare `Callable`: any arity, any result.
    pub fn bare_callable() -> Self {
        Descriptor::callable_any_arity(Descriptor::Any)
    }

    pub fn type_var(var: TypeVar) -> Self {
        Descriptor::TypeVar(Arc::new(var))
    }

    pub fn record(record: RecordDescriptor) -> Self {
        Descriptor::Record(Arc::new(record))
    }

    /// Apply a generic definition, or leave it unapplied with `None`.
    pub fn generic(
        def: Arc<GenericDef>,
        args: Option<Vec<Descriptor>>,
    ) -> Result<Self, DefinitionError> {
        GenericApplication::new(def, args).map(|app| Descriptor::Generic(Arc::new(app)))
    }

    /// An unresolved reference to `name`.
    pub fn forward(name: impl Into<Name>) -> Self {
        Descriptor::ForwardRef(ForwardRef {
            name: name.into(),
            resolved: None,
        })
    }

    /// A reference to `name` whose target is already known.
    pub fn forward_resolved(name: impl Into<Name>, target: Descriptor) -> Self {
        Descriptor::ForwardRef(ForwardRef {
            name: name.into(),
            resolved: Some(Box::new(target)),
        })
    }

    #[inline]
    pub fn is_any(&self) -> bool {
        matches!(self, Descriptor::Any)
    }

    /// Name of the nominal family this shape belongs to, if it has one.
    ///
    /// Unions, type variables, forward references and `Any` have none.
    pub fn origin_name(&self) -> Option<Name> {
        match self {
            Descriptor::Primitive(name) => Some(name.clone()),
            Descriptor::NoneType => Some(Name::new(well_known::NONE)),
            Descriptor::Tuple { .. } => Some(Name::new(well_known::TUPLE)),
            Descriptor::Sequence(_) => Some(Name::new(well_known::LIST)),
            Descriptor::SetOf(_) => Some(Name::new(well_known::SET)),
            Descriptor::Mapping { .. } => Some(Name::new(well_known::DICT)),
            Descriptor::Callable { .. } => Some(Name::new(well_known::FUNCTION)),
            Descriptor::Record(record) => Some(record.name.clone()),
            Descriptor::Generic(app) => Some(app.def.name.clone()),
            Descriptor::Any
            | Descriptor::Union(_)
            | Descriptor::TypeVar(_)
            | Descriptor::ForwardRef(_) => None,
        }
    }
}

fn push_unique(members: &mut Vec<Descriptor>, candidate: Descriptor) {
    if !members.contains(&candidate) {
        members.push(candidate);
    }
}

/// A type variable.
///
/// Its effective constraint set is the bound when one is present, otherwise
/// the declared constraints; empty means unconstrained.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeVar {
    name: Name,
    constraints: Vec<Descriptor>,
    bound: Option<Descriptor>,
    covariant: bool,
    contravariant: bool,
}

impl TypeVar {
    /// An unconstrained, invariant type variable.
    pub fn new(name: impl Into<Name>) -> Self {
        TypeVar {
            name: name.into(),
            constraints: Vec::new(),
            bound: None,
            covariant: false,
            contravariant: false,
        }
    }

    /// A type variable restricted to one of `constraints`.
    pub fn constrained(
        name: impl Into<Name>,
        constraints: impl IntoIterator<Item = Descriptor>,
    ) -> Result<Self, DefinitionError> {
        let mut var = TypeVar::new(name);
        var.constraints = constraints.into_iter().collect();
        if var.constraints.len() == 1 {
            return Err(DefinitionError::SingleConstraint { name: var.name });
        }
        Ok(var)
    }

    /// Attach an upper bound. With constraints present, the bound must be
    /// one of them.
    pub fn with_bound(mut self, bound: Descriptor) -> Result<Self, DefinitionError> {
        if !self.constraints.is_empty() && !self.constraints.contains(&bound) {
            return Err(DefinitionError::BoundContradictsConstraints {
                name: self.name,
                bound: bound.to_string(),
            });
        }
        self.bound = Some(bound);
        Ok(self)
    }

    #[must_use]
    pub fn covariant(mut self) -> Self {
        self.covariant = true;
        self
    }

    #[must_use]
    pub fn contravariant(mut self) -> Self {
        self.contravariant = true;
        self
    }

    /// Copy of this variable bound to `bound`, bypassing the constraint
    /// check. Used when a generic parameter is applied to an argument that
    /// was already validated against it.
    #[must_use]
    pub fn bound_to(&self, bound: Descriptor) -> Self {
        TypeVar {
            bound: Some(bound),
            ..self.clone()
        }
    }

    /// Copy with every nested descriptor passed through `f`.
    #[must_use]
    pub fn map_descriptors(&self, mut f: impl FnMut(&Descriptor) -> Descriptor) -> Self {
        TypeVar {
            name: self.name.clone(),
            constraints: self.constraints.iter().map(&mut f).collect(),
            bound: self.bound.as_ref().map(&mut f),
            covariant: self.covariant,
            contravariant: self.contravariant,
        }
    }

    /// Reorder constraints with `compare`, leaving everything else intact.
    pub fn sort_constraints_by(
        &mut self,
        compare: impl FnMut(&Descriptor, &Descriptor) -> std::cmp::Ordering,
    ) {
        self.constraints.sort_by(compare);
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    #[inline]
    pub fn constraints(&self) -> &[Descriptor] {
        &self.constraints
    }

    #[inline]
    pub fn bound(&self) -> Option<&Descriptor> {
        self.bound.as_ref()
    }

    #[inline]
    pub fn is_covariant(&self) -> bool {
        self.covariant
    }

    #[inline]
    pub fn is_contravariant(&self) -> bool {
        self.contravariant
    }

    /// The bound if present, else the declared constraints.
    pub fn effective_constraints(&self) -> &[Descriptor] {
        match &self.bound {
            Some(bound) => std::slice::from_ref(bound),
            None => &self.constraints,
        }
    }

    /// Display prefix: `*` bivariant, `+` covariant, `-` contravariant,
    /// `~` invariant.
    pub fn variance_prefix(&self) -> char {
        match (self.covariant, self.contravariant) {
            (true, true) => '*',
            (true, false) => '+',
            (false, true) => '-',
            (false, false) => '~',
        }
    }
}

/// A named record with an ordered set of typed fields.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordDescriptor {
    name: Name,
    fields: Vec<(Name, Descriptor)>,
}

impl RecordDescriptor {
    pub fn new(
        name: impl Into<Name>,
        fields: impl IntoIterator<Item = (Name, Descriptor)>,
    ) -> Result<Self, DefinitionError> {
        let name = name.into();
        let mut collected: Vec<(Name, Descriptor)> = Vec::new();
        for (field, descriptor) in fields {
            if collected.iter().any(|(existing, _)| *existing == field) {
                return Err(DefinitionError::DuplicateField {
                    record: name,
                    field,
                });
            }
            collected.push((field, descriptor));
        }
        Ok(RecordDescriptor {
            name,
            fields: collected,
        })
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    #[inline]
    pub fn fields(&self) -> &[(Name, Descriptor)] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Descriptor> {
        self.fields
            .iter()
            .find(|(field, _)| field.as_str() == name)
            .map(|(_, descriptor)| descriptor)
    }
}

/// A user-defined generic: a nominal origin with type parameters.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GenericDef {
    name: Name,
    params: Vec<TypeVar>,
}

impl GenericDef {
    pub fn new(
        name: impl Into<Name>,
        params: impl IntoIterator<Item = TypeVar>,
    ) -> Result<Self, DefinitionError> {
        let name = name.into();
        let params: Vec<TypeVar> = params.into_iter().collect();
        if params.is_empty() {
            return Err(DefinitionError::GenericWithoutParameters { name });
        }
        Ok(GenericDef { name, params })
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    #[inline]
    pub fn params(&self) -> &[TypeVar] {
        &self.params
    }
}

/// A generic definition, applied to arguments or left open.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GenericApplication {
    def: Arc<GenericDef>,
    args: Option<Vec<Descriptor>>,
}

impl GenericApplication {
    /// Apply `def` to `args`, or leave it open with `None`.
    pub fn new(def: Arc<GenericDef>, args: Option<Vec<Descriptor>>) -> Result<Self, DefinitionError> {
        if let Some(args) = &args {
            if args.len() != def.params.len() {
                return Err(DefinitionError::GenericArity {
                    name: def.name.clone(),
                    expected: def.params.len(),
                    found: args.len(),
                });
            }
        }
        Ok(GenericApplication { def, args })
    }

    #[inline]
    pub fn def(&self) -> &Arc<GenericDef> {
        &self.def
    }

    #[inline]
    pub fn args(&self) -> Option<&[Descriptor]> {
        self.args.as_deref()
    }

    /// Copy with every argument passed through `f`.
    #[must_use]
    pub fn map_args(&self, f: impl FnMut(&Descriptor) -> Descriptor) -> Self {
        GenericApplication {
            def: Arc::clone(&self.def),
            args: self.args.as_ref().map(|args| args.iter().map(f).collect()),
        }
    }
}

/// A self-referential or not-yet-declared name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ForwardRef {
    pub name: Name,
    pub resolved: Option<Box<Descriptor>>,
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
