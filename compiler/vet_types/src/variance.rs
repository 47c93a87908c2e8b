//! Variance checking between descriptors.
//!
//! `compatible(actual, expected, variance)` answers whether a value whose
//! shape is `actual` may stand where `expected` is declared. Rules apply in
//! priority order:
//!
//! 1. `expected` is `Any`: always compatible.
//! 2. `expected` is a type variable: its own flags replace the caller's
//!    variance, and `actual` must satisfy one of its effective constraints
//!    (none means `Any`).
//! 3. `expected` is a union: `actual` equals the union or invariantly
//!    matches one member.
//! 4. Otherwise invariant mode needs identical shapes, covariant mode needs
//!    `expected` to be an ancestor-or-self of `actual`, contravariant the
//!    reverse, bivariant either direction. Subclass hooks registered on
//!    either side are consulted before the hierarchy walk.
//!
//! Both sides are canonicalized first, so unions and constraint lists that
//! differ only in member order compare equal.

use std::cmp::Ordering;
use std::sync::Arc;

use vet_ir::{ensure_sufficient_stack, well_known, CallableParams, Descriptor, ForwardRef};

use crate::Hierarchy;

/// Direction(s) in which subtyping is allowed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Variance {
    pub covariant: bool,
    pub contravariant: bool,
}

impl Variance {
    pub const INVARIANT: Variance = Variance {
        covariant: false,
        contravariant: false,
    };
    pub const COVARIANT: Variance = Variance {
        covariant: true,
        contravariant: false,
    };
    pub const CONTRAVARIANT: Variance = Variance {
        covariant: false,
        contravariant: true,
    };
    pub const BIVARIANT: Variance = Variance {
        covariant: true,
        contravariant: true,
    };

    /// Both flags OR'd together.
    #[must_use]
    pub fn either(self, other: Variance) -> Variance {
        Variance {
            covariant: self.covariant || other.covariant,
            contravariant: self.contravariant || other.contravariant,
        }
    }

    #[inline]
    pub fn is_invariant(self) -> bool {
        !self.covariant && !self.contravariant
    }
}

/// Total order used to canonicalize unions and constraint lists.
fn by_description(a: &Descriptor, b: &Descriptor) -> Ordering {
    a.to_string().cmp(&b.to_string())
}

/// Rewrite a descriptor into canonical form.
///
/// Bare container names become their structured forms (`tuple` becomes
/// `Tuple[Any, ...]`, `list` becomes `List[Any]` and so on), `None` becomes
/// the none type, and union members and type-variable constraints are sorted
/// by their description.
pub fn canonicalize(descriptor: &Descriptor) -> Descriptor {
    ensure_sufficient_stack(|| match descriptor {
        Descriptor::Primitive(name) => match name.as_str() {
            well_known::TUPLE => Descriptor::variadic_tuple(Descriptor::Any),
            well_known::LIST => Descriptor::list(Descriptor::Any),
            well_known::SET => Descriptor::set(Descriptor::Any),
            well_known::DICT => Descriptor::dict(Descriptor::Any, Descriptor::Any),
            well_known::FUNCTION => Descriptor::bare_callable(),
            well_known::NONE => Descriptor::NoneType,
            _ => descriptor.clone(),
        },
        Descriptor::Any | Descriptor::NoneType => descriptor.clone(),
        Descriptor::Union(members) => {
            let mut members: Vec<Descriptor> = members.iter().map(canonicalize).collect();
            members.sort_by(by_description);
            members.dedup();
            // Aliasing can collapse members (`list` and `List[Any]`).
            if members.len() == 1 {
                members.pop().unwrap_or(Descriptor::Any)
            } else {
                Descriptor::Union(members)
            }
        }
        Descriptor::TypeVar(var) => {
            let mut var = var.map_descriptors(canonicalize);
            var.sort_constraints_by(by_description);
            Descriptor::TypeVar(Arc::new(var))
        }
        Descriptor::Tuple { elements, variadic } => Descriptor::Tuple {
            elements: elements.iter().map(canonicalize).collect(),
            variadic: *variadic,
        },
        Descriptor::Record(_) => descriptor.clone(),
        Descriptor::Sequence(element) => Descriptor::list(canonicalize(element)),
        Descriptor::SetOf(element) => Descriptor::set(canonicalize(element)),
        Descriptor::Mapping { key, value } => {
            Descriptor::dict(canonicalize(key), canonicalize(value))
        }
        Descriptor::Callable { params, result } => Descriptor::Callable {
            params: match params {
                CallableParams::Any => CallableParams::Any,
                CallableParams::Exact(params) => {
                    CallableParams::Exact(params.iter().map(canonicalize).collect())
                }
            },
            result: Box::new(canonicalize(result)),
        },
        Descriptor::Generic(app) => Descriptor::Generic(Arc::new(app.map_args(canonicalize))),
        Descriptor::ForwardRef(forward) => match &forward.resolved {
            Some(target) => canonicalize(target),
            None => Descriptor::ForwardRef(ForwardRef {
                name: forward.name.clone(),
                resolved: None,
            }),
        },
    })
}

/// Whether `actual` may stand where `expected` is declared.
pub fn compatible(
    hierarchy: &Hierarchy,
    actual: &Descriptor,
    expected: &Descriptor,
    variance: Variance,
) -> bool {
    let actual = canonicalize(actual);
    let expected = canonicalize(expected);
    let result = check(hierarchy, &actual, &expected, variance);
    tracing::trace!(%actual, %expected, ?variance, result, "variance check");
    result
}

/// `compatible` over already-canonical descriptors.
pub fn compatible_canonical(
    hierarchy: &Hierarchy,
    actual: &Descriptor,
    expected: &Descriptor,
    variance: Variance,
) -> bool {
    check(hierarchy, actual, expected, variance)
}

fn check(hierarchy: &Hierarchy, actual: &Descriptor, expected: &Descriptor, variance: Variance) -> bool {
    ensure_sufficient_stack(|| match expected {
        Descriptor::Any => true,
        Descriptor::TypeVar(var) => {
            let own = Variance {
                covariant: var.is_covariant(),
                contravariant: var.is_contravariant(),
            };
            let constraints = var.effective_constraints();
            if constraints.is_empty() {
                return true;
            }
            constraints
                .iter()
                .any(|constraint| check(hierarchy, actual, constraint, own))
        }
        Descriptor::Union(members) => {
            actual == expected
                || members
                    .iter()
                    .any(|member| check(hierarchy, actual, member, Variance::INVARIANT))
        }
        _ if variance.is_invariant() => actual == expected,
        _ => {
            if let Some(decided) = subclass_hooks(hierarchy, actual, expected, variance) {
                return decided;
            }
            directional(hierarchy, actual, expected, variance)
        }
    })
}

/// Ask the registered hooks. Covariant mode asks `expected` about `actual`;
/// contravariant mode asks `actual` about `expected`.
///
/// Returns `Some(true)` if any hook accepted, `Some(false)` if hooks answered
/// and none accepted, `None` when no hook had an opinion.
fn subclass_hooks(
    hierarchy: &Hierarchy,
    actual: &Descriptor,
    expected: &Descriptor,
    variance: Variance,
) -> Option<bool> {
    let mut answered = false;
    let mut ask = |owner: &Descriptor, other: &Descriptor| -> bool {
        let Some(hook) = owner.origin_name().and_then(|name| hierarchy.hook(name.as_str())) else {
            return false;
        };
        match hook(other) {
            Some(result) => {
                answered = true;
                result
            }
            None => false,
        }
    };
    let mut accepted = false;
    if variance.covariant {
        accepted |= ask(expected, actual);
    }
    if variance.contravariant {
        accepted |= ask(actual, expected);
    }
    if accepted {
        Some(true)
    } else if answered {
        Some(false)
    } else {
        None
    }
}

/// Covariant / contravariant comparison once the special cases are out of
/// the way.
fn directional(
    hierarchy: &Hierarchy,
    actual: &Descriptor,
    expected: &Descriptor,
    variance: Variance,
) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        // Every member of an actual union has to fit.
        (Descriptor::Union(members), _) => members
            .iter()
            .all(|member| check(hierarchy, member, expected, variance)),
        (Descriptor::Sequence(a), Descriptor::Sequence(e))
        | (Descriptor::SetOf(a), Descriptor::SetOf(e)) => check(hierarchy, a, e, variance),
        (
            Descriptor::Mapping { key: ak, value: av },
            Descriptor::Mapping { key: ek, value: ev },
        ) => check(hierarchy, ak, ek, variance) && check(hierarchy, av, ev, variance),
        (
            Descriptor::Tuple {
                elements: a,
                variadic: av,
            },
            Descriptor::Tuple {
                elements: e,
                variadic: ev,
            },
        ) => match (*av, *ev) {
            (false, false) | (true, true) => {
                a.len() == e.len()
                    && a.iter()
                        .zip(e)
                        .all(|(a, e)| check(hierarchy, a, e, variance))
            }
            // A fixed tuple fits a homogeneous variadic one element by element.
            (false, true) => e
                .first()
                .is_some_and(|e| a.iter().all(|a| check(hierarchy, a, e, variance))),
            (true, false) => false,
        },
        (
            Descriptor::Callable {
                params: ap,
                result: ar,
            },
            Descriptor::Callable {
                params: ep,
                result: er,
            },
        ) => {
            let params_fit = match (ap, ep) {
                (_, CallableParams::Any) => true,
                (CallableParams::Any, CallableParams::Exact(_)) => false,
                (CallableParams::Exact(a), CallableParams::Exact(e)) => {
                    a.len() == e.len()
                        && a.iter()
                            .zip(e)
                            .all(|(a, e)| check(hierarchy, a, e, variance))
                }
            };
            params_fit && check(hierarchy, ar, er, variance)
        }
        (Descriptor::Generic(a), Descriptor::Generic(e)) => {
            if !nominal(hierarchy, a.def().name().as_str(), e.def().name().as_str(), variance) {
                return false;
            }
            match (a.args(), e.args()) {
                (_, None) => true,
                (None, Some(_)) => false,
                (Some(a), Some(e)) => {
                    a.len() == e.len()
                        && a.iter()
                            .zip(e)
                            .all(|(a, e)| check(hierarchy, a, e, variance))
                }
            }
        }
        // Mismatched families (or two nominal leaves) compare by origin.
        _ => match (actual.origin_name(), expected.origin_name()) {
            (Some(a), Some(e)) if !is_structured(actual) || !is_structured(expected) => {
                nominal(hierarchy, a.as_str(), e.as_str(), variance)
            }
            _ => false,
        },
    }
}

/// Structured shapes carry element descriptors that the origin name alone
/// would ignore.
fn is_structured(descriptor: &Descriptor) -> bool {
    matches!(
        descriptor,
        Descriptor::Tuple { .. }
            | Descriptor::Sequence(_)
            | Descriptor::SetOf(_)
            | Descriptor::Mapping { .. }
            | Descriptor::Callable { .. }
            | Descriptor::Generic(_)
    )
}

fn nominal(hierarchy: &Hierarchy, actual: &str, expected: &str, variance: Variance) -> bool {
    (variance.covariant && hierarchy.is_subclass(actual, expected))
        || (variance.contravariant && hierarchy.is_subclass(expected, actual))
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
