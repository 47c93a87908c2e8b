//! Matcher nodes: the compiled form of a descriptor.
//!
//! Nodes live in a per-context arena and refer to each other through
//! `NodeRef`s. A reference may point into an enclosing context (`up > 0`),
//! which is how a method contract shares the type variables of its generic
//! owner.
//!
//! Each node implements the stages the evaluator drives, in order:
//! `preprocess`, `self_check`, `plan` (fan the value out to children),
//! child evaluation, `describe` and `reduce`. Container nodes keep going when
//! their own check fails so the reported shape can say why; every other node
//! stops there.
//!
//! `original_children` is the template fixed at compile time. `children` is
//! the live list a pass may narrow (a type variable committing to one
//! alternative) and `reset` restores it.

use std::sync::Arc;

use bitflags::bitflags;
use smallvec::SmallVec;
use vet_ir::{
    CallableParams, Descriptor, GenericApplication, Name, RecordDescriptor, TypeVar,
};
use vet_types::{canonicalize, compatible_canonical, Variance};

use crate::error::ArgumentError;
use crate::{ContractError, Settings, Value};

/// Index of a node in its context's arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(u32);

impl NodeId {
    #[inline]
    pub(crate) fn new(index: usize) -> Self {
        NodeId(u32::try_from(index).unwrap_or(u32::MAX))
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node reference, relative to the context that holds it.
///
/// `up` counts how many parent links to follow before looking `id` up.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeRef {
    pub(crate) up: u32,
    pub(crate) id: NodeId,
}

impl NodeRef {
    #[inline]
    pub(crate) fn local(id: NodeId) -> Self {
        NodeRef { up: 0, id }
    }

    /// The same node as seen from `levels` contexts further down.
    #[inline]
    #[must_use]
    pub(crate) fn lifted(self, levels: u32) -> Self {
        NodeRef {
            up: self.up + levels,
            id: self.id,
        }
    }
}

bitflags! {
    /// How a node combines its children.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub(crate) struct NodeFlags: u8 {
        /// Children are visited even when the node's own check fails.
        const CONTAINER = 1 << 0;
        /// One passing child is enough; otherwise all must pass.
        const CHOICE = 1 << 1;
        /// Stop at the first passing child and commit to it.
        const FIRST_MATCH = 1 << 2;
    }
}

/// Collection families with one replicated element template.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum CollectionKind {
    List,
    Set,
}

#[derive(Clone, Debug)]
pub(crate) enum NodeKind {
    /// Compares the value's nominal descriptor with `Node::descriptor`.
    Leaf,
    Collection(CollectionKind),
    Union,
    TypeVar { name: Name },
    Tuple { variadic: bool },
    Record { record: Arc<RecordDescriptor> },
    Mapping,
    Callable,
    Generic {
        expected: Arc<GenericApplication>,
        hints: Vec<TypeVar>,
    },
    /// Resolved on first use; the target becomes the only child.
    ForwardRef { name: Name },
}

#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) flags: NodeFlags,
    /// Canonical descriptor this node was compiled from.
    pub(crate) descriptor: Descriptor,
    /// Variance added on top of the configured mode.
    pub(crate) variance: Variance,
    pub(crate) original_children: SmallVec<[NodeRef; 4]>,
    pub(crate) children: SmallVec<[NodeRef; 4]>,
    /// A type variable committed to one alternative, or an `Any` leaf
    /// pinned to the first type it saw.
    pub(crate) bound: bool,
    /// Nominal descriptor of the last value this node accepted.
    pub(crate) in_shape: Option<Descriptor>,
}

/// Outcome of evaluating a value against a node.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationResult {
    pub valid: bool,
    /// The coerced output on success, the input on failure.
    pub value: Value,
    /// Description of the shape actually found.
    pub actual_shape: String,
}

impl ValidationResult {
    pub(crate) fn failed(value: Value, actual_shape: String) -> Self {
        ValidationResult {
            valid: false,
            value,
            actual_shape,
        }
    }
}

/// Result of a node's own check, before children.
#[derive(Clone, Debug)]
pub(crate) struct SelfCheck {
    pub(crate) valid: bool,
    pub(crate) shape: String,
}

/// One unit of child work planned by a node.
#[derive(Clone, Debug)]
pub(crate) enum Job {
    Eval { child: NodeRef, value: Value },
    /// An element with no child to check it against. Always fails.
    Extra { value: Value },
}

/// Per-pass inputs shared by every node.
pub(crate) struct PassEnv<'a> {
    pub(crate) settings: &'a Settings,
    pub(crate) mode: Variance,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, flags: NodeFlags, descriptor: Descriptor) -> Self {
        Node {
            kind,
            flags,
            descriptor,
            variance: Variance::INVARIANT,
            original_children: SmallVec::new(),
            children: SmallVec::new(),
            bound: false,
            in_shape: None,
        }
    }

    pub(crate) fn add_child(&mut self, child: NodeRef) {
        self.children.push(child);
        self.original_children.push(child);
    }

    pub(crate) fn reset(&mut self) {
        self.bound = false;
        self.in_shape = None;
        self.children = self.original_children.clone();
    }

    #[inline]
    pub(crate) fn is_container(&self) -> bool {
        self.flags.contains(NodeFlags::CONTAINER)
    }

    #[inline]
    pub(crate) fn is_choice(&self) -> bool {
        self.flags.contains(NodeFlags::CHOICE)
    }

    #[inline]
    pub(crate) fn is_first_match(&self) -> bool {
        self.flags.contains(NodeFlags::FIRST_MATCH)
    }

    /// Whether this is an `Any` leaf, which pins itself to the first type it
    /// accepts once its type variable commits.
    pub(crate) fn is_any_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf) && self.descriptor.is_any()
    }

    fn variance(&self, env: &PassEnv<'_>) -> Variance {
        env.mode.either(self.variance)
    }

    /// Stage 1: normalize the candidate.
    ///
    /// Functions get their contract created here so their signature can be
    /// compared. Records with the right name but the wrong field set are a
    /// caller error.
    pub(crate) fn preprocess(&self, value: Value, env: &PassEnv<'_>) -> Result<Value, ContractError> {
        match (&self.kind, &value) {
            (NodeKind::Callable, Value::Function(function)) => {
                function.contract(env.settings)?;
            }
            (NodeKind::Record { record }, Value::Record { name, fields }) if name == record.name() => {
                let declared = record.fields();
                let matches = fields.len() == declared.len()
                    && declared
                        .iter()
                        .all(|(field, _)| fields.iter().any(|(name, _)| name == field));
                if !matches {
                    return Err(ContractError::Arguments {
                        callee: record.name().clone(),
                        reason: ArgumentError::RecordFields {
                            expected: declared.iter().map(|(field, _)| field.clone()).collect(),
                            found: fields.iter().map(|(field, _)| field.clone()).collect(),
                        },
                    });
                }
            }
            _ => {}
        }
        Ok(value)
    }

    /// Stage 2: does the value's own shape match, ignoring children?
    pub(crate) fn self_check(&self, value: &Value, env: &PassEnv<'_>) -> Result<SelfCheck, ContractError> {
        let hierarchy = env.settings.hierarchy();
        let variance = self.variance(env);
        let nominal_fits = |expected: &Descriptor| {
            compatible_canonical(hierarchy, &canonicalize(&value.nominal()), expected, variance)
        };
        let shape = value.shape_name();

        let valid = match &self.kind {
            NodeKind::Leaf => {
                let expected = match (&self.in_shape, self.bound) {
                    (Some(pinned), true) => pinned,
                    _ => &self.descriptor,
                };
                nominal_fits(expected)
            }
            NodeKind::Collection(CollectionKind::List) => {
                nominal_fits(&Descriptor::list(Descriptor::Any))
            }
            NodeKind::Collection(CollectionKind::Set) => {
                nominal_fits(&Descriptor::set(Descriptor::Any))
            }
            NodeKind::Union | NodeKind::TypeVar { .. } | NodeKind::ForwardRef { .. } => true,
            NodeKind::Tuple { variadic } => match value {
                Value::Tuple(items) => *variadic || items.len() == self.children.len(),
                _ => false,
            },
            NodeKind::Record { record } => {
                matches!(value, Value::Record { name, .. } if name == record.name())
            }
            NodeKind::Mapping => nominal_fits(&Descriptor::dict(Descriptor::Any, Descriptor::Any)),
            NodeKind::Callable => {
                if let Value::Function(function) = value {
                    let signature = function.contract(env.settings)?.signature_descriptor();
                    return Ok(SelfCheck {
                        valid: callable_matches(&self.descriptor, &canonicalize(&signature)),
                        shape: signature.to_string(),
                    });
                }
                false
            }
            NodeKind::Generic { expected, hints } => match value {
                Value::Instance {
                    generic: Some(signature),
                    ..
                } => signature.matches(expected, hints, hierarchy, variance),
                _ => false,
            },
        };
        Ok(SelfCheck { valid, shape })
    }

    /// Stage 3: fan the value out into child work.
    ///
    /// Fixed-arity children follow an asymmetric policy: with fewer elements
    /// than children only the present elements are checked; with more, every
    /// child is checked and each surplus element becomes a failing extra.
    pub(crate) fn plan(&self, value: &Value, own_valid: bool) -> Vec<Job> {
        let eval = |child: NodeRef, value: &Value| Job::Eval {
            child,
            value: value.clone(),
        };
        match (&self.kind, value) {
            (NodeKind::Collection(_), Value::List(items) | Value::Set(items)) => {
                match self.children.first() {
                    Some(&template) => items.iter().map(|item| eval(template, item)).collect(),
                    None => Vec::new(),
                }
            }
            (NodeKind::Union | NodeKind::TypeVar { .. } | NodeKind::ForwardRef { .. }, _) => {
                self.children.iter().map(|&child| eval(child, value)).collect()
            }
            (NodeKind::Tuple { variadic: true }, Value::Tuple(items)) => match self.children.first() {
                Some(&template) => items.iter().map(|item| eval(template, item)).collect(),
                None => Vec::new(),
            },
            (NodeKind::Tuple { variadic: false }, Value::Tuple(items)) => {
                let mut jobs: Vec<Job> = self
                    .children
                    .iter()
                    .zip(items.iter())
                    .map(|(&child, item)| eval(child, item))
                    .collect();
                jobs.extend(
                    items
                        .iter()
                        .skip(self.children.len())
                        .map(|item| Job::Extra { value: item.clone() }),
                );
                jobs
            }
            (NodeKind::Record { record }, Value::Record { fields, .. }) if own_valid => record
                .fields()
                .iter()
                .zip(&self.children)
                .filter_map(|((field, _), &child)| {
                    fields
                        .iter()
                        .find(|(name, _)| name == field)
                        .map(|(_, item)| eval(child, item))
                })
                .collect(),
            (NodeKind::Mapping, Value::Dict(pairs)) if own_valid => {
                let (Some(&key), Some(&val)) = (self.children.first(), self.children.get(1)) else {
                    return Vec::new();
                };
                pairs
                    .iter()
                    .flat_map(|(k, v)| [eval(key, k), eval(val, v)])
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    /// Stage 4b: describe the shape actually found.
    pub(crate) fn describe(
        &self,
        input: &Value,
        own: &SelfCheck,
        results: &[ValidationResult],
        valid: bool,
    ) -> String {
        match &self.kind {
            NodeKind::Leaf | NodeKind::Callable | NodeKind::Generic { .. } => own.shape.clone(),
            NodeKind::Collection(_) => {
                if results.is_empty() {
                    own.shape.clone()
                } else {
                    format!("{}[{}]", own.shape, distinct_sorted(results.iter()).join(", "))
                }
            }
            NodeKind::Union => {
                if valid {
                    first_valid_shape(results).unwrap_or_else(|| own.shape.clone())
                } else {
                    most_descriptive(results).unwrap_or_else(|| own.shape.clone())
                }
            }
            NodeKind::TypeVar { .. } => {
                let chosen = if valid {
                    first_valid_shape(results)
                } else {
                    results.last().map(|result| result.actual_shape.clone())
                };
                chosen.unwrap_or_else(|| own.shape.clone())
            }
            NodeKind::Tuple { .. } => {
                if input.is_none() || results.is_empty() {
                    own.shape.clone()
                } else {
                    let shapes: Vec<&str> = results.iter().map(|r| r.actual_shape.as_str()).collect();
                    format!("{}[{}]", own.shape, shapes.join(", "))
                }
            }
            NodeKind::Record { record } => {
                if !own.valid || valid {
                    return own.shape.clone();
                }
                let parts: Vec<String> = record
                    .fields()
                    .iter()
                    .zip(results)
                    .map(|((field, _), result)| format!("{field} -> {}", result.actual_shape))
                    .collect();
                format!("{} with incorrect arguments: {}", record.name(), parts.join(", "))
            }
            NodeKind::Mapping => {
                if results.is_empty() {
                    return own.shape.clone();
                }
                let keys = distinct_sorted(results.iter().step_by(2));
                let values = distinct_sorted(results.iter().skip(1).step_by(2));
                format!("{}[{}, {}]", own.shape, union_of(&keys), union_of(&values))
            }
            NodeKind::ForwardRef { .. } => results
                .first()
                .map_or_else(|| own.shape.clone(), |result| result.actual_shape.clone()),
        }
    }

    /// Stage 5: rebuild the output from the children's outputs.
    pub(crate) fn reduce(&self, input: Value, results: Vec<ValidationResult>) -> Value {
        let outputs = || results.iter().map(|result| result.value.clone());
        match &self.kind {
            NodeKind::Leaf | NodeKind::Callable | NodeKind::Generic { .. } => input,
            NodeKind::Collection(CollectionKind::List) => Value::list(outputs()),
            // Elements of a set were distinct on the way in and stay so.
            NodeKind::Collection(CollectionKind::Set) => Value::set_of_distinct(outputs().collect()),
            NodeKind::Union | NodeKind::TypeVar { .. } | NodeKind::ForwardRef { .. } => results
                .into_iter()
                .find(|result| result.valid)
                .map_or(input, |result| result.value),
            NodeKind::Tuple { .. } => Value::tuple(outputs()),
            NodeKind::Record { record } => Value::record(
                record.name().clone(),
                record
                    .fields()
                    .iter()
                    .map(|(field, _)| field.clone())
                    .zip(outputs()),
            ),
            NodeKind::Mapping => {
                let mut pairs = Vec::with_capacity(results.len() / 2);
                let mut outputs = outputs();
                while let (Some(key), Some(value)) = (outputs.next(), outputs.next()) {
                    pairs.push((key, value));
                }
                Value::dict(pairs)
            }
        }
    }
}

fn first_valid_shape(results: &[ValidationResult]) -> Option<String> {
    results
        .iter()
        .find(|result| result.valid)
        .map(|result| result.actual_shape.clone())
}

/// The longest distinct shape; ties go to the lexicographically smallest.
fn most_descriptive(results: &[ValidationResult]) -> Option<String> {
    results
        .iter()
        .map(|result| result.actual_shape.as_str())
        .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
        .map(str::to_string)
}

fn distinct_sorted<'a>(results: impl Iterator<Item = &'a ValidationResult>) -> Vec<String> {
    let mut shapes: Vec<String> = results.map(|result| result.actual_shape.clone()).collect();
    shapes.sort();
    shapes.dedup();
    shapes
}

fn union_of(shapes: &[String]) -> String {
    match shapes {
        [single] => single.clone(),
        _ => format!("Union[{}]", shapes.join(", ")),
    }
}

/// Whether a candidate's signature satisfies an expected callable.
///
/// Parameters compare positionally by identity (an expected `Any` accepts
/// anything); `...` compares only results; a bare callable accepts any
/// signature.
pub(crate) fn callable_matches(expected: &Descriptor, actual: &Descriptor) -> bool {
    let (
        Descriptor::Callable {
            params: expected_params,
            result: expected_result,
        },
        Descriptor::Callable {
            params: actual_params,
            result: actual_result,
        },
    ) = (expected, actual)
    else {
        return false;
    };
    let fits = |expected: &Descriptor, actual: &Descriptor| expected.is_any() || expected == actual;
    let result_fits = fits(expected_result, actual_result);
    match (expected_params, actual_params) {
        (CallableParams::Any, _) => result_fits,
        (CallableParams::Exact(_), CallableParams::Any) => false,
        (CallableParams::Exact(expected), CallableParams::Exact(actual)) => {
            expected.len() == actual.len()
                && expected.iter().zip(actual).all(|(e, a)| fits(e, a))
                && result_fits
        }
    }
}
