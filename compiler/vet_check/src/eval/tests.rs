use std::sync::Arc;

use pretty_assertions::assert_eq;
use vet_ir::{Descriptor, Name, TypeVar};
use vet_types::Hierarchy;

use crate::{BindingContext, Config, ContractError, Scope, Settings, Value};

fn context(descriptor: Descriptor) -> BindingContext {
    let settings = Settings::new(Config::shared(), Arc::new(Hierarchy::with_builtins()));
    BindingContext::new([(Name::new("x"), descriptor)], settings, None).unwrap()
}

fn t() -> Descriptor {
    Descriptor::type_var(TypeVar::new("T"))
}

#[test]
fn type_variable_binds_once_per_pass() {
    let mut ctx = context(Descriptor::tuple([t(), t()]));
    let mixed = ctx
        .evaluate("x", Value::tuple(vec![Value::Int(1), Value::str("a")]))
        .unwrap();
    assert!(!mixed.valid);
    assert_eq!(mixed.actual_shape, "Tuple[int, str]");

    ctx.reset();
    let same = ctx
        .evaluate("x", Value::tuple(vec![Value::Int(1), Value::Int(2)]))
        .unwrap();
    assert!(same.valid);
    assert_eq!(same.value, Value::tuple(vec![Value::Int(1), Value::Int(2)]));
    assert_eq!(ctx.binding("T"), Some(Descriptor::int()));
}

#[test]
fn constrained_type_variable_commits_to_first_alternative() {
    let var = TypeVar::constrained("S", [Descriptor::int(), Descriptor::str()]).unwrap();
    let s = Descriptor::type_var(var);
    let mut ctx = context(Descriptor::list(s));
    assert!(ctx.validate("x", Value::list(vec![Value::str("a"), Value::str("b")])).unwrap());
    assert_eq!(ctx.binding("S"), Some(Descriptor::str()));

    ctx.reset();
    let result = ctx
        .evaluate("x", Value::list(vec![Value::str("a"), Value::Int(1)]))
        .unwrap();
    assert!(!result.valid);
    assert_eq!(result.actual_shape, "List[int, str]");
}

#[test]
fn reset_makes_passes_independent() {
    let mut ctx = context(Descriptor::list(t()));
    let first = ctx.evaluate("x", Value::list(vec![Value::Int(1)])).unwrap();
    ctx.reset();
    let again = ctx.evaluate("x", Value::list(vec![Value::Int(1)])).unwrap();
    assert_eq!(first, again);

    ctx.reset();
    assert!(ctx.validate("x", Value::list(vec![Value::str("s")])).unwrap());
}

#[test]
fn deep_values_do_not_recurse() {
    let tree = Descriptor::forward_resolved(
        "Tree",
        Descriptor::list(Descriptor::union([Descriptor::int(), Descriptor::forward("Tree")]).unwrap()),
    );
    let mut ctx = context(tree);
    let mut value = Value::list(vec![Value::Int(0)]);
    for _ in 0..2_000 {
        value = Value::list(vec![value, Value::Int(1)]);
    }
    assert!(ctx.validate("x", value).unwrap());
}

#[test]
fn forward_references_resolve_from_scope_once() {
    let mut ctx = context(Descriptor::list(Descriptor::forward("Id")));
    let err = ctx.validate("x", Value::list(vec![Value::Int(1)])).unwrap_err();
    assert_eq!(
        err,
        ContractError::UnresolvableForwardReference { name: Name::new("Id") }
    );

    ctx.reset();
    ctx.set_scope(Scope::new().with_global("Id", Descriptor::int()));
    assert!(ctx.validate("x", Value::list(vec![Value::Int(1)])).unwrap());

    // Resolved for good: no scope needed after a reset.
    ctx.reset();
    assert!(!ctx.validate("x", Value::list(vec![Value::str("a")])).unwrap());
}

#[test]
fn empty_list_checks_no_elements() {
    let mut ctx = context(Descriptor::list(Descriptor::int()));
    let result = ctx.evaluate("x", Value::list(vec![])).unwrap();
    assert!(result.valid);
    assert_eq!(result.actual_shape, "List");
}

#[test]
fn large_sets_are_rebuilt_in_one_pass() {
    let mut ctx = context(Descriptor::set(Descriptor::int()));
    let value = Value::set_of_distinct((0..50_000).map(Value::Int).collect());
    let result = ctx.evaluate("x", value.clone()).unwrap();
    assert!(result.valid);
    assert_eq!(result.actual_shape, "Set[int]");
    match &result.value {
        Value::Set(items) => assert_eq!(items.len(), 50_000),
        other => panic!("expected a set, found {other}"),
    }
    assert!(result.value == value);
}
