//! Behavioral properties of compiled contracts.
//!
//! Each test pins one guarantee of the evaluator: primitive identity,
//! reset idempotence, union order independence, single binding of type
//! variables, tuple arity rules, the variance matrix and termination on
//! self-referential shapes.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use vet_check::{
    record_contract, Arguments, BindingContext, Config, ConfigUpdate, Mode, Scope, Settings,
    SharedConfig, Value,
};
use vet_ir::{Descriptor, Name, RecordDescriptor, TypeVar};
use vet_types::Hierarchy;

fn settings_with(config: &SharedConfig, hierarchy: Arc<Hierarchy>) -> Settings {
    Settings::new(Arc::clone(config), hierarchy)
}

fn settings() -> Settings {
    settings_with(&Config::shared(), Arc::new(Hierarchy::with_builtins()))
}

fn slot(descriptor: Descriptor, settings: Settings) -> BindingContext {
    BindingContext::new([(Name::new("x"), descriptor)], settings, None).unwrap()
}

fn primitives() -> Vec<(Descriptor, Value)> {
    vec![
        (Descriptor::int(), Value::Int(7)),
        (Descriptor::float(), Value::Float(0.5)),
        (Descriptor::str(), Value::str("s")),
        (Descriptor::bool(), Value::Bool(true)),
        (Descriptor::NoneType, Value::None),
    ]
}

proptest! {
    #[test]
    fn primitives_match_only_themselves(expected in 0usize..5, actual in 0usize..5) {
        let table = primitives();
        let mut ctx = slot(table[expected].0.clone(), settings());
        let valid = ctx.validate("x", table[actual].1.clone()).unwrap();
        prop_assert_eq!(valid, expected == actual);
    }

    #[test]
    fn union_order_does_not_change_outcome(
        members in Just(vec![
            Descriptor::int(),
            Descriptor::str(),
            Descriptor::NoneType,
            Descriptor::list(Descriptor::int()),
        ]).prop_shuffle(),
        pick in 0usize..5,
    ) {
        let values = [
            Value::Int(1),
            Value::str("a"),
            Value::None,
            Value::list(vec![Value::Int(1)]),
            Value::Float(1.5),
        ];
        let reference = Descriptor::union([
            Descriptor::int(),
            Descriptor::str(),
            Descriptor::NoneType,
            Descriptor::list(Descriptor::int()),
        ]).unwrap();
        let shuffled = Descriptor::union(members).unwrap();

        let mut a = slot(reference, settings());
        let mut b = slot(shuffled, settings());
        let left = a.evaluate("x", values[pick].clone()).unwrap();
        let right = b.evaluate("x", values[pick].clone()).unwrap();
        prop_assert_eq!(left.valid, right.valid);
        prop_assert_eq!(left.valid, pick < 4);
    }
}

#[test]
fn reset_then_revalidate_is_idempotent() {
    let t = Descriptor::type_var(TypeVar::new("T"));
    let mut ctx = slot(Descriptor::dict(Descriptor::str(), t), settings());
    let value = Value::dict([
        (Value::str("a"), Value::Int(1)),
        (Value::str("b"), Value::str("two")),
    ]);
    let first = ctx.evaluate("x", value.clone()).unwrap();
    ctx.reset();
    let second = ctx.evaluate("x", value).unwrap();
    assert_eq!(first, second);
    assert!(!first.valid);
    assert_eq!(first.actual_shape, "Dict[str, Union[int, str]]");
}

#[test]
fn type_variable_binds_to_first_match() {
    let t = Descriptor::type_var(TypeVar::new("T"));
    let mut ctx = slot(Descriptor::tuple([t.clone(), t]), settings());

    assert!(!ctx
        .validate("x", Value::tuple(vec![Value::Int(1), Value::str("a")]))
        .unwrap());
    ctx.reset();

    let pair = Value::tuple(vec![Value::Int(1), Value::Int(2)]);
    let result = ctx.evaluate("x", pair.clone()).unwrap();
    assert!(result.valid);
    assert_eq!(result.value, pair);
    assert_eq!(ctx.binding("T"), Some(Descriptor::int()));
}

#[test]
fn variadic_and_fixed_tuples() {
    let tuple = |items: Vec<Value>| Value::tuple(items);
    let mut variadic = slot(Descriptor::variadic_tuple(Descriptor::int()), settings());
    for (value, expected) in [
        (tuple(vec![]), true),
        (tuple(vec![Value::Int(1), Value::Int(2), Value::Int(3)]), true),
        (tuple(vec![Value::Int(1), Value::str("a")]), false),
    ] {
        variadic.reset();
        assert_eq!(variadic.validate("x", value).unwrap(), expected);
    }

    let mut fixed = slot(
        Descriptor::tuple([Descriptor::int(), Descriptor::int(), Descriptor::int()]),
        settings(),
    );
    let short = fixed
        .evaluate("x", tuple(vec![Value::Int(1), Value::Int(2)]))
        .unwrap();
    fixed.reset();
    let wrong = fixed
        .evaluate("x", tuple(vec![Value::Int(1), Value::Int(2), Value::str("a")]))
        .unwrap();
    fixed.reset();
    let long = fixed
        .evaluate(
            "x",
            tuple(vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]),
        )
        .unwrap();

    assert!(!short.valid && !wrong.valid && !long.valid);
    assert_eq!(short.actual_shape, "Tuple[int, int]");
    assert_eq!(wrong.actual_shape, "Tuple[int, int, str]");
    assert_eq!(long.actual_shape, "Tuple[int, int, int, int]");

    fixed.reset();
    let none = fixed.evaluate("x", Value::None).unwrap();
    assert_eq!(none.actual_shape, "None");
}

#[test]
fn variance_matrix() {
    let hierarchy = Arc::new(Hierarchy::with_builtins());
    hierarchy.register("Animal", []).unwrap();
    hierarchy.register("Pet", [Name::new("Animal")]).unwrap();
    let config = Config::shared();

    // (actual, expected)
    let pet_as_animal = (Value::instance("Pet"), Descriptor::named("Animal"));
    let animal_as_pet = (Value::instance("Animal"), Descriptor::named("Pet"));
    let check = |pair: &(Value, Descriptor)| {
        let mut ctx = slot(pair.1.clone(), settings_with(&config, Arc::clone(&hierarchy)));
        ctx.validate("x", pair.0.clone()).unwrap()
    };

    for (mode, pet_ok, animal_ok) in [
        (Mode::Invariant, false, false),
        (Mode::Covariant, true, false),
        (Mode::Contravariant, false, true),
        (Mode::Bivariant, true, true),
    ] {
        config
            .write()
            .apply(ConfigUpdate {
                mode: Some(mode),
                ..ConfigUpdate::default()
            })
            .unwrap();
        assert_eq!(check(&pet_as_animal), pet_ok, "{mode:?} Pet as Animal");
        assert_eq!(check(&animal_as_pet), animal_ok, "{mode:?} Animal as Pet");
        let mut same = slot(Descriptor::named("Pet"), settings_with(&config, Arc::clone(&hierarchy)));
        assert!(same.validate("x", Value::instance("Pet")).unwrap());
    }
}

fn linked_list() -> Descriptor {
    Descriptor::record(
        RecordDescriptor::new(
            "Node",
            [
                (Name::new("value"), Descriptor::int()),
                (
                    Name::new("next"),
                    Descriptor::optional(Descriptor::forward("Node")).unwrap(),
                ),
            ],
        )
        .unwrap(),
    )
}

fn chain(depth: usize, last: Value) -> Value {
    let mut node = Value::record(
        "Node",
        [(Name::new("value"), last), (Name::new("next"), Value::None)],
    );
    for i in 0..depth {
        node = Value::record(
            "Node",
            [
                (Name::new("value"), Value::Int(i64::try_from(i).unwrap())),
                (Name::new("next"), node),
            ],
        );
    }
    node
}

#[test]
fn self_referential_records_terminate() {
    let mut ctx = slot(Descriptor::forward("Node"), settings());
    ctx.set_scope(Scope::new().with_global("Node", linked_list()));
    assert!(ctx.validate("x", chain(1_500, Value::Int(0))).unwrap());

    ctx.reset();
    let result = ctx.evaluate("x", chain(3, Value::str("end"))).unwrap();
    assert!(!result.valid);
    assert!(result.actual_shape.starts_with("Node with incorrect arguments: value -> int, next -> Node"));
}

#[test]
fn very_long_chains_validate() {
    let mut ctx = slot(Descriptor::forward("Node"), settings());
    ctx.set_scope(Scope::new().with_global("Node", linked_list()));
    let result = ctx.evaluate("x", chain(100_000, Value::Int(0))).unwrap();
    assert!(result.valid);
    assert_eq!(result.actual_shape, "Node");
    assert_eq!(result.value.field("value"), Some(&Value::Int(99_999)));
}

#[test]
fn record_scenario() {
    let record = Arc::new(
        RecordDescriptor::new(
            "Pair",
            [
                (Name::new("a"), Descriptor::int()),
                (
                    Name::new("b"),
                    Descriptor::union([Descriptor::str(), Descriptor::NoneType]).unwrap(),
                ),
            ],
        )
        .unwrap(),
    );
    let constructor = record_contract(&record, settings()).unwrap();

    let ok = constructor
        .construct(Arguments::new().with_named("a", Value::Int(5)).with_named("b", Value::None))
        .unwrap();
    assert_eq!(
        ok,
        Value::record("Pair", [(Name::new("a"), Value::Int(5)), (Name::new("b"), Value::None)])
    );

    let err = constructor
        .construct(Arguments::new().with_named("a", Value::str("x")).with_named("b", Value::None))
        .unwrap_err();
    let failure = &err.as_validation().unwrap().failures[0];
    assert_eq!(failure.slot.as_str(), "a");
    assert_eq!(failure.expected, Descriptor::int());
    assert_eq!(failure.actual, "str");

    let mut ctx = slot(Descriptor::Record(Arc::clone(&record)), settings());
    let result = ctx
        .evaluate(
            "x",
            Value::record("Pair", [(Name::new("a"), Value::str("x")), (Name::new("b"), Value::None)]),
        )
        .unwrap();
    assert_eq!(result.actual_shape, "Pair with incorrect arguments: a -> str, b -> None");
}
