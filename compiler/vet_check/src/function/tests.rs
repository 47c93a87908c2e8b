use std::sync::Arc;

use pretty_assertions::assert_eq;
use vet_ir::Descriptor;
use vet_types::Hierarchy;

use super::FunctionValue;
use crate::{Arguments, Config, Settings, Signature, Value};

fn double() -> FunctionValue {
    FunctionValue::new(
        "double",
        Signature::new().param("n", Descriptor::int()).returns(Descriptor::int()),
        |args| match args.positional.first() {
            Some(Value::Int(n)) => Value::Int(n * 2),
            _ => Value::None,
        },
    )
}

#[test]
fn calls_go_through_the_contract() {
    let settings = Settings::new(Config::shared(), Arc::new(Hierarchy::with_builtins()));
    let f = double();
    assert_eq!(
        f.call_with(&settings, Arguments::positional([Value::Int(4)])).unwrap(),
        Value::Int(8)
    );
    let err = f
        .call_with(&settings, Arguments::positional([Value::str("4")]))
        .unwrap_err();
    assert!(err.as_validation().is_some());
}

#[test]
fn contract_is_compiled_once() {
    let settings = Settings::new(Config::shared(), Arc::new(Hierarchy::with_builtins()));
    let f = double();
    let first = f.contract(&settings).unwrap().signature_descriptor();
    assert_eq!(first.to_string(), "Callable[[int], int]");
    assert!(std::ptr::eq(
        f.contract(&settings).unwrap(),
        f.contract(&settings).unwrap()
    ));
}

#[test]
fn equality_is_identity() {
    let f = double();
    assert_eq!(f, f.clone());
    assert_ne!(f, double());
}
