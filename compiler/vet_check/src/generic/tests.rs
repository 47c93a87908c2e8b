use std::sync::Arc;

use pretty_assertions::assert_eq;
use vet_ir::{DefinitionError, Descriptor, GenericDef, TypeVar};
use vet_types::{Hierarchy, Variance};

use super::GenericSignature;
use crate::{Config, ContractError, Settings, Value};

fn settings() -> Settings {
    Settings::new(Config::shared(), Arc::new(Hierarchy::with_builtins()))
}

fn boxed() -> Arc<GenericDef> {
    Arc::new(GenericDef::new("Box", [TypeVar::new("T")]).unwrap())
}

fn numeric() -> Arc<GenericDef> {
    let n = TypeVar::constrained("N", [Descriptor::int(), Descriptor::float()]).unwrap();
    Arc::new(GenericDef::new("Num", [n]).unwrap())
}

#[test]
fn applied_generics_bind_their_parameters() {
    let sig = GenericSignature::new(boxed(), Some(vec![Descriptor::int()]), &settings()).unwrap();
    assert!(sig.is_bound());
    assert_eq!(sig.descriptor().to_string(), "Box[int]");
    assert_eq!(sig.hints()[0].bound(), Some(&Descriptor::int()));
    assert_eq!(sig.instance().shape_name(), "Box[int]");
}

#[test]
fn arguments_must_satisfy_parameters() {
    let err = GenericSignature::new(numeric(), Some(vec![Descriptor::str()]), &settings()).unwrap_err();
    assert_eq!(
        err,
        ContractError::Definition(DefinitionError::GenericArgumentRejected {
            name: "Num".into(),
            param: "N".into(),
            argument: "str".to_string(),
        })
    );
}

#[test]
fn instances_match_on_origin_state_and_parameters() {
    let settings = settings();
    let hierarchy = settings.hierarchy();
    let open = GenericSignature::new(boxed(), None, &settings).unwrap();
    let of_int = open.apply(vec![Descriptor::int()], &settings).unwrap();
    let of_str = open.apply(vec![Descriptor::str()], &settings).unwrap();

    let Descriptor::Generic(expected) = of_int.descriptor() else {
        panic!("not a generic");
    };
    assert!(of_int.matches(expected, of_int.hints(), hierarchy, Variance::INVARIANT));
    assert!(!of_str.matches(expected, of_int.hints(), hierarchy, Variance::INVARIANT));
    assert!(!open.matches(expected, of_int.hints(), hierarchy, Variance::INVARIANT));
}

#[test]
fn instance_values_compare_by_descriptor() {
    let settings = settings();
    let a = GenericSignature::new(boxed(), Some(vec![Descriptor::int()]), &settings).unwrap();
    let b = GenericSignature::new(boxed(), Some(vec![Descriptor::int()]), &settings).unwrap();
    assert_eq!(a.instance(), b.instance());
    assert!(matches!(a.instance(), Value::Instance { generic: Some(_), .. }));
}
