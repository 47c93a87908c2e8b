use std::sync::Arc;

use pretty_assertions::assert_eq;

use super::*;

#[test]
fn union_flattens_and_dedups() {
    let inner = Descriptor::union([Descriptor::int(), Descriptor::str()]).unwrap();
    let outer = Descriptor::union([inner, Descriptor::int(), Descriptor::NoneType]).unwrap();

    assert_eq!(
        outer,
        Descriptor::Union(vec![
            Descriptor::int(),
            Descriptor::str(),
            Descriptor::NoneType
        ])
    );
}

#[test]
fn union_needs_two_members() {
    let err = Descriptor::union([Descriptor::int(), Descriptor::int()]).unwrap_err();
    assert_eq!(err, DefinitionError::DegenerateUnion { found: 1 });

    let err = Descriptor::union([]).unwrap_err();
    assert_eq!(err, DefinitionError::DegenerateUnion { found: 0 });
}

#[test]
fn optional_adds_none() {
    let opt = Descriptor::optional(Descriptor::str()).unwrap();
    assert_eq!(opt.to_string(), "Union[str, None]");
}

#[test]
fn single_constraint_rejected() {
    let err = TypeVar::constrained("T", [Descriptor::int()]).unwrap_err();
    assert_eq!(
        err,
        DefinitionError::SingleConstraint {
            name: Name::new("T")
        }
    );
}

#[test]
fn bound_must_be_a_constraint() {
    let var = TypeVar::constrained("T", [Descriptor::int(), Descriptor::str()]).unwrap();
    let err = var.with_bound(Descriptor::float()).unwrap_err();
    assert!(matches!(
        err,
        DefinitionError::BoundContradictsConstraints { ref bound, .. } if bound == "float"
    ));

    let var = TypeVar::constrained("T", [Descriptor::int(), Descriptor::str()])
        .unwrap()
        .with_bound(Descriptor::int())
        .unwrap();
    assert_eq!(var.effective_constraints(), &[Descriptor::int()]);
}

#[test]
fn effective_constraints_without_bound() {
    let free = TypeVar::new("T");
    assert!(free.effective_constraints().is_empty());

    let constrained = TypeVar::constrained("T", [Descriptor::int(), Descriptor::str()]).unwrap();
    assert_eq!(constrained.effective_constraints().len(), 2);

    let bound = TypeVar::new("T").with_bound(Descriptor::float()).unwrap();
    assert_eq!(bound.effective_constraints(), &[Descriptor::float()]);
}

#[test]
fn bound_to_skips_constraint_check() {
    let var = TypeVar::constrained("T", [Descriptor::int(), Descriptor::str()]).unwrap();
    let bound = var.bound_to(Descriptor::bool());
    assert_eq!(bound.bound(), Some(&Descriptor::bool()));
    assert_eq!(bound.constraints(), var.constraints());
}

#[test]
fn variance_prefixes() {
    assert_eq!(TypeVar::new("T").to_string(), "~T");
    assert_eq!(TypeVar::new("T").covariant().to_string(), "+T");
    assert_eq!(TypeVar::new("T").contravariant().to_string(), "-T");
    assert_eq!(
        TypeVar::new("T").covariant().contravariant().to_string(),
        "*T"
    );
}

#[test]
fn record_rejects_duplicate_fields() {
    let err = RecordDescriptor::new(
        "Point",
        [
            (Name::new("x"), Descriptor::int()),
            (Name::new("x"), Descriptor::float()),
        ],
    )
    .unwrap_err();
    assert_eq!(
        err,
        DefinitionError::DuplicateField {
            record: Name::new("Point"),
            field: Name::new("x"),
        }
    );
}

#[test]
fn record_field_lookup() {
    let point = RecordDescriptor::new(
        "Point",
        [
            (Name::new("x"), Descriptor::int()),
            (Name::new("y"), Descriptor::float()),
        ],
    )
    .unwrap();
    assert_eq!(point.field("y"), Some(&Descriptor::float()));
    assert_eq!(point.field("z"), None);
}

#[test]
fn generic_definition_needs_params() {
    let err = GenericDef::new("Box", []).unwrap_err();
    assert_eq!(
        err,
        DefinitionError::GenericWithoutParameters {
            name: Name::new("Box")
        }
    );
}

#[test]
fn generic_application_arity() {
    let def = Arc::new(GenericDef::new("Box", [TypeVar::new("T")]).unwrap());
    let err = Descriptor::generic(
        Arc::clone(&def),
        Some(vec![Descriptor::int(), Descriptor::str()]),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        DefinitionError::GenericArity {
            expected: 1,
            found: 2,
            ..
        }
    ));

    let open = Descriptor::generic(Arc::clone(&def), None).unwrap();
    assert_eq!(open.to_string(), "Box");

    let applied = Descriptor::generic(def, Some(vec![Descriptor::int()])).unwrap();
    assert_eq!(applied.to_string(), "Box[int]");
}

#[test]
fn display_structured_shapes() {
    assert_eq!(
        Descriptor::tuple([Descriptor::int(), Descriptor::str()]).to_string(),
        "Tuple[int, str]"
    );
    assert_eq!(
        Descriptor::variadic_tuple(Descriptor::int()).to_string(),
        "Tuple[int, ...]"
    );
    assert_eq!(Descriptor::tuple([]).to_string(), "Tuple[()]");
    assert_eq!(
        Descriptor::dict(Descriptor::str(), Descriptor::list(Descriptor::int())).to_string(),
        "Dict[str, List[int]]"
    );
    assert_eq!(Descriptor::set(Descriptor::Any).to_string(), "Set[Any]");
    assert_eq!(
        Descriptor::callable([Descriptor::int()], Descriptor::NoneType).to_string(),
        "Callable[[int], None]"
    );
    assert_eq!(
        Descriptor::bare_callable().to_string(),
        "Callable[..., Any]"
    );
    assert_eq!(Descriptor::forward("Node").to_string(), "'Node'");
}

#[test]
fn origin_names() {
    assert_eq!(
        Descriptor::list(Descriptor::int()).origin_name(),
        Some(Name::new("list"))
    );
    assert_eq!(Descriptor::NoneType.origin_name(), Some(Name::new("None")));
    assert_eq!(Descriptor::Any.origin_name(), None);
    assert_eq!(
        Descriptor::type_var(TypeVar::new("T")).origin_name(),
        None
    );
}

#[test]
fn deep_nesting_formats() {
    let mut desc = Descriptor::int();
    for _ in 0..2_000 {
        desc = Descriptor::list(desc);
    }
    let text = desc.to_string();
    assert!(text.starts_with("List[List["));
    assert!(text.ends_with("int]]"));
}
