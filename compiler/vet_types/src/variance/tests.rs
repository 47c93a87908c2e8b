use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use vet_ir::{Descriptor, GenericDef, Name, RecordDescriptor, TypeVar};

use super::{canonicalize, compatible, Variance};
use crate::Hierarchy;

fn pets() -> Hierarchy {
    let h = Hierarchy::with_builtins();
    h.register("Animal", []).unwrap();
    h.register("Pet", [Name::new("Animal")]).unwrap();
    h
}

fn named(name: &str) -> Descriptor {
    Descriptor::named(name)
}

#[test]
fn any_accepts_everything() {
    let h = pets();
    for variance in [
        Variance::INVARIANT,
        Variance::COVARIANT,
        Variance::CONTRAVARIANT,
        Variance::BIVARIANT,
    ] {
        assert!(compatible(&h, &named("Pet"), &Descriptor::Any, variance));
        assert!(compatible(
            &h,
            &Descriptor::list(Descriptor::int()),
            &Descriptor::Any,
            variance
        ));
    }
}

#[test]
fn variance_matrix() {
    let h = pets();
    let pet = named("Pet");
    let animal = named("Animal");

    assert!(compatible(&h, &pet, &animal, Variance::COVARIANT));
    assert!(!compatible(&h, &animal, &pet, Variance::COVARIANT));

    assert!(!compatible(&h, &pet, &animal, Variance::CONTRAVARIANT));
    assert!(compatible(&h, &animal, &pet, Variance::CONTRAVARIANT));

    assert!(compatible(&h, &pet, &animal, Variance::BIVARIANT));
    assert!(compatible(&h, &animal, &pet, Variance::BIVARIANT));

    assert!(!compatible(&h, &pet, &animal, Variance::INVARIANT));
    assert!(!compatible(&h, &animal, &pet, Variance::INVARIANT));
    assert!(compatible(&h, &pet, &pet, Variance::INVARIANT));
}

#[test]
fn numeric_tower_under_covariance() {
    let h = Hierarchy::with_builtins();
    assert!(compatible(&h, &Descriptor::int(), &Descriptor::float(), Variance::COVARIANT));
    assert!(!compatible(&h, &Descriptor::bool(), &Descriptor::int(), Variance::COVARIANT));
    assert!(!compatible(&h, &Descriptor::int(), &Descriptor::float(), Variance::INVARIANT));
}

#[test]
fn type_var_uses_its_own_flags() {
    let h = pets();
    let invariant = Descriptor::type_var(
        TypeVar::constrained("T", [named("Animal"), Descriptor::str()]).unwrap(),
    );
    // Caller asks for covariance but the variable is invariant.
    assert!(!compatible(&h, &named("Pet"), &invariant, Variance::COVARIANT));
    assert!(compatible(&h, &named("Animal"), &invariant, Variance::COVARIANT));

    let covariant = Descriptor::type_var(
        TypeVar::constrained("T", [named("Animal"), Descriptor::str()])
            .unwrap()
            .covariant(),
    );
    assert!(compatible(&h, &named("Pet"), &covariant, Variance::INVARIANT));
}

#[test]
fn unconstrained_type_var_is_any() {
    let h = Hierarchy::with_builtins();
    let free = Descriptor::type_var(TypeVar::new("T"));
    assert!(compatible(&h, &Descriptor::str(), &free, Variance::INVARIANT));
}

#[test]
fn bound_collapses_constraints() {
    let h = Hierarchy::with_builtins();
    let bound = Descriptor::type_var(
        TypeVar::constrained("T", [Descriptor::int(), Descriptor::str()])
            .unwrap()
            .with_bound(Descriptor::int())
            .unwrap(),
    );
    assert!(compatible(&h, &Descriptor::int(), &bound, Variance::INVARIANT));
    assert!(!compatible(&h, &Descriptor::str(), &bound, Variance::INVARIANT));
}

#[test]
fn union_members_are_checked_invariantly() {
    let h = pets();
    let union = Descriptor::union([named("Animal"), Descriptor::str()]).unwrap();
    assert!(compatible(&h, &Descriptor::str(), &union, Variance::COVARIANT));
    assert!(!compatible(&h, &named("Pet"), &union, Variance::COVARIANT));
}

#[test]
fn structured_shapes_recurse() {
    let h = Hierarchy::with_builtins();
    let ints = Descriptor::list(Descriptor::int());
    let floats = Descriptor::list(Descriptor::float());
    assert!(compatible(&h, &ints, &floats, Variance::COVARIANT));
    assert!(!compatible(&h, &floats, &ints, Variance::COVARIANT));
    assert!(!compatible(&h, &ints, &floats, Variance::INVARIANT));

    let fixed = Descriptor::tuple([Descriptor::int(), Descriptor::int()]);
    let variadic = Descriptor::variadic_tuple(Descriptor::float());
    assert!(compatible(&h, &fixed, &variadic, Variance::COVARIANT));
    assert!(!compatible(&h, &variadic, &fixed, Variance::COVARIANT));

    assert!(compatible(&h, &ints, &named("object"), Variance::COVARIANT));
    assert!(!compatible(&h, &ints, &Descriptor::set(Descriptor::int()), Variance::BIVARIANT));
}

#[test]
fn bare_container_names_alias_structured_forms() {
    let h = Hierarchy::with_builtins();
    assert_eq!(canonicalize(&named("list")), Descriptor::list(Descriptor::Any));
    assert_eq!(
        canonicalize(&named("tuple")),
        Descriptor::variadic_tuple(Descriptor::Any)
    );
    assert_eq!(canonicalize(&named("None")), Descriptor::NoneType);
    assert!(compatible(
        &h,
        &named("list"),
        &Descriptor::list(Descriptor::Any),
        Variance::INVARIANT
    ));
}

#[test]
fn records_compare_by_name() {
    let h = pets();
    h.register("Point", []).unwrap();
    h.register("Point3", [Name::new("Point")]).unwrap();
    let point = Descriptor::record(
        RecordDescriptor::new("Point", [(Name::new("x"), Descriptor::int())]).unwrap(),
    );
    let point3 = Descriptor::record(
        RecordDescriptor::new(
            "Point3",
            [
                (Name::new("x"), Descriptor::int()),
                (Name::new("z"), Descriptor::int()),
            ],
        )
        .unwrap(),
    );
    assert!(compatible(&h, &point3, &point, Variance::COVARIANT));
    assert!(!compatible(&h, &point3, &point, Variance::INVARIANT));
}

#[test]
fn generics_compare_origin_and_args() {
    let h = Hierarchy::with_builtins();
    h.register("Box", []).unwrap();
    let def = Arc::new(GenericDef::new("Box", [TypeVar::new("T")]).unwrap());
    let of_int = Descriptor::generic(Arc::clone(&def), Some(vec![Descriptor::int()])).unwrap();
    let of_float = Descriptor::generic(Arc::clone(&def), Some(vec![Descriptor::float()])).unwrap();
    let open = Descriptor::generic(def, None).unwrap();

    assert!(compatible(&h, &of_int, &of_float, Variance::COVARIANT));
    assert!(compatible(&h, &of_int, &open, Variance::COVARIANT));
    assert!(!compatible(&h, &open, &of_int, Variance::COVARIANT));
}

#[test]
fn hooks_take_precedence() {
    let h = Hierarchy::with_builtins();
    h.register_with_hook(
        "Sized",
        [],
        Arc::new(|other: &Descriptor| match other {
            Descriptor::Sequence(_) | Descriptor::Primitive(_) => Some(true),
            _ => None,
        }),
    )
    .unwrap();
    h.register_with_hook("Never", [], Arc::new(|_: &Descriptor| Some(false)))
        .unwrap();

    let sized = named("Sized");
    assert!(compatible(&h, &Descriptor::str(), &sized, Variance::COVARIANT));
    assert!(compatible(
        &h,
        &Descriptor::list(Descriptor::int()),
        &sized,
        Variance::COVARIANT
    ));
    // No opinion: falls back to the walk, and `dict` is not below `Sized`.
    assert!(!compatible(
        &h,
        &Descriptor::dict(Descriptor::int(), Descriptor::int()),
        &sized,
        Variance::COVARIANT
    ));
    // Hooks are not consulted in invariant mode.
    assert!(!compatible(&h, &Descriptor::str(), &sized, Variance::INVARIANT));

    // A hook that answers `false` beats the hierarchy.
    h.register("Never2", [Name::new("Never")]).unwrap();
    assert!(!compatible(&h, &named("Never2"), &named("Never"), Variance::COVARIANT));
}

#[test]
fn canonical_union_order() {
    let a = Descriptor::union([Descriptor::str(), Descriptor::int(), Descriptor::NoneType]).unwrap();
    assert_eq!(canonicalize(&a).to_string(), "Union[None, int, str]");
}

#[test]
fn canonical_constraint_order() {
    let var = Descriptor::type_var(
        TypeVar::constrained("T", [Descriptor::str(), Descriptor::bytes()]).unwrap(),
    );
    let Descriptor::TypeVar(canonical) = canonicalize(&var) else {
        panic!("canonicalization changed the variant");
    };
    assert_eq!(canonical.constraints(), &[Descriptor::bytes(), Descriptor::str()]);
}

fn leaf_strategy() -> impl Strategy<Value = Descriptor> {
    prop_oneof![
        Just(Descriptor::int()),
        Just(Descriptor::str()),
        Just(Descriptor::float()),
        Just(Descriptor::NoneType),
        Just(Descriptor::list(Descriptor::int())),
        Just(Descriptor::tuple([Descriptor::int(), Descriptor::str()])),
    ]
}

proptest! {
    #[test]
    fn union_permutations_canonicalize_equal(
        members in prop::collection::vec(leaf_strategy(), 2..6).prop_shuffle(),
        probe in leaf_strategy(),
    ) {
        let h = Hierarchy::with_builtins();
        let mut reversed = members.clone();
        reversed.reverse();
        let (Ok(forward), Ok(backward)) = (
            Descriptor::union(members),
            Descriptor::union(reversed),
        ) else {
            // Duplicates collapsed below two members.
            return Ok(());
        };
        prop_assert_eq!(canonicalize(&forward), canonicalize(&backward));
        for variance in [Variance::INVARIANT, Variance::COVARIANT] {
            prop_assert_eq!(
                compatible(&h, &probe, &forward, variance),
                compatible(&h, &probe, &backward, variance)
            );
        }
    }
}
