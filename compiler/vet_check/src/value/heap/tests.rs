use pretty_assertions::assert_eq;

use super::Heap;

#[test]
fn clones_share_the_allocation() {
    let first = Heap::new(vec![1, 2, 3]);
    let second = first.clone();
    assert!(first.ptr_eq(&second));
    assert_eq!(*first, *second);
}

#[test]
fn equality_compares_contents() {
    let a = Heap::new("same".to_string());
    let b = Heap::new("same".to_string());
    assert!(!a.ptr_eq(&b));
    assert_eq!(a, b);
    assert_ne!(a, Heap::new("other".to_string()));
}

#[test]
fn only_a_sole_owner_gets_mutable_access() {
    let mut only = Heap::new(vec![1]);
    assert!(only.get_mut().is_some());
    let _shared = only.clone();
    assert!(only.get_mut().is_none());
}
