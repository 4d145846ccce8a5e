//! Open-generic registrations: one family registration serving every closed
//! instantiation.

use std::sync::Arc;

use tundra_di::{
    ConstructorSpec, DiError, Lifetime, Resolver, ServiceContainer, TypeDescriptor,
};

struct Holder<T> {
    value: T,
}

fn register_holder<T>(container: &ServiceContainer, seed: fn() -> T)
where
    T: Send + Sync + 'static,
{
    container.register_type(
        TypeDescriptor::of::<Holder<T>>()
            .constructor(ConstructorSpec::new(vec![], move |_| Ok(Holder { value: seed() })))
            .generic_family("Holder")
            .build(),
    );
}

#[test]
fn one_registration_serves_every_closed_type() {
    let container = ServiceContainer::new();
    register_holder::<u32>(&container, || 7);
    register_holder::<String>(&container, || "generic".to_string());
    container.register_open_generic("Holder", Lifetime::Singleton).unwrap();

    let ints = container.get::<Holder<u32>>().unwrap();
    let strings = container.get::<Holder<String>>().unwrap();
    assert_eq!(ints.value, 7);
    assert_eq!(strings.value, "generic");

    // Each closed type gets its own cached singleton.
    assert!(Arc::ptr_eq(&ints, &container.get::<Holder<u32>>().unwrap()));
    assert!(Arc::ptr_eq(&strings, &container.get::<Holder<String>>().unwrap()));
    assert_eq!(container.descriptor_count(), 2);
    container.dispose().unwrap();
}

#[test]
fn closing_materializes_a_descriptor_per_identity() {
    let container = ServiceContainer::new();
    register_holder::<u32>(&container, || 1);
    container.register_open_generic("Holder", Lifetime::Transient).unwrap();

    assert!(!container.is_registered::<Holder<u32>>());
    assert_eq!(container.descriptor_count(), 0);

    let a = container.get::<Holder<u32>>().unwrap();
    let b = container.get::<Holder<u32>>().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));

    // The closed descriptor is now a first-class registration.
    assert!(container.is_registered::<Holder<u32>>());
    assert_eq!(container.descriptor_count(), 1);
    container.dispose().unwrap();
}

#[test]
fn untagged_types_do_not_close_against_the_family() {
    struct Plain;

    let container = ServiceContainer::new();
    container.register_type(
        TypeDescriptor::of::<Plain>()
            .constructor(ConstructorSpec::new(vec![], |_| Ok(Plain)))
            .build(),
    );
    container.register_open_generic("Holder", Lifetime::Transient).unwrap();

    let err = container.get::<Plain>().err().unwrap();
    assert!(matches!(err, DiError::NotRegistered(_)));
}

#[test]
fn keyed_family_closes_only_under_its_key() {
    let container = ServiceContainer::new();
    register_holder::<u32>(&container, || 42);
    container
        .register_open_generic_keyed("Holder", "fast", Lifetime::Singleton)
        .unwrap();

    let err = container.get::<Holder<u32>>().err().unwrap();
    assert!(matches!(err, DiError::NotRegistered(_)));

    let keyed = container.get_keyed::<Holder<u32>>("fast").unwrap();
    assert_eq!(keyed.value, 42);
    container.dispose().unwrap();
}
