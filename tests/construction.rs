//! The construction algorithm: constructor selection, value-type fallbacks,
//! and failure modes.

use std::sync::Arc;

use tundra_di::{
    ConstructorSpec, DiError, Lifetime, ParamSpec, Resolver, ServiceContainer, TypeDescriptor,
};

#[derive(Debug, PartialEq)]
struct Endpoint {
    host: &'static str,
    port: u16,
}

#[test]
fn greatest_arity_constructor_is_selected() {
    let container = ServiceContainer::new();
    container.register_type(
        TypeDescriptor::of::<Endpoint>()
            .constructor(ConstructorSpec::new(vec![], |_| {
                Ok(Endpoint { host: "default", port: 0 })
            }))
            .constructor(ConstructorSpec::new(
                vec![ParamSpec::value::<u16>()],
                |args| Ok(Endpoint { host: "port-only", port: args.get_value::<u16>(0)? }),
            ))
            .build(),
    );
    container.register::<Endpoint>(Lifetime::Transient).unwrap();

    let endpoint = container.get::<Endpoint>().unwrap();
    assert_eq!(endpoint.host, "port-only");
}

#[test]
fn preferred_marker_overrides_arity() {
    let container = ServiceContainer::new();
    container.register_type(
        TypeDescriptor::of::<Endpoint>()
            .constructor(ConstructorSpec::new(
                vec![ParamSpec::value::<u16>()],
                |args| Ok(Endpoint { host: "wide", port: args.get_value::<u16>(0)? }),
            ))
            .constructor(ConstructorSpec::preferred(vec![], |_| {
                Ok(Endpoint { host: "marked", port: 1 })
            }))
            .build(),
    );
    container.register::<Endpoint>(Lifetime::Transient).unwrap();

    assert_eq!(container.get::<Endpoint>().unwrap().host, "marked");
}

#[test]
fn unregistered_value_parameters_fall_back_to_zero() {
    let container = ServiceContainer::new();
    container.register_type(
        TypeDescriptor::of::<Endpoint>()
            .constructor(ConstructorSpec::new(
                vec![ParamSpec::value::<u16>()],
                |args| Ok(Endpoint { host: "zeroed", port: args.get_value::<u16>(0)? }),
            ))
            .build(),
    );
    container.register::<Endpoint>(Lifetime::Transient).unwrap();

    let endpoint = container.get::<Endpoint>().unwrap();
    assert_eq!(endpoint.port, 0);
}

#[test]
fn registered_value_parameters_resolve_from_the_registry() {
    let container = ServiceContainer::new();
    container.register_instance(Arc::new(8080u16)).unwrap();
    container.register_type(
        TypeDescriptor::of::<Endpoint>()
            .constructor(ConstructorSpec::new(
                vec![ParamSpec::value::<u16>()],
                |args| Ok(Endpoint { host: "configured", port: args.get_value::<u16>(0)? }),
            ))
            .build(),
    );
    container.register::<Endpoint>(Lifetime::Transient).unwrap();

    assert_eq!(container.get::<Endpoint>().unwrap().port, 8080);
}

#[test]
fn unregistered_service_parameter_fails_resolution() {
    struct Dep;
    let container = ServiceContainer::new();
    container.register_type(
        TypeDescriptor::of::<Endpoint>()
            .constructor(ConstructorSpec::new(
                vec![ParamSpec::of::<Dep>()],
                |_| Ok(Endpoint { host: "never", port: 0 }),
            ))
            .build(),
    );
    container.register::<Endpoint>(Lifetime::Transient).unwrap();

    let err = container.get::<Endpoint>().err().unwrap();
    assert!(matches!(err, DiError::NotRegistered(_)));
}

#[test]
fn constructorless_type_uses_its_zero_value() {
    #[derive(Default)]
    struct Flags {
        verbose: bool,
    }

    let container = ServiceContainer::new();
    container.register_type(TypeDescriptor::of::<Flags>().zero().build());
    container.register::<Flags>(Lifetime::Transient).unwrap();

    assert!(!container.get::<Flags>().unwrap().verbose);
}

#[test]
fn constructorless_type_without_zero_fails() {
    struct Opaqueish;

    let container = ServiceContainer::new();
    container.register_type(TypeDescriptor::of::<Opaqueish>().build());
    container.register::<Opaqueish>(Lifetime::Transient).unwrap();

    let err = container.get::<Opaqueish>().err().unwrap();
    assert!(matches!(err, DiError::NoViableConstructor(_)));
}

#[test]
fn opaque_types_cannot_be_constructed_directly() {
    struct Sealed;

    let container = ServiceContainer::new();
    container.register_type(TypeDescriptor::opaque::<Sealed>());
    container.register::<Sealed>(Lifetime::Transient).unwrap();

    let err = container.get::<Sealed>().err().unwrap();
    assert!(matches!(err, DiError::NotConstructible(_)));
}

#[test]
fn missing_metadata_is_not_constructible() {
    struct Unknown;

    let container = ServiceContainer::new();
    container.register::<Unknown>(Lifetime::Transient).unwrap();

    let err = container.get::<Unknown>().err().unwrap();
    assert!(matches!(err, DiError::NotConstructible(_)));
}

#[test]
fn create_instance_bypasses_the_registry_entry() {
    let container = ServiceContainer::new();
    container.register_type(
        TypeDescriptor::of::<Endpoint>()
            .constructor(ConstructorSpec::new(vec![], |_| {
                Ok(Endpoint { host: "fresh", port: 7 })
            }))
            .build(),
    );
    // The registered singleton instance must not shadow direct construction.
    container
        .register_instance(Arc::new(Endpoint { host: "registered", port: 1 }))
        .unwrap();

    let direct = container.create_instance::<Endpoint>().unwrap();
    assert_eq!(direct.host, "fresh");
    assert_eq!(container.get::<Endpoint>().unwrap().host, "registered");
}
