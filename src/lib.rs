//! # tundra-di
//!
//! A runtime inversion-of-control container: register services against type
//! (and optional key) identities, resolve them through a container or scope,
//! and let ownership-aware trackers release everything in reverse creation
//! order when the owner is disposed.
//!
//! ## Core concepts
//!
//! - **[`ServiceContainer`]** — registration surface, root disposal owner,
//!   scope factory.
//! - **[`Lifetime`]** — `Singleton` (one instance, container-owned),
//!   `Transient` (new instance per resolution), `Scoped` (one instance per
//!   scope, scope-owned).
//! - **[`Scope`]** — a bounded lifetime region with its own cache slice and
//!   disposal tracker.
//! - **[`TypeDescriptor`]** — explicit per-type metadata (constructors,
//!   injectable members, disposal capabilities, trait coercions) standing in
//!   for runtime reflection.
//! - **[`Resolver`]** — the typed resolution surface shared by containers,
//!   scopes, and factory contexts.
//!
//! ## Quick start
//!
//! ```
//! use std::sync::Arc;
//! use tundra_di::{
//!     ConstructorSpec, Lifetime, ParamSpec, Resolver, ServiceContainer, TypeDescriptor,
//! };
//!
//! struct Config { url: &'static str }
//! struct Client { config: Arc<Config> }
//!
//! let container = ServiceContainer::new();
//! container.register_type(
//!     TypeDescriptor::of::<Config>()
//!         .constructor(ConstructorSpec::new(vec![], |_| Ok(Config { url: "localhost" })))
//!         .build(),
//! );
//! container.register_type(
//!     TypeDescriptor::of::<Client>()
//!         .constructor(ConstructorSpec::new(
//!             vec![ParamSpec::of::<Config>()],
//!             |args| Ok(Client { config: args.get::<Config>(0)? }),
//!         ))
//!         .build(),
//! );
//! container.register::<Config>(Lifetime::Singleton).unwrap();
//! container.register::<Client>(Lifetime::Transient).unwrap();
//!
//! let client = container.get::<Client>().unwrap();
//! assert_eq!(client.config.url, "localhost");
//! container.dispose().unwrap();
//! ```
//!
//! ## Disposal
//!
//! Implement [`Dispose`] and/or [`AsyncDispose`] and declare the capability
//! on the type's [`TypeDescriptor`]; constructed instances are then tracked
//! by whichever owner created them and released in reverse order on dispose.
//! Containers holding async-only resources must be disposed through
//! [`ServiceContainer::dispose_async`].

#![warn(missing_docs)]

pub mod container;
pub mod descriptor;
pub mod disposal;
pub mod error;
pub mod key;
pub mod lifetime;
pub mod metadata;
pub mod traits;

mod registry;

pub use container::{ContainerOptions, ResolveContext, Scope, ServiceContainer};
pub use descriptor::ServiceDescriptor;
pub use disposal::{Disposable, DisposalTracker};
pub use error::{DiError, DiResult};
pub use key::{ServiceId, ServiceKey};
pub use lifetime::Lifetime;
pub use metadata::{
    AnyArc, Args, ConstructorSpec, MemberSpec, ParamSpec, TypeDescriptor, TypeDescriptorBuilder,
};
pub use traits::{AsyncDispose, Dispose, Resolver};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn instance_round_trip() {
        let container = ServiceContainer::new();
        container.register_instance(Arc::new(7usize)).unwrap();
        assert_eq!(*container.get::<usize>().unwrap(), 7);
        container.dispose().unwrap();
    }

    #[test]
    fn shorthand_registrations_pick_their_lifetime() {
        #[derive(Default)]
        struct Probe;

        let container = ServiceContainer::new();
        container.register_type(TypeDescriptor::of::<Probe>().zero().build());
        container.register_transient::<Probe>().unwrap();

        let a = container.get::<Probe>().unwrap();
        let b = container.get::<Probe>().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));

        container.register_singleton::<Probe>().unwrap();
        let a = container.get::<Probe>().unwrap();
        let b = container.get::<Probe>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        container.dispose().unwrap();
    }
}
