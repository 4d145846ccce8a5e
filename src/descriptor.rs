//! Service descriptors: the stored registration records.

use std::any::TypeId;
use std::sync::{Arc, Mutex};

use crate::container::ResolveContext;
use crate::error::DiResult;
use crate::key::ServiceId;
use crate::lifetime::Lifetime;
use crate::metadata::AnyArc;

/// Instance factory override: bypasses the default construction algorithm.
pub(crate) type InstanceFactory =
    Arc<dyn for<'a> Fn(&ResolveContext<'a>) -> DiResult<AnyArc> + Send + Sync>;

/// State of a singleton descriptor's instance slot.
pub(crate) enum SingletonSlot {
    /// Not realized yet.
    Empty,
    /// Supplied by the caller at registration; the caller retains disposal
    /// ownership and the container never tracks or disposes it.
    CallerOwned(AnyArc),
    /// Realized lazily by the engine; owned by the container's root tracker.
    ContainerOwned(AnyArc),
}

/// One registration: service identity, implementation type, lifetime, and
/// instance/factory state.
///
/// A non-empty instance slot is only legal for the `Singleton` lifetime, and
/// a supplied instance excludes a factory override; both invariants are
/// enforced at registration time by the container.
pub struct ServiceDescriptor {
    service: ServiceId,
    impl_type_id: TypeId,
    impl_type_name: &'static str,
    lifetime: Lifetime,
    factory: Option<InstanceFactory>,
    singleton: Mutex<SingletonSlot>,
}

impl ServiceDescriptor {
    /// Descriptor mapping `service` to implementation type `I`, constructed
    /// through the engine's construction algorithm.
    pub fn new<I: Send + Sync + 'static>(service: ServiceId, lifetime: Lifetime) -> Self {
        Self {
            service,
            impl_type_id: TypeId::of::<I>(),
            impl_type_name: std::any::type_name::<I>(),
            lifetime,
            factory: None,
            singleton: Mutex::new(SingletonSlot::Empty),
        }
    }

    /// Descriptor from raw implementation-type parts; used when the
    /// implementation type is only known through metadata, e.g. when closing
    /// an open-generic registration.
    pub(crate) fn for_impl(
        service: ServiceId,
        impl_type_id: TypeId,
        impl_type_name: &'static str,
        lifetime: Lifetime,
    ) -> Self {
        Self {
            service,
            impl_type_id,
            impl_type_name,
            lifetime,
            factory: None,
            singleton: Mutex::new(SingletonSlot::Empty),
        }
    }

    /// Singleton descriptor around a caller-supplied instance. The container
    /// never takes disposal ownership of it.
    pub(crate) fn with_instance(
        service: ServiceId,
        impl_type_id: TypeId,
        impl_type_name: &'static str,
        instance: AnyArc,
    ) -> Self {
        Self {
            service,
            impl_type_id,
            impl_type_name,
            lifetime: Lifetime::Singleton,
            factory: None,
            singleton: Mutex::new(SingletonSlot::CallerOwned(instance)),
        }
    }

    /// Descriptor whose instances come from a factory override instead of
    /// the construction algorithm.
    pub(crate) fn with_factory(
        service: ServiceId,
        impl_type_id: TypeId,
        impl_type_name: &'static str,
        lifetime: Lifetime,
        factory: InstanceFactory,
    ) -> Self {
        Self {
            service,
            impl_type_id,
            impl_type_name,
            lifetime,
            factory: Some(factory),
            singleton: Mutex::new(SingletonSlot::Empty),
        }
    }

    /// The registered service identity.
    pub fn service(&self) -> ServiceId {
        self.service
    }

    /// The implementation type's id.
    pub fn impl_type_id(&self) -> TypeId {
        self.impl_type_id
    }

    /// The implementation type's name, for diagnostics.
    pub fn impl_type_name(&self) -> &'static str {
        self.impl_type_name
    }

    /// The registered lifetime.
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Whether the singleton slot holds a realized instance.
    pub fn has_instance(&self) -> bool {
        !matches!(*self.singleton.lock().unwrap(), SingletonSlot::Empty)
    }

    pub(crate) fn factory(&self) -> Option<&InstanceFactory> {
        self.factory.as_ref()
    }

    /// Returns the realized singleton instance, if any.
    pub(crate) fn singleton_peek(&self) -> Option<AnyArc> {
        match &*self.singleton.lock().unwrap() {
            SingletonSlot::Empty => None,
            SingletonSlot::CallerOwned(v) | SingletonSlot::ContainerOwned(v) => Some(v.clone()),
        }
    }

    /// Installs a lazily constructed singleton. Double-checked: if another
    /// caller raced the construction and won, its instance is kept and the
    /// argument is discarded. Returns the retained instance and whether the
    /// argument was the one installed.
    pub(crate) fn singleton_install(&self, instance: AnyArc) -> (AnyArc, bool) {
        let mut slot = self.singleton.lock().unwrap();
        match &*slot {
            SingletonSlot::Empty => {
                *slot = SingletonSlot::ContainerOwned(instance.clone());
                (instance, true)
            }
            SingletonSlot::CallerOwned(v) | SingletonSlot::ContainerOwned(v) => (v.clone(), false),
        }
    }

    /// Empties the slot, returning the instance and whether the container
    /// owned it. Used by unregistration and descriptor replacement.
    pub(crate) fn singleton_take(&self) -> Option<(AnyArc, bool)> {
        let mut slot = self.singleton.lock().unwrap();
        match std::mem::replace(&mut *slot, SingletonSlot::Empty) {
            SingletonSlot::Empty => None,
            SingletonSlot::CallerOwned(v) => Some((v, false)),
            SingletonSlot::ContainerOwned(v) => Some((v, true)),
        }
    }
}
