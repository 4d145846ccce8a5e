//! The service container: registration surface, root disposal ownership, and
//! scope creation.

mod engine;
mod scope;

pub use scope::Scope;

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::descriptor::ServiceDescriptor;
use crate::disposal::{Disposable, DisposalTracker};
use crate::error::{DiError, DiResult};
use crate::key::{ServiceId, ServiceKey};
use crate::lifetime::Lifetime;
use crate::metadata::{AnyArc, TypeDescriptor, TypeMetadata};
use crate::registry::ServiceRegistry;
use crate::traits::Resolver;

use scope::ScopeInner;

/// Container construction options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerOptions {
    /// When set, registered services cannot be replaced or unregistered;
    /// attempts fail with [`DiError::AlreadyRegistered`] or
    /// [`DiError::InvalidRegistration`] and the original registration stays
    /// in effect.
    pub read_only: bool,
}

pub(crate) struct ContainerInner {
    pub(crate) options: ContainerOptions,
    pub(crate) registry: ServiceRegistry,
    pub(crate) types: TypeMetadata,
    /// Scoped-instance cache, keyed by (scope id, service identity). `None`
    /// is the container itself acting as the permanent scope for scoped
    /// services resolved without one.
    pub(crate) scoped: Mutex<HashMap<(Option<u64>, ServiceId), AnyArc>>,
    /// Root disposal tracker: singletons, plus transients and scoped
    /// instances realized without an active scope.
    pub(crate) disposables: DisposalTracker,
    next_scope_id: AtomicU64,
    pub(crate) disposed: AtomicBool,
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        if !self.disposed.load(Ordering::Relaxed) && self.disposables.count() > 0 {
            eprintln!(
                "tundra-di: ServiceContainer dropped without dispose(); {} tracked instance(s) leaked",
                self.disposables.count()
            );
        }
    }
}

/// The inversion-of-control container.
///
/// Holds the service registry, type metadata, the scoped-instance cache and
/// the root disposal tracker. Cheap to clone; clones share all state. Call
/// [`ServiceContainer::dispose`] (or `dispose_async`) when done — dropping an
/// undisposed container leaks its tracked instances and logs a warning.
///
/// # Examples
///
/// ```
/// use tundra_di::{ConstructorSpec, Lifetime, Resolver, ServiceContainer, TypeDescriptor};
///
/// struct Greeter { prefix: &'static str }
///
/// let container = ServiceContainer::new();
/// container.register_type(
///     TypeDescriptor::of::<Greeter>()
///         .constructor(ConstructorSpec::new(vec![], |_| Ok(Greeter { prefix: "hi" })))
///         .build(),
/// );
/// container.register::<Greeter>(Lifetime::Singleton).unwrap();
///
/// let greeter = container.get::<Greeter>().unwrap();
/// assert_eq!(greeter.prefix, "hi");
/// container.dispose().unwrap();
/// ```
#[derive(Clone)]
pub struct ServiceContainer {
    inner: Arc<ContainerInner>,
}

impl ServiceContainer {
    /// Container with default options.
    pub fn new() -> Self {
        Self::with_options(ContainerOptions::default())
    }

    /// Container with explicit options.
    pub fn with_options(options: ContainerOptions) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                options,
                registry: ServiceRegistry::new(options.read_only),
                types: TypeMetadata::new(),
                scoped: Mutex::new(HashMap::new()),
                disposables: DisposalTracker::new(),
                next_scope_id: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Registers (or replaces) the type metadata the engine uses to
    /// construct, inject, coerce and dispose instances of the described type.
    pub fn register_type(&self, descriptor: TypeDescriptor) {
        self.inner.types.insert(descriptor);
    }

    /// Registers concrete type `T` as its own service under `lifetime`.
    pub fn register<T: Send + Sync + 'static>(&self, lifetime: Lifetime) -> DiResult<()> {
        self.register_descriptor(ServiceDescriptor::new::<T>(ServiceId::of::<T>(), lifetime))
    }

    /// Keyed variant of [`ServiceContainer::register`].
    pub fn register_keyed<T: Send + Sync + 'static>(
        &self,
        key: ServiceKey,
        lifetime: Lifetime,
    ) -> DiResult<()> {
        self.register_descriptor(ServiceDescriptor::new::<T>(ServiceId::keyed::<T>(key), lifetime))
    }

    /// Shorthand for [`ServiceContainer::register`] with
    /// [`Lifetime::Singleton`].
    pub fn register_singleton<T: Send + Sync + 'static>(&self) -> DiResult<()> {
        self.register::<T>(Lifetime::Singleton)
    }

    /// Shorthand for [`ServiceContainer::register`] with
    /// [`Lifetime::Transient`].
    pub fn register_transient<T: Send + Sync + 'static>(&self) -> DiResult<()> {
        self.register::<T>(Lifetime::Transient)
    }

    /// Shorthand for [`ServiceContainer::register`] with
    /// [`Lifetime::Scoped`].
    pub fn register_scoped<T: Send + Sync + 'static>(&self) -> DiResult<()> {
        self.register::<T>(Lifetime::Scoped)
    }

    /// Registers service type `S` implemented by `I` under `lifetime`.
    ///
    /// For a trait-object service, `I`'s [`TypeDescriptor`] must carry the
    /// matching `implements::<S>` coercion; resolution fails with
    /// [`DiError::TypeMismatch`] otherwise.
    pub fn register_as<S, I>(&self, lifetime: Lifetime) -> DiResult<()>
    where
        S: ?Sized + 'static,
        I: Send + Sync + 'static,
    {
        self.register_descriptor(ServiceDescriptor::new::<I>(ServiceId::of::<S>(), lifetime))
    }

    /// Keyed variant of [`ServiceContainer::register_as`].
    pub fn register_as_keyed<S, I>(&self, key: ServiceKey, lifetime: Lifetime) -> DiResult<()>
    where
        S: ?Sized + 'static,
        I: Send + Sync + 'static,
    {
        self.register_descriptor(ServiceDescriptor::new::<I>(ServiceId::keyed::<S>(key), lifetime))
    }

    /// Registers a caller-supplied singleton instance.
    ///
    /// The caller keeps disposal ownership: the instance is never added to
    /// any disposal tracker, and unregistering it never disposes it.
    pub fn register_instance<T: Send + Sync + 'static>(&self, instance: Arc<T>) -> DiResult<()> {
        self.register_instance_inner::<T>(ServiceId::of::<T>(), instance)
    }

    /// Keyed variant of [`ServiceContainer::register_instance`].
    pub fn register_instance_keyed<T: Send + Sync + 'static>(
        &self,
        key: ServiceKey,
        instance: Arc<T>,
    ) -> DiResult<()> {
        self.register_instance_inner::<T>(ServiceId::keyed::<T>(key), instance)
    }

    fn register_instance_inner<T: Send + Sync + 'static>(
        &self,
        service: ServiceId,
        instance: Arc<T>,
    ) -> DiResult<()> {
        self.register_descriptor(ServiceDescriptor::with_instance(
            service,
            TypeId::of::<T>(),
            std::any::type_name::<T>(),
            instance,
        ))
    }

    /// Registers a caller-supplied trait-object singleton, e.g.
    /// `register_trait_instance::<dyn Logger>(logger)`. Caller keeps disposal
    /// ownership.
    pub fn register_trait_instance<S: ?Sized + Send + Sync + 'static>(
        &self,
        instance: Arc<S>,
    ) -> DiResult<()> {
        self.register_trait_instance_inner::<S>(ServiceId::of::<S>(), instance)
    }

    /// Keyed variant of [`ServiceContainer::register_trait_instance`].
    pub fn register_trait_instance_keyed<S: ?Sized + Send + Sync + 'static>(
        &self,
        key: ServiceKey,
        instance: Arc<S>,
    ) -> DiResult<()> {
        self.register_trait_instance_inner::<S>(ServiceId::keyed::<S>(key), instance)
    }

    fn register_trait_instance_inner<S: ?Sized + Send + Sync + 'static>(
        &self,
        service: ServiceId,
        instance: Arc<S>,
    ) -> DiResult<()> {
        // Stored double-wrapped so the trait object fits behind `dyn Any`;
        // the service identity doubles as the implementation identity.
        self.register_descriptor(ServiceDescriptor::with_instance(
            service,
            service.type_id(),
            service.type_name(),
            Arc::new(instance),
        ))
    }

    /// Registers `T` built by `factory` instead of the construction
    /// algorithm. The factory resolves its own dependencies through the
    /// passed context; produced instances are tracked according to `T`'s
    /// registered disposal capabilities.
    pub fn register_factory<T, F>(&self, lifetime: Lifetime, factory: F) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: for<'a> Fn(&ResolveContext<'a>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.register_factory_inner::<T, F>(ServiceId::of::<T>(), lifetime, factory)
    }

    /// Keyed variant of [`ServiceContainer::register_factory`].
    pub fn register_factory_keyed<T, F>(
        &self,
        key: ServiceKey,
        lifetime: Lifetime,
        factory: F,
    ) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: for<'a> Fn(&ResolveContext<'a>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.register_factory_inner::<T, F>(ServiceId::keyed::<T>(key), lifetime, factory)
    }

    fn register_factory_inner<T, F>(
        &self,
        service: ServiceId,
        lifetime: Lifetime,
        factory: F,
    ) -> DiResult<()>
    where
        T: Send + Sync + 'static,
        F: for<'a> Fn(&ResolveContext<'a>) -> DiResult<T> + Send + Sync + 'static,
    {
        self.register_descriptor(ServiceDescriptor::with_factory(
            service,
            TypeId::of::<T>(),
            std::any::type_name::<T>(),
            lifetime,
            Arc::new(move |cx: &ResolveContext| Ok(Arc::new(factory(cx)?) as AnyArc)),
        ))
    }

    /// Registers an open-generic family under `lifetime`. Any type whose
    /// [`TypeDescriptor`] is tagged with the same `generic_family` resolves
    /// through this registration; the closed descriptor is synthesized and
    /// cached on first resolution.
    pub fn register_open_generic(&self, family: &'static str, lifetime: Lifetime) -> DiResult<()> {
        self.check_alive()?;
        self.inner.registry.register_open_generic(family, None, lifetime)
    }

    /// Keyed variant of [`ServiceContainer::register_open_generic`].
    pub fn register_open_generic_keyed(
        &self,
        family: &'static str,
        key: ServiceKey,
        lifetime: Lifetime,
    ) -> DiResult<()> {
        self.check_alive()?;
        self.inner.registry.register_open_generic(family, Some(key), lifetime)
    }

    /// Registers a descriptor, retiring any replaced registration. A replaced
    /// container-owned singleton is disposed synchronously inline; if it only
    /// supports asynchronous disposal the replacement fails after taking
    /// effect.
    fn register_descriptor(&self, descriptor: ServiceDescriptor) -> DiResult<()> {
        self.check_alive()?;
        if let Some(old) = self.inner.registry.register(descriptor)? {
            self.inner.retire_descriptor(&old)?;
        }
        Ok(())
    }

    /// Removes the registration for concrete/service type `T`.
    ///
    /// A container-owned singleton instance is disposed synchronously inline;
    /// caller-supplied instances are handed back untouched. Returns whether a
    /// registration was removed.
    pub fn unregister<T: ?Sized + 'static>(&self) -> DiResult<bool> {
        self.unregister_id(&ServiceId::of::<T>())
    }

    /// Keyed variant of [`ServiceContainer::unregister`].
    pub fn unregister_keyed<T: ?Sized + 'static>(&self, key: ServiceKey) -> DiResult<bool> {
        self.unregister_id(&ServiceId::keyed::<T>(key))
    }

    fn unregister_id(&self, id: &ServiceId) -> DiResult<bool> {
        self.check_alive()?;
        if self.inner.options.read_only {
            return Err(DiError::InvalidRegistration(id.type_name()));
        }
        match self.inner.registry.unregister(id) {
            Some(old) => {
                self.inner.retire_descriptor(&old)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Whether a registration exists for `T`.
    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.inner.registry.is_registered(&ServiceId::of::<T>())
    }

    /// Keyed variant of [`ServiceContainer::is_registered`].
    pub fn is_registered_keyed<T: ?Sized + 'static>(&self, key: ServiceKey) -> bool {
        self.inner.registry.is_registered(&ServiceId::keyed::<T>(key))
    }

    /// The descriptor registered for `id`, if any.
    pub fn descriptor(&self, id: &ServiceId) -> Option<Arc<ServiceDescriptor>> {
        self.inner.registry.descriptor_optional(id)
    }

    /// Snapshot of every registered descriptor.
    pub fn descriptors(&self) -> Vec<Arc<ServiceDescriptor>> {
        self.inner.registry.descriptors()
    }

    /// Number of registered (closed) services.
    pub fn descriptor_count(&self) -> usize {
        self.inner.registry.count()
    }

    /// Number of instances the root tracker currently owns.
    pub fn disposable_count(&self) -> usize {
        self.inner.disposables.count()
    }

    /// Whether the container has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Constructs a `T` through the construction algorithm without consulting
    /// the registry for `T` itself. Dependencies resolve normally; the
    /// returned instance is owned by the caller and never tracked.
    pub fn create_instance<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.check_alive()?;
        self.inner
            .construct(TypeId::of::<T>(), std::any::type_name::<T>(), None)?
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Opens a new scope. Scoped services resolved through it are cached per
    /// scope and disposed with it.
    ///
    /// Fails with [`DiError::ObjectDisposed`] once the container itself has
    /// been disposed.
    pub fn create_scope(&self) -> DiResult<Scope> {
        self.check_alive()?;
        let id = self.inner.next_scope_id.fetch_add(1, Ordering::Relaxed);
        let scope = ScopeInner::new(id);
        let weak = Arc::downgrade(&self.inner);
        // Cache purge runs before the scope's tracker drains, so disposal
        // code can no longer observe the cached instances.
        scope.push_on_dispose(Box::new(move |scope_id| {
            if let Some(inner) = weak.upgrade() {
                inner.purge_scope(Some(scope_id));
            }
        }));
        Ok(Scope::new(self.clone(), scope))
    }

    /// Disposes the container synchronously: drops the scoped-instance cache
    /// and releases every root-tracked instance in reverse registration
    /// order. Idempotent.
    ///
    /// Fails with [`DiError::InvalidDisposable`] if a tracked instance only
    /// supports asynchronous disposal; use
    /// [`ServiceContainer::dispose_async`] for those.
    pub fn dispose(&self) -> DiResult<()> {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.inner.scoped.lock().unwrap().clear();
        self.inner.disposables.dispose_sync()
    }

    /// Disposes the container, suspending at each asynchronously disposable
    /// instance. Idempotent.
    pub async fn dispose_async(&self) -> DiResult<()> {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.inner.scoped.lock().unwrap().clear();
        self.inner.disposables.dispose_async().await
    }

    pub(crate) fn inner(&self) -> &Arc<ContainerInner> {
        &self.inner
    }

    fn check_alive(&self) -> DiResult<()> {
        if self.is_disposed() {
            return Err(DiError::ObjectDisposed("ServiceContainer"));
        }
        Ok(())
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver for ServiceContainer {
    fn resolve_raw(&self, id: &ServiceId) -> DiResult<AnyArc> {
        self.inner.resolve_id(id, None)
    }

    fn resolve_raw_optional(&self, id: &ServiceId) -> DiResult<Option<AnyArc>> {
        self.inner.resolve_id_optional(id, None)
    }

    fn register_disposable(&self, disposable: Disposable) -> DiResult<()> {
        self.check_alive()?;
        self.inner.disposables.register(disposable)
    }
}

/// Resolution context handed to instance factories. Resolves against the
/// container, within the scope (if any) the triggering resolution ran in.
pub struct ResolveContext<'a> {
    pub(crate) inner: &'a ContainerInner,
    pub(crate) scope: Option<&'a Arc<ScopeInner>>,
}

impl Resolver for ResolveContext<'_> {
    fn resolve_raw(&self, id: &ServiceId) -> DiResult<AnyArc> {
        self.inner.resolve_id(id, self.scope)
    }

    fn resolve_raw_optional(&self, id: &ServiceId) -> DiResult<Option<AnyArc>> {
        self.inner.resolve_id_optional(id, self.scope)
    }

    fn register_disposable(&self, disposable: Disposable) -> DiResult<()> {
        match self.scope {
            Some(scope) => scope.disposables().register(disposable),
            None => self.inner.disposables.register(disposable),
        }
    }
}
