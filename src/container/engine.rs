//! Resolution engine: descriptor lookup, lifetime realization, the
//! construction algorithm, and disposal-ownership placement.

use std::any::TypeId;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::container::{ContainerInner, ResolveContext};
use crate::descriptor::ServiceDescriptor;
use crate::disposal::Disposable;
use crate::error::{DiError, DiResult};
use crate::key::ServiceId;
use crate::lifetime::Lifetime;
use crate::metadata::{AnyArc, Args};

use super::scope::ScopeInner;

impl ContainerInner {
    /// Resolves a service identity into its (service-typed) instance.
    pub(crate) fn resolve_id(
        &self,
        id: &ServiceId,
        scope: Option<&Arc<ScopeInner>>,
    ) -> DiResult<AnyArc> {
        self.check_alive()?;
        let descriptor = self
            .descriptor_for(id)
            .ok_or(DiError::NotRegistered(id.type_name()))?;
        self.instance_from_descriptor(&descriptor, id, scope)
    }

    /// Like [`ContainerInner::resolve_id`], but an absent registration is
    /// `Ok(None)`; failures of a present registration still propagate.
    pub(crate) fn resolve_id_optional(
        &self,
        id: &ServiceId,
        scope: Option<&Arc<ScopeInner>>,
    ) -> DiResult<Option<AnyArc>> {
        self.check_alive()?;
        match self.descriptor_for(id) {
            Some(descriptor) => self.instance_from_descriptor(&descriptor, id, scope).map(Some),
            None => Ok(None),
        }
    }

    /// Looks up the descriptor for `id`, closing an open-generic registration
    /// on a lookup miss when the identity's type is tagged with a registered
    /// family.
    fn descriptor_for(&self, id: &ServiceId) -> Option<Arc<ServiceDescriptor>> {
        if let Some(descriptor) = self.registry.descriptor_optional(id) {
            return Some(descriptor);
        }
        let family = self.types.get(id.type_id())?.generic_family()?;
        self.registry.close_open_generic(family, id, |lifetime| {
            ServiceDescriptor::for_impl(*id, id.type_id(), id.type_name(), lifetime)
        })
    }

    /// Realizes an instance per the descriptor's lifetime.
    fn instance_from_descriptor(
        &self,
        descriptor: &ServiceDescriptor,
        id: &ServiceId,
        scope: Option<&Arc<ScopeInner>>,
    ) -> DiResult<AnyArc> {
        match descriptor.lifetime() {
            Lifetime::Transient => {
                let value = self.produce(descriptor, scope)?;
                self.track(&value, descriptor.impl_type_id(), scope)?;
                self.coerce(descriptor, value)
            }
            Lifetime::Singleton => {
                // Fast path without constructing anything.
                if let Some(value) = descriptor.singleton_peek() {
                    return self.coerce(descriptor, value);
                }

                // Constructed outside any lock; a concurrent resolver may
                // race us here, in which case the first installed instance
                // wins and ours is discarded untracked.
                let value = self.produce(descriptor, scope)?;
                let (kept, fresh) = descriptor.singleton_install(value);
                if fresh {
                    // Singletons belong to the root tracker even when first
                    // realized inside a scope.
                    self.track(&kept, descriptor.impl_type_id(), None)?;
                }
                self.coerce(descriptor, kept)
            }
            Lifetime::Scoped => {
                let scope_id = scope.map(|s| s.id());
                if let Some(scope) = scope {
                    if scope.is_disposed() {
                        return Err(DiError::ObjectDisposed("Scope"));
                    }
                }

                let cache_key = (scope_id, *id);
                if let Some(cached) = self.scoped.lock().unwrap().get(&cache_key) {
                    return Ok(cached.clone());
                }

                // The cache lock is not held across construction, so two
                // racing resolvers can each build an instance; both get
                // tracked, the last writer's lands in the cache.
                let value = self.produce(descriptor, scope)?;
                self.track(&value, descriptor.impl_type_id(), scope)?;
                let view = self.coerce(descriptor, value)?;
                self.scoped.lock().unwrap().insert(cache_key, view.clone());
                Ok(view)
            }
        }
    }

    /// Produces a raw implementation-typed instance, through the factory
    /// override when one is registered.
    fn produce(
        &self,
        descriptor: &ServiceDescriptor,
        scope: Option<&Arc<ScopeInner>>,
    ) -> DiResult<AnyArc> {
        if let Some(factory) = descriptor.factory() {
            let cx = ResolveContext { inner: self, scope };
            return factory(&cx);
        }
        self.construct(descriptor.impl_type_id(), descriptor.impl_type_name(), scope)
    }

    /// The construction algorithm: constructor selection, parameter
    /// resolution, invocation, and member injection. The result is handed
    /// back untracked; failures here therefore leave nothing behind for the
    /// instance under construction.
    pub(crate) fn construct(
        &self,
        type_id: TypeId,
        type_name: &'static str,
        scope: Option<&Arc<ScopeInner>>,
    ) -> DiResult<AnyArc> {
        let td = self
            .types
            .get(type_id)
            .ok_or(DiError::NotConstructible(type_name))?;
        if !td.is_constructible() {
            return Err(DiError::NotConstructible(type_name));
        }

        let value = match td.select_constructor() {
            Some(ctor) => {
                let mut args = Vec::with_capacity(ctor.params.len());
                for param in &ctor.params {
                    let dep = ServiceId::from_parts(param.type_id, param.type_name, param.key);
                    match self.resolve_id_optional(&dep, scope)? {
                        Some(value) => args.push(value),
                        None => match &param.zero {
                            Some(zero) => args.push(zero()),
                            None => return Err(DiError::NotRegistered(param.type_name)),
                        },
                    }
                }
                (ctor.build)(Args(args))?
            }
            None => match td.zero() {
                Some(zero) => zero(),
                None => return Err(DiError::NoViableConstructor(type_name)),
            },
        };

        // Member injection runs strictly after construction. A missing
        // required dependency fails the whole resolution; the constructed
        // value was never tracked, so nothing gets disposed for it.
        for member in td.members() {
            let dep = ServiceId::from_parts(member.type_id, member.type_name, member.key);
            match self.resolve_id_optional(&dep, scope)? {
                Some(dependency) => (member.assign)(&value, dependency)?,
                None if member.required => {
                    return Err(DiError::MissingRequiredDependency {
                        service: type_name,
                        member: member.name,
                    })
                }
                None => {}
            }
        }

        Ok(value)
    }

    /// Places disposal ownership: the active scope's tracker, or the root
    /// tracker when no scope applies. Instances without a registered disposal
    /// capability are not tracked.
    fn track(
        &self,
        value: &AnyArc,
        impl_type_id: TypeId,
        scope: Option<&Arc<ScopeInner>>,
    ) -> DiResult<()> {
        let view = match self.disposable_view(value, impl_type_id) {
            Some(view) => view,
            None => return Ok(()),
        };
        match scope {
            Some(scope) => scope.disposables().register(view),
            None => self.disposables.register(view),
        }
    }

    /// The disposal view of an instance, from its type's registered adapters.
    fn disposable_view(&self, value: &AnyArc, impl_type_id: TypeId) -> Option<Disposable> {
        let td = self.types.get(impl_type_id)?;
        let sync = td.sync_dispose().and_then(|adapt| adapt(value));
        let asynchronous = td.async_dispose().and_then(|adapt| adapt(value));
        if sync.is_none() && asynchronous.is_none() {
            return None;
        }
        Some(Disposable::from_parts(value.clone(), td.type_name(), sync, asynchronous))
    }

    /// Converts an implementation-typed instance into the descriptor's
    /// service-typed view.
    fn coerce(&self, descriptor: &ServiceDescriptor, value: AnyArc) -> DiResult<AnyArc> {
        let service = descriptor.service();
        if service.type_id() == descriptor.impl_type_id() {
            return Ok(value);
        }
        self.types
            .get(descriptor.impl_type_id())
            .and_then(|td| td.coercion(service.type_id()).map(Arc::clone))
            .and_then(|coerce| coerce(value))
            .ok_or(DiError::TypeMismatch(service.type_name()))
    }

    /// Retires a replaced or unregistered descriptor: purges its cached
    /// scoped instances and disposes a container-owned singleton instance
    /// synchronously inline. An async-only singleton fails the retirement.
    pub(crate) fn retire_descriptor(&self, old: &ServiceDescriptor) -> DiResult<()> {
        let id = old.service();
        self.scoped.lock().unwrap().retain(|(_, entry), _| *entry != id);

        if let Some((value, container_owned)) = old.singleton_take() {
            if container_owned {
                self.disposables.remove(&value);
                return self.dispose_value_sync(&value, old.impl_type_id());
            }
        }
        Ok(())
    }

    /// Disposes a single instance through its type's synchronous adapter.
    fn dispose_value_sync(&self, value: &AnyArc, impl_type_id: TypeId) -> DiResult<()> {
        match self.disposable_view(value, impl_type_id) {
            Some(view) => view.dispose_sync_inline(),
            None => Ok(()),
        }
    }

    /// Drops the cached instances belonging to one scope (`None` for the
    /// container's own permanent-scope entries).
    pub(crate) fn purge_scope(&self, scope_id: Option<u64>) {
        self.scoped.lock().unwrap().retain(|(entry, _), _| *entry != scope_id);
    }

    pub(crate) fn check_alive(&self) -> DiResult<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(DiError::ObjectDisposed("ServiceContainer"));
        }
        Ok(())
    }
}
