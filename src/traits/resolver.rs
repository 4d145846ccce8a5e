use std::sync::Arc;

use crate::disposal::Disposable;
use crate::error::{DiError, DiResult};
use crate::key::{ServiceId, ServiceKey};
use crate::metadata::AnyArc;
use crate::traits::{AsyncDispose, Dispose};

/// Common resolution surface shared by the container, its scopes, and the
/// context handed to instance factories.
///
/// Implementors supply the three raw operations; the typed `get_*` family is
/// provided on top of them. Concrete services come back as `Arc<T>`;
/// trait-object services (`dyn Logger`) go through the `get_trait_*` variants,
/// which unwrap the double-`Arc` storage convention.
pub trait Resolver {
    /// Resolves a service by identity, type-erased.
    fn resolve_raw(&self, id: &ServiceId) -> DiResult<AnyArc>;

    /// Like [`Resolver::resolve_raw`] but `None` when no registration exists.
    /// Construction failures of a registered service still surface as errors.
    fn resolve_raw_optional(&self, id: &ServiceId) -> DiResult<Option<AnyArc>>;

    /// Hands an externally created instance to this resolver's disposal
    /// tracker. Disposal runs in reverse registration order alongside the
    /// tracker's own instances.
    fn register_disposable(&self, disposable: Disposable) -> DiResult<()>;

    /// Resolves a concrete service of type `T`.
    fn get<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        downcast::<T>(self.resolve_raw(&ServiceId::of::<T>())?)
    }

    /// Resolves a keyed concrete service of type `T`.
    fn get_keyed<T: Send + Sync + 'static>(&self, key: ServiceKey) -> DiResult<Arc<T>> {
        downcast::<T>(self.resolve_raw(&ServiceId::keyed::<T>(key))?)
    }

    /// Resolves a concrete service of type `T`, or `None` if unregistered.
    fn get_optional<T: Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        self.resolve_raw_optional(&ServiceId::of::<T>())?
            .map(downcast::<T>)
            .transpose()
    }

    /// Keyed variant of [`Resolver::get_optional`].
    fn get_optional_keyed<T: Send + Sync + 'static>(
        &self,
        key: ServiceKey,
    ) -> DiResult<Option<Arc<T>>> {
        self.resolve_raw_optional(&ServiceId::keyed::<T>(key))?
            .map(downcast::<T>)
            .transpose()
    }

    /// Resolves a trait-object service, e.g. `get_trait::<dyn Logger>()`.
    fn get_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        downcast_trait::<T>(self.resolve_raw(&ServiceId::of::<T>())?)
    }

    /// Resolves a keyed trait-object service.
    fn get_trait_keyed<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: ServiceKey,
    ) -> DiResult<Arc<T>> {
        downcast_trait::<T>(self.resolve_raw(&ServiceId::keyed::<T>(key))?)
    }

    /// Resolves a trait-object service, or `None` if unregistered.
    fn get_trait_optional<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Option<Arc<T>>> {
        self.resolve_raw_optional(&ServiceId::of::<T>())?
            .map(downcast_trait::<T>)
            .transpose()
    }

    /// Keyed variant of [`Resolver::get_trait_optional`].
    fn get_trait_optional_keyed<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: ServiceKey,
    ) -> DiResult<Option<Arc<T>>> {
        self.resolve_raw_optional(&ServiceId::keyed::<T>(key))?
            .map(downcast_trait::<T>)
            .transpose()
    }

    /// Tracks a synchronously disposable instance.
    fn register_disposer<T: Dispose>(&self, value: Arc<T>) -> DiResult<()> {
        self.register_disposable(Disposable::from_sync(value))
    }

    /// Tracks an asynchronously disposable instance.
    fn register_async_disposer<T: AsyncDispose>(&self, value: Arc<T>) -> DiResult<()> {
        self.register_disposable(Disposable::from_async(value))
    }
}

fn downcast<T: Send + Sync + 'static>(value: AnyArc) -> DiResult<Arc<T>> {
    value
        .downcast::<T>()
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
}

fn downcast_trait<T: ?Sized + Send + Sync + 'static>(value: AnyArc) -> DiResult<Arc<T>> {
    value
        .downcast::<Arc<T>>()
        .map(|wrapped| (*wrapped).clone())
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
}
