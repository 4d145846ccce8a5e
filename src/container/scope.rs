//! Scopes: bounded lifetime regions with their own instance cache slice and
//! disposal tracker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::container::ServiceContainer;
use crate::disposal::{Disposable, DisposalTracker};
use crate::error::{DiError, DiResult};
use crate::key::ServiceId;
use crate::metadata::AnyArc;
use crate::traits::Resolver;

type DisposeCallback = Box<dyn FnOnce(u64) + Send>;

pub(crate) struct ScopeInner {
    id: u64,
    disposed: AtomicBool,
    disposables: DisposalTracker,
    on_dispose: Mutex<Vec<DisposeCallback>>,
}

impl ScopeInner {
    pub(crate) fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            disposed: AtomicBool::new(false),
            disposables: DisposalTracker::new(),
            on_dispose: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn disposables(&self) -> &DisposalTracker {
        &self.disposables
    }

    pub(crate) fn push_on_dispose(&self, callback: DisposeCallback) {
        self.on_dispose.lock().unwrap().push(callback);
    }

    /// Flips the disposed flag; `false` means the scope was already disposed.
    fn begin_dispose(&self) -> bool {
        !self.disposed.swap(true, Ordering::AcqRel)
    }

    /// Runs the disposed callbacks, in registration order. The cache purge
    /// registered at scope creation runs here, before the tracker drains.
    fn run_on_dispose(&self) {
        let callbacks = std::mem::take(&mut *self.on_dispose.lock().unwrap());
        for callback in callbacks {
            callback(self.id);
        }
    }
}

/// A resolution scope.
///
/// Scoped services resolved through a scope are cached per scope and live
/// until the scope is disposed; transients resolved through it are owned by
/// its tracker instead of the container's. Singletons are unaffected — they
/// stay container-owned regardless of where they are first realized.
///
/// Call [`Scope::dispose`] (or `dispose_async`) when done. Dropping an
/// undisposed scope still evicts its cached instances but leaks whatever its
/// tracker owns, and logs a warning.
///
/// # Examples
///
/// ```
/// use tundra_di::{ConstructorSpec, Lifetime, Resolver, ServiceContainer, TypeDescriptor};
/// use std::sync::Arc;
///
/// struct Session;
///
/// let container = ServiceContainer::new();
/// container.register_type(
///     TypeDescriptor::of::<Session>()
///         .constructor(ConstructorSpec::new(vec![], |_| Ok(Session)))
///         .build(),
/// );
/// container.register::<Session>(Lifetime::Scoped).unwrap();
///
/// let scope = container.create_scope().unwrap();
/// let a = scope.get::<Session>().unwrap();
/// let b = scope.get::<Session>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// scope.dispose().unwrap();
/// container.dispose().unwrap();
/// ```
pub struct Scope {
    container: ServiceContainer,
    inner: Arc<ScopeInner>,
}

impl Scope {
    pub(crate) fn new(container: ServiceContainer, inner: Arc<ScopeInner>) -> Self {
        Self { container, inner }
    }

    /// This scope's id, unique within its container.
    pub fn id(&self) -> u64 {
        self.inner.id()
    }

    /// Whether the scope has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Number of instances this scope's tracker currently owns.
    pub fn disposable_count(&self) -> usize {
        self.inner.disposables().count()
    }

    /// Registers a callback to run when this scope is disposed, receiving the
    /// scope id. Callbacks run in registration order, before the scope's
    /// tracked instances are released.
    pub fn on_dispose(&self, callback: impl FnOnce(u64) + Send + 'static) -> DiResult<()> {
        if self.is_disposed() {
            return Err(DiError::ObjectDisposed("Scope"));
        }
        self.inner.push_on_dispose(Box::new(callback));
        Ok(())
    }

    /// Constructs a `T` through the construction algorithm without consulting
    /// the registry for `T` itself. Dependencies resolve within this scope;
    /// the returned instance is owned by the caller and never tracked.
    pub fn create_instance<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.check_alive()?;
        self.container
            .inner()
            .construct(
                std::any::TypeId::of::<T>(),
                std::any::type_name::<T>(),
                Some(&self.inner),
            )?
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Disposes the scope synchronously: evicts its cached instances from
    /// the container, then releases every scope-tracked instance in reverse
    /// registration order. Idempotent.
    pub fn dispose(&self) -> DiResult<()> {
        if !self.inner.begin_dispose() {
            return Ok(());
        }
        self.inner.run_on_dispose();
        self.inner.disposables().dispose_sync()
    }

    /// Asynchronous counterpart of [`Scope::dispose`]. Idempotent.
    pub async fn dispose_async(&self) -> DiResult<()> {
        if !self.inner.begin_dispose() {
            return Ok(());
        }
        self.inner.run_on_dispose();
        self.inner.disposables().dispose_async().await
    }

    fn check_alive(&self) -> DiResult<()> {
        if self.is_disposed() {
            return Err(DiError::ObjectDisposed("Scope"));
        }
        Ok(())
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if self.inner.begin_dispose() {
            self.inner.run_on_dispose();
            if self.inner.disposables().count() > 0 {
                eprintln!(
                    "tundra-di: Scope {} dropped without dispose(); {} tracked instance(s) leaked",
                    self.inner.id(),
                    self.inner.disposables().count()
                );
            }
        }
    }
}

impl Resolver for Scope {
    fn resolve_raw(&self, id: &ServiceId) -> DiResult<AnyArc> {
        self.check_alive()?;
        self.container.inner().resolve_id(id, Some(&self.inner))
    }

    fn resolve_raw_optional(&self, id: &ServiceId) -> DiResult<Option<AnyArc>> {
        self.check_alive()?;
        self.container.inner().resolve_id_optional(id, Some(&self.inner))
    }

    fn register_disposable(&self, disposable: Disposable) -> DiResult<()> {
        self.check_alive()?;
        self.inner.disposables().register(disposable)
    }
}
