//! Service lifetime definitions.

/// Service lifetimes controlling instance caching and disposal ownership.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use tundra_di::{Resolver, ServiceContainer};
///
/// let container = ServiceContainer::new();
/// container.register_instance(Arc::new(42usize)).unwrap();
///
/// let a = container.get::<usize>().unwrap();
/// let b = container.get::<usize>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Single instance per container, created lazily on first request and
    /// cached on the descriptor until unregistration or container disposal.
    ///
    /// A lazily created singleton is always owned by the container's root
    /// disposal tracker, even when first realized from within a scope —
    /// singletons must outlive any scope.
    Singleton,
    /// New instance per resolution, never cached.
    ///
    /// Each transient instance is owned by whichever disposal tracker was
    /// active at creation: the resolving scope's, or the container's root
    /// tracker when no scope is active.
    Transient,
    /// Single instance per scope, cached for the scope's lifetime.
    ///
    /// When resolved with no scope active, the container itself acts as a
    /// permanent scope: the instance is cached under the root context and
    /// disposed with the container.
    Scoped,
}

impl std::fmt::Display for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lifetime::Singleton => write!(f, "Singleton"),
            Lifetime::Transient => write!(f, "Transient"),
            Lifetime::Scoped => write!(f, "Scoped"),
        }
    }
}
