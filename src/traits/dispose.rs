//! Disposal capability traits.
//!
//! A tracked instance may implement the synchronous capability, the
//! asynchronous capability, or both. The [`DisposalTracker`] dispatches on
//! whichever capability is present and whichever disposal path the caller
//! invoked.
//!
//! [`DisposalTracker`]: crate::DisposalTracker

/// Trait for synchronous resource disposal.
///
/// Implement this for services that need structured teardown (flushing
/// caches, closing connections). Tracked instances are disposed in reverse
/// registration order when the owning container or scope is disposed.
///
/// # Examples
///
/// ```
/// use tundra_di::Dispose;
///
/// struct Cache {
///     name: String,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) {
///         println!("Flushing cache: {}", self.name);
///     }
/// }
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self);
}

/// Trait for asynchronous resource disposal.
///
/// Implement this for services that require async teardown (graceful
/// connection shutdown, async I/O cleanup). An instance that only implements
/// this trait can only be released through the asynchronous disposal path;
/// forcing it through the synchronous path is an
/// [`InvalidDisposable`](crate::DiError::InvalidDisposable) error.
///
/// # Examples
///
/// ```
/// use tundra_di::AsyncDispose;
/// use async_trait::async_trait;
///
/// struct DatabaseClient {
///     connection_id: String,
/// }
///
/// #[async_trait]
/// impl AsyncDispose for DatabaseClient {
///     async fn dispose(&self) {
///         println!("Closing connection: {}", self.connection_id);
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    /// Perform asynchronous cleanup of resources.
    async fn dispose(&self);
}
