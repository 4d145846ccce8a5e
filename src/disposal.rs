//! Disposal tracking: the ordered ownership list guaranteeing reverse-order
//! cleanup.

use std::sync::{Arc, Mutex};

use crate::error::{DiError, DiResult};
use crate::metadata::AnyArc;
use crate::traits::{AsyncDispose, Dispose};

/// A tracked handle: an instance together with whichever disposal
/// capabilities it carries.
///
/// Exactly one tracker owns a given instance — the scope that created it, or
/// the container when no scope was active. Handles with neither capability
/// are rejected at registration.
pub struct Disposable {
    value: AnyArc,
    type_name: &'static str,
    sync: Option<Arc<dyn Dispose>>,
    asynchronous: Option<Arc<dyn AsyncDispose>>,
}

impl Disposable {
    /// Handle for a synchronously disposable instance.
    pub fn from_sync<T: Dispose>(value: Arc<T>) -> Self {
        Self {
            value: value.clone(),
            type_name: std::any::type_name::<T>(),
            sync: Some(value),
            asynchronous: None,
        }
    }

    /// Handle for an asynchronously disposable instance.
    pub fn from_async<T: AsyncDispose>(value: Arc<T>) -> Self {
        Self {
            value: value.clone(),
            type_name: std::any::type_name::<T>(),
            sync: None,
            asynchronous: Some(value),
        }
    }

    /// Handle for an instance carrying both capabilities.
    pub fn from_both<T: Dispose + AsyncDispose>(value: Arc<T>) -> Self {
        Self {
            value: value.clone(),
            type_name: std::any::type_name::<T>(),
            sync: Some(value.clone()),
            asynchronous: Some(value),
        }
    }

    pub(crate) fn from_parts(
        value: AnyArc,
        type_name: &'static str,
        sync: Option<Arc<dyn Dispose>>,
        asynchronous: Option<Arc<dyn AsyncDispose>>,
    ) -> Self {
        Self {
            value,
            type_name,
            sync,
            asynchronous,
        }
    }

    /// Disposes this handle through its synchronous capability, outside any
    /// tracker. Async-only handles cannot take this path.
    pub(crate) fn dispose_sync_inline(self) -> DiResult<()> {
        match self.sync {
            Some(disposable) => {
                disposable.dispose();
                Ok(())
            }
            None => Err(DiError::InvalidDisposable(self.type_name)),
        }
    }

    fn has_capability(&self) -> bool {
        self.sync.is_some() || self.asynchronous.is_some()
    }

    fn is_same_instance(&self, other: &AnyArc) -> bool {
        Arc::ptr_eq(&self.value, other)
    }
}

#[derive(Default)]
struct TrackerState {
    entries: Vec<Disposable>,
    disposed: bool,
}

/// Ordered collection of disposable handles with guaranteed reverse-order
/// release.
///
/// The tracker is marked disposed before any handle is released, so
/// re-entrant registration during disposal fails fast with
/// [`DiError::ObjectDisposed`]. A failure while releasing one handle aborts
/// the remaining chain; undisposed remainders are a documented trade-off, not
/// cleaned up after the fact.
pub struct DisposalTracker {
    state: Mutex<TrackerState>,
}

impl DisposalTracker {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Registers a handle for disposal. Duplicate registration of the same
    /// instance is a no-op.
    pub fn register(&self, disposable: Disposable) -> DiResult<()> {
        if !disposable.has_capability() {
            return Err(DiError::InvalidDisposable(disposable.type_name));
        }

        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return Err(DiError::ObjectDisposed("DisposalTracker"));
        }
        if state.entries.iter().any(|e| e.is_same_instance(&disposable.value)) {
            return Ok(());
        }
        state.entries.push(disposable);
        Ok(())
    }

    /// Excludes an instance from automatic disposal, e.g. when ownership is
    /// handed back to the caller. Returns whether the instance was tracked.
    pub fn remove(&self, instance: &AnyArc) -> bool {
        let mut state = self.state.lock().unwrap();
        let before = state.entries.len();
        state.entries.retain(|e| !e.is_same_instance(instance));
        state.entries.len() != before
    }

    /// Number of currently tracked handles.
    pub fn count(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    /// Whether the tracker has been drained.
    pub fn is_disposed(&self) -> bool {
        self.state.lock().unwrap().disposed
    }

    /// Releases every handle synchronously, in reverse registration order.
    ///
    /// A handle that only supports asynchronous disposal is a misuse of this
    /// path and fails with [`DiError::InvalidDisposable`]; the caller must use
    /// [`DisposalTracker::dispose_async`]. Idempotent.
    pub fn dispose_sync(&self) -> DiResult<()> {
        let entries = match self.take_entries() {
            Some(entries) => entries,
            None => return Ok(()),
        };

        for entry in entries.into_iter().rev() {
            match entry.sync {
                Some(disposable) => disposable.dispose(),
                None => return Err(DiError::InvalidDisposable(entry.type_name)),
            }
        }
        Ok(())
    }

    /// Releases every handle in reverse registration order, suspending at
    /// each asynchronously disposable entry until that disposal completes.
    ///
    /// Strictly sequential; sync-only entries are disposed inline. Idempotent.
    pub async fn dispose_async(&self) -> DiResult<()> {
        let entries = match self.take_entries() {
            Some(entries) => entries,
            None => return Ok(()),
        };

        for entry in entries.into_iter().rev() {
            if let Some(disposable) = entry.asynchronous {
                disposable.dispose().await;
            } else if let Some(disposable) = entry.sync {
                disposable.dispose();
            }
        }
        Ok(())
    }

    /// Marks the tracker disposed and takes the entries out, releasing the
    /// lock before any user disposal code runs. Returns `None` when already
    /// disposed.
    fn take_entries(&self) -> Option<Vec<Disposable>> {
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return None;
        }
        state.disposed = true;
        Some(std::mem::take(&mut state.entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct Logged {
        name: &'static str,
        log: Arc<StdMutex<Vec<&'static str>>>,
    }

    impl Dispose for Logged {
        fn dispose(&self) {
            self.log.lock().unwrap().push(self.name);
        }
    }

    fn logged(name: &'static str, log: &Arc<StdMutex<Vec<&'static str>>>) -> Arc<Logged> {
        Arc::new(Logged {
            name,
            log: log.clone(),
        })
    }

    #[test]
    fn disposes_in_reverse_registration_order() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let tracker = DisposalTracker::new();

        tracker.register(Disposable::from_sync(logged("a", &log))).unwrap();
        tracker.register(Disposable::from_sync(logged("b", &log))).unwrap();
        tracker.register(Disposable::from_sync(logged("c", &log))).unwrap();

        tracker.dispose_sync().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["c", "b", "a"]);
    }

    #[test]
    fn duplicate_registration_is_noop() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let tracker = DisposalTracker::new();

        let service = logged("only", &log);
        tracker.register(Disposable::from_sync(service.clone())).unwrap();
        tracker.register(Disposable::from_sync(service.clone())).unwrap();

        assert_eq!(tracker.count(), 1);
        tracker.dispose_sync().unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn remove_excludes_from_disposal() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let tracker = DisposalTracker::new();

        let kept = logged("kept", &log);
        tracker.register(Disposable::from_sync(kept.clone())).unwrap();
        tracker.register(Disposable::from_sync(logged("dropped", &log))).unwrap();

        let handle: AnyArc = kept;
        assert!(tracker.remove(&handle));
        tracker.dispose_sync().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["dropped"]);
    }

    #[test]
    fn dispose_is_idempotent() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let tracker = DisposalTracker::new();
        tracker.register(Disposable::from_sync(logged("once", &log))).unwrap();

        tracker.dispose_sync().unwrap();
        tracker.dispose_sync().unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn registration_after_dispose_fails_fast() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let tracker = DisposalTracker::new();
        tracker.dispose_sync().unwrap();

        let err = tracker
            .register(Disposable::from_sync(logged("late", &log)))
            .unwrap_err();
        assert!(matches!(err, DiError::ObjectDisposed(_)));
    }
}
