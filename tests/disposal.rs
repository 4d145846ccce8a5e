//! Disposal ordering, sync/async capability handling, and ownership rules.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tundra_di::{
    AsyncDispose, ConstructorSpec, DiError, Disposable, Dispose, Lifetime, Resolver,
    ServiceContainer, TypeDescriptor,
};

type Log = Arc<Mutex<Vec<&'static str>>>;

struct SyncResource {
    name: &'static str,
    log: Log,
}

impl Dispose for SyncResource {
    fn dispose(&self) {
        self.log.lock().unwrap().push(self.name);
    }
}

struct AsyncResource {
    name: &'static str,
    log: Log,
}

#[async_trait]
impl AsyncDispose for AsyncResource {
    async fn dispose(&self) {
        self.log.lock().unwrap().push(self.name);
    }
}

struct DualResource {
    log: Log,
}

impl Dispose for DualResource {
    fn dispose(&self) {
        self.log.lock().unwrap().push("dual-sync");
    }
}

#[async_trait]
impl AsyncDispose for DualResource {
    async fn dispose(&self) {
        self.log.lock().unwrap().push("dual-async");
    }
}

fn register_sync(container: &ServiceContainer, name: &'static str, log: &Log) {
    let log = log.clone();
    container.register_type(
        TypeDescriptor::of::<SyncResource>()
            .constructor(ConstructorSpec::new(vec![], move |_| {
                Ok(SyncResource { name, log: log.clone() })
            }))
            .disposable()
            .build(),
    );
}

#[test]
fn container_disposes_in_reverse_resolution_order() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let container = ServiceContainer::new();
    register_sync(&container, "a", &log);
    container.register_keyed::<SyncResource>("a", Lifetime::Transient).unwrap();

    container.get_keyed::<SyncResource>("a").unwrap();
    register_sync(&container, "b", &log);
    container.get_keyed::<SyncResource>("a").unwrap();
    register_sync(&container, "c", &log);
    container.get_keyed::<SyncResource>("a").unwrap();

    assert_eq!(container.disposable_count(), 3);
    container.dispose().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["c", "b", "a"]);

    // Double dispose is a no-op.
    container.dispose().unwrap();
    assert_eq!(log.lock().unwrap().len(), 3);
}

#[test]
fn sync_dispose_rejects_async_only_resources() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let container = ServiceContainer::new();
    let ctor_log = log.clone();
    container.register_type(
        TypeDescriptor::of::<AsyncResource>()
            .constructor(ConstructorSpec::new(vec![], move |_| {
                Ok(AsyncResource { name: "db", log: ctor_log.clone() })
            }))
            .async_disposable()
            .build(),
    );
    container.register::<AsyncResource>(Lifetime::Singleton).unwrap();
    container.get::<AsyncResource>().unwrap();

    let err = container.dispose().unwrap_err();
    assert!(matches!(err, DiError::InvalidDisposable(_)));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn async_dispose_releases_mixed_capabilities_in_order() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let container = ServiceContainer::new();

    register_sync(&container, "sync", &log);
    container.register::<SyncResource>(Lifetime::Singleton).unwrap();

    let ctor_log = log.clone();
    container.register_type(
        TypeDescriptor::of::<AsyncResource>()
            .constructor(ConstructorSpec::new(vec![], move |_| {
                Ok(AsyncResource { name: "async", log: ctor_log.clone() })
            }))
            .async_disposable()
            .build(),
    );
    container.register::<AsyncResource>(Lifetime::Singleton).unwrap();

    let ctor_log = log.clone();
    container.register_type(
        TypeDescriptor::of::<DualResource>()
            .constructor(ConstructorSpec::new(vec![], move |_| {
                Ok(DualResource { log: ctor_log.clone() })
            }))
            .disposable()
            .async_disposable()
            .build(),
    );
    container.register::<DualResource>(Lifetime::Singleton).unwrap();

    container.get::<SyncResource>().unwrap();
    container.get::<AsyncResource>().unwrap();
    container.get::<DualResource>().unwrap();

    container.dispose_async().await.unwrap();
    // Reverse order; the dual-capability resource takes its async path.
    assert_eq!(*log.lock().unwrap(), vec!["dual-async", "async", "sync"]);
}

#[tokio::test]
async fn scope_async_dispose_releases_scope_owned_instances() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let container = ServiceContainer::new();
    let ctor_log = log.clone();
    container.register_type(
        TypeDescriptor::of::<AsyncResource>()
            .constructor(ConstructorSpec::new(vec![], move |_| {
                Ok(AsyncResource { name: "scoped", log: ctor_log.clone() })
            }))
            .async_disposable()
            .build(),
    );
    container.register::<AsyncResource>(Lifetime::Scoped).unwrap();

    let scope = container.create_scope().unwrap();
    scope.get::<AsyncResource>().unwrap();
    assert_eq!(scope.disposable_count(), 1);

    scope.dispose_async().await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["scoped"]);

    container.dispose_async().await.unwrap();
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn caller_supplied_instances_are_never_tracked() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let container = ServiceContainer::new();
    // Disposal capability is declared for the type, but the instance is
    // caller-owned, so the container must not claim it.
    register_sync(&container, "external", &log);
    container
        .register_instance(Arc::new(SyncResource { name: "external", log: log.clone() }))
        .unwrap();

    container.get::<SyncResource>().unwrap();
    assert_eq!(container.disposable_count(), 0);

    container.dispose().unwrap();
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn create_instance_is_caller_owned() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let container = ServiceContainer::new();
    register_sync(&container, "local", &log);

    let resource = container.create_instance::<SyncResource>().unwrap();
    assert_eq!(resource.name, "local");
    assert_eq!(container.disposable_count(), 0);

    container.dispose().unwrap();
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn externally_created_instances_can_join_a_tracker() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let container = ServiceContainer::new();

    let resource = Arc::new(SyncResource { name: "manual", log: log.clone() });
    container.register_disposer(resource.clone()).unwrap();
    // Same instance registered twice is tracked once.
    container.register_disposer(resource).unwrap();
    assert_eq!(container.disposable_count(), 1);

    container.dispose().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["manual"]);
}

#[tokio::test]
async fn dual_capability_handles_prefer_their_async_path() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let container = ServiceContainer::new();

    let dual = Arc::new(DualResource { log: log.clone() });
    container.register_disposable(Disposable::from_both(dual)).unwrap();
    container
        .register_async_disposer(Arc::new(AsyncResource { name: "late", log: log.clone() }))
        .unwrap();
    assert_eq!(container.disposable_count(), 2);

    container.dispose_async().await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["late", "dual-async"]);
}

#[test]
fn dual_capability_handles_dispose_synchronously_inline() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let container = ServiceContainer::new();

    let dual = Arc::new(DualResource { log: log.clone() });
    container.register_disposable(Disposable::from_both(dual)).unwrap();

    container.dispose().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["dual-sync"]);
}

#[test]
fn failed_construction_tracks_nothing() {
    use tundra_di::MemberSpec;

    struct Audited {
        log: Log,
        dep: Mutex<Option<Arc<SyncResource>>>,
    }

    impl Dispose for Audited {
        fn dispose(&self) {
            self.log.lock().unwrap().push("audited");
        }
    }

    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let container = ServiceContainer::new();
    let ctor_log = log.clone();
    container.register_type(
        TypeDescriptor::of::<Audited>()
            .constructor(ConstructorSpec::new(vec![], move |_| {
                Ok(Audited { log: ctor_log.clone(), dep: Mutex::new(None) })
            }))
            .member(MemberSpec::of::<Audited, SyncResource, _>("dep", |a, v| {
                *a.dep.lock().unwrap() = Some(v);
            }))
            .disposable()
            .build(),
    );
    container.register::<Audited>(Lifetime::Transient).unwrap();

    // SyncResource is unregistered; the required member fails the resolution
    // before the constructed value is handed anywhere.
    let err = container.get::<Audited>().err().unwrap();
    assert!(matches!(
        err,
        DiError::MissingRequiredDependency { member: "dep", .. }
    ));
    assert_eq!(container.disposable_count(), 0);

    container.dispose().unwrap();
    assert!(log.lock().unwrap().is_empty());
}
