//! Type metadata consumed by the resolution engine.
//!
//! Rust has no runtime reflection, so the "given a type, enumerate its
//! constructors and injectable members" capability is supplied explicitly:
//! each constructible type registers a [`TypeDescriptor`] carrying its
//! constructor specs, injectable members, disposal capabilities and trait
//! coercions. The engine consumes descriptors as pure data — it never
//! inspects types itself.
//!
//! # Examples
//!
//! ```
//! use tundra_di::{ConstructorSpec, ParamSpec, TypeDescriptor};
//! use std::sync::Arc;
//!
//! struct Database { url: String }
//! struct UserService { db: Arc<Database> }
//!
//! let td = TypeDescriptor::of::<UserService>()
//!     .constructor(ConstructorSpec::new(
//!         vec![ParamSpec::of::<Database>()],
//!         |args| Ok(UserService { db: args.get::<Database>(0)? }),
//!     ))
//!     .build();
//! assert_eq!(td.type_name(), std::any::type_name::<UserService>());
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use crate::error::{DiError, DiResult};
use crate::key::ServiceKey;
use crate::traits::{AsyncDispose, Dispose};

/// Type-erased shared instance, the engine's universal currency.
///
/// Concrete services are stored as `Arc<T>`; trait-object services are stored
/// double-wrapped as `Arc<Arc<dyn Trait>>` so they fit behind `dyn Any`.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) type ZeroFn = Arc<dyn Fn() -> AnyArc + Send + Sync>;
type BuildFn = Arc<dyn Fn(Args) -> DiResult<AnyArc> + Send + Sync>;
type AssignFn = Arc<dyn Fn(&AnyArc, AnyArc) -> DiResult<()> + Send + Sync>;
pub(crate) type SyncAdapterFn = Arc<dyn Fn(&AnyArc) -> Option<Arc<dyn Dispose>> + Send + Sync>;
pub(crate) type AsyncAdapterFn =
    Arc<dyn Fn(&AnyArc) -> Option<Arc<dyn AsyncDispose>> + Send + Sync>;
type CoerceFn = Arc<dyn Fn(AnyArc) -> Option<AnyArc> + Send + Sync>;

/// Resolved constructor arguments, in parameter declaration order.
pub struct Args(pub(crate) Vec<AnyArc>);

impl Args {
    /// Downcasts the argument at `index` to a concrete service type.
    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> DiResult<Arc<T>> {
        self.arg(index)?
            .downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Copies out a plain value argument (primitives resolved to zero values).
    pub fn get_value<T: Copy + Send + Sync + 'static>(&self, index: usize) -> DiResult<T> {
        self.get::<T>(index).map(|v| *v)
    }

    /// Downcasts the argument at `index` to a trait-object service.
    pub fn get_trait<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> DiResult<Arc<T>> {
        self.arg(index)?
            .downcast::<Arc<T>>()
            .map(|wrapped| (*wrapped).clone())
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    fn arg(&self, index: usize) -> DiResult<AnyArc> {
        self.0
            .get(index)
            .cloned()
            .ok_or(DiError::NoViableConstructor("constructor argument index out of range"))
    }
}

/// A single constructor parameter: declared type, optional keyed-service
/// marker, and an optional zero-value fallback for unregistered primitives.
#[derive(Clone)]
pub struct ParamSpec {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) key: Option<ServiceKey>,
    pub(crate) zero: Option<ZeroFn>,
}

impl ParamSpec {
    /// Parameter of service type `T`, resolved through the registry.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            key: None,
            zero: None,
        }
    }

    /// Parameter of a plain value type. If no descriptor is registered for
    /// it, the parameter resolves to `T::default()` instead of failing.
    pub fn value<T: Default + Send + Sync + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            key: None,
            zero: Some(Arc::new(|| Arc::new(T::default()) as AnyArc)),
        }
    }

    /// Attaches a keyed-service marker: the parameter resolves under `key`.
    pub fn keyed(mut self, key: ServiceKey) -> Self {
        self.key = Some(key);
        self
    }
}

/// A constructor: parameter list plus the invocation closure.
pub struct ConstructorSpec {
    pub(crate) preferred: bool,
    pub(crate) params: Vec<ParamSpec>,
    pub(crate) build: BuildFn,
}

impl ConstructorSpec {
    /// Constructor taking `params`, built by `build` from the resolved
    /// arguments.
    pub fn new<T, F>(params: Vec<ParamSpec>, build: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Args) -> DiResult<T> + Send + Sync + 'static,
    {
        Self {
            preferred: false,
            params,
            build: Arc::new(move |args| Ok(Arc::new(build(&args)?) as AnyArc)),
        }
    }

    /// Like [`ConstructorSpec::new`] but carrying the preferred-constructor
    /// marker; selected over other constructors regardless of arity.
    pub fn preferred<T, F>(params: Vec<ParamSpec>, build: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Args) -> DiResult<T> + Send + Sync + 'static,
    {
        let mut spec = Self::new(params, build);
        spec.preferred = true;
        spec
    }
}

/// An injectable member: externally-settable state filled in after
/// construction.
///
/// The setter runs strictly after the constructor, so injected fields use
/// interior mutability (`Mutex<Option<..>>` or similar). `required` defaults
/// to true, matching the required-injection marker's default.
pub struct MemberSpec {
    pub(crate) name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) key: Option<ServiceKey>,
    pub(crate) required: bool,
    pub(crate) assign: AssignFn,
}

impl MemberSpec {
    /// Member of concrete dependency type `D` on owner `O`.
    pub fn of<O, D, F>(name: &'static str, set: F) -> Self
    where
        O: Send + Sync + 'static,
        D: Send + Sync + 'static,
        F: Fn(&O, Arc<D>) + Send + Sync + 'static,
    {
        Self {
            name,
            type_id: TypeId::of::<D>(),
            type_name: std::any::type_name::<D>(),
            key: None,
            required: true,
            assign: Arc::new(move |owner, value| {
                let owner = owner
                    .downcast_ref::<O>()
                    .ok_or(DiError::TypeMismatch(std::any::type_name::<O>()))?;
                let value = value
                    .downcast::<D>()
                    .map_err(|_| DiError::TypeMismatch(std::any::type_name::<D>()))?;
                set(owner, value);
                Ok(())
            }),
        }
    }

    /// Member of trait-object dependency type `D` on owner `O`.
    pub fn of_trait<O, D, F>(name: &'static str, set: F) -> Self
    where
        O: Send + Sync + 'static,
        D: ?Sized + Send + Sync + 'static,
        F: Fn(&O, Arc<D>) + Send + Sync + 'static,
    {
        Self {
            name,
            type_id: TypeId::of::<D>(),
            type_name: std::any::type_name::<D>(),
            key: None,
            required: true,
            assign: Arc::new(move |owner, value| {
                let owner = owner
                    .downcast_ref::<O>()
                    .ok_or(DiError::TypeMismatch(std::any::type_name::<O>()))?;
                let value = value
                    .downcast::<Arc<D>>()
                    .map(|wrapped| (*wrapped).clone())
                    .map_err(|_| DiError::TypeMismatch(std::any::type_name::<D>()))?;
                set(owner, value);
                Ok(())
            }),
        }
    }

    /// Attaches a keyed-service marker to the member.
    pub fn keyed(mut self, key: ServiceKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Marks the member optional: a missing dependency leaves the member in
    /// its empty/absent state instead of failing.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Everything the engine knows about one type.
///
/// Built once per type via [`TypeDescriptor::of`] (constructible types) or
/// [`TypeDescriptor::opaque`] (trait objects and other non-constructible
/// service types) and registered on the container.
pub struct TypeDescriptor {
    type_id: TypeId,
    type_name: &'static str,
    constructible: bool,
    generic_family: Option<&'static str>,
    constructors: Vec<ConstructorSpec>,
    members: Vec<MemberSpec>,
    zero: Option<ZeroFn>,
    sync_dispose: Option<SyncAdapterFn>,
    async_dispose: Option<AsyncAdapterFn>,
    coercions: HashMap<TypeId, CoerceFn>,
}

impl TypeDescriptor {
    /// Starts building the descriptor for a constructible type `T`.
    pub fn of<T: Send + Sync + 'static>() -> TypeDescriptorBuilder<T> {
        TypeDescriptorBuilder {
            descriptor: TypeDescriptor {
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
                constructible: true,
                generic_family: None,
                constructors: Vec::new(),
                members: Vec::new(),
                zero: None,
                sync_dispose: None,
                async_dispose: None,
                coercions: HashMap::new(),
            },
            _marker: PhantomData,
        }
    }

    /// Descriptor for a type that can never be constructed directly — the
    /// interface/abstract case. Requesting direct construction of an opaque
    /// type fails with [`DiError::NotConstructible`].
    pub fn opaque<T: ?Sized + 'static>() -> TypeDescriptor {
        TypeDescriptor {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            constructible: false,
            generic_family: None,
            constructors: Vec::new(),
            members: Vec::new(),
            zero: None,
            sync_dispose: None,
            async_dispose: None,
            coercions: HashMap::new(),
        }
    }

    /// The described type's id.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The described type's name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn is_constructible(&self) -> bool {
        self.constructible
    }

    pub(crate) fn generic_family(&self) -> Option<&'static str> {
        self.generic_family
    }

    pub(crate) fn members(&self) -> &[MemberSpec] {
        &self.members
    }

    pub(crate) fn zero(&self) -> Option<&ZeroFn> {
        self.zero.as_ref()
    }

    pub(crate) fn sync_dispose(&self) -> Option<&SyncAdapterFn> {
        self.sync_dispose.as_ref()
    }

    pub(crate) fn async_dispose(&self) -> Option<&AsyncAdapterFn> {
        self.async_dispose.as_ref()
    }

    pub(crate) fn coercion(&self, service: TypeId) -> Option<&CoerceFn> {
        self.coercions.get(&service)
    }

    /// Selects the constructor per the engine's priority order: a lone
    /// constructor wins, then the preferred marker, then the greatest
    /// parameter count (first declared wins ties).
    pub(crate) fn select_constructor(&self) -> Option<&ConstructorSpec> {
        if self.constructors.len() == 1 {
            return self.constructors.first();
        }

        if let Some(preferred) = self.constructors.iter().find(|c| c.preferred) {
            return Some(preferred);
        }

        let mut best: Option<&ConstructorSpec> = None;
        for ctor in &self.constructors {
            match best {
                Some(b) if ctor.params.len() <= b.params.len() => {}
                _ => best = Some(ctor),
            }
        }
        best
    }
}

/// Builder for [`TypeDescriptor`], typed on the described type.
pub struct TypeDescriptorBuilder<T: Send + Sync + 'static> {
    descriptor: TypeDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> TypeDescriptorBuilder<T> {
    /// Adds a constructor. Declaration order matters for tie-breaking.
    pub fn constructor(mut self, ctor: ConstructorSpec) -> Self {
        self.descriptor.constructors.push(ctor);
        self
    }

    /// Adds an injectable member.
    pub fn member(mut self, member: MemberSpec) -> Self {
        self.descriptor.members.push(member);
        self
    }

    /// Provides a default/zero value, used when the type declares no
    /// constructors (the value-type case).
    pub fn zero(mut self) -> Self
    where
        T: Default,
    {
        self.descriptor.zero = Some(Arc::new(|| Arc::new(T::default()) as AnyArc));
        self
    }

    /// Marks instances as synchronously disposable; constructed instances are
    /// registered with the owning disposal tracker.
    pub fn disposable(mut self) -> Self
    where
        T: Dispose,
    {
        self.descriptor.sync_dispose = Some(Arc::new(|any: &AnyArc| {
            any.clone().downcast::<T>().ok().map(|v| v as Arc<dyn Dispose>)
        }));
        self
    }

    /// Marks instances as asynchronously disposable.
    pub fn async_disposable(mut self) -> Self
    where
        T: AsyncDispose,
    {
        self.descriptor.async_dispose = Some(Arc::new(|any: &AnyArc| {
            any.clone().downcast::<T>().ok().map(|v| v as Arc<dyn AsyncDispose>)
        }));
        self
    }

    /// Records the unsizing coercion to a trait-object service type, so a
    /// descriptor registered as `(dyn Service <- T)` can hand out the
    /// service-typed view of a constructed instance.
    pub fn implements<S>(mut self, coerce: fn(Arc<T>) -> Arc<S>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.descriptor.coercions.insert(
            TypeId::of::<S>(),
            Arc::new(move |any: AnyArc| {
                any.downcast::<T>().ok().map(|v| Arc::new(coerce(v)) as AnyArc)
            }),
        );
        self
    }

    /// Tags the type as a closed instantiation of the named open-generic
    /// family, making it resolvable through an open-generic registration.
    pub fn generic_family(mut self, family: &'static str) -> Self {
        self.descriptor.generic_family = Some(family);
        self
    }

    /// Finishes the build.
    pub fn build(self) -> TypeDescriptor {
        self.descriptor
    }
}

/// Per-container map of type descriptors. No global state: two containers
/// never share metadata implicitly.
pub(crate) struct TypeMetadata {
    types: Mutex<HashMap<TypeId, Arc<TypeDescriptor>>>,
}

impl TypeMetadata {
    pub(crate) fn new() -> Self {
        Self {
            types: Mutex::new(HashMap::new()),
        }
    }

    /// Registers (or replaces) the descriptor for its type.
    pub(crate) fn insert(&self, descriptor: TypeDescriptor) {
        let mut types = self.types.lock().unwrap();
        types.insert(descriptor.type_id, Arc::new(descriptor));
    }

    pub(crate) fn get(&self, type_id: TypeId) -> Option<Arc<TypeDescriptor>> {
        self.types.lock().unwrap().get(&type_id).cloned()
    }
}
