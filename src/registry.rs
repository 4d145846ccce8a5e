//! Service registry: one descriptor per service identity, plus open-generic
//! registrations that close lazily.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::descriptor::ServiceDescriptor;
use crate::error::{DiError, DiResult};
use crate::key::{ServiceId, ServiceKey};
use crate::lifetime::Lifetime;

/// An open-generic registration: every closed instantiation of the family
/// resolves through a descriptor cloned from this record on first use.
struct OpenGenericRegistration {
    lifetime: Lifetime,
}

struct RegistryState {
    descriptors: HashMap<ServiceId, Arc<ServiceDescriptor>>,
    open_generics: HashMap<(&'static str, Option<ServiceKey>), OpenGenericRegistration>,
}

/// Stores one descriptor per (service type, optional key) identity.
///
/// Registration policy: re-registering an identity replaces its descriptor by
/// default, or fails with [`DiError::AlreadyRegistered`] when the registry was
/// constructed read-only. Disposal of a replaced singleton's instance is the
/// container's responsibility — the registry only hands the old descriptor
/// back.
pub(crate) struct ServiceRegistry {
    read_only: bool,
    state: Mutex<RegistryState>,
}

impl ServiceRegistry {
    pub(crate) fn new(read_only: bool) -> Self {
        Self {
            read_only,
            state: Mutex::new(RegistryState {
                descriptors: HashMap::new(),
                open_generics: HashMap::new(),
            }),
        }
    }

    /// Inserts a descriptor, returning the replaced one if the identity was
    /// already present.
    pub(crate) fn register(
        &self,
        descriptor: ServiceDescriptor,
    ) -> DiResult<Option<Arc<ServiceDescriptor>>> {
        let id = descriptor.service();
        let mut state = self.state.lock().unwrap();

        if self.read_only && state.descriptors.contains_key(&id) {
            return Err(DiError::AlreadyRegistered(id.type_name()));
        }

        Ok(state.descriptors.insert(id, Arc::new(descriptor)))
    }

    /// Registers an open-generic family under an optional key.
    pub(crate) fn register_open_generic(
        &self,
        family: &'static str,
        key: Option<ServiceKey>,
        lifetime: Lifetime,
    ) -> DiResult<()> {
        let mut state = self.state.lock().unwrap();

        if self.read_only && state.open_generics.contains_key(&(family, key)) {
            return Err(DiError::AlreadyRegistered(family));
        }

        state
            .open_generics
            .insert((family, key), OpenGenericRegistration { lifetime });
        Ok(())
    }

    /// Removes a descriptor, handing it back so the caller can settle
    /// disposal ownership.
    pub(crate) fn unregister(&self, id: &ServiceId) -> Option<Arc<ServiceDescriptor>> {
        self.state.lock().unwrap().descriptors.remove(id)
    }

    pub(crate) fn is_registered(&self, id: &ServiceId) -> bool {
        self.state.lock().unwrap().descriptors.contains_key(id)
    }

    pub(crate) fn descriptor_optional(&self, id: &ServiceId) -> Option<Arc<ServiceDescriptor>> {
        self.state.lock().unwrap().descriptors.get(id).cloned()
    }

    /// Synthesizes and caches a closed descriptor for `id` from the
    /// open-generic registration of `family`, if one exists under the same
    /// key. Subsequent lookups of `id` hit the descriptor map directly.
    ///
    /// The closed descriptor's implementation is the requested closed type
    /// itself: with monomorphized generics, each closed instantiation carries
    /// its own constructor metadata.
    pub(crate) fn close_open_generic(
        &self,
        family: &'static str,
        id: &ServiceId,
        close: impl FnOnce(Lifetime) -> ServiceDescriptor,
    ) -> Option<Arc<ServiceDescriptor>> {
        let mut state = self.state.lock().unwrap();

        // Another caller may have closed the same identity already.
        if let Some(existing) = state.descriptors.get(id) {
            return Some(existing.clone());
        }

        let registration = state.open_generics.get(&(family, id.key()))?;
        let descriptor = Arc::new(close(registration.lifetime));
        state.descriptors.insert(*id, descriptor.clone());
        Some(descriptor)
    }

    /// Number of registered descriptors (closed identities only).
    pub(crate) fn count(&self) -> usize {
        self.state.lock().unwrap().descriptors.len()
    }

    /// Snapshot of every registered descriptor.
    pub(crate) fn descriptors(&self) -> Vec<Arc<ServiceDescriptor>> {
        self.state.lock().unwrap().descriptors.values().cloned().collect()
    }
}
