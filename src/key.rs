//! Service identity: the (type, optional key) pair used for registry and
//! cache lookup.

use std::any::TypeId;
use std::hash::{Hash, Hasher};

/// Key that disambiguates multiple registrations of the same service type.
///
/// Keys are `&'static str`, which keeps identities `Copy` and hashable.
pub type ServiceKey = &'static str;

/// Identity of a registered service: service type plus optional key.
///
/// Equality and hashing cover `(type_id, key)` only — the type name is
/// carried for diagnostics. Two identities are equal iff the types match and
/// both keys are absent, or both are present and equal.
///
/// # Examples
///
/// ```rust
/// use tundra_di::ServiceId;
///
/// let plain = ServiceId::of::<u32>();
/// let keyed = ServiceId::keyed::<u32>("port");
/// assert_ne!(plain, keyed);
/// assert_eq!(keyed, ServiceId::keyed::<u32>("port"));
/// assert_eq!(plain.type_name(), "u32");
/// assert_eq!(keyed.key(), Some("port"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ServiceId {
    type_id: TypeId,
    type_name: &'static str,
    key: Option<ServiceKey>,
}

impl ServiceId {
    /// Identity for an unkeyed service of type `T`.
    ///
    /// `T` may be unsized, so trait-object services (`dyn Logger`) get
    /// identities the same way concrete types do.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            key: None,
        }
    }

    /// Identity for a keyed service of type `T`.
    #[inline]
    pub fn keyed<T: ?Sized + 'static>(key: ServiceKey) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            key: Some(key),
        }
    }

    /// Identity for type `T` under an optional key.
    #[inline]
    pub fn with_key<T: ?Sized + 'static>(key: Option<ServiceKey>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            key,
        }
    }

    /// Builds an identity from raw parts; used when the type is only known
    /// through metadata (constructor parameters, injected members).
    #[inline]
    pub(crate) fn from_parts(
        type_id: TypeId,
        type_name: &'static str,
        key: Option<ServiceKey>,
    ) -> Self {
        Self { type_id, type_name, key }
    }

    /// The service type id.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Human-readable service type name for diagnostics.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The key, or `None` for unkeyed registrations.
    #[inline]
    pub fn key(&self) -> Option<ServiceKey> {
        self.key
    }
}

impl PartialEq for ServiceId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.key == other.key
    }
}

impl Eq for ServiceId {}

impl Hash for ServiceId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.key.hash(state);
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.key {
            Some(key) => write!(f, "{} (key: {:?})", self.type_name, key),
            None => write!(f, "{}", self.type_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn keyed_and_unkeyed_are_distinct_map_entries() {
        let mut map = HashMap::new();
        map.insert(ServiceId::of::<String>(), 1);
        map.insert(ServiceId::keyed::<String>("a"), 2);
        map.insert(ServiceId::keyed::<String>("b"), 3);

        assert_eq!(map.len(), 3);
        assert_eq!(map[&ServiceId::keyed::<String>("a")], 2);
        assert_eq!(map[&ServiceId::of::<String>()], 1);
    }

    #[test]
    fn trait_object_identity() {
        trait Marker {}
        let a = ServiceId::of::<dyn Marker>();
        let b = ServiceId::of::<dyn Marker>();
        assert_eq!(a, b);
        assert_ne!(a, ServiceId::of::<String>());
    }
}
