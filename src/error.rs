//! Error types for the dependency injection container.

use std::fmt;

/// Dependency injection errors.
///
/// Every failure is local, synchronous and surfaced directly to the caller of
/// the triggering operation; nothing is retried or swallowed. Callers can rely
/// on the distinction between "service absent" ([`DiError::NotRegistered`],
/// avoidable via the optional accessors) and "service misconfigured" (all
/// other variants).
///
/// # Examples
///
/// ```rust
/// use tundra_di::{DiError, Resolver, ServiceContainer};
///
/// let container = ServiceContainer::new();
/// match container.get::<String>() {
///     Err(DiError::NotRegistered(name)) => assert_eq!(name, "alloc::string::String"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiError {
    /// Requested identity has no descriptor.
    NotRegistered(&'static str),
    /// Interface/abstract (opaque) type requested for direct construction.
    NotConstructible(&'static str),
    /// The type has constructors but none could be selected, and no zero
    /// value is available. Treated as a programmer error in the metadata.
    NoViableConstructor(&'static str),
    /// A required injected member had no resolvable value.
    MissingRequiredDependency {
        /// Type that was being constructed.
        service: &'static str,
        /// Name of the member that could not be satisfied.
        member: &'static str,
    },
    /// Resolved instance cannot be cast to the statically requested type.
    /// Indicates a registration bug.
    TypeMismatch(&'static str),
    /// Mutating or resolving call on a disposed container or scope.
    ObjectDisposed(&'static str),
    /// Defensive: lifetime value with no dispatch arm.
    UnsupportedLifetime(&'static str),
    /// Registered object supports neither sync nor async disposal, or an
    /// async-only object was forced through the synchronous disposal path.
    InvalidDisposable(&'static str),
    /// Identity already registered and the registry is read-only.
    AlreadyRegistered(&'static str),
    /// Registration change rejected: unregistration on a read-only registry,
    /// or a descriptor invariant violation.
    InvalidRegistration(&'static str),
}

impl fmt::Display for DiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiError::NotRegistered(name) => write!(f, "Service not registered: {}", name),
            DiError::NotConstructible(name) => {
                write!(f, "Type is not constructible (opaque or abstract): {}", name)
            }
            DiError::NoViableConstructor(name) => {
                write!(f, "No viable constructor for: {}", name)
            }
            DiError::MissingRequiredDependency { service, member } => {
                write!(f, "Required dependency for member `{}` of {} is not registered", member, service)
            }
            DiError::TypeMismatch(name) => write!(f, "Type mismatch for: {}", name),
            DiError::ObjectDisposed(what) => write!(f, "{} is disposed", what),
            DiError::UnsupportedLifetime(msg) => write!(f, "Unsupported lifetime: {}", msg),
            DiError::InvalidDisposable(msg) => write!(f, "Invalid disposable: {}", msg),
            DiError::AlreadyRegistered(name) => {
                write!(f, "Service already registered (registry is read-only): {}", name)
            }
            DiError::InvalidRegistration(msg) => write!(f, "Invalid registration: {}", msg),
        }
    }
}

impl std::error::Error for DiError {}

/// Result type for DI operations.
pub type DiResult<T> = Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_member() {
        let err = DiError::MissingRequiredDependency {
            service: "app::Widget",
            member: "logger",
        };
        let text = err.to_string();
        assert!(text.contains("logger"));
        assert!(text.contains("app::Widget"));
    }

    #[test]
    fn errors_compare_by_payload() {
        assert_eq!(DiError::NotRegistered("A"), DiError::NotRegistered("A"));
        assert_ne!(DiError::NotRegistered("A"), DiError::TypeMismatch("A"));
    }
}
