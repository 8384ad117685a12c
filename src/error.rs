//! Error types for the authorization engine

use std::sync::Arc;

use thiserror::Error;

/// Authorization engine errors
///
/// Structural variants (`UndefinedInheritance`, `InvalidPattern`,
/// `InheritanceCycle`) are raised once, while building the role graph, and
/// are fatal to initialization. `Loader` and `Init` belong to the deferred
/// initialization path. `Predicate` is per-call: the engine stays usable
/// after one.
#[derive(Debug, Error)]
pub enum RbacError {
    /// A role inherits from a role that is not defined
    #[error("role `{role}` inherits undefined role `{target}`")]
    UndefinedInheritance { role: String, target: String },

    /// A grant pattern failed to compile
    #[error("invalid pattern `{pattern}` in role `{role}`: {source}")]
    InvalidPattern {
        role: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Cyclic inheritance detected while building the role graph
    #[error("circular inheritance: {path}")]
    InheritanceCycle { path: String },

    /// The deferred role-definition source rejected or failed
    #[error("role definitions failed to load: {error}")]
    Loader { error: Arc<anyhow::Error> },

    /// A failed deferred initialization, re-surfaced to later callers
    ///
    /// Every `ready()` or `can()` call made after a deferred initialization
    /// fails observes the same memoized failure wrapped in this variant.
    #[error("initialization failed: {0}")]
    Init(Arc<RbacError>),

    /// A conditional predicate failed during resolution
    ///
    /// Distinct from the predicate returning `false`: only a failing
    /// predicate produces this, annotated with the role that owns the
    /// grant.
    #[error("role: {role} when: {error}")]
    Predicate { role: String, error: Arc<anyhow::Error> },

    /// Internal consistency violation; indicates an engine defect
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, RbacError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicate_error_carries_role_annotation() {
        let err = RbacError::Predicate {
            role: "user".to_string(),
            error: Arc::new(anyhow::anyhow!("ownerId missing")),
        };
        assert_eq!(err.to_string(), "role: user when: ownerId missing");
    }

    #[test]
    fn init_error_wraps_original_failure() {
        let inner = RbacError::UndefinedInheritance {
            role: "admin".to_string(),
            target: "root".to_string(),
        };
        let err = RbacError::Init(Arc::new(inner));
        assert!(err.to_string().contains("inherits undefined role `root`"));
    }
}
