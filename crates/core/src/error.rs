//! Access-control error model.

use thiserror::Error;

/// Result type used across the access-control layer.
pub type RbacResult<T> = Result<T, RbacError>;

/// Storage backend failure.
///
/// Stores are external collaborators; this is the only error shape they may
/// surface to the manager.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage lock poisoned")]
    LockPoisoned,

    #[error("storage error: {0}")]
    Backend(String),
}

/// Error raised by the access-control manager.
///
/// Authorization outcomes ("no access", "unknown permission") are never errors;
/// these variants describe caller or configuration bugs and structural
/// violations of the item hierarchy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RbacError {
    /// Subject identifier is neither a string, an integer, nor absent.
    #[error("invalid subject identifier: {0}")]
    InvalidSubject(String),

    /// A referenced item does not exist where existence is required.
    #[error("item '{0}' not found")]
    NotFound(String),

    /// An item references a rule that is not registered.
    #[error("rule '{0}' not found")]
    RuleNotFound(String),

    /// An item with this name already exists (of either kind).
    #[error("item '{0}' already exists")]
    AlreadyExists(String),

    /// Renaming an item onto a name that is already taken.
    #[error("unable to change name to '{0}': an item with this name already exists")]
    NameConflict(String),

    #[error("'{item}' has already been assigned to subject '{subject}'")]
    AlreadyAssigned { item: String, subject: String },

    /// Direct permission assignment is disabled for this manager.
    #[error("assigning permission '{0}' directly to a subject is disabled")]
    DirectPermissionDisabled(String),

    /// Structural hierarchy violation (self-child, permission parenting a
    /// role, duplicate edge, cycle).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed default-role configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("default role '{0}' not found")]
    DefaultRoleNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RbacError {
    pub fn invalid_subject(msg: impl Into<String>) -> Self {
        Self::InvalidSubject(msg.into())
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    pub fn rule_not_found(name: impl Into<String>) -> Self {
        Self::RuleNotFound(name.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn already_assigned(item: impl Into<String>, subject: impl Into<String>) -> Self {
        Self::AlreadyAssigned {
            item: item.into(),
            subject: subject.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_convert_transparently() {
        let err: RbacError = StoreError::Backend("disk full".to_string()).into();
        assert_eq!(err.to_string(), "storage error: disk full");
    }

    #[test]
    fn already_assigned_names_both_sides() {
        let err = RbacError::already_assigned("author", "42");
        let msg = err.to_string();
        assert!(msg.contains("author"));
        assert!(msg.contains("42"));
    }
}
