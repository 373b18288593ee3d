//! Subject identifiers (the "who" of an access check).

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::RbacError;

/// Identifier of a subject (user, service account, ...) that receives assignments.
///
/// Integer identifiers are normalized to their decimal form, so `42` and `"42"`
/// name the same subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate a dynamically-typed subject identifier.
    ///
    /// Strings and integers are accepted, `null` means "anonymous". Every other
    /// shape is rejected with [`RbacError::InvalidSubject`].
    pub fn from_json(value: &JsonValue) -> Result<Option<Self>, RbacError> {
        match value {
            JsonValue::Null => Ok(None),
            JsonValue::String(s) => Ok(Some(Self(s.clone()))),
            JsonValue::Number(n) if n.is_i64() || n.is_u64() => Ok(Some(Self(n.to_string()))),
            JsonValue::Number(n) => Err(RbacError::invalid_subject(format!(
                "expected string or integer, got number {n}"
            ))),
            JsonValue::Bool(_) => Err(RbacError::invalid_subject("expected string or integer, got bool")),
            JsonValue::Array(_) => Err(RbacError::invalid_subject("expected string or integer, got array")),
            JsonValue::Object(_) => Err(RbacError::invalid_subject("expected string or integer, got object")),
        }
    }
}

impl core::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SubjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&String> for SubjectId {
    fn from(value: &String) -> Self {
        Self(value.clone())
    }
}

impl From<Uuid> for SubjectId {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for SubjectId {
                fn from(value: $t) -> Self {
                    Self(value.to_string())
                }
            }
        )*
    };
}

impl_from_integer!(i32, i64, u32, u64, usize);
