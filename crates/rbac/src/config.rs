//! Manager configuration: default roles, guest role, direct permissions.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use keystone_core::{RbacError, RbacResult};

/// Zero-argument producer of default role names, evaluated on every read.
pub type DefaultRolesProvider = Arc<dyn Fn() -> anyhow::Result<Vec<String>> + Send + Sync>;

/// Roles implicitly held by every subject.
///
/// Either a literal ordered list or a provider that is re-run each time the
/// list is read (never cached). Providers sit on the hot path of every access
/// check and must be side-effect free.
#[derive(Clone)]
pub enum DefaultRoleNames {
    Static(Vec<String>),
    Provider(DefaultRolesProvider),
}

impl DefaultRoleNames {
    pub fn provider<F>(f: F) -> Self
    where
        F: Fn() -> anyhow::Result<Vec<String>> + Send + Sync + 'static,
    {
        Self::Provider(Arc::new(f))
    }

    /// Accept a JSON array of strings; any other shape is rejected.
    pub fn from_json(value: &JsonValue) -> RbacResult<Self> {
        let JsonValue::Array(values) = value else {
            return Err(RbacError::invalid_config(
                "default roles must be an array of role names or a provider",
            ));
        };

        values
            .iter()
            .map(|v| match v {
                JsonValue::String(s) => Ok(s.clone()),
                other => Err(RbacError::invalid_config(format!(
                    "default role name must be a string, got {other}"
                ))),
            })
            .collect::<RbacResult<Vec<_>>>()
            .map(Self::Static)
    }

    /// Current list of names, running the provider if one is configured.
    pub fn resolve(&self) -> RbacResult<Vec<String>> {
        match self {
            Self::Static(names) => Ok(names.clone()),
            Self::Provider(f) => f().map_err(|e| {
                RbacError::invalid_config(format!("default roles provider failed: {e}"))
            }),
        }
    }
}

impl Default for DefaultRoleNames {
    fn default() -> Self {
        Self::Static(Vec::new())
    }
}

impl core::fmt::Debug for DefaultRoleNames {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Static(names) => f.debug_tuple("Static").field(names).finish(),
            Self::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

impl<S: Into<String>> FromIterator<S> for DefaultRoleNames {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::Static(iter.into_iter().map(Into::into).collect())
    }
}

/// Static manager configuration (file/env sourced).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerConfig {
    pub default_roles: Vec<String>,
    pub guest_role: Option<String>,
    pub enable_direct_permissions: bool,
}

impl ManagerConfig {
    pub const ENV_DEFAULT_ROLES: &'static str = "RBAC_DEFAULT_ROLES";
    pub const ENV_GUEST_ROLE: &'static str = "RBAC_GUEST_ROLE";
    pub const ENV_ENABLE_DIRECT_PERMISSIONS: &'static str = "RBAC_ENABLE_DIRECT_PERMISSIONS";

    /// Read configuration from `RBAC_*` environment variables.
    ///
    /// Unset variables fall back to defaults; `RBAC_DEFAULT_ROLES` is a comma
    /// separated list.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_roles = lookup(Self::ENV_DEFAULT_ROLES)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let guest_role = lookup(Self::ENV_GUEST_ROLE)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let enable_direct_permissions = lookup(Self::ENV_ENABLE_DIRECT_PERMISSIONS)
            .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            default_roles,
            guest_role,
            enable_direct_permissions,
        }
    }

    pub fn from_json(value: &JsonValue) -> RbacResult<Self> {
        serde_json::from_value(value.clone()).map_err(|e| RbacError::invalid_config(e.to_string()))
    }
}
