use serde::Serialize;

use keystone_core::{RbacResult, SubjectId};

use crate::manager::Manager;
use crate::rule::{Params, RuleFactory};
use crate::store::{AssignmentsStore, ItemsStore};

// ─────────────────────────────────────────────────────────────────────────────
// Access Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an access decision.
///
/// This structure provides transparent, debuggable information about why
/// a check was allowed or denied.
#[derive(Debug, Clone, Serialize)]
pub struct AccessExplanation {
    /// The permission that was being checked.
    pub permission: String,

    /// `None` for anonymous checks.
    pub subject: Option<SubjectId>,

    pub granted: bool,

    /// Human-readable reason for the decision.
    pub reason: String,

    /// Effective roles (default roles first, then assigned roles).
    pub roles: Vec<String>,

    /// Effective permissions before rule evaluation.
    pub effective_permissions: Vec<String>,

    /// If denied, this explains what was missing.
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    UnknownPermission,
    NotGranted,
}

impl<I, A, R> Manager<I, A, R>
where
    I: ItemsStore,
    A: AssignmentsStore,
    R: RuleFactory,
{
    /// Explain why an access decision was made (or would be made).
    ///
    /// Runs the same check as [`Manager::user_has_permission`], so it fails in
    /// the same cases. Anonymous subjects report the guest role (or default
    /// roles) they are evaluated with.
    pub fn explain_access(
        &self,
        subject: Option<&SubjectId>,
        permission_name: &str,
        params: &Params,
    ) -> RbacResult<AccessExplanation> {
        let granted = self.user_has_permission(subject, permission_name, params)?;

        let (roles, effective_permissions) = match subject {
            Some(subject) => (
                item_names(self.get_roles_by_user_id(subject)?),
                item_names(self.get_permissions_by_user_id(subject)?),
            ),
            None => {
                let roles = match self.get_guest_role()? {
                    Some(guest) => vec![guest.name().to_string()],
                    None => item_names(self.resolved_default_roles()?),
                };
                let mut permissions: Vec<String> = Vec::new();
                for role in &roles {
                    for p in item_names(self.get_permissions_by_role_name(role)?) {
                        if !permissions.contains(&p) {
                            permissions.push(p);
                        }
                    }
                }
                (roles, permissions)
            }
        };

        let exists = self.get_permission(permission_name)?.is_some()
            || self.get_role(permission_name)?.is_some();

        if granted {
            return Ok(AccessExplanation {
                permission: permission_name.to_string(),
                subject: subject.cloned(),
                granted,
                reason: format!("'{permission_name}' is granted through the subject's roles or assignments"),
                roles,
                effective_permissions,
                denial_reason: None,
            });
        }

        let denial_reason = if !exists {
            DenialReason {
                kind: DenialKind::UnknownPermission,
                message: format!("'{permission_name}' is not defined"),
                suggestions: vec![format!("Add the permission '{permission_name}' before checking it")],
            }
        } else {
            let mut suggestions = vec![
                format!("Assign a role that grants the '{permission_name}' permission"),
                format!("Add '{permission_name}' as a child of one of the subject's roles"),
            ];
            if effective_permissions.iter().any(|p| p == permission_name) {
                suggestions.insert(
                    0,
                    "The permission is reachable; a rule on the path rejected the parameters".to_string(),
                );
            }
            DenialReason {
                kind: DenialKind::NotGranted,
                message: format!("Missing required permission: '{permission_name}'"),
                suggestions,
            }
        };

        Ok(AccessExplanation {
            permission: permission_name.to_string(),
            subject: subject.cloned(),
            granted,
            reason: format!(
                "Subject does not have permission '{}'. Current permissions: {:?}",
                permission_name, effective_permissions
            ),
            roles,
            effective_permissions,
            denial_reason: Some(denial_reason),
        })
    }
}

fn item_names(items: Vec<crate::item::Item>) -> Vec<String> {
    items.into_iter().map(|i| i.name().to_string()).collect()
}
