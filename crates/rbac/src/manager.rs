//! Access-control manager: hierarchy invariants, permission resolution,
//! listings and assignment bookkeeping.
//!
//! The manager owns no graph or assignment state. Every call reads the current
//! state from the stores, runs in memory and writes mutations back. The only
//! state held here is configuration: default roles, guest role, and whether
//! permissions may be assigned directly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value as JsonValue;

use keystone_core::{Clock, RbacError, RbacResult, SubjectId, SystemClock};

use crate::config::{DefaultRoleNames, ManagerConfig};
use crate::item::{Assignment, Item, ItemKind};
use crate::rule::{Params, RuleFactory};
use crate::store::{AssignmentsStore, ItemsStore};

/// RBAC decision engine over an items store, an assignments store and a rule
/// factory.
///
/// # Invariants
/// - The parent → child edge set is acyclic; every insertion is checked first.
/// - A permission never parents a role.
/// - Item names are unique across roles and permissions.
/// - An `(item, subject)` pair is assigned at most once.
///
/// Configuration setters take `&mut self`: configure before sharing.
pub struct Manager<I, A, R> {
    items: I,
    assignments: A,
    rules: R,
    clock: Arc<dyn Clock>,
    default_role_names: DefaultRoleNames,
    guest_role_name: Option<String>,
    enable_direct_permissions: bool,
}

impl<I, A, R> Manager<I, A, R>
where
    I: ItemsStore,
    A: AssignmentsStore,
    R: RuleFactory,
{
    pub fn new(items: I, assignments: A, rules: R) -> Self {
        Self {
            items,
            assignments,
            rules,
            clock: Arc::new(SystemClock),
            default_role_names: DefaultRoleNames::default(),
            guest_role_name: None,
            enable_direct_permissions: false,
        }
    }

    pub fn from_config(items: I, assignments: A, rules: R, config: ManagerConfig) -> Self {
        let mut manager = Self::new(items, assignments, rules);
        manager.default_role_names = DefaultRoleNames::Static(config.default_roles);
        manager.guest_role_name = config.guest_role;
        manager.enable_direct_permissions = config.enable_direct_permissions;
        manager
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_direct_permissions(mut self, enabled: bool) -> Self {
        self.enable_direct_permissions = enabled;
        self
    }

    pub fn direct_permissions_enabled(&self) -> bool {
        self.enable_direct_permissions
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Access checks
    // ─────────────────────────────────────────────────────────────────────────

    /// Decide whether `subject` holds `permission_name`.
    ///
    /// Unknown permissions and missing grants are `Ok(false)`. Errors are
    /// reserved for configuration bugs: an item on the search path referencing
    /// an unregistered rule fails with [`RbacError::RuleNotFound`], whether or
    /// not the subject could reach that item.
    pub fn user_has_permission(
        &self,
        subject: Option<&SubjectId>,
        permission_name: &str,
        params: &Params,
    ) -> RbacResult<bool> {
        let Some(permission) = self.items.get(permission_name)? else {
            tracing::trace!(permission = permission_name, "unknown permission, denying");
            return Ok(false);
        };

        let assigned = self.assigned_item_names(subject)?;
        let mut denied = HashSet::new();
        let granted = self.user_has_item(subject, &permission, params, &assigned, &mut denied)?;

        tracing::trace!(
            subject = subject.map(SubjectId::as_str),
            permission = permission_name,
            granted,
            "access decision"
        );
        Ok(granted)
    }

    /// Same as [`Self::user_has_permission`], for a dynamically-typed subject.
    ///
    /// Fails with [`RbacError::InvalidSubject`] unless `subject` is a string, an
    /// integer or `null`.
    pub fn user_has_permission_json(
        &self,
        subject: &JsonValue,
        permission_name: &str,
        params: &Params,
    ) -> RbacResult<bool> {
        let subject = SubjectId::from_json(subject)?;
        self.user_has_permission(subject.as_ref(), permission_name, params)
    }

    /// Item names the subject holds for this query, before hierarchy expansion.
    fn assigned_item_names(&self, subject: Option<&SubjectId>) -> RbacResult<HashSet<String>> {
        let mut names = HashSet::new();

        match subject {
            Some(subject) => {
                names.extend(
                    self.assignments
                        .get_by_user_id(subject)?
                        .into_iter()
                        .map(|a| a.item_name),
                );
            }
            None => {
                if let Some(guest) = self.get_guest_role()? {
                    names.insert(guest.name().to_string());
                    return Ok(names);
                }
            }
        }

        names.extend(
            self.resolved_default_roles()?
                .into_iter()
                .map(|role| role.name().to_string()),
        );
        Ok(names)
    }

    /// Rule gate first, then assignment membership, then parents in order.
    ///
    /// `denied` collects items already evaluated to `false` within this query,
    /// so each item is visited at most once.
    fn user_has_item(
        &self,
        subject: Option<&SubjectId>,
        item: &Item,
        params: &Params,
        assigned: &HashSet<String>,
        denied: &mut HashSet<String>,
    ) -> RbacResult<bool> {
        if denied.contains(item.name()) {
            return Ok(false);
        }

        if !self.execute_rule(subject, item, params)? {
            denied.insert(item.name().to_string());
            return Ok(false);
        }

        if assigned.contains(item.name()) {
            return Ok(true);
        }

        for parent in self.items.get_parents(item.name())? {
            if self.user_has_item(subject, &parent, params, assigned, denied)? {
                return Ok(true);
            }
        }

        denied.insert(item.name().to_string());
        Ok(false)
    }

    fn execute_rule(&self, subject: Option<&SubjectId>, item: &Item, params: &Params) -> RbacResult<bool> {
        let Some(rule_name) = item.rule_name() else {
            return Ok(true);
        };

        let Some(rule) = self.rules.create(rule_name) else {
            tracing::error!(rule = rule_name, item = item.name(), "rule referenced by item is not registered");
            return Err(RbacError::rule_not_found(rule_name));
        };

        Ok(rule.execute(subject, item.name(), params))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Hierarchy
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `child_name` may be added under `parent_name`. Never mutates.
    pub fn can_add_child(&self, parent_name: &str, child_name: &str) -> RbacResult<bool> {
        let parent = self.require_item(parent_name)?;
        self.require_item(child_name)?;

        if parent.is_permission() {
            return Ok(false);
        }

        Ok(!self.detect_loop(parent_name, child_name)?)
    }

    pub fn add_child(&self, parent_name: &str, child_name: &str) -> RbacResult<()> {
        let parent = self.require_item(parent_name)?;
        let child = self.require_item(child_name)?;

        if parent_name == child_name {
            return Err(RbacError::conflict(format!(
                "cannot add '{parent_name}' as a child of itself"
            )));
        }

        if parent.is_permission() && child.is_role() {
            return Err(RbacError::conflict(format!(
                "cannot add role '{child_name}' as a child of permission '{parent_name}'"
            )));
        }

        if self.items.has_child(parent_name, child_name)? {
            tracing::debug!(parent = parent_name, child = child_name, "edge already present");
            return Err(RbacError::conflict(format!(
                "'{parent_name}' already has '{child_name}' as a child"
            )));
        }

        if self.detect_loop(parent_name, child_name)? {
            tracing::debug!(parent = parent_name, child = child_name, "edge rejected: loop detected");
            return Err(RbacError::conflict(format!(
                "cannot add '{child_name}' as a child of '{parent_name}': loop detected"
            )));
        }

        self.items.add_child(parent_name, child_name)?;
        tracing::debug!(parent = parent_name, child = child_name, "child added");
        Ok(())
    }

    /// Removes the edge if present.
    pub fn remove_child(&self, parent_name: &str, child_name: &str) -> RbacResult<()> {
        self.items.remove_child(parent_name, child_name)?;
        tracing::debug!(parent = parent_name, child = child_name, "child removed");
        Ok(())
    }

    /// Removes every outgoing edge of `parent_name`.
    pub fn remove_children(&self, parent_name: &str) -> RbacResult<()> {
        self.items.remove_children(parent_name)?;
        tracing::debug!(parent = parent_name, "children removed");
        Ok(())
    }

    /// Direct edge check, no traversal.
    pub fn has_child(&self, parent_name: &str, child_name: &str) -> RbacResult<bool> {
        Ok(self.items.has_child(parent_name, child_name)?)
    }

    /// Direct children of an item, in edge insertion order.
    pub fn get_children(&self, name: &str) -> RbacResult<Vec<Item>> {
        self.require_item(name)?;
        Ok(self.items.get_children(name)?)
    }

    /// `true` if `parent_name` is `child_name` or one of its descendants.
    fn detect_loop(&self, parent_name: &str, child_name: &str) -> RbacResult<bool> {
        if parent_name == child_name {
            return Ok(true);
        }
        let mut seen = HashSet::from([child_name.to_string()]);
        self.collect_descendants(child_name, &mut Vec::new(), &mut seen)?;
        Ok(seen.contains(parent_name))
    }

    /// Ordered descendant closure of `root`, root first.
    ///
    /// Children are visited in stored order; each child's own descendants are
    /// listed before the child itself. Names already collected are skipped.
    fn closure(&self, root: Item) -> RbacResult<Vec<Item>> {
        let mut seen = HashSet::from([root.name().to_string()]);
        let root_name = root.name().to_string();
        let mut result = vec![root];
        self.collect_descendants(&root_name, &mut result, &mut seen)?;
        Ok(result)
    }

    fn collect_descendants(
        &self,
        name: &str,
        result: &mut Vec<Item>,
        seen: &mut HashSet<String>,
    ) -> RbacResult<()> {
        for child in self.items.get_children(name)? {
            if !seen.insert(child.name().to_string()) {
                continue;
            }
            self.collect_descendants(child.name(), result, seen)?;
            result.push(child);
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Listings
    // ─────────────────────────────────────────────────────────────────────────

    /// The role and every role below it.
    pub fn get_child_roles(&self, role_name: &str) -> RbacResult<Vec<Item>> {
        let role = self
            .items
            .get_role(role_name)?
            .ok_or_else(|| RbacError::not_found(role_name))?;

        Ok(filter_kind(self.closure(role)?, ItemKind::Role))
    }

    /// Every permission reachable from the role. Unknown roles have none.
    pub fn get_permissions_by_role_name(&self, role_name: &str) -> RbacResult<Vec<Item>> {
        let Some(role) = self.items.get_role(role_name)? else {
            return Ok(Vec::new());
        };

        Ok(filter_kind(self.closure(role)?, ItemKind::Permission))
    }

    /// Default roles first (configured order), then directly assigned roles
    /// (assignment order). First occurrence wins.
    pub fn get_roles_by_user_id(&self, subject: &SubjectId) -> RbacResult<Vec<Item>> {
        let mut roles = OrderedItems::default();

        for role in self.resolved_default_roles()? {
            roles.push(role);
        }

        for assignment in self.assignments.get_by_user_id(subject)? {
            if let Some(role) = self.items.get_role(&assignment.item_name)? {
                roles.push(role);
            }
        }

        Ok(roles.into_vec())
    }

    /// Directly assigned permissions first, then permissions reached through
    /// [`Self::get_roles_by_user_id`], role by role. First occurrence wins.
    pub fn get_permissions_by_user_id(&self, subject: &SubjectId) -> RbacResult<Vec<Item>> {
        let mut permissions = OrderedItems::default();

        for assignment in self.assignments.get_by_user_id(subject)? {
            if let Some(permission) = self.items.get_permission(&assignment.item_name)? {
                permissions.push(permission);
            }
        }

        for role in self.get_roles_by_user_id(subject)? {
            for permission in self.get_permissions_by_role_name(role.name())? {
                permissions.push(permission);
            }
        }

        Ok(permissions.into_vec())
    }

    /// Subjects holding `role_name` directly or through a parent role.
    pub fn get_user_ids_by_role_name(&self, role_name: &str) -> RbacResult<Vec<SubjectId>> {
        if self.items.get_role(role_name)?.is_none() {
            return Ok(Vec::new());
        }

        let mut grants: HashMap<String, bool> = HashMap::new();
        let mut seen: HashSet<SubjectId> = HashSet::new();
        let mut subjects: Vec<SubjectId> = Vec::new();

        for assignment in self.assignments.get_all()? {
            let grants_role = match grants.get(&assignment.item_name) {
                Some(&cached) => cached,
                None => {
                    let computed = self.item_grants_role(&assignment.item_name, role_name)?;
                    grants.insert(assignment.item_name.clone(), computed);
                    computed
                }
            };

            if grants_role && seen.insert(assignment.subject_id.clone()) {
                subjects.push(assignment.subject_id);
            }
        }

        Ok(subjects)
    }

    fn item_grants_role(&self, item_name: &str, role_name: &str) -> RbacResult<bool> {
        if item_name == role_name {
            return Ok(true);
        }
        let Some(role) = self.items.get_role(item_name)? else {
            return Ok(false);
        };
        Ok(self.closure(role)?.iter().any(|i| i.is_role() && i.name() == role_name))
    }

    pub fn get_assignments_by_user_id(&self, subject: &SubjectId) -> RbacResult<Vec<Assignment>> {
        Ok(self.assignments.get_by_user_id(subject)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Items
    // ─────────────────────────────────────────────────────────────────────────

    pub fn get_role(&self, name: &str) -> RbacResult<Option<Item>> {
        Ok(self.items.get_role(name)?)
    }

    pub fn get_permission(&self, name: &str) -> RbacResult<Option<Item>> {
        Ok(self.items.get_permission(name)?)
    }

    pub fn get_roles(&self) -> RbacResult<Vec<Item>> {
        Ok(self.items.get_roles()?)
    }

    pub fn get_permissions(&self) -> RbacResult<Vec<Item>> {
        Ok(self.items.get_permissions()?)
    }

    pub fn add_role(&self, role: Item) -> RbacResult<()> {
        self.add_item(ItemKind::Role, role)
    }

    pub fn add_permission(&self, permission: Item) -> RbacResult<()> {
        self.add_item(ItemKind::Permission, permission)
    }

    /// Deletes the role, its edges and its assignments. No-op if absent.
    pub fn remove_role(&self, name: &str) -> RbacResult<()> {
        if self.items.get_role(name)?.is_some() {
            self.remove_item(name)?;
        }
        Ok(())
    }

    /// Deletes the permission, its edges and its assignments. No-op if absent.
    pub fn remove_permission(&self, name: &str) -> RbacResult<()> {
        if self.items.get_permission(name)?.is_some() {
            self.remove_item(name)?;
        }
        Ok(())
    }

    /// Replace role `old_name` with `role`, renaming in place when the names
    /// differ. Edges and assignments follow the rename.
    pub fn update_role(&self, old_name: &str, role: Item) -> RbacResult<()> {
        self.update_item(ItemKind::Role, old_name, role)
    }

    pub fn update_permission(&self, old_name: &str, permission: Item) -> RbacResult<()> {
        self.update_item(ItemKind::Permission, old_name, permission)
    }

    fn add_item(&self, kind: ItemKind, item: Item) -> RbacResult<()> {
        ensure_kind(kind, &item)?;

        if self.items.has(item.name())? {
            return Err(RbacError::AlreadyExists(item.name().to_string()));
        }

        let item = item.touch(self.clock.now());
        let name = item.name().to_string();
        self.items.add(item)?;
        tracing::debug!(%name, %kind, "item added");
        Ok(())
    }

    /// Removes the item before its assignments: a failure in between leaves
    /// stale assignments to a missing item, which resolve to nothing.
    fn remove_item(&self, name: &str) -> RbacResult<()> {
        self.items.remove(name)?;
        self.assignments.remove_by_item_name(name)?;
        tracing::debug!(name, "item removed");
        Ok(())
    }

    fn update_item(&self, kind: ItemKind, old_name: &str, item: Item) -> RbacResult<()> {
        ensure_kind(kind, &item)?;

        let existing = self
            .items
            .get(old_name)?
            .filter(|existing| existing.kind() == kind)
            .ok_or_else(|| RbacError::not_found(old_name))?;

        let renamed = item.name() != old_name;
        if renamed && self.items.has(item.name())? {
            return Err(RbacError::NameConflict(item.name().to_string()));
        }

        let item = item
            .inherit_created_at(existing.created_at())
            .refresh(self.clock.now());
        let new_name = item.name().to_string();

        self.items.update(old_name, item)?;
        if renamed {
            if let Err(err) = self.assignments.rename_item(old_name, &new_name) {
                tracing::warn!(old_name, %new_name, error = %err, "assignment rename failed, restoring item");
                self.items.update(&new_name, existing)?;
                return Err(err.into());
            }
        }

        tracing::debug!(old_name, %new_name, %kind, "item updated");
        Ok(())
    }

    fn require_item(&self, name: &str) -> RbacResult<Item> {
        self.items.get(name)?.ok_or_else(|| RbacError::not_found(name))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Assignments
    // ─────────────────────────────────────────────────────────────────────────

    pub fn assign(&self, item_name: &str, subject: &SubjectId) -> RbacResult<()> {
        let item = self.require_item(item_name)?;

        if item.is_permission() && !self.enable_direct_permissions {
            return Err(RbacError::DirectPermissionDisabled(item_name.to_string()));
        }

        if self.assignments.get(item_name, subject)?.is_some() {
            return Err(RbacError::already_assigned(item_name, subject.as_str()));
        }

        self.assignments.add(item_name, subject, self.clock.now())?;
        tracing::debug!(item = item_name, subject = %subject, "assigned");
        Ok(())
    }

    /// Removes the assignment if present.
    pub fn revoke(&self, item_name: &str, subject: &SubjectId) -> RbacResult<()> {
        self.assignments.remove(item_name, subject)?;
        tracing::debug!(item = item_name, subject = %subject, "revoked");
        Ok(())
    }

    pub fn revoke_all(&self, subject: &SubjectId) -> RbacResult<()> {
        self.assignments.remove_by_user_id(subject)?;
        tracing::debug!(subject = %subject, "all assignments revoked");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Default and guest roles
    // ─────────────────────────────────────────────────────────────────────────

    pub fn set_default_role_names(&mut self, names: DefaultRoleNames) -> &mut Self {
        self.default_role_names = names;
        self
    }

    /// Configure default roles from a JSON array of names.
    pub fn set_default_role_names_json(&mut self, value: &JsonValue) -> RbacResult<&mut Self> {
        self.default_role_names = DefaultRoleNames::from_json(value)?;
        Ok(self)
    }

    /// Current default role names; runs the provider if one is configured.
    pub fn get_default_role_names(&self) -> RbacResult<Vec<String>> {
        self.default_role_names.resolve()
    }

    /// Default roles as items. Fails on the first name that is not a role.
    pub fn get_default_roles(&self) -> RbacResult<Vec<Item>> {
        self.get_default_role_names()?
            .into_iter()
            .map(|name| {
                self.items
                    .get_role(&name)?
                    .ok_or(RbacError::DefaultRoleNotFound(name))
            })
            .collect()
    }

    /// Default roles that resolve; unknown names are skipped.
    pub(crate) fn resolved_default_roles(&self) -> RbacResult<Vec<Item>> {
        let mut roles = Vec::new();
        for name in self.get_default_role_names()? {
            match self.items.get_role(&name)? {
                Some(role) => roles.push(role),
                None => tracing::warn!(role = %name, "default role not found, skipping"),
            }
        }
        Ok(roles)
    }

    /// Role substituted for default roles when no subject is given. Not
    /// validated here; resolution happens on each query.
    pub fn set_guest_role_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.guest_role_name = Some(name.into());
        self
    }

    pub fn clear_guest_role_name(&mut self) -> &mut Self {
        self.guest_role_name = None;
        self
    }

    pub fn guest_role_name(&self) -> Option<&str> {
        self.guest_role_name.as_deref()
    }

    /// The configured guest role, if it names an existing role.
    pub fn get_guest_role(&self) -> RbacResult<Option<Item>> {
        match &self.guest_role_name {
            Some(name) => Ok(self.items.get_role(name)?),
            None => Ok(None),
        }
    }
}

fn ensure_kind(expected: ItemKind, item: &Item) -> RbacResult<()> {
    if item.kind() == expected {
        Ok(())
    } else {
        Err(RbacError::conflict(format!("{item} is not a {expected}")))
    }
}

fn filter_kind(items: Vec<Item>, kind: ItemKind) -> Vec<Item> {
    items.into_iter().filter(|i| i.kind() == kind).collect()
}

/// Insertion-ordered, name-deduplicated item list.
#[derive(Default)]
struct OrderedItems {
    seen: HashSet<String>,
    items: Vec<Item>,
}

impl OrderedItems {
    fn push(&mut self, item: Item) {
        if self.seen.insert(item.name().to_string()) {
            self.items.push(item);
        }
    }

    fn into_vec(self) -> Vec<Item> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleRegistry;
    use crate::store::{InMemoryAssignmentsStore, InMemoryItemsStore};
    use keystone_core::{FixedClock, StoreError};

    type TestManager = Manager<InMemoryItemsStore, InMemoryAssignmentsStore, RuleRegistry>;

    fn manager() -> TestManager {
        Manager::new(
            InMemoryItemsStore::new(),
            InMemoryAssignmentsStore::new(),
            RuleRegistry::new(),
        )
        .with_clock(Arc::new(FixedClock::new(1_700_000_000)))
    }

    fn names(items: &[Item]) -> Vec<&str> {
        items.iter().map(Item::name).collect()
    }

    #[test]
    fn add_role_stamps_timestamps() {
        let m = manager();
        m.add_role(Item::role("admin")).unwrap();

        let admin = m.get_role("admin").unwrap().unwrap();
        assert_eq!(admin.created_at(), Some(1_700_000_000));
        assert_eq!(admin.updated_at(), Some(1_700_000_000));
    }

    #[test]
    fn names_are_unique_across_kinds() {
        let m = manager();
        m.add_permission(Item::permission("shared")).unwrap();

        let err = m.add_role(Item::role("shared")).unwrap_err();
        assert_eq!(err, RbacError::AlreadyExists("shared".to_string()));
    }

    #[test]
    fn add_role_rejects_permission_items() {
        let m = manager();
        let err = m.add_role(Item::permission("readPost")).unwrap_err();
        assert!(matches!(err, RbacError::Conflict(_)));
    }

    #[test]
    fn add_child_reports_missing_items() {
        let m = manager();
        m.add_role(Item::role("admin")).unwrap();

        assert_eq!(
            m.add_child("ghost", "admin").unwrap_err(),
            RbacError::NotFound("ghost".to_string())
        );
        assert_eq!(
            m.add_child("admin", "ghost").unwrap_err(),
            RbacError::NotFound("ghost".to_string())
        );
        assert_eq!(
            m.can_add_child("admin", "ghost").unwrap_err(),
            RbacError::NotFound("ghost".to_string())
        );
    }

    #[test]
    fn add_child_structural_conflicts() {
        let m = manager();
        m.add_role(Item::role("admin")).unwrap();
        m.add_permission(Item::permission("readPost")).unwrap();

        let self_child = m.add_child("admin", "admin").unwrap_err();
        assert!(matches!(self_child, RbacError::Conflict(msg) if msg.contains("itself")));

        let demoted = m.add_child("readPost", "admin").unwrap_err();
        assert!(matches!(demoted, RbacError::Conflict(msg) if msg.contains("role")));

        m.add_child("admin", "readPost").unwrap();
        let duplicate = m.add_child("admin", "readPost").unwrap_err();
        assert!(matches!(duplicate, RbacError::Conflict(msg) if msg.contains("already has")));
    }

    #[test]
    fn permission_may_parent_permission_but_cannot_add_child_says_no() {
        let m = manager();
        m.add_permission(Item::permission("updatePost")).unwrap();
        m.add_permission(Item::permission("updateOwnPost")).unwrap();

        assert!(!m.can_add_child("updatePost", "updateOwnPost").unwrap());
        m.add_child("updatePost", "updateOwnPost").unwrap();
        assert!(m.has_child("updatePost", "updateOwnPost").unwrap());
    }

    #[test]
    fn loops_are_rejected_and_leave_edges_unchanged() {
        let m = manager();
        for name in ["a", "b", "c"] {
            m.add_role(Item::role(name)).unwrap();
        }
        m.add_child("a", "b").unwrap();
        m.add_child("b", "c").unwrap();

        assert!(!m.can_add_child("c", "a").unwrap());
        let err = m.add_child("c", "a").unwrap_err();
        assert!(matches!(err, RbacError::Conflict(msg) if msg.contains("loop")));
        assert!(m.get_children("c").unwrap().is_empty());
    }

    #[test]
    fn closure_lists_descendants_before_child() {
        let m = manager();
        for name in ["admin", "author", "reader"] {
            m.add_role(Item::role(name)).unwrap();
        }
        for name in ["updateAnyPost", "createPost", "readPost"] {
            m.add_permission(Item::permission(name)).unwrap();
        }
        m.add_child("reader", "readPost").unwrap();
        m.add_child("author", "createPost").unwrap();
        m.add_child("author", "reader").unwrap();
        m.add_child("admin", "author").unwrap();
        m.add_child("admin", "updateAnyPost").unwrap();

        let roles = m.get_child_roles("admin").unwrap();
        assert_eq!(names(&roles), ["admin", "reader", "author"]);

        let perms = m.get_permissions_by_role_name("admin").unwrap();
        assert_eq!(names(&perms), ["createPost", "readPost", "updateAnyPost"]);
    }

    #[test]
    fn get_child_roles_requires_a_role() {
        let m = manager();
        m.add_permission(Item::permission("readPost")).unwrap();
        assert_eq!(
            m.get_child_roles("readPost").unwrap_err(),
            RbacError::NotFound("readPost".to_string())
        );
        assert!(m.get_permissions_by_role_name("nobody").unwrap().is_empty());
    }

    #[test]
    fn assign_checks() {
        let m = manager();
        m.add_role(Item::role("author")).unwrap();
        m.add_permission(Item::permission("readPost")).unwrap();
        let alice = SubjectId::from("alice");

        assert_eq!(
            m.assign("ghost", &alice).unwrap_err(),
            RbacError::NotFound("ghost".to_string())
        );
        assert_eq!(
            m.assign("readPost", &alice).unwrap_err(),
            RbacError::DirectPermissionDisabled("readPost".to_string())
        );

        m.assign("author", &alice).unwrap();
        assert!(matches!(
            m.assign("author", &alice).unwrap_err(),
            RbacError::AlreadyAssigned { .. }
        ));

        let assignments = m.get_assignments_by_user_id(&alice).unwrap();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].created_at, 1_700_000_000);
    }

    #[test]
    fn direct_permissions_when_enabled() {
        let m = manager().with_direct_permissions(true);
        m.add_permission(Item::permission("readPost")).unwrap();
        let alice = SubjectId::from("alice");

        m.assign("readPost", &alice).unwrap();
        assert!(m.user_has_permission(Some(&alice), "readPost", &Params::new()).unwrap());
    }

    #[test]
    fn update_refreshes_updated_at_and_keeps_created_at() {
        let clock = Arc::new(FixedClock::new(100));
        let m = manager().with_clock(clock.clone());
        m.add_role(Item::role("author")).unwrap();

        clock.advance(50);
        m.update_role("author", Item::role("author").with_description("writes posts"))
            .unwrap();

        let author = m.get_role("author").unwrap().unwrap();
        assert_eq!(author.created_at(), Some(100));
        assert_eq!(author.updated_at(), Some(150));
        assert_eq!(author.description(), Some("writes posts"));
    }

    #[test]
    fn update_rejects_name_conflict_and_missing_items() {
        let m = manager();
        m.add_role(Item::role("author")).unwrap();
        m.add_role(Item::role("reader")).unwrap();

        assert_eq!(
            m.update_role("author", Item::role("reader")).unwrap_err(),
            RbacError::NameConflict("reader".to_string())
        );
        assert_eq!(
            m.update_role("ghost", Item::role("ghost2")).unwrap_err(),
            RbacError::NotFound("ghost".to_string())
        );
        assert_eq!(
            m.update_permission("author", Item::permission("author")).unwrap_err(),
            RbacError::NotFound("author".to_string())
        );
    }

    #[test]
    fn remove_role_cascades() {
        let m = manager();
        m.add_role(Item::role("admin")).unwrap();
        m.add_role(Item::role("author")).unwrap();
        m.add_child("admin", "author").unwrap();
        let alice = SubjectId::from("alice");
        m.assign("author", &alice).unwrap();

        m.remove_role("author").unwrap();
        m.remove_role("author").unwrap();

        assert!(m.get_role("author").unwrap().is_none());
        assert!(m.get_children("admin").unwrap().is_empty());
        assert!(m.get_assignments_by_user_id(&alice).unwrap().is_empty());
    }

    #[test]
    fn remove_permission_ignores_roles() {
        let m = manager();
        m.add_role(Item::role("admin")).unwrap();
        m.remove_permission("admin").unwrap();
        assert!(m.get_role("admin").unwrap().is_some());
    }

    #[test]
    fn default_roles_strict_accessor() {
        let mut m = manager();
        m.add_role(Item::role("member")).unwrap();
        m.set_default_role_names(["member", "missing"].into_iter().collect());

        assert_eq!(m.get_default_role_names().unwrap(), ["member", "missing"]);
        assert_eq!(
            m.get_default_roles().unwrap_err(),
            RbacError::DefaultRoleNotFound("missing".to_string())
        );
    }

    #[test]
    fn default_roles_from_json_shape() {
        let mut m = manager();
        let err = m
            .set_default_role_names_json(&serde_json::json!("member"))
            .err()
            .unwrap();
        assert!(matches!(err, RbacError::InvalidConfig(_)));

        m.set_default_role_names_json(&serde_json::json!(["member"])).unwrap();
        assert_eq!(m.get_default_role_names().unwrap(), ["member"]);
    }

    #[test]
    fn unknown_guest_role_resolves_to_none() {
        let mut m = manager();
        m.set_guest_role_name("guest");
        assert_eq!(m.guest_role_name(), Some("guest"));
        assert!(m.get_guest_role().unwrap().is_none());
    }

    #[test]
    fn clear_guest_role_name_restores_default_roles() {
        let mut m = manager();
        m.add_role(Item::role("guest")).unwrap();
        m.set_guest_role_name("guest");
        assert!(m.get_guest_role().unwrap().is_some());

        m.clear_guest_role_name();
        assert_eq!(m.guest_role_name(), None);
        assert!(m.get_guest_role().unwrap().is_none());
    }

    /// `layers` rows of `width` roles, each role parenting every role of the
    /// next row; the last row parents permission `p`.
    fn layered(layers: usize, width: usize) -> TestManager {
        let m = manager();
        m.add_permission(Item::permission("p")).unwrap();
        for layer in 0..layers {
            for i in 0..width {
                m.add_role(Item::role(format!("r{layer}_{i}"))).unwrap();
            }
        }
        for layer in 0..layers {
            for i in 0..width {
                let parent = format!("r{layer}_{i}");
                if layer + 1 == layers {
                    m.add_child(&parent, "p").unwrap();
                } else {
                    for j in 0..width {
                        m.add_child(&parent, &format!("r{}_{j}", layer + 1)).unwrap();
                    }
                }
            }
        }
        m
    }

    #[test]
    fn denial_on_shared_ancestors_visits_each_item_once() {
        let m = layered(14, 4);
        let nobody = SubjectId::from("nobody");

        let started = std::time::Instant::now();
        assert!(!m.user_has_permission(Some(&nobody), "p", &Params::new()).unwrap());
        assert!(started.elapsed() < std::time::Duration::from_secs(2));

        m.assign("r0_3", &nobody).unwrap();
        assert!(m.user_has_permission(Some(&nobody), "p", &Params::new()).unwrap());
    }

    #[test]
    fn denied_rule_is_evaluated_once_per_check() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        let m = Manager::new(
            InMemoryItemsStore::new(),
            InMemoryAssignmentsStore::new(),
            RuleRegistry::new().with_fn("closed", move |_, _, _| {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                false
            }),
        );
        m.add_permission(Item::permission("p")).unwrap();
        m.add_role(Item::role("gate").with_rule_name("closed")).unwrap();
        m.add_role(Item::role("left")).unwrap();
        m.add_role(Item::role("right")).unwrap();
        m.add_child("left", "p").unwrap();
        m.add_child("right", "p").unwrap();
        m.add_child("gate", "left").unwrap();
        m.add_child("gate", "right").unwrap();

        let alice = SubjectId::from("alice");
        m.assign("gate", &alice).unwrap();
        assert!(!m.user_has_permission(Some(&alice), "p", &Params::new()).unwrap());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    /// Assignments store whose bulk rewrites fail.
    struct BrokenBulkAssignments(InMemoryAssignmentsStore);

    impl AssignmentsStore for BrokenBulkAssignments {
        fn get(&self, item_name: &str, subject_id: &SubjectId) -> Result<Option<Assignment>, StoreError> {
            self.0.get(item_name, subject_id)
        }

        fn get_all(&self) -> Result<Vec<Assignment>, StoreError> {
            self.0.get_all()
        }

        fn get_by_user_id(&self, subject_id: &SubjectId) -> Result<Vec<Assignment>, StoreError> {
            self.0.get_by_user_id(subject_id)
        }

        fn get_by_item_name(&self, item_name: &str) -> Result<Vec<Assignment>, StoreError> {
            self.0.get_by_item_name(item_name)
        }

        fn add(&self, item_name: &str, subject_id: &SubjectId, created_at: i64) -> Result<(), StoreError> {
            self.0.add(item_name, subject_id, created_at)
        }

        fn remove(&self, item_name: &str, subject_id: &SubjectId) -> Result<(), StoreError> {
            self.0.remove(item_name, subject_id)
        }

        fn remove_by_user_id(&self, subject_id: &SubjectId) -> Result<(), StoreError> {
            self.0.remove_by_user_id(subject_id)
        }

        fn remove_by_item_name(&self, _item_name: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("write failed".to_string()))
        }

        fn rename_item(&self, _old_name: &str, _new_name: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("write failed".to_string()))
        }

        fn clear(&self) -> Result<(), StoreError> {
            self.0.clear()
        }
    }

    fn broken_bulk_manager() -> Manager<InMemoryItemsStore, BrokenBulkAssignments, RuleRegistry> {
        let m = Manager::new(
            InMemoryItemsStore::new(),
            BrokenBulkAssignments(InMemoryAssignmentsStore::new()),
            RuleRegistry::new(),
        );
        m.add_role(Item::role("author")).unwrap();
        m.add_permission(Item::permission("createPost")).unwrap();
        m.add_child("author", "createPost").unwrap();
        m.assign("author", &SubjectId::from("alice")).unwrap();
        m
    }

    #[test]
    fn failed_cascade_keeps_assignments_of_removed_item() {
        let m = broken_bulk_manager();
        let alice = SubjectId::from("alice");

        let err = m.remove_role("author").unwrap_err();
        assert!(matches!(err, RbacError::Store(StoreError::Backend(_))));

        assert!(m.get_role("author").unwrap().is_none());
        assert_eq!(m.get_assignments_by_user_id(&alice).unwrap().len(), 1);
        assert!(!m.user_has_permission(Some(&alice), "createPost", &Params::new()).unwrap());
    }

    #[test]
    fn failed_assignment_rename_restores_the_item() {
        let m = broken_bulk_manager();
        let alice = SubjectId::from("alice");

        let err = m.update_role("author", Item::role("writer")).unwrap_err();
        assert!(matches!(err, RbacError::Store(StoreError::Backend(_))));

        assert!(m.get_role("writer").unwrap().is_none());
        assert!(m.get_role("author").unwrap().is_some());
        assert!(m.has_child("author", "createPost").unwrap());
        assert!(m.user_has_permission(Some(&alice), "createPost", &Params::new()).unwrap());
    }

    #[test]
    fn from_config_applies_every_field() {
        let config = ManagerConfig {
            default_roles: vec!["member".to_string()],
            guest_role: Some("guest".to_string()),
            enable_direct_permissions: true,
        };
        let m = Manager::from_config(
            InMemoryItemsStore::new(),
            InMemoryAssignmentsStore::new(),
            RuleRegistry::new(),
            config,
        );

        assert!(m.direct_permissions_enabled());
        assert_eq!(m.guest_role_name(), Some("guest"));
        assert_eq!(m.get_default_role_names().unwrap(), ["member"]);
    }
}
