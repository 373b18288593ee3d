use serde::{Deserialize, Serialize};

use keystone_core::SubjectId;

/// Discriminator of the two item variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Role,
    Permission,
}

impl core::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ItemKind::Role => write!(f, "role"),
            ItemKind::Permission => write!(f, "permission"),
        }
    }
}

/// A named node of the access hierarchy: either a role or a permission.
///
/// `name` is unique across both kinds within one items store. Timestamps are
/// unix seconds; when left unset the manager fills them in on write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    kind: ItemKind,
    name: String,
    description: Option<String>,
    rule_name: Option<String>,
    created_at: Option<i64>,
    updated_at: Option<i64>,
}

impl Item {
    fn new(kind: ItemKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: None,
            rule_name: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn role(name: impl Into<String>) -> Self {
        Self::new(ItemKind::Role, name)
    }

    pub fn permission(name: impl Into<String>) -> Self {
        Self::new(ItemKind::Permission, name)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Gate this item behind a registered rule.
    pub fn with_rule_name(mut self, rule_name: impl Into<String>) -> Self {
        self.rule_name = Some(rule_name.into());
        self
    }

    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_updated_at(mut self, updated_at: i64) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn rule_name(&self) -> Option<&str> {
        self.rule_name.as_deref()
    }

    pub fn created_at(&self) -> Option<i64> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }

    pub fn is_role(&self) -> bool {
        self.kind == ItemKind::Role
    }

    pub fn is_permission(&self) -> bool {
        self.kind == ItemKind::Permission
    }

    pub(crate) fn touch(mut self, now: i64) -> Self {
        self.created_at.get_or_insert(now);
        self.updated_at.get_or_insert(now);
        self
    }

    pub(crate) fn refresh(mut self, now: i64) -> Self {
        self.updated_at = Some(now);
        self
    }

    pub(crate) fn inherit_created_at(mut self, created_at: Option<i64>) -> Self {
        if self.created_at.is_none() {
            self.created_at = created_at;
        }
        self
    }
}

impl core::fmt::Display for Item {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}

/// A record granting one item to one subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub item_name: String,
    pub subject_id: SubjectId,
    pub created_at: i64,
}

impl Assignment {
    pub fn new(item_name: impl Into<String>, subject_id: SubjectId, created_at: i64) -> Self {
        Self {
            item_name: item_name.into(),
            subject_id,
            created_at,
        }
    }
}
