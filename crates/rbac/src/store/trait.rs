use std::sync::Arc;

use keystone_core::{StoreError, SubjectId};

use crate::item::{Assignment, Item};

/// Persistence of items and the parent → child hierarchy.
///
/// The store is the source of truth; the manager keeps no cache across calls.
///
/// ## Ordering
///
/// `get_children` / `get_parents` return **direct** neighbours in edge
/// insertion order. Listing and resolution order observed by callers is derived
/// from this, so implementations must keep it stable.
///
/// ## Implementation Requirements
///
/// - `remove` drops every edge touching the item (as parent or as child).
/// - `update` renames in place, rewriting edge endpoints to the new name.
/// - Edge operations do not validate the hierarchy; the manager does.
pub trait ItemsStore: Send + Sync {
    fn get(&self, name: &str) -> Result<Option<Item>, StoreError>;

    fn get_all(&self) -> Result<Vec<Item>, StoreError>;

    fn has(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.get(name)?.is_some())
    }

    fn get_role(&self, name: &str) -> Result<Option<Item>, StoreError> {
        Ok(self.get(name)?.filter(Item::is_role))
    }

    fn get_permission(&self, name: &str) -> Result<Option<Item>, StoreError> {
        Ok(self.get(name)?.filter(Item::is_permission))
    }

    fn get_roles(&self) -> Result<Vec<Item>, StoreError> {
        Ok(self.get_all()?.into_iter().filter(Item::is_role).collect())
    }

    fn get_permissions(&self) -> Result<Vec<Item>, StoreError> {
        Ok(self.get_all()?.into_iter().filter(Item::is_permission).collect())
    }

    fn add(&self, item: Item) -> Result<(), StoreError>;

    fn update(&self, old_name: &str, item: Item) -> Result<(), StoreError>;

    fn remove(&self, name: &str) -> Result<(), StoreError>;

    fn clear(&self) -> Result<(), StoreError>;

    fn add_child(&self, parent: &str, child: &str) -> Result<(), StoreError>;

    fn remove_child(&self, parent: &str, child: &str) -> Result<(), StoreError>;

    fn remove_children(&self, parent: &str) -> Result<(), StoreError>;

    fn has_child(&self, parent: &str, child: &str) -> Result<bool, StoreError>;

    fn get_children(&self, name: &str) -> Result<Vec<Item>, StoreError>;

    fn get_parents(&self, name: &str) -> Result<Vec<Item>, StoreError>;
}

/// Persistence of `(item, subject, created_at)` assignment records.
///
/// Records are keyed by `(item_name, subject_id)`. Every listing returns
/// records in insertion order.
pub trait AssignmentsStore: Send + Sync {
    fn get(&self, item_name: &str, subject_id: &SubjectId) -> Result<Option<Assignment>, StoreError>;

    fn get_all(&self) -> Result<Vec<Assignment>, StoreError>;

    fn get_by_user_id(&self, subject_id: &SubjectId) -> Result<Vec<Assignment>, StoreError>;

    fn get_by_item_name(&self, item_name: &str) -> Result<Vec<Assignment>, StoreError>;

    fn has_item(&self, item_name: &str) -> Result<bool, StoreError> {
        Ok(!self.get_by_item_name(item_name)?.is_empty())
    }

    fn add(&self, item_name: &str, subject_id: &SubjectId, created_at: i64) -> Result<(), StoreError>;

    fn remove(&self, item_name: &str, subject_id: &SubjectId) -> Result<(), StoreError>;

    fn remove_by_user_id(&self, subject_id: &SubjectId) -> Result<(), StoreError>;

    fn remove_by_item_name(&self, item_name: &str) -> Result<(), StoreError>;

    /// Rewrite every record referencing `old_name` to reference `new_name`.
    fn rename_item(&self, old_name: &str, new_name: &str) -> Result<(), StoreError>;

    fn clear(&self) -> Result<(), StoreError>;
}

impl<S> ItemsStore for Arc<S>
where
    S: ItemsStore + ?Sized,
{
    fn get(&self, name: &str) -> Result<Option<Item>, StoreError> {
        (**self).get(name)
    }

    fn get_all(&self) -> Result<Vec<Item>, StoreError> {
        (**self).get_all()
    }

    fn has(&self, name: &str) -> Result<bool, StoreError> {
        (**self).has(name)
    }

    fn get_role(&self, name: &str) -> Result<Option<Item>, StoreError> {
        (**self).get_role(name)
    }

    fn get_permission(&self, name: &str) -> Result<Option<Item>, StoreError> {
        (**self).get_permission(name)
    }

    fn get_roles(&self) -> Result<Vec<Item>, StoreError> {
        (**self).get_roles()
    }

    fn get_permissions(&self) -> Result<Vec<Item>, StoreError> {
        (**self).get_permissions()
    }

    fn add(&self, item: Item) -> Result<(), StoreError> {
        (**self).add(item)
    }

    fn update(&self, old_name: &str, item: Item) -> Result<(), StoreError> {
        (**self).update(old_name, item)
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        (**self).remove(name)
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }

    fn add_child(&self, parent: &str, child: &str) -> Result<(), StoreError> {
        (**self).add_child(parent, child)
    }

    fn remove_child(&self, parent: &str, child: &str) -> Result<(), StoreError> {
        (**self).remove_child(parent, child)
    }

    fn remove_children(&self, parent: &str) -> Result<(), StoreError> {
        (**self).remove_children(parent)
    }

    fn has_child(&self, parent: &str, child: &str) -> Result<bool, StoreError> {
        (**self).has_child(parent, child)
    }

    fn get_children(&self, name: &str) -> Result<Vec<Item>, StoreError> {
        (**self).get_children(name)
    }

    fn get_parents(&self, name: &str) -> Result<Vec<Item>, StoreError> {
        (**self).get_parents(name)
    }
}

impl<S> AssignmentsStore for Arc<S>
where
    S: AssignmentsStore + ?Sized,
{
    fn get(&self, item_name: &str, subject_id: &SubjectId) -> Result<Option<Assignment>, StoreError> {
        (**self).get(item_name, subject_id)
    }

    fn get_all(&self) -> Result<Vec<Assignment>, StoreError> {
        (**self).get_all()
    }

    fn get_by_user_id(&self, subject_id: &SubjectId) -> Result<Vec<Assignment>, StoreError> {
        (**self).get_by_user_id(subject_id)
    }

    fn get_by_item_name(&self, item_name: &str) -> Result<Vec<Assignment>, StoreError> {
        (**self).get_by_item_name(item_name)
    }

    fn has_item(&self, item_name: &str) -> Result<bool, StoreError> {
        (**self).has_item(item_name)
    }

    fn add(&self, item_name: &str, subject_id: &SubjectId, created_at: i64) -> Result<(), StoreError> {
        (**self).add(item_name, subject_id, created_at)
    }

    fn remove(&self, item_name: &str, subject_id: &SubjectId) -> Result<(), StoreError> {
        (**self).remove(item_name, subject_id)
    }

    fn remove_by_user_id(&self, subject_id: &SubjectId) -> Result<(), StoreError> {
        (**self).remove_by_user_id(subject_id)
    }

    fn remove_by_item_name(&self, item_name: &str) -> Result<(), StoreError> {
        (**self).remove_by_item_name(item_name)
    }

    fn rename_item(&self, old_name: &str, new_name: &str) -> Result<(), StoreError> {
        (**self).rename_item(old_name, new_name)
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}
