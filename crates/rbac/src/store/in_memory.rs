use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use keystone_core::{StoreError, SubjectId};

use super::r#trait::{AssignmentsStore, ItemsStore};
use crate::item::{Assignment, Item};

#[derive(Debug, Default)]
struct Hierarchy {
    items: HashMap<String, Item>,
    /// Item names in insertion order.
    order: Vec<String>,
    children: HashMap<String, Vec<String>>,
    parents: HashMap<String, Vec<String>>,
}

impl Hierarchy {
    fn resolve(&self, names: Option<&Vec<String>>) -> Vec<Item> {
        names
            .map(|names| names.iter().filter_map(|n| self.items.get(n).cloned()).collect())
            .unwrap_or_default()
    }

    fn unlink(&mut self, parent: &str, child: &str) {
        if let Some(children) = self.children.get_mut(parent) {
            children.retain(|c| c != child);
        }
        if let Some(parents) = self.parents.get_mut(child) {
            parents.retain(|p| p != parent);
        }
    }
}

fn rename_in(map: &mut HashMap<String, Vec<String>>, old_name: &str, new_name: &str) {
    if let Some(list) = map.remove(old_name) {
        map.insert(new_name.to_string(), list);
    }
    for list in map.values_mut() {
        for name in list.iter_mut().filter(|n| n.as_str() == old_name) {
            *name = new_name.to_string();
        }
    }
}

/// In-memory items store.
///
/// Intended for tests/dev and single-process embedding. A single lock guards
/// items and edges so every call observes a consistent snapshot.
#[derive(Debug, Default)]
pub struct InMemoryItemsStore {
    inner: RwLock<Hierarchy>,
}

impl InMemoryItemsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Hierarchy>, StoreError> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Hierarchy>, StoreError> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }
}

impl ItemsStore for InMemoryItemsStore {
    fn get(&self, name: &str) -> Result<Option<Item>, StoreError> {
        Ok(self.read()?.items.get(name).cloned())
    }

    fn get_all(&self) -> Result<Vec<Item>, StoreError> {
        let h = self.read()?;
        Ok(h.order.iter().filter_map(|n| h.items.get(n).cloned()).collect())
    }

    fn add(&self, item: Item) -> Result<(), StoreError> {
        let mut h = self.write()?;
        let name = item.name().to_string();
        if h.items.insert(name.clone(), item).is_none() {
            h.order.push(name);
        }
        Ok(())
    }

    fn update(&self, old_name: &str, item: Item) -> Result<(), StoreError> {
        let mut h = self.write()?;
        let new_name = item.name().to_string();

        if new_name != old_name {
            h.items.remove(old_name);
            match h.order.iter_mut().find(|n| n.as_str() == old_name) {
                Some(slot) => *slot = new_name.clone(),
                None => h.order.push(new_name.clone()),
            }
            rename_in(&mut h.children, old_name, &new_name);
            rename_in(&mut h.parents, old_name, &new_name);
        } else if !h.items.contains_key(old_name) {
            h.order.push(new_name.clone());
        }

        h.items.insert(new_name, item);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        let mut h = self.write()?;
        if h.items.remove(name).is_none() {
            return Ok(());
        }
        h.order.retain(|n| n != name);

        for child in h.children.remove(name).unwrap_or_default() {
            if let Some(parents) = h.parents.get_mut(&child) {
                parents.retain(|p| p != name);
            }
        }
        for parent in h.parents.remove(name).unwrap_or_default() {
            if let Some(children) = h.children.get_mut(&parent) {
                children.retain(|c| c != name);
            }
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.write()? = Hierarchy::default();
        Ok(())
    }

    fn add_child(&self, parent: &str, child: &str) -> Result<(), StoreError> {
        let mut h = self.write()?;
        let children = h.children.entry(parent.to_string()).or_default();
        if children.iter().any(|c| c == child) {
            return Ok(());
        }
        children.push(child.to_string());
        h.parents
            .entry(child.to_string())
            .or_default()
            .push(parent.to_string());
        Ok(())
    }

    fn remove_child(&self, parent: &str, child: &str) -> Result<(), StoreError> {
        self.write()?.unlink(parent, child);
        Ok(())
    }

    fn remove_children(&self, parent: &str) -> Result<(), StoreError> {
        let mut h = self.write()?;
        for child in h.children.remove(parent).unwrap_or_default() {
            if let Some(parents) = h.parents.get_mut(&child) {
                parents.retain(|p| p != parent);
            }
        }
        Ok(())
    }

    fn has_child(&self, parent: &str, child: &str) -> Result<bool, StoreError> {
        let h = self.read()?;
        Ok(h
            .children
            .get(parent)
            .is_some_and(|children| children.iter().any(|c| c == child)))
    }

    fn get_children(&self, name: &str) -> Result<Vec<Item>, StoreError> {
        let h = self.read()?;
        Ok(h.resolve(h.children.get(name)))
    }

    fn get_parents(&self, name: &str) -> Result<Vec<Item>, StoreError> {
        let h = self.read()?;
        Ok(h.resolve(h.parents.get(name)))
    }
}

/// In-memory assignments store.
///
/// Records are kept in a single insertion-ordered list; lookups are linear.
#[derive(Debug, Default)]
pub struct InMemoryAssignmentsStore {
    inner: RwLock<Vec<Assignment>>,
}

impl InMemoryAssignmentsStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Assignment>>, StoreError> {
        self.inner.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Assignment>>, StoreError> {
        self.inner.write().map_err(|_| StoreError::LockPoisoned)
    }

    fn select<P>(&self, predicate: P) -> Result<Vec<Assignment>, StoreError>
    where
        P: Fn(&Assignment) -> bool,
    {
        Ok(self.read()?.iter().filter(|a| predicate(a)).cloned().collect())
    }
}

impl AssignmentsStore for InMemoryAssignmentsStore {
    fn get(&self, item_name: &str, subject_id: &SubjectId) -> Result<Option<Assignment>, StoreError> {
        Ok(self
            .read()?
            .iter()
            .find(|a| a.item_name == item_name && &a.subject_id == subject_id)
            .cloned())
    }

    fn get_all(&self) -> Result<Vec<Assignment>, StoreError> {
        Ok(self.read()?.clone())
    }

    fn get_by_user_id(&self, subject_id: &SubjectId) -> Result<Vec<Assignment>, StoreError> {
        self.select(|a| &a.subject_id == subject_id)
    }

    fn get_by_item_name(&self, item_name: &str) -> Result<Vec<Assignment>, StoreError> {
        self.select(|a| a.item_name == item_name)
    }

    fn add(&self, item_name: &str, subject_id: &SubjectId, created_at: i64) -> Result<(), StoreError> {
        let mut records = self.write()?;
        if records
            .iter()
            .any(|a| a.item_name == item_name && &a.subject_id == subject_id)
        {
            return Ok(());
        }
        records.push(Assignment::new(item_name, subject_id.clone(), created_at));
        Ok(())
    }

    fn remove(&self, item_name: &str, subject_id: &SubjectId) -> Result<(), StoreError> {
        self.write()?
            .retain(|a| !(a.item_name == item_name && &a.subject_id == subject_id));
        Ok(())
    }

    fn remove_by_user_id(&self, subject_id: &SubjectId) -> Result<(), StoreError> {
        self.write()?.retain(|a| &a.subject_id != subject_id);
        Ok(())
    }

    fn remove_by_item_name(&self, item_name: &str) -> Result<(), StoreError> {
        self.write()?.retain(|a| a.item_name != item_name);
        Ok(())
    }

    fn rename_item(&self, old_name: &str, new_name: &str) -> Result<(), StoreError> {
        if old_name == new_name {
            return Ok(());
        }
        for record in self.write()?.iter_mut().filter(|a| a.item_name == old_name) {
            record.item_name = new_name.to_string();
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.write()?.clear();
        Ok(())
    }
}
