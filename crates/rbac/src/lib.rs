//! `keystone-rbac` — role-based access-control decision engine.
//!
//! Roles and permissions form a directed acyclic hierarchy; items may carry a
//! rule that gates the grant dynamically. This crate is intentionally decoupled
//! from transport and durable storage.

pub mod config;
pub mod explain;
pub mod item;
pub mod manager;
pub mod rule;
pub mod store;

pub use config::{DefaultRoleNames, DefaultRolesProvider, ManagerConfig};
pub use explain::{AccessExplanation, DenialKind, DenialReason};
pub use item::{Assignment, Item, ItemKind};
pub use manager::Manager;
pub use rule::{Params, Rule, RuleFactory, RuleRegistry};
pub use store::{AssignmentsStore, InMemoryAssignmentsStore, InMemoryItemsStore, ItemsStore};

pub use keystone_core::{Clock, FixedClock, RbacError, RbacResult, StoreError, SubjectId, SystemClock};
