//! Storage boundary for items, the hierarchy and assignments.
//!
//! The manager consumes these traits only; durable backends live with the host
//! application. In-memory implementations are provided for tests and embedding.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::{InMemoryAssignmentsStore, InMemoryItemsStore};
pub use r#trait::{AssignmentsStore, ItemsStore};
