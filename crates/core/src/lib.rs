//! `keystone-core` — access-control foundation building blocks.
//!
//! This crate contains **pure** primitives (no storage or hierarchy logic).

pub mod clock;
pub mod error;
pub mod subject;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{RbacError, RbacResult, StoreError};
pub use subject::SubjectId;
