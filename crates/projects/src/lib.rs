//! `jobhub-projects` — project records and membership checks.
//!
//! Plain value types with pure authorization checks; no concurrency subtlety
//! (member lists are small and mutated via whole-record writes).

pub mod project;
pub mod store;

pub use project::{Project, ProjectId, ProjectMember, ProjectRole};
pub use store::{InMemoryProjectStore, ProjectStore, ProjectStoreError};
