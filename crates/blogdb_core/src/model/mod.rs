//! Blog entity model.
//!
//! # Responsibility
//! - Declare entities, fields, relationships and soft-delete capability.
//! - Define typed records and validated insert values.
//!
//! # Invariants
//! - Every row is identified by an integer primary key `id`.
//! - Deletion of users, posts and comments is a soft-delete timestamp.

pub mod entity;
pub mod records;
pub mod schema;
