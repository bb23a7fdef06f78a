//! Domain model for the multi-tenant task store.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Own pure invariants: status ordering, due-date floor, attachment limits.
//!
//! # Invariants
//! - Every entity other than `Organization` is reachable only within one
//!   organization's scope.
//! - Identifiers are store-assigned integers; ascending id is iteration order.

pub mod activity;
pub mod project;
pub mod task;
pub mod tenant;
pub mod time;

pub type OrganizationId = i64;
pub type UserId = i64;
pub type ProjectId = i64;
pub type TaskId = i64;
pub type CommentId = i64;
pub type AttachmentId = i64;
pub type NotificationId = i64;
