//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Apply the authorization policy and task state machine for direct API
//!   callers and assistant actions alike.
//!
//! # Invariants
//! - Services borrow one `DomainStore`; the caller owns the transaction.
//! - Organization scope is checked before permissions.

pub mod error;
pub(crate) mod guard;
pub mod notification;
pub mod organization;
pub mod project;
pub mod task;
pub mod user;

pub use error::{ServiceError, ServiceResult};
pub use notification::NotificationService;
pub use organization::{register_organization, RegisteredOrganization, Registration};
pub use project::{ProjectDetail, ProjectPatch, ProjectService, ProjectStats};
pub use task::{TaskDraft, TaskPatch, TaskService};
pub use user::{
    CredentialHasher, LockedCredentialHasher, UserDraft, UserPatch, UserService,
    LOCKED_CREDENTIAL,
};
