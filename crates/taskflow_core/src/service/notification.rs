//! Notification side effects and the caller's inbox.

use super::error::ServiceResult;
use crate::model::activity::Notification;
use crate::model::task::Task;
use crate::model::tenant::Identity;
use crate::model::{NotificationId, UserId};
use crate::repo::DomainStore;

pub(crate) const ASSIGNMENT_TITLE: &str = "New Task Assignment";
pub(crate) const STATUS_CHANGE_TITLE: &str = "Task Status Updated";
pub(crate) const COMMENT_TITLE: &str = "New Comment";

pub(crate) fn notify_assignment<S: DomainStore + ?Sized>(
    store: &S,
    task: &Task,
    user_id: UserId,
) -> ServiceResult<Notification> {
    let message = format!("You have been assigned to task: {}", task.title);
    Ok(store.create_notification(user_id, ASSIGNMENT_TITLE, &message)?)
}

pub(crate) fn notify_status_change<S: DomainStore + ?Sized>(
    store: &S,
    task: &Task,
    user_id: UserId,
) -> ServiceResult<Notification> {
    let message = format!(
        "Task '{}' status changed to {}",
        task.title,
        task.status.as_str()
    );
    Ok(store.create_notification(user_id, STATUS_CHANGE_TITLE, &message)?)
}

pub(crate) fn notify_comment<S: DomainStore + ?Sized>(
    store: &S,
    task: &Task,
    author_name: &str,
    user_id: UserId,
) -> ServiceResult<Notification> {
    let message = format!("{author_name} commented on {}", task.title);
    Ok(store.create_notification(user_id, COMMENT_TITLE, &message)?)
}

/// Read side of notifications; always limited to the caller's own inbox.
pub struct NotificationService<'s, S: DomainStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: DomainStore + ?Sized> NotificationService<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    pub fn list(&self, identity: &Identity, unread_only: bool) -> ServiceResult<Vec<Notification>> {
        Ok(self.store.list_notifications(identity.user_id, unread_only)?)
    }

    /// Marks one of the caller's notifications read. Other users' ids are `NotFound`.
    pub fn mark_read(&self, identity: &Identity, id: NotificationId) -> ServiceResult<()> {
        self.store.mark_notification_read(identity.user_id, id)?;
        Ok(())
    }
}
