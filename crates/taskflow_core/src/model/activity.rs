//! Task activity: comments, attachments and notifications.
//!
//! # Invariants
//! - Comments are append-only.
//! - At most `MAX_ATTACHMENTS_PER_TASK` attachments per task, each at most
//!   `MAX_ATTACHMENT_BYTES`. Reaching the cap never evicts older files.
//! - Notifications are side effects of assignment, status change and comment
//!   events; no user action creates one directly.

use super::{AttachmentId, CommentId, NotificationId, TaskId, UserId};
use serde::Serialize;

pub const MAX_ATTACHMENTS_PER_TASK: u32 = 3;
pub const MAX_ATTACHMENT_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub content: String,
    pub task_id: TaskId,
    pub author_id: UserId,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub filename: String,
    /// Location assigned for the storage collaborator.
    pub file_path: String,
    pub size_bytes: u64,
    pub task_id: TaskId,
    pub uploaded_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    pub filename: String,
    pub file_path: String,
    pub size_bytes: u64,
    pub task_id: TaskId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    pub user_id: UserId,
    pub is_read: bool,
    pub created_at: i64,
}

/// Reduces an uploaded name to a single safe path component.
///
/// Returns `None` when nothing usable remains.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let last_component = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned: String = last_component
        .chars()
        .filter(|ch| !ch.is_control())
        .collect();
    let cleaned = cleaned.trim_start_matches('.').trim().to_string();
    if cleaned.is_empty() {
        return None;
    }
    Some(cleaned)
}

/// Storage location for one attachment of one task.
pub fn attachment_path(task_id: TaskId, filename: &str) -> String {
    format!("storage/tasks/{task_id}/{filename}")
}

#[cfg(test)]
mod tests {
    use super::{attachment_path, sanitize_filename};

    #[test]
    fn sanitize_strips_directories_and_hidden_prefixes() {
        assert_eq!(
            sanitize_filename("../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(
            sanitize_filename("C:\\tmp\\report.pdf").as_deref(),
            Some("report.pdf")
        );
        assert_eq!(sanitize_filename(".env").as_deref(), Some("env"));
        assert_eq!(sanitize_filename("  / "), None);
    }

    #[test]
    fn attachment_path_is_task_scoped() {
        assert_eq!(attachment_path(7, "a.png"), "storage/tasks/7/a.png");
    }
}
