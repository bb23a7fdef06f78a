//! Comments, attachments and notifications.

use super::{bool_to_int, int_to_bool, RepoError, RepoResult, SqliteStore};
use crate::model::activity::{Attachment, Comment, NewAttachment, Notification};
use crate::model::{NotificationId, TaskId, UserId};
use rusqlite::{params, Row};

/// Repository interface for task activity and user notifications.
pub trait ActivityRepository {
    fn create_comment(&self, task_id: TaskId, author_id: UserId, content: &str)
        -> RepoResult<Comment>;
    fn list_comments(&self, task_id: TaskId) -> RepoResult<Vec<Comment>>;
    fn create_attachment(&self, attachment: &NewAttachment) -> RepoResult<Attachment>;
    fn count_attachments(&self, task_id: TaskId) -> RepoResult<u32>;
    fn create_notification(
        &self,
        user_id: UserId,
        title: &str,
        message: &str,
    ) -> RepoResult<Notification>;
    fn list_notifications(&self, user_id: UserId, unread_only: bool)
        -> RepoResult<Vec<Notification>>;
    fn mark_notification_read(&self, user_id: UserId, id: NotificationId) -> RepoResult<()>;
}

impl ActivityRepository for SqliteStore<'_> {
    fn create_comment(
        &self,
        task_id: TaskId,
        author_id: UserId,
        content: &str,
    ) -> RepoResult<Comment> {
        self.conn.execute(
            "INSERT INTO comments (content, task_id, author_id) VALUES (?1, ?2, ?3);",
            params![content, task_id, author_id],
        )?;
        let id = self.conn.last_insert_rowid();
        let comment = self.conn.query_row(
            "SELECT id, content, task_id, author_id, created_at FROM comments WHERE id = ?1;",
            [id],
            parse_comment_row,
        )?;
        Ok(comment)
    }

    fn list_comments(&self, task_id: TaskId) -> RepoResult<Vec<Comment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, content, task_id, author_id, created_at
             FROM comments WHERE task_id = ?1 ORDER BY id ASC;",
        )?;
        let comments = stmt
            .query_map([task_id], parse_comment_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    fn create_attachment(&self, attachment: &NewAttachment) -> RepoResult<Attachment> {
        let size_bytes = i64::try_from(attachment.size_bytes).map_err(|_| {
            RepoError::InvalidData(format!(
                "attachment size {} exceeds storage range",
                attachment.size_bytes
            ))
        })?;
        self.conn.execute(
            "INSERT INTO attachments (filename, file_path, size_bytes, task_id)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                attachment.filename.as_str(),
                attachment.file_path.as_str(),
                size_bytes,
                attachment.task_id,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        let (stored, stored_size) = self.conn.query_row(
            "SELECT id, filename, file_path, size_bytes, task_id, uploaded_at
             FROM attachments WHERE id = ?1;",
            [id],
            |row| {
                let attachment = Attachment {
                    id: row.get("id")?,
                    filename: row.get("filename")?,
                    file_path: row.get("file_path")?,
                    size_bytes: 0,
                    task_id: row.get("task_id")?,
                    uploaded_at: row.get("uploaded_at")?,
                };
                Ok((attachment, row.get::<_, i64>("size_bytes")?))
            },
        )?;
        let size_bytes = u64::try_from(stored_size).map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid attachment size `{stored_size}` in attachments.size_bytes"
            ))
        })?;
        Ok(Attachment {
            size_bytes,
            ..stored
        })
    }

    fn count_attachments(&self, task_id: TaskId) -> RepoResult<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM attachments WHERE task_id = ?1;",
            [task_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn create_notification(
        &self,
        user_id: UserId,
        title: &str,
        message: &str,
    ) -> RepoResult<Notification> {
        self.conn.execute(
            "INSERT INTO notifications (title, message, user_id, is_read) VALUES (?1, ?2, ?3, ?4);",
            params![title, message, user_id, bool_to_int(false)],
        )?;
        let id = self.conn.last_insert_rowid();
        let mut stmt = self.conn.prepare(
            "SELECT id, title, message, user_id, is_read, created_at
             FROM notifications WHERE id = ?1;",
        )?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => parse_notification_row(row),
            None => Err(RepoError::NotFound {
                entity: "notification",
                id,
            }),
        }
    }

    fn list_notifications(
        &self,
        user_id: UserId,
        unread_only: bool,
    ) -> RepoResult<Vec<Notification>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, message, user_id, is_read, created_at
             FROM notifications
             WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0)
             ORDER BY id DESC;",
        )?;
        let mut rows = stmt.query(params![user_id, bool_to_int(unread_only)])?;
        let mut notifications = Vec::new();
        while let Some(row) = rows.next()? {
            notifications.push(parse_notification_row(row)?);
        }
        Ok(notifications)
    }

    fn mark_notification_read(&self, user_id: UserId, id: NotificationId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2;",
            params![id, user_id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "notification",
                id,
            });
        }
        Ok(())
    }
}

fn parse_comment_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get("id")?,
        content: row.get("content")?,
        task_id: row.get("task_id")?,
        author_id: row.get("author_id")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    Ok(Notification {
        id: row.get("id")?,
        title: row.get("title")?,
        message: row.get("message")?,
        user_id: row.get("user_id")?,
        is_read: int_to_bool(row.get("is_read")?, "notifications.is_read")?,
        created_at: row.get("created_at")?,
    })
}
