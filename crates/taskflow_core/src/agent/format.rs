//! Deterministic text rendering of action results.

use super::executor::{ActionOutput, TaskView};
use crate::model::task::StatusCounts;
use crate::model::time::format_day;
use std::fmt::Write as _;

pub fn render(output: &ActionOutput) -> String {
    let mut out = String::new();
    match output {
        ActionOutput::SearchResults { results, .. } => {
            if results.is_empty() {
                return "No tasks found matching your query.".to_string();
            }
            let _ = writeln!(out, "Found {} relevant tasks:", results.len());
            for (index, snippet) in results.iter().enumerate() {
                let _ = write!(out, "\n{}. {}", index + 1, snippet.text);
            }
        }
        ActionOutput::TaskList { filter, tasks } => {
            if tasks.is_empty() {
                return match *filter {
                    "all" => "No tasks found.".to_string(),
                    other => format!("No {other} tasks found."),
                };
            }
            let _ = writeln!(out, "Found {} tasks:", tasks.len());
            for task in tasks {
                let _ = write!(out, "\n{}", task_line(task));
            }
        }
        ActionOutput::TaskCreated { task } => {
            let _ = write!(
                out,
                "✅ Task '{}' created in project '{}' (priority: {}, assigned to: {}",
                task.title,
                task.project_name,
                task.priority,
                task.assignee_name.as_deref().unwrap_or("Unassigned")
            );
            if let Some(due) = &task.due_date {
                let _ = write!(out, ", due: {due}");
            }
            out.push(')');
        }
        ActionOutput::TaskUpdated {
            task,
            previous_status,
        } => {
            if *previous_status == task.status {
                let _ = write!(out, "Task '{}' is already {}.", task.title, task.status.label());
            } else {
                let _ = write!(
                    out,
                    "✅ Task '{}' status updated from {} to {}",
                    task.title,
                    previous_status.label(),
                    task.status.label()
                );
            }
        }
        ActionOutput::TaskDetail { task, comments } => {
            let _ = writeln!(out, "📋 {}", task.title);
            let _ = writeln!(
                out,
                "Description: {}",
                task.description.as_deref().unwrap_or("No description")
            );
            let _ = writeln!(out, "Status: {}", task.status.label());
            let _ = writeln!(out, "Priority: {}", task.priority);
            let _ = writeln!(out, "Project: {}", task.project_name);
            let _ = writeln!(
                out,
                "Assigned to: {}",
                task.assignee_name.as_deref().unwrap_or("Unassigned")
            );
            let _ = write!(
                out,
                "Due date: {}{}",
                task.due_date.as_deref().unwrap_or("No due date"),
                if task.overdue { " (OVERDUE)" } else { "" }
            );
            if !comments.is_empty() {
                let _ = write!(out, "\nComments: {}", comments.len());
            }
        }
        ActionOutput::ProjectStats { projects } => {
            if projects.is_empty() {
                return "No projects found.".to_string();
            }
            out.push_str("📊 Project statistics:");
            for stats in projects {
                let _ = write!(out, "\n\n{}\n{}", stats.project.name, counts_block(&stats.counts));
            }
        }
        ActionOutput::ProjectCreated { project } => {
            let _ = write!(out, "✅ Project '{}' created successfully", project.name);
        }
        ActionOutput::ProjectUpdated { project } => {
            let _ = write!(out, "✅ Project '{}' updated successfully", project.name);
        }
        ActionOutput::ProjectDetail { detail } => {
            let _ = writeln!(out, "📁 {}", detail.project.name);
            let _ = writeln!(
                out,
                "Description: {}",
                detail.project.description.as_deref().unwrap_or("No description")
            );
            let _ = writeln!(out, "Created: {}", format_day(detail.project.created_at));
            let _ = writeln!(out, "Members: {}", detail.member_count);
            out.push_str(&counts_block(&detail.counts));
        }
        ActionOutput::UserDetail { user } => {
            let _ = write!(
                out,
                "👤 {}\nEmail: {}\nRole: {}\nStatus: {}",
                user.full_name,
                user.email,
                user.role,
                if user.is_active { "Active" } else { "Inactive" }
            );
        }
        ActionOutput::UserList { role_filter, users } => {
            if users.is_empty() {
                return match role_filter {
                    Some(role) => format!("No users with role '{role}' found."),
                    None => "No users found.".to_string(),
                };
            }
            let _ = writeln!(out, "Found {} users:", users.len());
            for user in users {
                let _ = write!(
                    out,
                    "\n- {} ({}) - {}{}",
                    user.full_name,
                    user.email,
                    user.role,
                    if user.is_active { "" } else { " [inactive]" }
                );
            }
        }
        ActionOutput::UserCreated { user } => {
            let _ = write!(
                out,
                "✅ User '{}' ({}) created with role {}",
                user.full_name, user.email, user.role
            );
        }
        ActionOutput::UserUpdated { user } => {
            let _ = write!(out, "✅ User '{}' updated successfully", user.full_name);
        }
        ActionOutput::CommentAdded { task_title, .. } => {
            let _ = write!(out, "💬 Comment added to task '{task_title}'");
        }
        ActionOutput::FileAttached {
            task_title,
            attachment,
            remaining_slots,
        } => {
            let _ = write!(
                out,
                "📎 Attached '{}' ({}) to task '{}'. {} attachment slot(s) left.",
                attachment.filename,
                human_size(attachment.size_bytes),
                task_title,
                remaining_slots
            );
        }
        ActionOutput::MemberAdded {
            project_name,
            user_name,
        } => {
            let _ = write!(out, "✅ {user_name} added to project '{project_name}'");
        }
        ActionOutput::Notifications {
            unread_only,
            notifications,
        } => {
            if notifications.is_empty() {
                return if *unread_only {
                    "You have no unread notifications.".to_string()
                } else {
                    "You have no notifications.".to_string()
                };
            }
            let _ = writeln!(out, "🔔 {} notifications:", notifications.len());
            for notification in notifications {
                let _ = write!(
                    out,
                    "\n{} {}: {}",
                    if notification.is_read { "-" } else { "•" },
                    notification.title,
                    notification.message
                );
            }
        }
    }
    out
}

fn task_line(task: &TaskView) -> String {
    let mut line = format!(
        "- {} [{}] ({} priority) - Project: {} - Assigned to: {}",
        task.title,
        task.status.label(),
        task.priority,
        task.project_name,
        task.assignee_name.as_deref().unwrap_or("Unassigned")
    );
    if let Some(due) = &task.due_date {
        let _ = write!(line, " - Due: {due}");
    }
    if task.overdue {
        line.push_str(" ⚠️ OVERDUE");
    }
    line
}

fn counts_block(counts: &StatusCounts) -> String {
    format!(
        "To Do: {}\nIn Progress: {}\nDone: {}\nTotal: {}",
        counts.todo,
        counts.in_progress,
        counts.done,
        counts.total()
    )
}

fn human_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}
