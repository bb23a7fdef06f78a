//! Task domain model and status state machine.
//!
//! # Responsibility
//! - Define task status/priority vocabularies and their parsers.
//! - Own the monotonic status transition rule and the due-date floor.
//!
//! # Invariants
//! - Status order is `Todo(1) < InProgress(2) < Done(3)`.
//! - A transition to `S` is permitted iff `order(S) >= order(current)`; forward
//!   skips (Todo -> Done) and same-state transitions are allowed.
//! - A due date, when set on write, is not earlier than the start of the
//!   current UTC day.

use super::time::start_of_utc_day;
use super::{ProjectId, TaskId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created but not started.
    Todo,
    /// Work is in progress.
    InProgress,
    /// Completed.
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [Self::Todo, Self::InProgress, Self::Done];

    /// Position in the monotonic workflow.
    pub fn order(self) -> u8 {
        match self {
            Self::Todo => 1,
            Self::InProgress => 2,
            Self::Done => 3,
        }
    }

    /// Checks the monotonic transition rule.
    pub fn check_transition(self, target: TaskStatus) -> Result<(), TransitionError> {
        if target.order() < self.order() {
            return Err(TransitionError {
                from: self,
                to: target,
            });
        }
        Ok(())
    }

    /// Stable storage value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }

    /// Human label used by formatters.
    pub fn label(self) -> &'static str {
        match self {
            Self::Todo => "To Do",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
        }
    }

    /// Parses loose status spellings (`in-progress`, `In Progress`, `completed`).
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value
            .trim()
            .to_ascii_lowercase()
            .replace(['-', ' '], "_");
        match normalized.as_str() {
            "todo" | "to_do" | "open" => Some(Self::Todo),
            "in_progress" | "inprogress" | "started" | "doing" => Some(Self::InProgress),
            "done" | "complete" | "completed" | "finished" => Some(Self::Done),
            _ => None,
        }
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected backward status move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move task status backward from {from} to {to}")]
pub struct TransitionError {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Task urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "normal" => Some(Self::Medium),
            "high" | "urgent" => Some(Self::High),
            _ => None,
        }
    }
}

impl Display for TaskPriority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted task row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// UTC epoch ms.
    pub due_date: Option<i64>,
    pub project_id: ProjectId,
    pub assignee_id: Option<UserId>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    /// Overdue means past due and not finished.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != TaskStatus::Done
            && self
                .due_date
                .is_some_and(|due| due < now.timestamp_millis())
    }
}

/// Insert model for tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<i64>,
    pub project_id: ProjectId,
    pub assignee_id: Option<UserId>,
}

/// Due date earlier than today (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("due date must be today or in the future")]
pub struct PastDueDate;

/// Checks the due-date floor against the start of the current UTC day.
pub fn check_due_date(due: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), PastDueDate> {
    if due < start_of_utc_day(now) {
        return Err(PastDueDate);
    }
    Ok(())
}

/// Task counts grouped by status for one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusCounts {
    pub todo: u32,
    pub in_progress: u32,
    pub done: u32,
}

impl StatusCounts {
    pub fn add(&mut self, status: TaskStatus, count: u32) {
        match status {
            TaskStatus::Todo => self.todo += count,
            TaskStatus::InProgress => self.in_progress += count,
            TaskStatus::Done => self.done += count,
        }
    }

    pub fn total(&self) -> u32 {
        self.todo + self.in_progress + self.done
    }
}
