//! Service error and its mapping into the shared taxonomy.

use crate::error::ErrorKind;
use crate::repo::RepoError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Use-case failure shared by every service and the assistant actions.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Entity absent or owned by another organization. Carries the entity label.
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    StateConflict(String),
    /// A bounded collection is full.
    #[error("{0}")]
    Capacity(String),
    /// An external collaborator (credential hasher, storage) rejected the call.
    #[error("collaborator failure: {0}")]
    Collaborator(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl ServiceError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::StateConflict(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::StateConflict(_) | Self::Capacity(_) => ErrorKind::StateConflict,
            Self::Repo(RepoError::Conflict(_)) => ErrorKind::StateConflict,
            Self::Repo(RepoError::NotFound { .. }) => ErrorKind::NotFound,
            Self::Collaborator(_) | Self::Repo(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to show a caller: no SQL, no foreign entity data.
    pub fn user_message(&self) -> String {
        match self {
            Self::Repo(RepoError::Conflict(_)) => {
                "That name or email is already taken.".to_string()
            }
            Self::Repo(RepoError::NotFound { entity, .. }) => {
                format!("{} not found", capitalize(entity))
            }
            Self::Collaborator(_) | Self::Repo(_) => {
                "Something went wrong while processing your request. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceError;
    use crate::db::DbError;
    use crate::error::ErrorKind;
    use crate::repo::RepoError;

    #[test]
    fn capacity_is_reported_as_state_conflict() {
        let err = ServiceError::Capacity("full".to_string());
        assert_eq!(err.kind(), ErrorKind::StateConflict);
    }

    #[test]
    fn storage_failures_hide_sql_details() {
        let err = ServiceError::Repo(RepoError::Db(DbError::Sqlite(
            rusqlite::Error::InvalidQuery,
        )));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.user_message().contains("Query"));
    }

    #[test]
    fn repo_not_found_keeps_entity_label_only() {
        let err = ServiceError::Repo(RepoError::NotFound {
            entity: "task",
            id: 42,
        });
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.user_message(), "Task not found");
    }

    #[test]
    fn not_found_message_names_entity() {
        assert_eq!(ServiceError::NotFound("Project").user_message(), "Project not found");
    }
}
