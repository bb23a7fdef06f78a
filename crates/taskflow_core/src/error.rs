//! User-facing error taxonomy shared by services and the assistant.
//!
//! # Invariants
//! - `NotFound` is used for both absent and cross-organization entities.
//! - `Internal` never carries storage details to the caller.

use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Stable error categories surfaced by every entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Entity absent, or owned by another organization.
    NotFound,
    /// Role lacks the permission for this operation.
    Forbidden,
    /// Bad date, invalid enum value or missing required field.
    InvalidInput,
    /// Illegal status transition, duplicate name/email, capacity reached.
    StateConflict,
    /// Language model timeout, quota exhaustion or search outage.
    UpstreamUnavailable,
    /// Intent parser produced unusable output.
    ParseFailure,
    /// Storage or collaborator failure with no user-actionable detail.
    Internal,
}

impl ErrorKind {
    /// Stable snake_case code used in logs and envelopes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::InvalidInput => "invalid_input",
            Self::StateConflict => "state_conflict",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::ParseFailure => "parse_failure",
            Self::Internal => "internal",
        }
    }

    /// Whether a caller may retry the same request unchanged.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::UpstreamUnavailable)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
