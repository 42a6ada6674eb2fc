//! Error types shared across the core crate.

use thiserror::Error;

/// Failures talking to the interviewer backend.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("backend returned {status}{}", format_detail(.detail))]
    Status {
        status: reqwest::StatusCode,
        detail: Option<String>,
    },
    #[error("backend response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("backend request aborted: {0}")]
    Aborted(String),
    #[error("invalid backend URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
}

fn format_detail(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

impl BackendError {
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            BackendError::Request(err) => err.status(),
            BackendError::Decode(_) | BackendError::Aborted(_) | BackendError::InvalidUrl { .. } => None,
        }
    }
}

/// Platform speech capability failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SpeechError {
    #[error("{0}")]
    Unavailable(String),
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Problems with user input, reported before any request is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("Please enter a role to start the interview practice session.")]
    RoleRequired,
    #[error("\"{role}\" doesn't look like a job role. Please enter a valid job position.")]
    InvalidRole {
        role: String,
        suggestions: Vec<String>,
    },
    #[error("Role not found!")]
    RoleNotFound(String),
    #[error("Please enter a message or use the mic to speak")]
    MessageRequired,
    #[error("Start an interview before sending answers.")]
    NoSession,
    #[error("An interview is already starting.")]
    StartInProgress,
    #[error("Local questions are only available before an interview starts.")]
    SessionActive,
}

impl ValidationError {
    /// Short heading for the notice shown to the user.
    pub fn title(&self) -> &'static str {
        match self {
            ValidationError::RoleRequired => "Role Required",
            ValidationError::InvalidRole { .. } => "Invalid Role",
            ValidationError::RoleNotFound(_) => "Unknown Role",
            ValidationError::MessageRequired => "Message Required",
            ValidationError::NoSession => "No Interview",
            ValidationError::StartInProgress => "Please Wait",
            ValidationError::SessionActive => "Interview Active",
        }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InterviewError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Speech(#[from] SpeechError),
}

pub type Result<T, E = InterviewError> = std::result::Result<T, E>;
