// src/error.rs
// Standardized error types for commit-scribe

use thiserror::Error;

/// Errors from the IDE chat store.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("database not found: {0}")]
    NotFound(String),

    #[error("database access denied: {0}")]
    Access(String),

    #[error("unexpected database schema: {0}")]
    Schema(String),

    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

/// Errors from LLM providers.
#[derive(Error, Debug)]
pub enum AiError {
    #[error("AI request timed out after {0}s")]
    Timeout(u64),

    #[error("AI response did not match the expected schema: {0}")]
    InvalidResponse(String),

    #[error("AI provider failure: {0}")]
    ProviderFailure(String),

    #[error("AI API key is missing or invalid")]
    InvalidKey,
}

/// Main error type for the scribe library
#[derive(Error, Debug)]
pub enum ScribeError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Ai(#[from] AiError),

    #[error("boundary detection was ambiguous: {0}")]
    BoundaryAmbiguous(String),

    #[error("section '{section}' failed: {reason}")]
    SectionFailed { section: String, reason: String },

    #[error("orchestration exceeded its {0}s budget")]
    OrchestrationTimeout(u64),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid input: {0}")]
    BadRequest(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("task cancelled")]
    Cancelled,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Convenience type alias for Result using ScribeError
pub type Result<T> = std::result::Result<T, ScribeError>;

impl ScribeError {
    /// Stable category string for telemetry attributes and tool responses.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Db(DbError::NotFound(_)) => "DbNotFound",
            Self::Db(DbError::Access(_)) => "DbAccess",
            Self::Db(DbError::Schema(_)) => "DbSchema",
            Self::Db(DbError::Query(_)) => "DbQuery",
            Self::Ai(AiError::Timeout(_)) => "AiTimeout",
            Self::Ai(AiError::InvalidResponse(_)) => "AiInvalidResponse",
            Self::Ai(AiError::ProviderFailure(_)) => "AiProviderFailure",
            Self::Ai(AiError::InvalidKey) => "InvalidKey",
            Self::BoundaryAmbiguous(_) => "BoundaryAmbiguous",
            Self::SectionFailed { .. } => "SectionFailed",
            Self::OrchestrationTimeout(_) => "OrchestrationTimeout",
            Self::Permission(_) => "PermissionError",
            Self::Io(_) => "IoError",
            Self::BadRequest(_) => "BadRequest",
            Self::Git(_) => "GitError",
            Self::Json(_) => "JsonError",
            Self::Config(_) => "ConfigError",
            Self::Cancelled => "Cancelled",
            Self::Anyhow(_) => "Other",
        }
    }

    /// Actionable guidance for user-facing error results, where one exists.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Ai(AiError::InvalidKey) => {
                Some("set ai.api_key in .scribe.yml or export the provider's API key env var")
            }
            Self::BadRequest(_) => Some("pass {\"text\": \"...\"} as a mapping"),
            Self::Config(_) => Some("check .scribe.yml against the documented options"),
            _ => None,
        }
    }

    /// Process exit code for CLI wrappers: 1 generic, 2 invalid input, 3 missing config.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BadRequest(_) => 2,
            Self::Config(_) | Self::Ai(AiError::InvalidKey) => 3,
            _ => 1,
        }
    }

    /// Map an I/O error, keeping permission failures distinct from other OS errors.
    pub fn from_io(err: std::io::Error, path: &std::path::Path) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            Self::Permission(format!("{}: {}", path.display(), err))
        } else {
            Self::Io(err)
        }
    }
}

impl From<String> for ScribeError {
    fn from(s: String) -> Self {
        ScribeError::Git(s)
    }
}

impl From<tokio::task::JoinError> for ScribeError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            ScribeError::Cancelled
        } else {
            ScribeError::Anyhow(anyhow::anyhow!(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_strings() {
        assert_eq!(
            ScribeError::Db(DbError::NotFound("x".into())).category(),
            "DbNotFound"
        );
        assert_eq!(ScribeError::Ai(AiError::InvalidKey).category(), "InvalidKey");
        assert_eq!(
            ScribeError::BadRequest("nope".into()).category(),
            "BadRequest"
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ScribeError::BadRequest("x".into()).exit_code(), 2);
        assert_eq!(ScribeError::Config("x".into()).exit_code(), 3);
        assert_eq!(ScribeError::Ai(AiError::InvalidKey).exit_code(), 3);
        assert_eq!(ScribeError::Git("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_permission_mapped_distinctly() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let mapped = ScribeError::from_io(err, std::path::Path::new("/tmp/j"));
        assert!(matches!(mapped, ScribeError::Permission(_)));

        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let mapped = ScribeError::from_io(err, std::path::Path::new("/tmp/j"));
        assert!(matches!(mapped, ScribeError::Io(_)));
    }

    #[test]
    fn test_bad_request_hint() {
        let hint = ScribeError::BadRequest("string input".into()).hint();
        assert_eq!(hint, Some("pass {\"text\": \"...\"} as a mapping"));
    }
}
