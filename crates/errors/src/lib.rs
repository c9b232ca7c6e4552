//! Error taxonomy for the log-ingestion platform.
//!
//! `CoreError` is the one error type crossing crate boundaries into the HTTP
//! layer. Component crates keep their own narrow `thiserror` enums for
//! internal detail and convert into `CoreError` at their public edge; only
//! the HTTP layer translates a `CoreError` into a status code and the stable
//! `{error_kind, message, correlation_id, detail?}` response shape.

use serde::Serialize;
use thiserror::Error;

/// The kinds an operator or client must be able to distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorKind {
    InputInvalid,
    AuthExpired,
    InvalidCredentials,
    Forbidden,
    NotFound,
    Conflict,
    QuotaExceeded,
    SizeExceeded,
    RateLimited,
    InvalidArchive,
    UnsupportedArchive,
    CorruptArchive,
    ParserFailure,
    ParserTimeout,
    ParserOOM,
    UrlFetchFailed,
    Internal
}

impl ErrorKind {
    /// The HTTP status this kind maps to at the ingress layer (§7).
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::InputInvalid => 400,
            ErrorKind::InvalidArchive | ErrorKind::UnsupportedArchive | ErrorKind::CorruptArchive => 400,
            ErrorKind::UrlFetchFailed => 400,
            ErrorKind::AuthExpired | ErrorKind::InvalidCredentials => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::QuotaExceeded | ErrorKind::SizeExceeded => 413,
            ErrorKind::RateLimited => 429,
            ErrorKind::ParserFailure | ErrorKind::ParserTimeout | ErrorKind::ParserOOM => 500,
            ErrorKind::Internal => 500
        }
    }
}

/// The one error type that crosses crate boundaries into the HTTP layer.
#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct CoreError {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: Option<serde_json::Value>
}

impl CoreError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }

    #[must_use]
    pub fn input_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InputInvalid, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

/// Object store failures (C1).
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("backing store io failed: {reason}")]
    Io { reason: String },
    #[error("object not found: {stored_ref}")]
    NotFound { stored_ref: String },
    #[error("remote object store error: {reason}")]
    Remote { reason: String }
}

impl From<ObjectStoreError> for CoreError {
    fn from(err: ObjectStoreError) -> Self {
        match err {
            ObjectStoreError::NotFound { stored_ref } => {
                CoreError::new(ErrorKind::NotFound, format!("object not found: {stored_ref}"))
            }
            other => CoreError::new(ErrorKind::Internal, other.to_string())
        }
    }
}

/// Archive inspection failures (C2).
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("unrecognized archive format")]
    Unsupported,
    #[error("archive stream is truncated or corrupt: {reason}")]
    Corrupt { reason: String },
    #[error("archive io failed: {reason}")]
    Io { reason: String }
}

impl From<ArchiveError> for CoreError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Unsupported => {
                CoreError::new(ErrorKind::UnsupportedArchive, "unrecognized archive format")
            }
            ArchiveError::Corrupt { reason } => {
                CoreError::new(ErrorKind::CorruptArchive, format!("corrupt archive: {reason}"))
            }
            ArchiveError::Io { reason } => CoreError::new(ErrorKind::Internal, reason)
        }
    }
}

/// Parser process failures (C3).
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("parser exited with non-zero status: {code:?}")]
    Failure { code: Option<i32> },
    #[error("parser exceeded the wall-clock timeout of {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("parser exceeded its memory soft cap of {cap_bytes} bytes")]
    Oom { cap_bytes: u64 },
    #[error("unknown mode key: {mode_key}")]
    UnknownMode { mode_key: String },
    #[error("failed to spawn parser process: {reason}")]
    Spawn { reason: String }
}

impl From<ParserError> for CoreError {
    fn from(err: ParserError) -> Self {
        match err {
            ParserError::Failure { .. } => CoreError::new(ErrorKind::ParserFailure, err.to_string()),
            ParserError::Timeout { .. } => CoreError::new(ErrorKind::ParserTimeout, err.to_string()),
            ParserError::Oom { .. } => CoreError::new(ErrorKind::ParserOOM, err.to_string()),
            ParserError::UnknownMode { .. } => CoreError::new(ErrorKind::InputInvalid, err.to_string()),
            ParserError::Spawn { .. } => CoreError::new(ErrorKind::Internal, err.to_string())
        }
    }
}

/// URL-sourced ingestion failures (§4.9).
#[derive(Debug, Error)]
pub enum UrlFetchError {
    #[error("access denied")]
    AccessDenied,
    #[error("not found")]
    NotFound,
    #[error("timeout")]
    Timeout,
    #[error("connection refused")]
    ConnectionRefused,
    #[error("invalid url: {reason}")]
    InvalidUrl { reason: String }
}

impl UrlFetchError {
    /// The user-visible message that must not leak internal URLs or headers (§4.9).
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            UrlFetchError::AccessDenied => {
                "Access denied. The URL requires authentication or the link has expired."
            }
            UrlFetchError::NotFound => "The URL could not be found.",
            UrlFetchError::Timeout => "The download timed out.",
            UrlFetchError::ConnectionRefused => "The server refused the connection.",
            UrlFetchError::InvalidUrl { .. } => "The provided URL is not valid."
        }
    }
}

impl From<UrlFetchError> for CoreError {
    fn from(err: UrlFetchError) -> Self {
        CoreError::new(ErrorKind::UrlFetchFailed, err.user_message())
    }
}

/// Auth & session failures (C6).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("credentials are invalid")]
    InvalidCredentials,
    #[error("session has expired or does not exist")]
    SessionExpired,
    #[error("password does not satisfy policy: {reason}")]
    WeakPassword { reason: String },
    #[error("principal is not active")]
    Inactive
}

impl From<AuthError> for CoreError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                CoreError::new(ErrorKind::InvalidCredentials, "invalid credentials")
            }
            AuthError::SessionExpired => CoreError::new(ErrorKind::AuthExpired, "session expired"),
            AuthError::WeakPassword { reason } => {
                CoreError::new(ErrorKind::InputInvalid, format!("weak password: {reason}"))
            }
            AuthError::Inactive => CoreError::new(ErrorKind::Forbidden, "principal is not active")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_matches_taxonomy() {
        assert_eq!(ErrorKind::RateLimited.http_status(), 429);
        assert_eq!(ErrorKind::QuotaExceeded.http_status(), 413);
        assert_eq!(ErrorKind::NotFound.http_status(), 404);
    }

    #[test]
    fn url_fetch_error_never_leaks_detail() {
        let err = UrlFetchError::InvalidUrl {
            reason: "internal-secret-header-xyz".into()
        };
        assert!(!err.user_message().contains("internal-secret-header-xyz"));
    }
}
