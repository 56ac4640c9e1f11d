//! GitHub API error types.
//!
//! Callers care about three outcomes of a failed request:
//!
//! - **AuthInvalid** (HTTP 401): the token is wrong or expired
//! - **PermissionOrNotFound** (HTTP 403/404): the token is valid but cannot see
//!   or modify the resource; GitHub answers 404 for private repositories the
//!   token has no access to
//! - **Other**: everything else, including transport failures without a status

use std::fmt;
use thiserror::Error;

/// The kind of GitHub API error, derived from the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHubErrorKind {
    AuthInvalid,
    PermissionOrNotFound,
    Other,
}

impl GitHubErrorKind {
    pub fn from_status(status_code: Option<u16>) -> Self {
        match status_code {
            Some(401) => GitHubErrorKind::AuthInvalid,
            Some(403) | Some(404) => GitHubErrorKind::PermissionOrNotFound,
            _ => GitHubErrorKind::Other,
        }
    }
}

/// A failed GitHub API call.
#[derive(Debug, Error)]
pub struct GitHubApiError {
    pub kind: GitHubErrorKind,

    /// The HTTP status code, if a response was received.
    pub status_code: Option<u16>,

    /// The message GitHub returned, or the transport error text.
    pub message: String,

    #[source]
    pub source: Option<octocrab::Error>,
}

impl fmt::Display for GitHubApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(
                f,
                "GitHub API error: status={}, message={}",
                code, self.message
            ),
            None => write!(f, "GitHub API error: {}", self.message),
        }
    }
}

impl GitHubApiError {
    /// Builds an error from a status code and message, without a source.
    pub fn new(status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind: GitHubErrorKind::from_status(status_code),
            status_code,
            message: message.into(),
            source: None,
        }
    }

    /// Categorizes an octocrab error.
    ///
    /// Non-2xx responses arrive as `octocrab::Error::GitHub` with a parsed
    /// status and message. Anything else (connection, TLS, JSON decoding) has
    /// no status and is classified as [`GitHubErrorKind::Other`].
    pub fn from_octocrab(err: octocrab::Error) -> Self {
        let (status_code, message) = match &err {
            octocrab::Error::GitHub { source, .. } => {
                (Some(source.status_code.as_u16()), source.message.clone())
            }
            other => (None, other.to_string()),
        };
        Self {
            kind: GitHubErrorKind::from_status(status_code),
            status_code,
            message,
            source: Some(err),
        }
    }

    pub fn is_auth_invalid(&self) -> bool {
        self.kind == GitHubErrorKind::AuthInvalid
    }

    pub fn is_permission_or_not_found(&self) -> bool {
        self.kind == GitHubErrorKind::PermissionOrNotFound
    }
}
