//! GitHub API access.
//!
//! The engine talks to GitHub through the synchronous [`IssuePlatform`] trait.
//! [`OctocrabClient`] implements it over the REST API; startup validation uses
//! its async methods directly.
//!
//! Errors carry the HTTP status so callers can tell an invalid token (401)
//! from a missing permission or resource (403/404).

mod client;
mod error;
mod platform;


pub use client::OctocrabClient;
pub use error::{GitHubApiError, GitHubErrorKind};
pub use platform::{
    Issue, IssueComment, IssuePlatform, NewPullRequest, PullRequest, Result, comments_after,
};
