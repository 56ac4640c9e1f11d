//! Core domain types for the engineer bot.
//!
//! Identifiers are newtypes so that an issue number can never be passed where a
//! pull request number or comment watermark is expected.

pub mod ids;

pub use ids::{CommentId, InvalidRepoId, IssueNumber, PrNumber, RepoId, Sha, WORK_BRANCH_PREFIX};
