//! Human-facing text: issue comments, commit messages, PR titles and bodies.
//!
//! # Issue comments
//!
//! Every run that gets past context resolution ends with at most one issue
//! comment:
//!
//! ```text
//! ✅ Engineer Bot run completed.
//!
//! - Time (UTC): 2025-01-02T03:04:05.000000+00:00
//! - Branch: `agent/issue-123`
//! - Head SHA: `abc123`
//! - PR: https://github.com/octo/hello/pull/99 (#99)
//!
//! Summary:
//! ...
//! ```
//!
//! or, when the run failed, `❌ Engineer Bot run failed.` followed by the
//! error. Cancelled runs post nothing.

pub mod format;
pub mod pr_body;

pub use format::{
    CONSTRAINTS_MARKDOWN, GITHUB_COMMENT_SIZE_LIMIT, clean_title, comments_markdown,
    commit_message, error_comment, pr_title, success_comment,
};
pub use pr_body::{PrBodyInput, PrBodyRenderer, RenderError};
