//! Text produced by a run: commit messages, PR titles, the agent's comment
//! digest, and the issue comments that report the outcome.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::github::IssueComment;
use crate::persistence::WorkerState;
use crate::types::IssueNumber;

/// GitHub's comment size limit (65536 characters).
pub const GITHUB_COMMENT_SIZE_LIMIT: usize = 65536;

/// Room left for the fixed parts of a comment around the error text.
const COMMENT_FRAME_RESERVE: usize = 512;

const COMMIT_TITLE_MAX: usize = 60;
const PR_TITLE_MAX: usize = 80;
const ELLIPSIS: &str = "...";

/// Constraints appended to every task.
pub const CONSTRAINTS_MARKDOWN: &str = "## Constraints\n\
- Use clear English names (verb+object). Avoid abbreviations.\n\
- Prefer maintainability, readability, security.\n\
- Avoid hardcoded secrets; use environment variables.\n\
- Handle errors and edge cases explicitly; no happy-path assumptions.\n\
- Add unit tests and a usage example.\n";

/// Renders new comments as `### Comment <id>` blocks separated by blank lines.
pub fn comments_markdown(comments: &[IssueComment]) -> String {
    comments
        .iter()
        .map(|c| format!("### Comment {}\n\n{}", c.id, c.body.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim()
        .to_string()
}

/// Collapses whitespace runs and shortens to `max` characters, ending in `...`
/// when cut.
pub fn clean_title(title: &str, max: usize) -> String {
    let clean = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if clean.chars().count() <= max {
        return clean;
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut cut: String = clean.chars().take(keep).collect();
    cut.push_str(ELLIPSIS);
    cut
}

pub fn commit_message(issue: IssueNumber, title: &str) -> String {
    format!("Implement #{}: {}", issue.0, clean_title(title, COMMIT_TITLE_MAX))
}

pub fn pr_title(issue: IssueNumber, title: &str) -> String {
    format!("#{}: {}", issue.0, clean_title(title, PR_TITLE_MAX))
}

/// Issue comment posted after a successful run.
pub fn success_comment(
    state: &WorkerState,
    pr_url: Option<&str>,
    summary: &str,
    now: DateTime<Utc>,
) -> String {
    let pr_number = state
        .pr_number
        .map(|n| n.to_string())
        .unwrap_or_default();
    let pr_part = match pr_url {
        Some(url) => format!("- PR: {} ({})", url, pr_number),
        None => format!("- PR: {}", pr_number),
    };
    format!(
        "✅ Engineer Bot run completed.\n\n\
         - Time (UTC): {}\n\
         - Branch: `{}`\n\
         - Head SHA: `{}`\n\
         {}\n\n\
         Summary:\n{}\n",
        now.to_rfc3339_opts(SecondsFormat::Micros, false),
        state.branch,
        state.last_head_sha.as_ref().map(|s| s.as_str()).unwrap_or(""),
        pr_part,
        summary,
    )
}

/// Issue comment posted when a run ends with an error.
pub fn error_comment(error: &str) -> String {
    let error = truncate_middle(error, GITHUB_COMMENT_SIZE_LIMIT - COMMENT_FRAME_RESERVE);
    format!("❌ Engineer Bot run failed.\n\nError:\n{}\n", error)
}

/// Keeps the start and the end of `text` when it exceeds `max` characters.
pub fn truncate_middle(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    let marker = "\n\n[... truncated ...]\n\n";
    let budget = max.saturating_sub(marker.len());
    let head = budget / 2;
    let tail = budget - head;
    let start: String = text.chars().take(head).collect();
    let end: String = text.chars().skip(count - tail).collect();
    format!("{}{}{}", start, marker, end)
}
