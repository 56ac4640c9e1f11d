//! Pull request description rendering.
//!
//! The body comes from a minijinja template (built in, or loaded from
//! `PR_TEMPLATE_PATH`) with `issue_number`, `summary` and `how_to_test` in
//! scope. Undefined variables are errors. Whatever the template says, the
//! result always carries the `Closes #<n>` line that links the PR to its issue.

use std::path::{Path, PathBuf};

use minijinja::{Environment, UndefinedBehavior, context};
use thiserror::Error;

use crate::types::IssueNumber;

const DEFAULT_TEMPLATE: &str = include_str!("pr_template.md");

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to read PR template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PR template error: {0}")]
    Template(#[from] minijinja::Error),
}

/// Values available to the template.
#[derive(Debug, Clone)]
pub struct PrBodyInput<'a> {
    pub issue_number: IssueNumber,
    pub summary: &'a str,
    pub how_to_test: &'a str,
}

#[derive(Debug, Clone)]
pub struct PrBodyRenderer {
    source: String,
}

impl PrBodyRenderer {
    /// Uses the built-in template.
    pub fn builtin() -> Self {
        PrBodyRenderer {
            source: DEFAULT_TEMPLATE.to_string(),
        }
    }

    /// Compiles `source`, failing early on syntax errors.
    pub fn from_source(source: impl Into<String>) -> Result<Self, RenderError> {
        let source = source.into();
        environment().template_from_str(&source)?;
        Ok(PrBodyRenderer { source })
    }

    pub fn from_file(path: &Path) -> Result<Self, RenderError> {
        let source = std::fs::read_to_string(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_source(source)
    }

    /// Template file if given, otherwise the built-in one.
    pub fn from_optional_file(path: Option<&Path>) -> Result<Self, RenderError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::builtin()),
        }
    }

    pub fn render(&self, input: &PrBodyInput<'_>) -> Result<String, RenderError> {
        let rendered = environment().render_str(
            &self.source,
            context! {
                issue_number => input.issue_number.0,
                summary => input.summary.trim(),
                how_to_test => input.how_to_test.trim(),
            },
        )?;

        let mut body = rendered.trim().to_string();
        let closes = input.issue_number.closes_line();
        if !body.contains(&closes) {
            body.push_str("\n\n");
            body.push_str(&closes);
        }
        body.push('\n');
        Ok(body)
    }
}

fn environment<'source>() -> Environment<'source> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn input<'a>(summary: &'a str, how_to_test: &'a str) -> PrBodyInput<'a> {
        PrBodyInput {
            issue_number: IssueNumber(42),
            summary,
            how_to_test,
        }
    }

    #[test]
    fn builtin_template() {
        let body = PrBodyRenderer::builtin()
            .render(&input("  did x \n", "Not run."))
            .unwrap();
        assert_eq!(
            body,
            "## Summary\ndid x\n\n## How to test\nNot run.\n\n## Tracking\nCloses #42\n"
        );
    }

    #[test]
    fn closes_line_is_appended_when_missing() {
        let renderer =
            PrBodyRenderer::from_source("Summary\n{{ summary }}\n\nHow to test\n{{ how_to_test }}\n")
                .unwrap();
        let body = renderer.render(&input("did x", "ran y")).unwrap();
        assert_eq!(body, "Summary\ndid x\n\nHow to test\nran y\n\nCloses #42\n");
    }

    #[test]
    fn undefined_variable_is_an_error() {
        let renderer = PrBodyRenderer::from_source("{{ reviewer }}").unwrap();
        assert!(matches!(
            renderer.render(&input("a", "b")),
            Err(RenderError::Template(_))
        ));
    }

    #[test]
    fn syntax_error_fails_at_construction() {
        assert!(PrBodyRenderer::from_source("{% if %}").is_err());
    }

    #[test]
    fn template_file_is_loaded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pr.md");
        std::fs::write(&path, "Fixes things for #{{ issue_number }}.\n").unwrap();

        let renderer = PrBodyRenderer::from_optional_file(Some(&path)).unwrap();
        let body = renderer.render(&input("a", "b")).unwrap();
        assert_eq!(body, "Fixes things for #42.\n\nCloses #42\n");

        let missing = PrBodyRenderer::from_file(&dir.path().join("nope.md"));
        assert!(matches!(missing, Err(RenderError::Io { .. })));
    }
}
