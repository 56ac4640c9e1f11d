//! Transient HTTPS authentication for git.
//!
//! The token is handed to git as a per-invocation `-c http.<url>.extraheader=...`
//! option. Nothing is written to `.git/config`, remote URLs stay token-free, and
//! every string that leaves this module for logs or errors is redacted.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::config::Secret;

/// Config key that scopes the header to github.com.
pub const EXTRAHEADER_KEY: &str = "http.https://github.com/.extraheader";

/// Placeholder used wherever a secret would otherwise be shown.
pub const REDACTED: &str = "<REDACTED>";

/// Username GitHub expects when a token is used as a Basic-auth password.
const TOKEN_USERNAME: &str = "x-access-token";

/// Authentication material for git over HTTPS.
#[derive(Debug, Clone)]
pub struct GitAuth {
    token: Secret,
    header: Secret,
}

impl GitAuth {
    pub fn from_token(token: &Secret) -> Self {
        let encoded = STANDARD.encode(format!("{}:{}", TOKEN_USERNAME, token.expose()));
        GitAuth {
            token: token.clone(),
            header: Secret::new(format!("Authorization: Basic {}", encoded)),
        }
    }

    /// The full `-c` value, including the secret header.
    pub fn config_arg(&self) -> String {
        format!("{}={}", EXTRAHEADER_KEY, self.header.expose())
    }

    /// The `-c` value as it may be displayed.
    pub fn redacted_config_arg() -> String {
        format!("{}={}", EXTRAHEADER_KEY, REDACTED)
    }

    /// Replaces any occurrence of the header or the raw token in `text`.
    pub fn redact(&self, text: &str) -> String {
        let mut out = text.replace(self.header.expose(), REDACTED);
        let encoded = self
            .header
            .expose()
            .trim_start_matches("Authorization: Basic ");
        out = out.replace(encoded, REDACTED);
        if !self.token.expose().is_empty() {
            out = out.replace(self.token.expose(), REDACTED);
        }
        out
    }
}
