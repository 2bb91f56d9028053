//! Conversation identifier format

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque conversation identifier reported by the external agent
///
/// The raw text is kept as received; shape checks happen in
/// [`TokenFormat::check`] right before the token would be sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationToken(String);

impl ConversationToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Accepted conversation identifier shape: `<scheme><body>` where `body` is
/// non-empty and made only of ASCII hex digits and `-`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenFormat {
    schemes: Vec<String>,
}

impl Default for TokenFormat {
    fn default() -> Self {
        Self {
            schemes: Self::DEFAULT_SCHEMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TokenFormat {
    pub const DEFAULT_SCHEMES: [&'static str; 2] = ["conv_", "thread_"];

    pub fn new(schemes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            schemes: schemes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn schemes(&self) -> &[String] {
        &self.schemes
    }

    /// Returns the reason the token is malformed, if it is.
    pub fn check(&self, token: &ConversationToken) -> Result<(), String> {
        let raw = token.as_str();
        if raw.is_empty() {
            return Err("identifier is empty".to_string());
        }
        if raw.trim() != raw {
            return Err("identifier has surrounding whitespace".to_string());
        }
        let body = self
            .schemes
            .iter()
            .filter(|scheme| !scheme.is_empty())
            .find_map(|scheme| raw.strip_prefix(scheme.as_str()))
            .ok_or_else(|| {
                format!(
                    "identifier '{}' lacks a recognized scheme prefix ({})",
                    raw,
                    self.schemes.join(", ")
                )
            })?;
        if body.is_empty() {
            return Err(format!("identifier '{}' has an empty body", raw));
        }
        if let Some(bad) = body.chars().find(|c| !(c.is_ascii_hexdigit() || *c == '-')) {
            return Err(format!(
                "identifier '{}' contains '{}' outside the hex/hyphen body",
                raw, bad
            ));
        }
        Ok(())
    }

    pub fn is_valid(&self, token: &ConversationToken) -> bool {
        self.check(token).is_ok()
    }
}
