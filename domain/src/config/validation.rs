//! Configuration validation results.
//!
//! Loading and validating configuration produces a list of issues with a
//! severity. Errors are fatal at startup; warnings are printed and ignored.

use std::fmt;

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: the configuration works but may not behave as expected.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// A workflow checkpoint references a role that is not registered.
    UnknownRole { role: String },
    /// A checkpoint label is not one of `0, T-1, T, T+1, L-1, L`.
    UnknownCheckpoint { label: String },
    /// A string field holds a value outside its allowed set.
    InvalidEnumValue {
        field: String,
        value: String,
        valid_values: Vec<String>,
    },
    /// A required field is empty.
    EmptyField { field: String },
    /// A numeric field is out of range.
    OutOfRange { field: String },
    /// The checkpoint plan failed validation against the registry.
    InvalidWorkflow,
    /// A role has no checkpoint and is not out-of-band, so it can never be consulted.
    UnreachableRole { role: String },
}

/// A detected issue in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", level, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes_severity() {
        let issue = ConfigIssue::error(
            ConfigIssueCode::UnknownRole {
                role: "auditor".into(),
            },
            "checkpoint T requires unknown role 'auditor'",
        );
        assert!(issue.is_error());
        assert_eq!(
            issue.to_string(),
            "error: checkpoint T requires unknown role 'auditor'"
        );
    }

    #[test]
    fn test_warning_is_not_error() {
        let issue = ConfigIssue::warning(
            ConfigIssueCode::UnreachableRole {
                role: "security".into(),
            },
            "role 'security' is never consulted",
        );
        assert!(!issue.is_error());
    }
}
