//! Verdict types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome class of a single consultation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerdictKind {
    Approve,
    Concerns,
    BugsFound,
    Blocked,
    /// No recognized marker. Never treated as approval.
    Inconclusive,
}

impl VerdictKind {
    /// Only `approve` and `concerns` let a checkpoint advance
    pub fn is_satisfying(&self) -> bool {
        matches!(self, VerdictKind::Approve | VerdictKind::Concerns)
    }

    /// Ranking used when a response carries several markers; the most
    /// severe one wins.
    pub fn severity(&self) -> u8 {
        match self {
            VerdictKind::Approve => 0,
            VerdictKind::Concerns => 1,
            VerdictKind::BugsFound => 2,
            VerdictKind::Blocked => 3,
            VerdictKind::Inconclusive => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictKind::Approve => "approve",
            VerdictKind::Concerns => "concerns",
            VerdictKind::BugsFound => "bugs-found",
            VerdictKind::Blocked => "blocked",
            VerdictKind::Inconclusive => "inconclusive",
        }
    }
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerdictKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();
        match normalized.as_str() {
            "approve" | "approved" | "lgtm" => Ok(VerdictKind::Approve),
            "concerns" | "concern" | "approve-with-concerns" => Ok(VerdictKind::Concerns),
            "bugs-found" | "bugs" | "bug" => Ok(VerdictKind::BugsFound),
            "blocked" | "block" | "blocker" => Ok(VerdictKind::Blocked),
            "inconclusive" => Ok(VerdictKind::Inconclusive),
            other => Err(format!("unknown verdict: {}", other)),
        }
    }
}

/// A file/line reference flagged by the agent
///
/// `raw` is the text exactly as it appeared in the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedLocation {
    pub path: String,
    /// Line or line range (`"42"`, `"42-50"`), when given
    pub line: Option<String>,
    pub raw: String,
}

impl FlaggedLocation {
    pub fn new(path: impl Into<String>, line: Option<String>) -> Self {
        let path = path.into();
        let raw = match &line {
            Some(line) => format!("{}:{}", path, line),
            None => path.clone(),
        };
        Self { path, line, raw }
    }
}

impl fmt::Display for FlaggedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Structured outcome of a consultation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub kind: VerdictKind,
    pub rationale: String,
    #[serde(default)]
    pub locations: Vec<FlaggedLocation>,
}

impl Verdict {
    pub fn new(kind: VerdictKind, rationale: impl Into<String>) -> Self {
        Self {
            kind,
            rationale: rationale.into(),
            locations: Vec::new(),
        }
    }

    pub fn inconclusive(rationale: impl Into<String>) -> Self {
        Self::new(VerdictKind::Inconclusive, rationale)
    }

    pub fn with_locations(mut self, locations: Vec<FlaggedLocation>) -> Self {
        self.locations = locations;
        self
    }

    pub fn is_satisfying(&self) -> bool {
        self.kind.is_satisfying()
    }

    /// First non-empty line of the rationale, for one-line summaries
    pub fn headline(&self) -> &str {
        self.rationale
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_approve_and_concerns_satisfy() {
        assert!(VerdictKind::Approve.is_satisfying());
        assert!(VerdictKind::Concerns.is_satisfying());
        assert!(!VerdictKind::BugsFound.is_satisfying());
        assert!(!VerdictKind::Blocked.is_satisfying());
        assert!(!VerdictKind::Inconclusive.is_satisfying());
    }

    #[test]
    fn test_verdict_kind_parse_variants() {
        assert_eq!("BUGS FOUND".parse::<VerdictKind>(), Ok(VerdictKind::BugsFound));
        assert_eq!("bugs_found".parse::<VerdictKind>(), Ok(VerdictKind::BugsFound));
        assert_eq!("Approved".parse::<VerdictKind>(), Ok(VerdictKind::Approve));
        assert!("maybe".parse::<VerdictKind>().is_err());
    }

    #[test]
    fn test_verdict_kind_serde_is_kebab_case() {
        assert_eq!(
            serde_json::to_string(&VerdictKind::BugsFound).unwrap(),
            "\"bugs-found\""
        );
    }

    #[test]
    fn test_flagged_location_raw() {
        let loc = FlaggedLocation::new("src/lib.rs", Some("10-12".to_string()));
        assert_eq!(loc.to_string(), "src/lib.rs:10-12");
        assert_eq!(FlaggedLocation::new("README.md", None).raw, "README.md");
    }

    #[test]
    fn test_headline_skips_blank_lines() {
        let verdict = Verdict::new(VerdictKind::Concerns, "\n\n  Minor naming issues\nmore");
        assert_eq!(verdict.headline(), "Minor naming issues");
    }
}
