//! Response reconciliation.
//!
//! Turns an agent's free-text or structured response into a [`Verdict`].
//! Pure text processing: no I/O, no knowledge of the workflow.
//!
//! # Recognized forms (first match wins)
//!
//! | Form | Example |
//! |------|---------|
//! | JSON object with a `verdict` field | `{"verdict": "bugs-found", "summary": "...", "findings": [{"path": "src/a.rs", "line": 12}]}` |
//! | Verdict line | `VERDICT: APPROVE`, `**Verdict:** bugs found` |
//! | Marker keywords anywhere in the text | `LGTM`, `BUGS FOUND`, `BLOCKED`, `concerns` |
//!
//! When several markers are present the most severe one wins
//! (blocked > bugs-found > concerns > approve). Negated phrases such as
//! `no bugs found` or `not blocked` are ignored. Any approval marker right
//! after a negation (`cannot approve`, `don't ship it`, `not LGTM yet`)
//! counts as block language.
//!
//! Anything else is `inconclusive`, which never advances a checkpoint.

use super::entities::{FlaggedLocation, Verdict, VerdictKind};
use crate::exchange::AgentExchange;
use crate::role::entities::RoleMarkers;
use regex::Regex;

const APPROVE_MARKERS: &[&str] = &[
    "APPROVE",
    "APPROVED",
    "LGTM",
    "LOOKS GOOD TO ME",
    "SHIP IT",
];

const CONCERN_MARKERS: &[&str] = &[
    "CONCERNS",
    "CONCERN",
    "APPROVE WITH CONCERNS",
    "APPROVED WITH CONCERNS",
    "NITS",
];

const BUG_MARKERS: &[&str] = &[
    "BUGS FOUND",
    "BUGS-FOUND",
    "BUGS_FOUND",
    "BUG FOUND",
    "FOUND BUGS",
    "FOUND A BUG",
    "BUG:",
    "BUGS:",
];

const BLOCK_MARKERS: &[&str] = &[
    "BLOCKED",
    "BLOCKER",
    "BLOCKERS",
    "BLOCKING ISSUE",
    "BLOCKING ISSUES",
    "CANNOT PROCEED",
    "DO NOT PROCEED",
    "MUST NOT PROCEED",
    "DO NOT MERGE",
    "REJECT",
    "REJECTED",
];

/// Words that turn a following approval marker into a refusal
const APPROVAL_NEGATION: &str = r"(?:not|never|cannot|dont|cant|wont|isnt|\w+n['\x{2019}]t)(?:\s+yet)?";

const NEGATIONS: &[&str] = &[
    "NO BUGS FOUND",
    "NO BUGS",
    "NO BUG",
    "NOT A BUG",
    "NO CONCERNS",
    "NO CONCERN",
    "NOT BLOCKED",
    "UNBLOCKED",
    "NON-BLOCKING",
    "NOT BLOCKING",
    "NO BLOCKERS",
    "NO BLOCKER",
    "NO BLOCKING ISSUES",
    "NO BLOCKING ISSUE",
];

/// Compiled marker grammar
///
/// Built once per role: the standard markers plus whatever the role's
/// prompt teaches the agent to say.
#[derive(Debug, Clone)]
pub struct MarkerGrammar {
    approve: Vec<Regex>,
    concerns: Vec<Regex>,
    bugs_found: Vec<Regex>,
    blocked: Vec<Regex>,
    negated_approve: Vec<Regex>,
    negations: Vec<Regex>,
    verdict_line: Option<Regex>,
    location: Option<Regex>,
}

impl Default for MarkerGrammar {
    fn default() -> Self {
        Self::with_markers(&RoleMarkers::default())
    }
}

impl MarkerGrammar {
    pub fn with_markers(extra: &RoleMarkers) -> Self {
        let build = |standard: &[&str], extra: &[String]| -> Vec<Regex> {
            standard
                .iter()
                .copied()
                .chain(extra.iter().map(String::as_str))
                .filter_map(marker_regex)
                .collect()
        };
        Self {
            approve: build(APPROVE_MARKERS, &extra.approve),
            concerns: build(CONCERN_MARKERS, &extra.concerns),
            bugs_found: build(BUG_MARKERS, &extra.bugs_found),
            blocked: build(BLOCK_MARKERS, &extra.blocked),
            negated_approve: APPROVE_MARKERS
                .iter()
                .copied()
                .chain(extra.approve.iter().map(String::as_str))
                .filter_map(negated_marker_regex)
                .collect(),
            negations: build(NEGATIONS, &[]),
            verdict_line: Regex::new(
                r"(?im)^[\s>#*_`-]*verdict[\s*_`]*[:=]\s*(?P<value>.+?)\s*$",
            )
            .ok(),
            location: Regex::new(
                r"(?:^|[\s(\[`'\x22])(?P<path>(?:[A-Za-z0-9_.\-]+/)*[A-Za-z0-9_\-][A-Za-z0-9_.\-]*\.[A-Za-z0-9]+):(?P<line>\d+(?:-\d+)?)",
            )
            .ok(),
        }
    }

    /// Classify by marker keywords only. `None` when nothing matched.
    pub fn classify_keywords(&self, text: &str) -> Option<VerdictKind> {
        let cleaned = strip_all(&self.negations, text);
        if any_match(&self.blocked, &cleaned) || any_match(&self.negated_approve, &cleaned) {
            return Some(VerdictKind::Blocked);
        }
        if any_match(&self.bugs_found, &cleaned) {
            Some(VerdictKind::BugsFound)
        } else if any_match(&self.concerns, &cleaned) {
            Some(VerdictKind::Concerns)
        } else if any_match(&self.approve, &cleaned) {
            Some(VerdictKind::Approve)
        } else {
            None
        }
    }

    /// Every `path:line` or `path:start-end` reference, in order of first
    /// appearance, without duplicates
    pub fn extract_locations(&self, text: &str) -> Vec<FlaggedLocation> {
        let Some(re) = &self.location else {
            return Vec::new();
        };
        let mut locations: Vec<FlaggedLocation> = Vec::new();
        for caps in re.captures_iter(text) {
            let (Some(path), Some(line)) = (caps.name("path"), caps.name("line")) else {
                continue;
            };
            let location = FlaggedLocation {
                path: path.as_str().to_string(),
                line: Some(line.as_str().to_string()),
                raw: text[path.start()..line.end()].to_string(),
            };
            if !locations.iter().any(|l| l.raw == location.raw) {
                locations.push(location);
            }
        }
        locations
    }

    fn classify_verdict_lines(&self, text: &str) -> Option<Option<VerdictKind>> {
        let re = self.verdict_line.as_ref()?;
        let values: Vec<&str> = re
            .captures_iter(text)
            .filter_map(|caps| caps.name("value").map(|m| m.as_str()))
            .collect();
        if values.is_empty() {
            return None;
        }
        let kind = values
            .iter()
            .filter_map(|value| {
                let plain = value.trim_matches(|c: char| "*_`\"'.!".contains(c));
                plain
                    .parse::<VerdictKind>()
                    .ok()
                    .filter(|kind| *kind != VerdictKind::Inconclusive)
                    .or_else(|| self.classify_keywords(plain))
            })
            .max_by_key(VerdictKind::severity);
        Some(kind)
    }
}

/// Reconcile an exchange into a verdict.
///
/// Failed transport outcomes and empty responses are `inconclusive`.
pub fn reconcile(exchange: &AgentExchange, grammar: &MarkerGrammar) -> Verdict {
    if !exchange.outcome.is_ok() {
        return Verdict::inconclusive(exchange.outcome.to_string());
    }
    parse_verdict(exchange.response_text(), grammar)
}

/// Parse a raw response text into a verdict
pub fn parse_verdict(response: &str, grammar: &MarkerGrammar) -> Verdict {
    let text = response.trim();
    if text.is_empty() {
        return Verdict::inconclusive("empty response");
    }

    if let Some(verdict) = parse_structured(text, grammar) {
        return verdict;
    }

    let locations = grammar.extract_locations(text);

    if let Some(explicit) = grammar.classify_verdict_lines(text) {
        let kind = explicit.unwrap_or(VerdictKind::Inconclusive);
        return Verdict::new(kind, text).with_locations(locations);
    }

    let kind = grammar
        .classify_keywords(text)
        .unwrap_or(VerdictKind::Inconclusive);
    Verdict::new(kind, text).with_locations(locations)
}

/// JSON form: `{"verdict": "...", "summary": "...", "findings": [...]}`
///
/// Returns `None` when there is no JSON object with a `verdict` field. An
/// unrecognized verdict value is inconclusive rather than a fallthrough.
fn parse_structured(text: &str, grammar: &MarkerGrammar) -> Option<Verdict> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let parsed: serde_json::Value = serde_json::from_str(&text[start..=end]).ok()?;
    let verdict = parsed.get("verdict")?.as_str()?;

    let rationale = ["summary", "rationale", "reason"]
        .iter()
        .find_map(|key| parsed.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| text.to_string());

    let Ok(kind) = verdict.parse::<VerdictKind>() else {
        return Some(Verdict::inconclusive(format!(
            "unrecognized verdict '{}': {}",
            verdict, rationale
        )));
    };

    let mut locations: Vec<FlaggedLocation> = parsed
        .get("findings")
        .and_then(|f| f.as_array())
        .map(|findings| findings.iter().filter_map(finding_location).collect())
        .unwrap_or_default();
    if locations.is_empty() {
        locations = grammar.extract_locations(text);
    }

    Some(Verdict::new(kind, rationale).with_locations(locations))
}

fn finding_location(finding: &serde_json::Value) -> Option<FlaggedLocation> {
    let path = finding
        .get("path")
        .or_else(|| finding.get("file"))
        .and_then(|p| p.as_str())?;
    let line = finding.get("line").and_then(|l| match l {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    });
    Some(FlaggedLocation::new(path, line))
}

fn marker_regex(marker: &str) -> Option<Regex> {
    let marker = marker.trim();
    let first = marker.chars().next()?;
    let last = marker.chars().last()?;
    let body = regex::escape(marker).replace(' ', r"\s+");
    let prefix = if first.is_alphanumeric() { r"\b" } else { "" };
    let suffix = if last.is_alphanumeric() { r"\b" } else { "" };
    Regex::new(&format!("(?i){}{}{}", prefix, body, suffix)).ok()
}

/// `<negation> <marker>`, e.g. `won't approve` or `not LGTM`
fn negated_marker_regex(marker: &str) -> Option<Regex> {
    let marker = marker.trim();
    let last = marker.chars().last()?;
    let body = regex::escape(marker).replace(' ', r"\s+");
    let suffix = if last.is_alphanumeric() { r"\b" } else { "" };
    Regex::new(&format!(r"(?i)\b{}\s+{}{}", APPROVAL_NEGATION, body, suffix)).ok()
}

fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}

fn strip_all(patterns: &[Regex], text: &str) -> String {
    patterns.iter().fold(text.to_string(), |acc, re| {
        re.replace_all(&acc, " ").into_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::TransportOutcome;
    use crate::role::value_objects::RoleId;
    use std::time::Duration;

    fn kind(text: &str) -> VerdictKind {
        parse_verdict(text, &MarkerGrammar::default()).kind
    }

    // ==================== Keyword scan ====================

    #[test]
    fn test_plain_approval() {
        assert_eq!(kind("Looks good to me, approve."), VerdictKind::Approve);
        assert_eq!(kind("LGTM"), VerdictKind::Approve);
    }

    #[test]
    fn test_concerns_outrank_approval() {
        assert_eq!(
            kind("Approved, with a couple of concerns about naming."),
            VerdictKind::Concerns
        );
    }

    #[test]
    fn test_bugs_outrank_concerns() {
        assert_eq!(
            kind("Some concerns, and BUGS FOUND in the parser."),
            VerdictKind::BugsFound
        );
        assert_eq!(kind("Bug: off-by-one in the loop"), VerdictKind::BugsFound);
    }

    #[test]
    fn test_blocked_outranks_everything() {
        assert_eq!(
            kind("Bugs found. This is blocked until the schema is settled."),
            VerdictKind::Blocked
        );
    }

    #[test]
    fn test_negated_approval_is_block_language() {
        assert_eq!(kind("I cannot approve this design."), VerdictKind::Blocked);
        assert_eq!(kind("I do NOT approve"), VerdictKind::Blocked);
        assert_eq!(kind("Don't ship it."), VerdictKind::Blocked);
        assert_eq!(kind("This is not LGTM yet."), VerdictKind::Blocked);
        assert_eq!(kind("I would not ship it as is."), VerdictKind::Blocked);
        assert_eq!(kind("I won\u{2019}t approve this."), VerdictKind::Blocked);
        assert_eq!(kind("Not yet approved."), VerdictKind::Blocked);
    }

    #[test]
    fn test_every_approval_marker_negated_never_approves() {
        for marker in APPROVE_MARKERS {
            for negation in ["not", "never", "don't", "won't", "can't", "cannot", "shouldn't"] {
                let text = format!("I {} {} this change.", negation, marker.to_lowercase());
                let verdict = kind(&text);
                assert_eq!(verdict, VerdictKind::Blocked, "{text}");
            }
        }
    }

    #[test]
    fn test_negated_role_approval_marker_is_blocked() {
        let grammar = MarkerGrammar::with_markers(&RoleMarkers {
            approve: vec!["ROOT CAUSE IDENTIFIED".to_string()],
            ..Default::default()
        });
        let verdict = parse_verdict("Never root cause identified; still guessing.", &grammar);
        assert_eq!(verdict.kind, VerdictKind::Blocked);
        let verdict = parse_verdict("VERDICT: not root cause identified", &grammar);
        assert_eq!(verdict.kind, VerdictKind::Blocked);
    }

    #[test]
    fn test_negations_are_ignored() {
        assert_eq!(kind("No bugs found. LGTM."), VerdictKind::Approve);
        assert_eq!(kind("Not blocked; approve."), VerdictKind::Approve);
        assert_eq!(kind("No concerns, approved."), VerdictKind::Approve);
        assert_eq!(kind("Non-blocking nits only."), VerdictKind::Concerns);
    }

    #[test]
    fn test_word_boundaries() {
        // "disapproved" and "debugged" are not markers
        assert_eq!(kind("The change was debugged and disapproved of"), VerdictKind::Inconclusive);
    }

    // ==================== Fail-closed default ====================

    #[test]
    fn test_no_markers_is_inconclusive() {
        assert_eq!(kind("I looked at the code."), VerdictKind::Inconclusive);
        assert_eq!(kind(""), VerdictKind::Inconclusive);
        assert_eq!(kind("   \n "), VerdictKind::Inconclusive);
    }

    // ==================== Verdict lines ====================

    #[test]
    fn test_verdict_line_wins_over_body_keywords() {
        let text = "The earlier draft had bugs found by CI, now fixed.\n\nVERDICT: APPROVE";
        assert_eq!(kind(text), VerdictKind::Approve);
    }

    #[test]
    fn test_markdown_verdict_line() {
        assert_eq!(kind("**Verdict:** bugs found"), VerdictKind::BugsFound);
        assert_eq!(kind("## Verdict: BUGS_FOUND"), VerdictKind::BugsFound);
        assert_eq!(kind("Verdict = concerns."), VerdictKind::Concerns);
    }

    #[test]
    fn test_verdict_line_with_qualifier() {
        assert_eq!(
            kind("VERDICT: APPROVE (minor concerns noted)"),
            VerdictKind::Concerns
        );
    }

    #[test]
    fn test_unrecognized_verdict_line_is_inconclusive() {
        let text = "Approve the idea in general.\nVERDICT: maybe later";
        assert_eq!(kind(text), VerdictKind::Inconclusive);
    }

    #[test]
    fn test_conflicting_verdict_lines_take_most_severe() {
        assert_eq!(
            kind("VERDICT: APPROVE\n...\nVERDICT: BLOCKED"),
            VerdictKind::Blocked
        );
    }

    // ==================== Structured JSON ====================

    #[test]
    fn test_json_verdict() {
        let text = r#"Here you go:
```json
{"verdict": "bugs-found", "summary": "Null deref", "findings": [{"path": "src/io.rs", "line": 88, "note": "unwrap on None"}]}
```"#;
        let verdict = parse_verdict(text, &MarkerGrammar::default());
        assert_eq!(verdict.kind, VerdictKind::BugsFound);
        assert_eq!(verdict.rationale, "Null deref");
        assert_eq!(verdict.locations.len(), 1);
        assert_eq!(verdict.locations[0].raw, "src/io.rs:88");
    }

    #[test]
    fn test_json_unknown_verdict_is_inconclusive() {
        let verdict = parse_verdict(
            r#"{"verdict": "probably fine", "summary": "eh"}"#,
            &MarkerGrammar::default(),
        );
        assert_eq!(verdict.kind, VerdictKind::Inconclusive);
    }

    #[test]
    fn test_json_without_verdict_falls_through() {
        assert_eq!(kind(r#"{"score": 9} LGTM"#), VerdictKind::Approve);
    }

    // ==================== Locations ====================

    #[test]
    fn test_locations_preserved_verbatim() {
        let text = "BUGS FOUND\n- src/domain/lib.rs:42 overflow\n- (tests/it.rs:10-14) flaky\n- src/domain/lib.rs:42 again";
        let verdict = parse_verdict(text, &MarkerGrammar::default());
        let raws: Vec<&str> = verdict.locations.iter().map(|l| l.raw.as_str()).collect();
        assert_eq!(raws, vec!["src/domain/lib.rs:42", "tests/it.rs:10-14"]);
        assert_eq!(verdict.locations[1].line.as_deref(), Some("10-14"));
        assert_eq!(verdict.rationale, text);
    }

    #[test]
    fn test_urls_are_not_locations() {
        let grammar = MarkerGrammar::default();
        assert!(grammar.extract_locations("see http://example.com:8080/x").is_empty());
    }

    // ==================== Role markers ====================

    #[test]
    fn test_role_specific_markers() {
        let grammar = MarkerGrammar::with_markers(&RoleMarkers {
            approve: vec!["ROOT CAUSE IDENTIFIED".to_string()],
            ..Default::default()
        });
        let verdict = parse_verdict("Root cause identified: stale cache.", &grammar);
        assert_eq!(verdict.kind, VerdictKind::Approve);
        assert_eq!(kind("Root cause identified: stale cache."), VerdictKind::Inconclusive);
    }

    // ==================== reconcile ====================

    #[test]
    fn test_reconcile_failed_exchange_is_inconclusive() {
        let exchange = AgentExchange::new(RoleId::reviewer(), None, "p")
            .failed(TransportOutcome::Timeout { after_secs: 600 }, Duration::from_secs(600));
        let verdict = reconcile(&exchange, &MarkerGrammar::default());
        assert_eq!(verdict.kind, VerdictKind::Inconclusive);
        assert!(verdict.rationale.contains("timeout"));
    }

    #[test]
    fn test_reconcile_ok_exchange() {
        let exchange = AgentExchange::new(RoleId::reviewer(), None, "p").succeeded(
            "VERDICT: APPROVE",
            None,
            Duration::from_secs(1),
        );
        assert_eq!(
            reconcile(&exchange, &MarkerGrammar::default()).kind,
            VerdictKind::Approve
        );
    }
}
