//! Verdicts and status codes.

use serde::{Deserialize, Serialize};

/// Outcome of a single check or of a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Not written yet
    #[default]
    Unknown,
    /// Check passed
    Pass,
    /// Check failed
    Fail,
}

impl Verdict {
    /// Map a boolean decision onto a verdict.
    pub fn from_passed(passed: bool) -> Self {
        if passed {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    /// Whether this verdict is `Pass`.
    pub fn is_pass(self) -> bool {
        self == Verdict::Pass
    }

    /// Whether this verdict is still `Unknown`.
    pub fn is_unknown(&self) -> bool {
        *self == Verdict::Unknown
    }

    /// Combine two reports of the same check. A failure always wins.
    pub fn merge(self, other: Verdict) -> Verdict {
        match (self, other) {
            (Verdict::Fail, _) | (_, Verdict::Fail) => Verdict::Fail,
            (Verdict::Pass, _) | (_, Verdict::Pass) => Verdict::Pass,
            _ => Verdict::Unknown,
        }
    }

    /// Lowercase label used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Unknown => "unknown",
            Verdict::Pass => "pass",
            Verdict::Fail => "fail",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome code of the last operation a component issued.
///
/// Codes follow HTTP conventions so that they line up with what keyed stores
/// and notification services report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u16);

impl StatusCode {
    /// Operation succeeded.
    pub const OK: StatusCode = StatusCode(200);
    /// Caller supplied invalid input.
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    /// Key has no record.
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    /// Downstream channel rejected or failed the delivery.
    pub const BAD_GATEWAY: StatusCode = StatusCode(502);
    /// Store could not be reached.
    pub const SERVICE_UNAVAILABLE: StatusCode = StatusCode(503);

    /// 2xx codes.
    pub fn is_success(self) -> bool {
        (200..300).contains(&self.0)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_serde() {
        assert_eq!(serde_json::to_string(&Verdict::Pass).unwrap(), "\"pass\"");
        assert_eq!(serde_json::to_string(&Verdict::Fail).unwrap(), "\"fail\"");
        let v: Verdict = serde_json::from_str("\"unknown\"").unwrap();
        assert_eq!(v, Verdict::Unknown);
    }

    #[test]
    fn test_verdict_merge_fail_wins() {
        assert_eq!(Verdict::Pass.merge(Verdict::Fail), Verdict::Fail);
        assert_eq!(Verdict::Fail.merge(Verdict::Pass), Verdict::Fail);
        assert_eq!(Verdict::Pass.merge(Verdict::Pass), Verdict::Pass);
        assert_eq!(Verdict::Unknown.merge(Verdict::Pass), Verdict::Pass);
        assert_eq!(Verdict::Unknown.merge(Verdict::Unknown), Verdict::Unknown);
    }

    #[test]
    fn test_status_code_success() {
        assert!(StatusCode::OK.is_success());
        assert!(StatusCode(204).is_success());
        assert!(!StatusCode::NOT_FOUND.is_success());
        assert!(!StatusCode::SERVICE_UNAVAILABLE.is_success());
        assert_eq!(serde_json::to_string(&StatusCode::OK).unwrap(), "200");
    }
}
