//! Unique identifiers for QC runs.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Run-scoped correlation token shared by every check of one QC run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QcPid(Ulid);

impl QcPid {
    /// Generate a new QcPid
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for QcPid {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for QcPid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for QcPid {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qc_pid_unique() {
        let a = QcPid::new();
        let b = QcPid::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_qc_pid_parse_display() {
        let pid = QcPid::new();
        let parsed: QcPid = pid.to_string().parse().unwrap();
        assert_eq!(parsed, pid);
        assert!("not-a-ulid".parse::<QcPid>().is_err());
    }
}
