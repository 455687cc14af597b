//! Issue lifecycle states and the transition table between audit runs.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Status of an issue across repeated audit runs.
///
/// `Wontfix` is only ever entered through a manual override; the audit runner
/// keeps it while the check still fires and drops back to `Fixed` once it stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    New,
    Reopened,
    Fixed,
    NotFound,
    Wontfix,
}

impl IssueStatus {
    pub const ALL: [IssueStatus; 5] = [
        Self::New,
        Self::Reopened,
        Self::Fixed,
        Self::NotFound,
        Self::Wontfix,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Reopened => "reopened",
            Self::Fixed => "fixed",
            Self::NotFound => "not_found",
            Self::Wontfix => "wontfix",
        }
    }

    /// Whether an issue in this state shows up in the active audit report.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::New | Self::Reopened)
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "reopened" => Ok(Self::Reopened),
            "fixed" => Ok(Self::Fixed),
            "not_found" => Ok(Self::NotFound),
            "wontfix" => Ok(Self::Wontfix),
            _ => Err(format!("Invalid issue status: {}", s)),
        }
    }
}

/// Next status of an issue given whether its check fired in this run.
///
/// | old       | found    | not found |
/// |-----------|----------|-----------|
/// | NotFound  | New      | NotFound  |
/// | New       | New      | Fixed     |
/// | Fixed     | Reopened | Fixed     |
/// | Reopened  | Reopened | Fixed     |
/// | Wontfix   | Wontfix  | Fixed     |
pub fn determine_issue_status(is_found: bool, old_status: IssueStatus) -> IssueStatus {
    use IssueStatus::*;

    match (is_found, old_status) {
        (true, NotFound) => New,
        (true, New) => New,
        (true, Fixed | Reopened) => Reopened,
        (true, Wontfix) => Wontfix,
        (false, NotFound) => NotFound,
        (false, New | Reopened | Fixed | Wontfix) => Fixed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use IssueStatus::*;

    #[test]
    fn test_transition_table_is_exhaustive() {
        let cases = [
            (true, NotFound, New),
            (true, New, New),
            (true, Fixed, Reopened),
            (true, Reopened, Reopened),
            (true, Wontfix, Wontfix),
            (false, NotFound, NotFound),
            (false, New, Fixed),
            (false, Reopened, Fixed),
            (false, Fixed, Fixed),
            (false, Wontfix, Fixed),
        ];
        assert_eq!(cases.len(), IssueStatus::ALL.len() * 2);

        for (is_found, old, expected) in cases {
            assert_eq!(
                determine_issue_status(is_found, old),
                expected,
                "is_found={} old={}",
                is_found,
                old
            );
        }
    }

    #[test]
    fn test_wontfix_survives_rediscovery() {
        assert_eq!(determine_issue_status(true, Wontfix), Wontfix);
        assert_eq!(determine_issue_status(true, Wontfix), Wontfix);
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in IssueStatus::ALL {
            assert_eq!(IssueStatus::from_str(status.as_str()), Ok(status));
        }
        assert!(IssueStatus::from_str("closed").is_err());
    }

    #[test]
    fn test_only_new_and_reopened_are_open() {
        let open: Vec<_> = IssueStatus::ALL.iter().filter(|s| s.is_open()).collect();
        assert_eq!(open, vec![&New, &Reopened]);
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
    }
}
