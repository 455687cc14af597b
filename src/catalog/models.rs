use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auditing::IssueStatus;

/// Evidence payload attached to an issue by the check that found it.
pub type Details = serde_json::Map<String, serde_json::Value>;

/// A source repository known to the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Repository {
    pub id: i64,
    pub owner: String,
    pub name: String,
    /// `service` or `library`.
    pub project_type: String,
    /// Provider name (`gitlab`, `github`).
    pub provider: String,
    pub remote_id: Option<i64>,
    pub url: Option<String>,
    pub created_at: String,
}

/// A service backed by a repository. Several services may share one repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: i64,
    pub owner: String,
    pub name: String,
    pub owner_slug: String,
    pub name_slug: String,
    pub slack_channel: Option<String>,
    pub repository_id: Option<i64>,
}

impl Service {
    /// Channel to notify, if one is configured and non-blank.
    pub fn chat_channel(&self) -> Option<&str> {
        self.slack_channel
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// Persisted outcome history of one check for one repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Issue {
    pub id: i64,
    pub repository_id: i64,
    pub kind_key: String,
    pub status: IssueStatus,
    pub details: Details,
    pub last_check: DateTime<Utc>,
    pub deleted: bool,
    pub comment: Option<String>,
}

/// Result of reconciling one check result into its issue row.
#[derive(Debug, Clone)]
pub struct IssueUpdate {
    pub issue: Issue,
    pub previous_status: IssueStatus,
    /// The row did not exist before this call.
    pub created: bool,
}

impl IssueUpdate {
    pub fn status_changed(&self) -> bool {
        self.issue.status != self.previous_status
    }
}

/// Issues of one repository laid out for the audit report.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuditReport {
    /// Open issues grouped by kind category, groups and issues sorted.
    pub categories: Vec<ReportCategory>,
    /// Issues whose check is no longer part of the active check set.
    pub deprecated: Vec<Issue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportCategory {
    pub name: String,
    pub issues: Vec<Issue>,
}

impl AuditReport {
    pub const DEPRECATED_CATEGORY: &'static str = "Deprecated Issues";

    pub fn open_issue_count(&self) -> usize {
        self.categories.iter().map(|c| c.issues.len()).sum()
    }
}
