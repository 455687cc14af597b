use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::{Details, Repository};

/// Outcome of one check for one issue kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Conventionally `namespace:check_name`, unique across all checks.
    pub issue_key: String,
    /// `None` means the check could not decide; such results are never reconciled.
    pub is_found: Option<bool>,
    pub details: Option<Details>,
}

impl CheckResult {
    pub fn new(
        issue_key: impl Into<String>,
        is_found: Option<bool>,
        details: Option<Details>,
    ) -> Self {
        Self {
            issue_key: issue_key.into(),
            is_found,
            details,
        }
    }
}

/// Read-only view of a repository handed to every check.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckContext {
    pub owner: String,
    pub name: String,
    pub path: PathBuf,
    pub project_type: String,
}

impl CheckContext {
    pub fn new(repository: &Repository, path: &Path) -> Self {
        Self {
            owner: repository.owner.clone(),
            name: repository.name.clone(),
            path: path.to_path_buf(),
            project_type: repository.project_type.clone(),
        }
    }

    /// Build a result so checks never construct `CheckResult` by hand.
    pub fn result(
        &self,
        issue_key: &str,
        is_found: Option<bool>,
        details: Option<Details>,
    ) -> CheckResult {
        CheckResult::new(issue_key, is_found, details)
    }

    pub fn found(&self, issue_key: &str, details: Details) -> CheckResult {
        self.result(issue_key, Some(true), Some(details))
    }

    pub fn not_found(&self, issue_key: &str) -> CheckResult {
        self.result(issue_key, Some(false), None)
    }

    pub fn inconclusive(&self, issue_key: &str) -> CheckResult {
        self.result(issue_key, None, None)
    }
}
