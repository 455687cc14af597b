//! Merging a fresh check result into the persisted issue for that check.

use anyhow::{Context, Result};
use chrono::Utc;

use super::status::determine_issue_status;
use crate::catalog::{CatalogDb, Details, IssueUpdate, Repository};

/// Record one check outcome for `repository`.
///
/// Loads (or creates, as `not_found`) the issue for `issue_key`, moves it
/// through the status table, replaces its details and stamps `last_check`.
/// The read-modify-write runs in a single immediate transaction. Details are
/// kept only when the issue was found; stale evidence is always dropped. An
/// issue swept as deleted is restored, keeping whatever status it computes to.
pub fn save_check_result(
    db: &CatalogDb,
    repository: &Repository,
    issue_key: &str,
    is_found: bool,
    details: Option<Details>,
) -> Result<IssueUpdate> {
    db.atomically(|db| {
        let (mut issue, created) = db.get_or_create_issue(repository.id, issue_key)?;
        let previous_status = issue.status;

        issue.status = determine_issue_status(is_found, previous_status);
        issue.details = if is_found {
            details.unwrap_or_default()
        } else {
            Details::new()
        };
        // Never move backwards, even if the wall clock does.
        issue.last_check = issue.last_check.max(Utc::now());
        // A result for this key means its check is active again.
        issue.deleted = false;

        let issue = db.save_issue(&issue).with_context(|| {
            format!(
                "Failed to save issue {} for repository {}",
                issue_key, repository.id
            )
        })?;

        tracing::debug!(
            repo_id = repository.id,
            kind_key = issue_key,
            is_found,
            old_status = %previous_status,
            new_status = %issue.status,
            "auditing.issue.reconciled"
        );

        Ok(IssueUpdate {
            issue,
            previous_status,
            created,
        })
    })
}
