//! One audit batch: run, reconcile, notify, sweep.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::mpsc;

use super::check::CheckSet;
use super::context::CheckResult;
use super::notify::Notifier;
use super::reconcile::save_check_result;
use super::runner::check_repository;
use super::status::IssueStatus;
use crate::catalog::{DbHandle, Repository};

/// A status transition observed during a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub kind_key: String,
    pub from: IssueStatus,
    pub to: IssueStatus,
    pub created: bool,
}

/// What a batch did to one repository's issues.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditSummary {
    pub repository_id: i64,
    /// Conclusive results reconciled into issues.
    pub results: usize,
    pub changes: Vec<StatusChange>,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    /// Keys soft-deleted because no check produced them this time.
    pub swept: Vec<String>,
    pub failed_checks: Vec<String>,
}

/// Audit `repository` at `path` with `checks` and persist the outcome.
///
/// Checks run on the blocking pool, since they walk the checkout with
/// synchronous filesystem calls, and stream their results back here. Every
/// conclusive result is reconciled as soon as it arrives, and an issue whose
/// status changed is announced through `notifier` when one is
/// given. Afterwards every live issue whose key was not produced in this
/// batch is flagged deleted, status untouched and nobody notified. A key whose
/// check failed this time is therefore swept too.
///
/// A save error aborts the batch before the sweep. Check and delivery
/// failures never do.
pub async fn run_checks_and_save_results(
    db: &DbHandle,
    notifier: Option<&Notifier>,
    checks: &CheckSet,
    repository: &Repository,
    path: &Path,
) -> Result<AuditSummary> {
    tracing::info!(
        repo_id = repository.id,
        checks = checks.len(),
        path = %path.display(),
        "auditing.batch.start"
    );

    let mut summary = AuditSummary {
        repository_id: repository.id,
        ..Default::default()
    };
    let mut produced = HashSet::new();
    let (result_tx, mut result_rx) = mpsc::channel::<CheckResult>(100);
    let runner = {
        let checks = checks.clone();
        let repository = repository.clone();
        let path = path.to_path_buf();
        let span = tracing::Span::current();
        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let mut run = check_repository(&checks, &repository, &path);
            for result in run.by_ref() {
                // Receiver gone means the batch aborted; stop running checks.
                if result_tx.blocking_send(result).is_err() {
                    break;
                }
            }
            run.failed_checks().to_vec()
        })
    };

    while let Some(result) = result_rx.recv().await {
        let Some(is_found) = result.is_found else {
            continue;
        };
        produced.insert(result.issue_key.clone());

        let repo = repository.clone();
        let update = db
            .call(move |db| {
                save_check_result(db, &repo, &result.issue_key, is_found, result.details)
            })
            .await?;
        summary.results += 1;

        if !update.status_changed() {
            continue;
        }
        summary.changes.push(StatusChange {
            kind_key: update.issue.kind_key.clone(),
            from: update.previous_status,
            to: update.issue.status,
            created: update.created,
        });

        if let Some(notifier) = notifier {
            match notifier.notify_status_change(&update.issue).await {
                Ok(outcome) => {
                    summary.notifications_sent += outcome.sent;
                    summary.notifications_failed += outcome.failed;
                }
                Err(e) => {
                    tracing::error!(
                        repo_id = repository.id,
                        kind_key = %update.issue.kind_key,
                        error = %format!("{:#}", e),
                        "auditing.update_issue.notify_error"
                    );
                    summary.notifications_failed += 1;
                }
            }
        }
    }
    summary.failed_checks = runner.await.context("Check runner task panicked")?;

    let repository_id = repository.id;
    let swept = db
        .call(move |db| db.sweep_issues(repository_id, &produced))
        .await?;
    summary.swept = swept.into_iter().map(|i| i.kind_key).collect();
    if !summary.swept.is_empty() {
        tracing::info!(
            repo_id = repository.id,
            swept = ?summary.swept,
            "auditing.batch.swept"
        );
    }

    tracing::info!(
        repo_id = repository.id,
        results = summary.results,
        changes = summary.changes.len(),
        failed_checks = summary.failed_checks.len(),
        "auditing.batch.done"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auditing::check::CheckOutput;
    use crate::auditing::context::CheckContext;
    use crate::auditing::kinds::KindRegistry;
    use crate::auditing::notify::tests::RecordingChat;
    use crate::auditing::urls::UrlReverser;
    use crate::auditing::IssueStatus::*;
    use crate::auditing::check::Check;
    use crate::catalog::CatalogDb;
    use std::sync::{Arc, Mutex};
    use std::thread::ThreadId;

    fn setup() -> (DbHandle, Repository) {
        let db = CatalogDb::new_in_memory().unwrap();
        let repo = db
            .create_repository("platform", "billing", "service", "gitlab")
            .unwrap();
        db.create_service("Platform", "Billing", Some("#billing"), Some(repo.id))
            .unwrap();
        (DbHandle::new(db), repo)
    }

    fn check_ab(ctx: &CheckContext) -> Result<CheckOutput> {
        Ok(ctx.found("a:b", Default::default()).into())
    }

    fn check_cd(ctx: &CheckContext) -> Result<CheckOutput> {
        Ok(ctx.not_found("c:d").into())
    }

    fn check_unknown(ctx: &CheckContext) -> Result<CheckOutput> {
        Ok(ctx.inconclusive("e:f").into())
    }

    fn check_failing(_ctx: &CheckContext) -> Result<CheckOutput> {
        anyhow::bail!("boom")
    }

    fn check_spaced_key(ctx: &CheckContext) -> Result<CheckOutput> {
        Ok(ctx.found("license:missing header", Default::default()).into())
    }

    fn check_empty_key(ctx: &CheckContext) -> Result<CheckOutput> {
        Ok(ctx.found("", Default::default()).into())
    }

    /// Remembers which thread it ran on.
    struct ThreadRecorder {
        ran_on: Arc<Mutex<Option<ThreadId>>>,
    }

    impl Check for ThreadRecorder {
        fn name(&self) -> &str {
            "thread"
        }

        fn run(&self, ctx: &CheckContext) -> Result<CheckOutput> {
            *self.ran_on.lock().unwrap() = Some(std::thread::current().id());
            Ok(ctx.not_found("thread:recorded").into())
        }
    }

    #[tokio::test]
    async fn test_batch_reconciles_every_conclusive_result() {
        let (db, repo) = setup();
        let checks = CheckSet::new()
            .with_fn("ab", check_ab)
            .with_fn("cd", check_cd)
            .with_fn("unknown", check_unknown)
            .with_fn("failing", check_failing);

        let summary = run_checks_and_save_results(&db, None, &checks, &repo, Path::new("/tmp"))
            .await
            .unwrap();

        assert_eq!(summary.results, 2);
        assert_eq!(summary.failed_checks, vec!["failing".to_string()]);
        assert_eq!(
            summary.changes,
            vec![StatusChange {
                kind_key: "a:b".into(),
                from: NotFound,
                to: New,
                created: true,
            }]
        );
        let issues = db.lock_sync().unwrap().list_issues(repo.id, None).unwrap();
        let keys: Vec<_> = issues.iter().map(|i| i.kind_key.as_str()).collect();
        assert_eq!(keys, vec!["a:b", "c:d"]);
    }

    #[tokio::test]
    async fn test_retired_check_is_swept_with_status_unchanged() {
        let (db, repo) = setup();
        let both = CheckSet::new().with_fn("ab", check_ab).with_fn("cd", check_cd);
        run_checks_and_save_results(&db, None, &both, &repo, Path::new("/tmp"))
            .await
            .unwrap();

        let only_cd = CheckSet::new().with_fn("cd", check_cd);
        let summary = run_checks_and_save_results(&db, None, &only_cd, &repo, Path::new("/tmp"))
            .await
            .unwrap();

        assert_eq!(summary.swept, vec!["a:b".to_string()]);
        let guard = db.lock_sync().unwrap();
        let ab = guard.find_issue(repo.id, "a:b").unwrap().unwrap();
        assert!(ab.deleted);
        assert_eq!(ab.status, New);
        let cd = guard.find_issue(repo.id, "c:d").unwrap().unwrap();
        assert!(!cd.deleted);
    }

    #[tokio::test]
    async fn test_already_deleted_issue_is_not_swept_again() {
        let (db, repo) = setup();
        let ab = CheckSet::new().with_fn("ab", check_ab);
        run_checks_and_save_results(&db, None, &ab, &repo, Path::new("/tmp"))
            .await
            .unwrap();
        let empty = CheckSet::new();
        let first = run_checks_and_save_results(&db, None, &empty, &repo, Path::new("/tmp"))
            .await
            .unwrap();
        let second = run_checks_and_save_results(&db, None, &empty, &repo, Path::new("/tmp"))
            .await
            .unwrap();
        assert_eq!(first.swept.len(), 1);
        assert!(second.swept.is_empty());
    }

    #[tokio::test]
    async fn test_notifies_only_on_status_change() {
        let (db, repo) = setup();
        let chat = Arc::new(RecordingChat::default());
        let notifier = Notifier::new(
            db.clone(),
            chat.clone(),
            UrlReverser::new("https://zoo.example.com"),
            Arc::new(KindRegistry::builtin()),
        );
        let checks = CheckSet::new().with_fn("ab", check_ab).with_fn("cd", check_cd);
        let path = Path::new("/tmp");

        let first = run_checks_and_save_results(&db, Some(&notifier), &checks, &repo, path)
            .await
            .unwrap();
        let second = run_checks_and_save_results(&db, Some(&notifier), &checks, &repo, path)
            .await
            .unwrap();

        assert_eq!(first.notifications_sent, 1);
        assert_eq!(second.notifications_sent, 0);
        assert!(second.changes.is_empty());
        assert_eq!(chat.messages().len(), 1);
        assert!(chat.messages()[0].1.contains("a:b"));
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_abort_batch() {
        let (db, repo) = setup();
        let chat = Arc::new(RecordingChat::failing(&["#billing"]));
        let notifier = Notifier::new(
            db.clone(),
            chat,
            UrlReverser::new("https://zoo.example.com"),
            Arc::new(KindRegistry::builtin()),
        );
        let checks = CheckSet::new().with_fn("ab", check_ab).with_fn("cd", check_cd);
        let path = Path::new("/tmp");

        let summary = run_checks_and_save_results(&db, Some(&notifier), &checks, &repo, path)
            .await
            .unwrap();

        assert_eq!(summary.results, 2);
        assert_eq!(summary.notifications_failed, 1);
    }

    #[tokio::test]
    async fn test_key_with_spaces_does_not_abort_batch() {
        let (db, repo) = setup();
        let checks = CheckSet::new()
            .with_fn("spaced", check_spaced_key)
            .with_fn("ab", check_ab);

        let summary = run_checks_and_save_results(&db, None, &checks, &repo, Path::new("/tmp"))
            .await
            .unwrap();

        assert_eq!(summary.results, 2);
        let issues = db.lock_sync().unwrap().list_issues(repo.id, None).unwrap();
        let keys: Vec<_> = issues.iter().map(|i| i.kind_key.as_str()).collect();
        assert_eq!(keys, vec!["license:missing header", "a:b"]);
    }

    #[tokio::test]
    async fn test_invalid_key_aborts_batch_before_sweep() {
        let (db, repo) = setup();
        let cd = CheckSet::new().with_fn("cd", check_cd);
        run_checks_and_save_results(&db, None, &cd, &repo, Path::new("/tmp"))
            .await
            .unwrap();

        let broken = CheckSet::new().with_fn("empty", check_empty_key);
        let result =
            run_checks_and_save_results(&db, None, &broken, &repo, Path::new("/tmp")).await;

        assert!(result.is_err());
        let cd = db.lock_sync().unwrap().find_issue(repo.id, "c:d").unwrap().unwrap();
        assert!(!cd.deleted);
    }

    #[tokio::test]
    async fn test_checks_run_off_the_async_thread() {
        let (db, repo) = setup();
        let ran_on = Arc::new(Mutex::new(None));
        let checks = CheckSet::new().with(ThreadRecorder {
            ran_on: ran_on.clone(),
        });

        run_checks_and_save_results(&db, None, &checks, &repo, Path::new("/tmp"))
            .await
            .unwrap();

        let check_thread = ran_on.lock().unwrap().expect("check did not run");
        assert_ne!(check_thread, std::thread::current().id());
    }
}
