use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};

use super::models::*;
use crate::auditing::{IssueStatus, KindRegistry};
use crate::errors::AuditError;

/// Longest accepted `kind_key`, matching the column width of the original catalog.
pub const KIND_KEY_MAX_LEN: usize = 100;

/// Async-safe handle to the catalog database.
///
/// Wraps `CatalogDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`. The mutex is also what
/// serializes issue writes coming from concurrent audit batches in one process.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<CatalogDb>>,
}

impl DbHandle {
    pub fn new(db: CatalogDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&CatalogDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| AuditError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    /// Acquire the database mutex synchronously. Used for startup, CLI
    /// commands and tests; never from a hot async path.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, CatalogDb>> {
        self.inner.lock().map_err(|_| AuditError::LockPoisoned.into())
    }
}

pub struct CatalogDb {
    conn: Connection,
}

impl CatalogDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.conn
            .busy_timeout(std::time::Duration::from_secs(5))
            .context("Failed to set busy timeout")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS repositories (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    owner TEXT NOT NULL,
                    name TEXT NOT NULL,
                    project_type TEXT NOT NULL DEFAULT 'service',
                    provider TEXT NOT NULL DEFAULT 'gitlab',
                    remote_id INTEGER,
                    url TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    UNIQUE(owner, name)
                );

                CREATE TABLE IF NOT EXISTS services (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    owner TEXT NOT NULL,
                    name TEXT NOT NULL,
                    owner_slug TEXT NOT NULL,
                    name_slug TEXT NOT NULL,
                    slack_channel TEXT,
                    repository_id INTEGER REFERENCES repositories(id) ON DELETE SET NULL,
                    UNIQUE(owner_slug, name_slug)
                );

                CREATE TABLE IF NOT EXISTS issues (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    repository_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
                    kind_key TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'not_found',
                    details TEXT NOT NULL DEFAULT '{}',
                    last_check TEXT NOT NULL,
                    deleted INTEGER NOT NULL DEFAULT 0,
                    comment TEXT,
                    UNIQUE(repository_id, kind_key)
                );

                CREATE INDEX IF NOT EXISTS idx_services_repository ON services(repository_id);
                CREATE INDEX IF NOT EXISTS idx_issues_repository ON issues(repository_id, deleted);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    /// Run `f` inside one `BEGIN IMMEDIATE` transaction.
    ///
    /// The write lock is taken up front, so a read-modify-write inside `f`
    /// cannot interleave with another connection's. Any error rolls back.
    pub fn atomically<R>(&self, f: impl FnOnce(&Self) -> Result<R>) -> Result<R> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .context("Failed to begin transaction")?;
        let out = f(self)?;
        tx.commit().context("Failed to commit transaction")?;
        Ok(out)
    }

    // ── Repositories ──────────────────────────────────────────────────

    pub fn create_repository(
        &self,
        owner: &str,
        name: &str,
        project_type: &str,
        provider: &str,
    ) -> Result<Repository> {
        self.conn
            .execute(
                "INSERT INTO repositories (owner, name, project_type, provider)
                 VALUES (?1, ?2, ?3, ?4)",
                params![owner, name, project_type, provider],
            )
            .context("Failed to insert repository")?;
        let id = self.conn.last_insert_rowid();
        self.get_repository(id)?
            .context("Repository not found after insert")
    }

    pub fn get_repository(&self, id: i64) -> Result<Option<Repository>> {
        self.conn
            .query_row(
                "SELECT id, owner, name, project_type, provider, remote_id, url, created_at
                 FROM repositories WHERE id = ?1",
                params![id],
                repository_from_row,
            )
            .optional()
            .context("Failed to query repository")
    }

    pub fn list_repositories(&self) -> Result<Vec<Repository>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, owner, name, project_type, provider, remote_id, url, created_at
                 FROM repositories ORDER BY id",
            )
            .context("Failed to prepare list_repositories")?;
        let rows = stmt
            .query_map([], repository_from_row)
            .context("Failed to query repositories")?;
        let mut repositories = Vec::new();
        for row in rows {
            repositories.push(row.context("Failed to read repository row")?);
        }
        Ok(repositories)
    }

    pub fn delete_repository(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM repositories WHERE id = ?1", params![id])
            .context("Failed to delete repository")?;
        Ok(count > 0)
    }

    // ── Services ──────────────────────────────────────────────────────

    pub fn create_service(
        &self,
        owner: &str,
        name: &str,
        slack_channel: Option<&str>,
        repository_id: Option<i64>,
    ) -> Result<Service> {
        self.conn
            .execute(
                "INSERT INTO services
                 (owner, name, owner_slug, name_slug, slack_channel, repository_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    owner,
                    name,
                    slugify(owner),
                    slugify(name),
                    slack_channel,
                    repository_id
                ],
            )
            .context("Failed to insert service")?;
        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                "SELECT id, owner, name, owner_slug, name_slug, slack_channel, repository_id
                 FROM services WHERE id = ?1",
                params![id],
                service_from_row,
            )
            .context("Service not found after insert")
    }

    pub fn list_services(&self) -> Result<Vec<Service>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, owner, name, owner_slug, name_slug, slack_channel, repository_id
                 FROM services ORDER BY id",
            )
            .context("Failed to prepare list_services")?;
        let rows = stmt
            .query_map([], service_from_row)
            .context("Failed to query services")?;
        let mut services = Vec::new();
        for row in rows {
            services.push(row.context("Failed to read service row")?);
        }
        Ok(services)
    }

    /// Services owning a repository. A monorepo may back several services.
    pub fn services_for_repository(&self, repository_id: i64) -> Result<Vec<Service>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, owner, name, owner_slug, name_slug, slack_channel, repository_id
                 FROM services WHERE repository_id = ?1 ORDER BY id",
            )
            .context("Failed to prepare services_for_repository")?;
        let rows = stmt
            .query_map(params![repository_id], service_from_row)
            .context("Failed to query services for repository")?;
        let mut services = Vec::new();
        for row in rows {
            services.push(row.context("Failed to read service row")?);
        }
        Ok(services)
    }

    // ── Issues ────────────────────────────────────────────────────────

    /// Fetch the issue for `(repository_id, kind_key)`, inserting a `not_found`
    /// row when none exists. Returns the issue and whether it was created.
    pub fn get_or_create_issue(&self, repository_id: i64, kind_key: &str) -> Result<(Issue, bool)> {
        validate_kind_key(kind_key)?;
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO issues (repository_id, kind_key, status, details, last_check)
                 VALUES (?1, ?2, ?3, '{}', ?4)",
                params![
                    repository_id,
                    kind_key,
                    IssueStatus::NotFound.as_str(),
                    format_timestamp(&Utc::now())
                ],
            )
            .context("Failed to insert issue")?;
        let issue = self
            .find_issue(repository_id, kind_key)?
            .context("Issue not found after get_or_create")?;
        Ok((issue, inserted > 0))
    }

    pub fn find_issue(&self, repository_id: i64, kind_key: &str) -> Result<Option<Issue>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, repository_id, kind_key, status, details, last_check, deleted, comment
                 FROM issues WHERE repository_id = ?1 AND kind_key = ?2",
                params![repository_id, kind_key],
                issue_row_from_row,
            )
            .optional()
            .context("Failed to query issue")?;
        row.map(IssueRow::into_issue).transpose()
    }

    pub fn get_issue(&self, id: i64) -> Result<Option<Issue>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, repository_id, kind_key, status, details, last_check, deleted, comment
                 FROM issues WHERE id = ?1",
                params![id],
                issue_row_from_row,
            )
            .optional()
            .context("Failed to query issue")?;
        row.map(IssueRow::into_issue).transpose()
    }

    /// Issues of a repository, optionally restricted to one side of the `deleted` flag.
    pub fn list_issues(&self, repository_id: i64, deleted: Option<bool>) -> Result<Vec<Issue>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, repository_id, kind_key, status, details, last_check, deleted, comment
                 FROM issues
                 WHERE repository_id = ?1 AND (?2 IS NULL OR deleted = ?2)
                 ORDER BY kind_key",
            )
            .context("Failed to prepare list_issues")?;
        let rows = stmt
            .query_map(params![repository_id, deleted], issue_row_from_row)
            .context("Failed to query issues")?;
        let mut issues = Vec::new();
        for row in rows {
            let r = row.context("Failed to read issue row")?;
            issues.push(r.into_issue()?);
        }
        Ok(issues)
    }

    /// Validate and write every mutable field of an existing issue.
    pub fn save_issue(&self, issue: &Issue) -> Result<Issue> {
        validate_issue(issue)?;
        let details =
            serde_json::to_string(&issue.details).context("Failed to serialize issue details")?;
        let count = self
            .conn
            .execute(
                "UPDATE issues
                 SET status = ?1, details = ?2, last_check = ?3, deleted = ?4, comment = ?5
                 WHERE id = ?6",
                params![
                    issue.status.as_str(),
                    details,
                    format_timestamp(&issue.last_check),
                    issue.deleted,
                    issue.comment,
                    issue.id
                ],
            )
            .context("Failed to update issue")?;
        if count == 0 {
            return Err(AuditError::IssueNotFound { id: issue.id }.into());
        }
        self.get_issue(issue.id)?
            .context("Issue not found after update")
    }

    /// Soft-delete every live issue of the repository whose key is not in `produced`.
    /// Status is left untouched. Returns the issues that were flagged.
    pub fn sweep_issues(
        &self,
        repository_id: i64,
        produced: &HashSet<String>,
    ) -> Result<Vec<Issue>> {
        self.atomically(|db| {
            let mut swept = Vec::new();
            for mut issue in db.list_issues(repository_id, Some(false))? {
                if produced.contains(&issue.kind_key) {
                    continue;
                }
                issue.deleted = true;
                swept.push(db.save_issue(&issue)?);
            }
            Ok(swept)
        })
    }

    /// Manual override: mark an issue as won't-fix with a reason.
    pub fn mark_wontfix(&self, id: i64, comment: &str) -> Result<Issue> {
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(
                AuditError::validation("comment", "a reason is required for wontfix").into(),
            );
        }
        let mut issue = self
            .get_issue(id)?
            .ok_or(AuditError::IssueNotFound { id })?;
        issue.status = IssueStatus::Wontfix;
        issue.comment = Some(comment.to_string());
        self.save_issue(&issue)
    }

    // ── Report view ───────────────────────────────────────────────────

    /// Open issues grouped by kind category, plus deprecated (swept) issues.
    pub fn audit_report(&self, repository_id: i64, kinds: &KindRegistry) -> Result<AuditReport> {
        let mut grouped: BTreeMap<String, Vec<Issue>> = BTreeMap::new();
        let mut deprecated = Vec::new();

        for issue in self.list_issues(repository_id, None)? {
            if issue.deleted {
                deprecated.push(issue);
            } else if issue.status.is_open() {
                let category = kinds.category_of(&issue.kind_key).to_string();
                grouped.entry(category).or_default().push(issue);
            }
        }

        let categories = grouped
            .into_iter()
            .map(|(name, mut issues)| {
                issues.sort_by(|a, b| a.kind_key.cmp(&b.kind_key));
                ReportCategory { name, issues }
            })
            .collect();

        Ok(AuditReport {
            categories,
            deprecated,
        })
    }
}

// ── Row helpers ───────────────────────────────────────────────────────

fn repository_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Repository> {
    Ok(Repository {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: row.get(2)?,
        project_type: row.get(3)?,
        provider: row.get(4)?,
        remote_id: row.get(5)?,
        url: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn service_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Service> {
    Ok(Service {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: row.get(2)?,
        owner_slug: row.get(3)?,
        name_slug: row.get(4)?,
        slack_channel: row.get(5)?,
        repository_id: row.get(6)?,
    })
}

fn issue_row_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<IssueRow> {
    Ok(IssueRow {
        id: row.get(0)?,
        repository_id: row.get(1)?,
        kind_key: row.get(2)?,
        status: row.get(3)?,
        details: row.get(4)?,
        last_check: row.get(5)?,
        deleted: row.get(6)?,
        comment: row.get(7)?,
    })
}

/// Intermediate row struct for issues.
struct IssueRow {
    id: i64,
    repository_id: i64,
    kind_key: String,
    status: String,
    details: String,
    last_check: String,
    deleted: bool,
    comment: Option<String>,
}

impl IssueRow {
    fn into_issue(self) -> Result<Issue> {
        let status = IssueStatus::from_str(&self.status)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse issue status")?;
        let details: Details =
            serde_json::from_str(&self.details).context("Failed to parse issue details JSON")?;
        let last_check = DateTime::parse_from_rfc3339(&self.last_check)
            .context("Failed to parse issue last_check")?
            .with_timezone(&Utc);

        Ok(Issue {
            id: self.id,
            repository_id: self.repository_id,
            kind_key: self.kind_key,
            status,
            details,
            last_check,
            deleted: self.deleted,
            comment: self.comment,
        })
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn validate_kind_key(kind_key: &str) -> Result<(), AuditError> {
    if kind_key.is_empty() {
        return Err(AuditError::validation("kind_key", "must not be empty"));
    }
    if kind_key.chars().count() > KIND_KEY_MAX_LEN {
        return Err(AuditError::validation(
            "kind_key",
            format!("longer than {} characters", KIND_KEY_MAX_LEN),
        ));
    }
    Ok(())
}

fn validate_issue(issue: &Issue) -> Result<(), AuditError> {
    validate_kind_key(&issue.kind_key)?;
    if !issue.status.is_open() && issue.status != IssueStatus::Wontfix && !issue.details.is_empty()
    {
        return Err(AuditError::validation(
            "details",
            format!("must be empty when status is {}", issue.status),
        ));
    }
    Ok(())
}

/// Lowercase, dash-separated form of a name for use in report URLs.
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn db_with_repo() -> Result<(CatalogDb, Repository)> {
        let db = CatalogDb::new_in_memory()?;
        let repo = db.create_repository("platform", "billing", "service", "gitlab")?;
        Ok((db, repo))
    }

    #[test]
    fn test_create_database_and_run_migrations() -> Result<()> {
        let db = CatalogDb::new_in_memory()?;

        let table_count: i32 = db.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type='table' AND name IN ('repositories', 'services', 'issues')",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(table_count, 3, "Expected 3 tables to exist");

        Ok(())
    }

    #[test]
    fn test_migrations_are_idempotent() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("zoo.db");
        {
            let db = CatalogDb::new(&path)?;
            db.create_repository("a", "b", "service", "gitlab")?;
        }
        let db = CatalogDb::new(&path)?;
        assert_eq!(db.list_repositories()?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_create_and_get_repository() -> Result<()> {
        let (db, repo) = db_with_repo()?;
        assert!(repo.id > 0);
        assert_eq!(repo.owner, "platform");
        assert_eq!(repo.project_type, "service");

        let fetched = db.get_repository(repo.id)?.expect("repository should exist");
        assert_eq!(fetched, repo);
        assert!(db.get_repository(9999)?.is_none());
        Ok(())
    }

    #[test]
    fn test_services_for_repository_supports_monorepos() -> Result<()> {
        let (db, repo) = db_with_repo()?;
        let other = db.create_repository("platform", "auth", "service", "gitlab")?;

        db.create_service("Platform", "Billing API", Some("#billing"), Some(repo.id))?;
        db.create_service("Platform", "Billing Worker", None, Some(repo.id))?;
        db.create_service("Platform", "Auth", Some("#auth"), Some(other.id))?;

        let services = db.services_for_repository(repo.id)?;
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].name_slug, "billing-api");
        assert_eq!(services[0].owner_slug, "platform");
        assert_eq!(services[1].slack_channel, None);
        assert!(db.services_for_repository(9999)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_get_or_create_issue_never_duplicates() -> Result<()> {
        let (db, repo) = db_with_repo()?;

        let (first, created) = db.get_or_create_issue(repo.id, "missing:readme")?;
        assert!(created);
        assert_eq!(first.status, IssueStatus::NotFound);
        assert!(first.details.is_empty());

        let (second, created) = db.get_or_create_issue(repo.id, "missing:readme")?;
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(db.list_issues(repo.id, None)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_get_or_create_issue_rejects_invalid_key() -> Result<()> {
        let (db, repo) = db_with_repo()?;
        let err = db.get_or_create_issue(repo.id, "").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AuditError>(),
            Some(AuditError::Validation { .. })
        ));
        let long = "x".repeat(KIND_KEY_MAX_LEN + 1);
        assert!(db.get_or_create_issue(repo.id, &long).is_err());
        Ok(())
    }

    #[test]
    fn test_get_or_create_issue_accepts_free_form_keys() -> Result<()> {
        let (db, repo) = db_with_repo()?;
        let (issue, created) = db.get_or_create_issue(repo.id, "license:missing header")?;
        assert!(created);
        assert_eq!(issue.kind_key, "license:missing header");
        let at_limit = "é".repeat(KIND_KEY_MAX_LEN);
        assert!(db.get_or_create_issue(repo.id, &at_limit).is_ok());
        Ok(())
    }

    #[test]
    fn test_save_issue_roundtrips_details() -> Result<()> {
        let (db, repo) = db_with_repo()?;
        let (mut issue, _) = db.get_or_create_issue(repo.id, "docker:latest_tag")?;
        issue.status = IssueStatus::New;
        issue.details = json!({"files": ["Dockerfile"], "count": 1})
            .as_object()
            .cloned()
            .unwrap();

        let saved = db.save_issue(&issue)?;
        assert_eq!(saved.status, IssueStatus::New);
        assert_eq!(saved.details["count"], json!(1));
        Ok(())
    }

    #[test]
    fn test_save_issue_rejects_details_on_fixed_issue() -> Result<()> {
        let (db, repo) = db_with_repo()?;
        let (mut issue, _) = db.get_or_create_issue(repo.id, "missing:readme")?;
        issue.status = IssueStatus::Fixed;
        issue.details.insert("stale".into(), json!(true));

        let err = db.save_issue(&issue).unwrap_err();
        assert!(err.to_string().contains("details"));
        Ok(())
    }

    #[test]
    fn test_list_issues_filters_deleted() -> Result<()> {
        let (db, repo) = db_with_repo()?;
        db.get_or_create_issue(repo.id, "a:one")?;
        let (mut gone, _) = db.get_or_create_issue(repo.id, "a:two")?;
        gone.deleted = true;
        db.save_issue(&gone)?;

        assert_eq!(db.list_issues(repo.id, None)?.len(), 2);
        let live = db.list_issues(repo.id, Some(false))?;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].kind_key, "a:one");
        let deleted = db.list_issues(repo.id, Some(true))?;
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].kind_key, "a:two");
        Ok(())
    }

    #[test]
    fn test_sweep_flags_only_unproduced_keys() -> Result<()> {
        let (db, repo) = db_with_repo()?;
        let (mut kept, _) = db.get_or_create_issue(repo.id, "a:kept")?;
        kept.status = IssueStatus::New;
        db.save_issue(&kept)?;
        let (mut retired, _) = db.get_or_create_issue(repo.id, "a:retired")?;
        retired.status = IssueStatus::Reopened;
        db.save_issue(&retired)?;

        let produced: HashSet<String> = ["a:kept".to_string()].into_iter().collect();
        let swept = db.sweep_issues(repo.id, &produced)?;

        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].kind_key, "a:retired");
        assert!(swept[0].deleted);
        assert_eq!(swept[0].status, IssueStatus::Reopened);
        assert!(!db.find_issue(repo.id, "a:kept")?.unwrap().deleted);

        // Already-deleted issues are not swept twice.
        assert!(db.sweep_issues(repo.id, &produced)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_mark_wontfix_requires_comment() -> Result<()> {
        let (db, repo) = db_with_repo()?;
        let (issue, _) = db.get_or_create_issue(repo.id, "missing:license")?;

        assert!(db.mark_wontfix(issue.id, "   ").is_err());

        let updated = db.mark_wontfix(issue.id, "internal tool, no license needed")?;
        assert_eq!(updated.status, IssueStatus::Wontfix);
        assert_eq!(
            updated.comment.as_deref(),
            Some("internal tool, no license needed")
        );

        let err = db.mark_wontfix(4242, "nope").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AuditError>(),
            Some(AuditError::IssueNotFound { id: 4242 })
        ));
        Ok(())
    }

    #[test]
    fn test_delete_repository_cascades_to_issues() -> Result<()> {
        let (db, repo) = db_with_repo()?;
        let (issue, _) = db.get_or_create_issue(repo.id, "missing:readme")?;

        assert!(db.delete_repository(repo.id)?);
        assert!(db.get_issue(issue.id)?.is_none());
        Ok(())
    }

    #[test]
    fn test_atomically_rolls_back_on_error() -> Result<()> {
        let (db, repo) = db_with_repo()?;
        let result: Result<()> = db.atomically(|db| {
            db.get_or_create_issue(repo.id, "a:rolled_back")?;
            anyhow::bail!("abort");
        });
        assert!(result.is_err());
        assert!(db.find_issue(repo.id, "a:rolled_back")?.is_none());
        Ok(())
    }

    #[test]
    fn test_audit_report_groups_open_and_deprecated() -> Result<()> {
        let (db, repo) = db_with_repo()?;
        let kinds = KindRegistry::builtin();

        for (key, status, deleted) in [
            ("missing:readme", IssueStatus::New, false),
            ("missing:gitignore", IssueStatus::Reopened, false),
            ("docker:latest_tag", IssueStatus::New, false),
            ("ci:missing_pipeline", IssueStatus::Fixed, false),
            ("missing:license", IssueStatus::Wontfix, false),
            ("legacy:removed", IssueStatus::New, true),
        ] {
            let (mut issue, _) = db.get_or_create_issue(repo.id, key)?;
            issue.status = status;
            issue.deleted = deleted;
            db.save_issue(&issue)?;
        }

        let report = db.audit_report(repo.id, &kinds)?;
        let names: Vec<_> = report.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Docker", "Repository hygiene"]);
        let hygiene: Vec<_> = report.categories[1]
            .issues
            .iter()
            .map(|i| i.kind_key.as_str())
            .collect();
        assert_eq!(hygiene, vec!["missing:gitignore", "missing:readme"]);
        assert_eq!(report.open_issue_count(), 3);
        assert_eq!(report.deprecated.len(), 1);
        assert_eq!(report.deprecated[0].kind_key, "legacy:removed");
        Ok(())
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Billing API"), "billing-api");
        assert_eq!(slugify("  Team / Payments  "), "team-payments");
        assert_eq!(slugify("already-slugged"), "already-slugged");
    }

    #[tokio::test]
    async fn test_db_handle_call_runs_on_blocking_pool() -> Result<()> {
        let handle = DbHandle::new(CatalogDb::new_in_memory()?);
        let repo = handle
            .call(|db| db.create_repository("o", "n", "library", "github"))
            .await?;
        let fetched = handle.call(move |db| db.get_repository(repo.id)).await?;
        assert_eq!(fetched.map(|r| r.project_type), Some("library".to_string()));
        Ok(())
    }
}
