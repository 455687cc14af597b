//! Check execution with per-check failure isolation.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use super::check::{Check, CheckSet};
use super::context::{CheckContext, CheckResult};
use crate::catalog::Repository;

/// Lazy stream of conclusive results from running a check set.
///
/// Checks run one at a time as the stream is pulled. A check that errors or
/// panics is logged as `auditing.check.error` and contributes no results,
/// including any it produced before failing.
pub struct CheckRun<'a> {
    checks: std::slice::Iter<'a, Arc<dyn Check>>,
    repository: &'a Repository,
    path: PathBuf,
    pending: VecDeque<CheckResult>,
    failed: Vec<String>,
}

impl<'a> CheckRun<'a> {
    /// Names of checks that failed so far.
    pub fn failed_checks(&self) -> &[String] {
        &self.failed
    }

    fn run_next_check(&mut self) -> bool {
        let Some(check) = self.checks.next() else {
            return false;
        };
        let context = CheckContext::new(self.repository, &self.path);

        match run_isolated(check.as_ref(), &context) {
            Ok(results) => {
                self.pending
                    .extend(results.into_iter().filter(|r| r.is_found.is_some()));
            }
            Err(e) => {
                tracing::error!(
                    repo_id = self.repository.id,
                    check = check.name(),
                    error = %format!("{:#}", e),
                    "auditing.check.error"
                );
                self.failed.push(check.name().to_string());
            }
        }
        true
    }
}

impl Iterator for CheckRun<'_> {
    type Item = CheckResult;

    fn next(&mut self) -> Option<CheckResult> {
        loop {
            if let Some(result) = self.pending.pop_front() {
                return Some(result);
            }
            if !self.run_next_check() {
                return None;
            }
        }
    }
}

/// Run `checks` against the repository checked out at `path`.
///
/// Results come back in check order, then in the order each check emitted
/// them. Inconclusive results (`is_found == None`) are dropped.
pub fn check_repository<'a>(
    checks: &'a CheckSet,
    repository: &'a Repository,
    path: &Path,
) -> CheckRun<'a> {
    CheckRun {
        checks: checks.as_slice().iter(),
        repository,
        path: path.to_path_buf(),
        pending: VecDeque::new(),
        failed: Vec::new(),
    }
}

fn run_isolated(check: &dyn Check, context: &CheckContext) -> Result<Vec<CheckResult>> {
    match catch_unwind(AssertUnwindSafe(|| {
        check.run(context).and_then(|output| output.collect_results())
    })) {
        Ok(outcome) => outcome,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(anyhow::anyhow!("check panicked: {}", message))
        }
    }
}
