//! Auditing: run checks against a repository checkout, fold their results
//! into persisted issues and tell owning teams about status changes.

pub mod batch;
pub mod check;
pub mod checks;
pub mod context;
pub mod kinds;
pub mod notify;
pub mod reconcile;
pub mod runner;
pub mod slack;
pub mod status;
pub mod urls;

pub use batch::{AuditSummary, StatusChange, run_checks_and_save_results};
pub use check::{Check, CheckOutput, CheckSet, FnCheck};
pub use context::{CheckContext, CheckResult};
pub use kinds::{Effort, Kind, KindRegistry, Severity};
pub use notify::{ChatSender, Notifier, NotifyOutcome};
pub use reconcile::save_check_result;
pub use runner::{CheckRun, check_repository};
pub use slack::SlackClient;
pub use status::{IssueStatus, determine_issue_status};
pub use urls::UrlReverser;
