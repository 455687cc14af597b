//! Audit command: `zoo audit`.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::Instrument;
use zoo::auditing::{
    AuditSummary, KindRegistry, Notifier, SlackClient, UrlReverser, checks,
    run_checks_and_save_results,
};
use zoo::catalog::DbHandle;
use zoo::config::ZooConfig;
use zoo::errors::AuditError;
use zoo::observability::audit_span;

use super::open_db;

pub async fn cmd_audit(
    config: &ZooConfig,
    repo_id: i64,
    path: &Path,
    no_notify: bool,
    json: bool,
) -> Result<()> {
    if !path.is_dir() {
        return Err(AuditError::MissingPath {
            path: path.to_path_buf(),
        }
        .into());
    }

    let db = DbHandle::new(open_db(config)?);
    let repository = db
        .call(move |db| {
            db.get_repository(repo_id)?
                .ok_or_else(|| AuditError::RepositoryNotFound { id: repo_id }.into())
        })
        .await?;

    let notifier = if no_notify {
        None
    } else {
        build_notifier(config, &db)
    };

    let checks = checks::builtin();
    let summary = run_checks_and_save_results(&db, notifier.as_ref(), &checks, &repository, path)
        .instrument(audit_span(repository.id, &repository.owner, &repository.name))
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&format!("{}/{}", repository.owner, repository.name), &summary);
    }
    Ok(())
}

/// A notifier when Slack is enabled and has a token, otherwise `None`.
fn build_notifier(config: &ZooConfig, db: &DbHandle) -> Option<Notifier> {
    if !config.toml.slack.enabled {
        return None;
    }
    let Some(token) = config.toml.slack_token() else {
        tracing::warn!("Slack is enabled but no token is configured; notifications are off");
        return None;
    };
    let client = match SlackClient::new(&config.toml.slack_api_url(), &token) {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "Slack client unavailable; notifications are off");
            return None;
        }
    };
    Some(
        Notifier::new(
            db.clone(),
            Arc::new(client),
            UrlReverser::new(&config.toml.base_url()),
            Arc::new(KindRegistry::builtin()),
        )
        .with_timeout(config.toml.slack_timeout()),
    )
}

fn print_summary(repository: &str, summary: &AuditSummary) {
    println!();
    println!(
        "{} {}",
        console::style("Audited").bold().cyan(),
        console::style(repository).bold()
    );
    println!("  Results reconciled: {}", summary.results);

    if summary.changes.is_empty() {
        println!("  No status changes.");
    } else {
        println!("  Status changes:");
        for change in &summary.changes {
            println!(
                "    {:<28} {} -> {}",
                change.kind_key,
                console::style(change.from).dim(),
                change.to
            );
        }
    }
    if !summary.swept.is_empty() {
        println!(
            "  {} {}",
            console::style("Deprecated:").yellow(),
            summary.swept.join(", ")
        );
    }
    if !summary.failed_checks.is_empty() {
        println!(
            "  {} {}",
            console::style("Failed checks:").red().bold(),
            summary.failed_checks.join(", ")
        );
    }
    if summary.notifications_sent + summary.notifications_failed > 0 {
        println!(
            "  Notifications: {} sent, {} failed",
            summary.notifications_sent, summary.notifications_failed
        );
    }
    println!();
}
