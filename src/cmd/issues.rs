//! Issue views and overrides: `zoo report`, `zoo wontfix`, `zoo kinds`.

use anyhow::Result;
use zoo::auditing::KindRegistry;
use zoo::catalog::{AuditReport, Issue};
use zoo::config::ZooConfig;
use zoo::errors::AuditError;

use super::open_db;

pub fn cmd_report(config: &ZooConfig, repo_id: i64, json: bool) -> Result<()> {
    let db = open_db(config)?;
    let repository = db
        .get_repository(repo_id)?
        .ok_or(AuditError::RepositoryNotFound { id: repo_id })?;
    let kinds = KindRegistry::builtin();
    let report = db.audit_report(repo_id, &kinds)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!(
        "{} {}/{}",
        console::style("Audit report").bold().cyan(),
        repository.owner,
        repository.name
    );
    println!();

    if report.open_issue_count() == 0 {
        println!("  No open issues.");
        println!();
    }
    for category in &report.categories {
        println!("{}", console::style(&category.name).bold());
        for issue in &category.issues {
            print_issue(issue, &kinds);
        }
        println!();
    }
    if !report.deprecated.is_empty() {
        println!("{}", console::style(AuditReport::DEPRECATED_CATEGORY).bold().dim());
        for issue in &report.deprecated {
            print_issue(issue, &kinds);
        }
        println!();
    }
    Ok(())
}

fn print_issue(issue: &Issue, kinds: &KindRegistry) {
    let severity = kinds
        .get(&issue.kind_key)
        .map(|k| k.severity.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  #{:<5} {:<28} {:<9} {:<9} {}",
        issue.id,
        issue.kind_key,
        issue.status.as_str(),
        severity,
        kinds.title_of(&issue.kind_key)
    );
    if !issue.details.is_empty() {
        println!(
            "         {}",
            console::style(serde_json::Value::Object(issue.details.clone())).dim()
        );
    }
    if let Some(comment) = &issue.comment {
        println!("         {} {}", console::style("Comment:").dim(), comment);
    }
}

pub fn cmd_wontfix(config: &ZooConfig, issue_id: i64, comment: &str) -> Result<()> {
    let db = open_db(config)?;
    let issue = db.mark_wontfix(issue_id, comment)?;
    tracing::info!(
        issue_id = issue.id,
        kind_key = %issue.kind_key,
        "auditing.issue.wontfix"
    );
    println!("Issue #{} ({}) marked as {}", issue.id, issue.kind_key, issue.status);
    Ok(())
}

pub fn cmd_kinds() -> Result<()> {
    let kinds = KindRegistry::builtin();
    println!(
        "{:<24} {:<24} {:<9} {:<7} Title",
        "Key", "Category", "Severity", "Effort"
    );
    for kind in kinds.iter() {
        println!(
            "{:<24} {:<24} {:<9} {:<7} {}",
            kind.key,
            kind.category,
            kind.severity.to_string(),
            kind.effort.to_string(),
            kind.title
        );
    }
    Ok(())
}
