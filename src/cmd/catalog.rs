//! Catalog seeding commands: `zoo repo`, `zoo service`.

use anyhow::Result;
use zoo::config::ZooConfig;

use super::super::{RepoCommands, ServiceCommands};
use super::open_db;

pub fn cmd_repo(config: &ZooConfig, command: RepoCommands) -> Result<()> {
    let db = open_db(config)?;

    match command {
        RepoCommands::Add {
            owner,
            name,
            project_type,
            provider,
        } => {
            if project_type != "service" && project_type != "library" {
                anyhow::bail!(
                    "Unknown project type '{}': expected 'service' or 'library'",
                    project_type
                );
            }
            let repo = db.create_repository(&owner, &name, &project_type, &provider)?;
            println!(
                "Added repository {}: {}/{} ({})",
                repo.id, repo.owner, repo.name, repo.project_type
            );
        }
        RepoCommands::List => {
            let repos = db.list_repositories()?;
            if repos.is_empty() {
                println!("No repositories. Run 'zoo repo add <owner> <name>' to add one.");
                return Ok(());
            }
            println!("{:<6} {:<40} {:<10} Provider", "ID", "Repository", "Type");
            for repo in repos {
                println!(
                    "{:<6} {:<40} {:<10} {}",
                    repo.id,
                    format!("{}/{}", repo.owner, repo.name),
                    repo.project_type,
                    repo.provider
                );
            }
        }
    }
    Ok(())
}

pub fn cmd_service(config: &ZooConfig, command: ServiceCommands) -> Result<()> {
    let db = open_db(config)?;

    match command {
        ServiceCommands::Add {
            owner,
            name,
            repo,
            slack_channel,
        } => {
            if let Some(repo_id) = repo
                && db.get_repository(repo_id)?.is_none()
            {
                return Err(zoo::errors::AuditError::RepositoryNotFound { id: repo_id }.into());
            }
            let service = db.create_service(&owner, &name, slack_channel.as_deref(), repo)?;
            println!(
                "Added service {}: {}/{}",
                service.id, service.owner_slug, service.name_slug
            );
        }
        ServiceCommands::List => {
            let services = db.list_services()?;
            if services.is_empty() {
                println!("No services. Run 'zoo service add <owner> <name>' to add one.");
                return Ok(());
            }
            println!("{:<6} {:<40} {:<6} Channel", "ID", "Service", "Repo");
            for service in services {
                println!(
                    "{:<6} {:<40} {:<6} {}",
                    service.id,
                    format!("{}/{}", service.owner_slug, service.name_slug),
                    service
                        .repository_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    service.chat_channel().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}
