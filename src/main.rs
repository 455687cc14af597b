use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "zoo")]
#[command(version, about = "Engineering catalog auditing")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Catalog database. Overrides zoo.toml [database] path.
    #[arg(long, global = true, env = "ZOO_DB_PATH")]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage repositories in the catalog
    Repo {
        #[command(subcommand)]
        command: RepoCommands,
    },
    /// Manage services and their chat channels
    Service {
        #[command(subcommand)]
        command: ServiceCommands,
    },
    /// Run the built-in checks against a checked-out repository
    Audit {
        /// Repository id
        #[arg(long)]
        repo: i64,
        /// Directory holding the repository's source tree
        #[arg(long)]
        path: PathBuf,
        /// Do not send chat notifications
        #[arg(long)]
        no_notify: bool,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show open and deprecated issues of a repository
    Report {
        #[arg(long)]
        repo: i64,
        #[arg(long)]
        json: bool,
    },
    /// Mark an issue as won't fix
    Wontfix {
        issue_id: i64,
        /// Why the issue will not be fixed
        #[arg(short, long)]
        comment: String,
    },
    /// List the issue kinds the built-in checks can report
    Kinds,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum RepoCommands {
    /// Register a repository
    Add {
        owner: String,
        name: String,
        /// `service` or `library`
        #[arg(long, default_value = "service")]
        project_type: String,
        #[arg(long, default_value = "gitlab")]
        provider: String,
    },
    /// List registered repositories
    List,
}

#[derive(Subcommand, Clone)]
pub enum ServiceCommands {
    /// Register a service, optionally backed by a repository
    Add {
        owner: String,
        name: String,
        #[arg(long)]
        repo: Option<i64>,
        /// Chat channel notified about issue status changes
        #[arg(long)]
        slack_channel: Option<String>,
    },
    /// List registered services
    List,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default zoo.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    // `config` must work even when zoo.toml does not parse.
    if let Commands::Config { command } = &cli.command {
        return cmd::cmd_config(&project_dir, command.clone());
    }

    let config =
        zoo::config::ZooConfig::with_cli_args(project_dir, cli.verbose, cli.db_path.clone())?;
    zoo::observability::init_logging(config.toml.logging.format, config.log_filter().as_deref());

    match &cli.command {
        Commands::Repo { command } => cmd::cmd_repo(&config, command.clone())?,
        Commands::Service { command } => cmd::cmd_service(&config, command.clone())?,
        Commands::Audit {
            repo,
            path,
            no_notify,
            json,
        } => cmd::cmd_audit(&config, *repo, path, *no_notify, *json).await?,
        Commands::Report { repo, json } => cmd::cmd_report(&config, *repo, *json)?,
        Commands::Wontfix { issue_id, comment } => cmd::cmd_wontfix(&config, *issue_id, comment)?,
        Commands::Kinds => cmd::cmd_kinds()?,
        Commands::Config { .. } => {}
    }

    Ok(())
}
