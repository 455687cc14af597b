//! Configuration view and validation commands: `zoo config`.

use anyhow::Result;
use std::path::Path;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    use zoo::config::{CONFIG_FILE, ENV_SLACK_TOKEN, ZOO_DIR, ZooToml};

    let zoo_dir = project_dir.join(ZOO_DIR);
    let config_path = zoo_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Zoo Configuration");
            println!("=================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                ZooToml::load(&config_path)?
            } else {
                println!("No zoo.toml found at {}", config_path.display());
                println!("Using default configuration.");
                ZooToml::default()
            };
            println!();

            println!("[database]");
            println!("  path = \"{}\"", toml.database.path.display());
            println!();
            println!("[slack]");
            println!("  enabled = {}", toml.slack.enabled);
            println!("  timeout_secs = {}", toml.slack.timeout_secs);
            println!();
            println!("[site]");
            println!("  base_url = \"{}\"", toml.site.base_url);
            println!();
            println!("[logging]");
            println!("  format = \"{}\"", toml.logging.format);
            if let Some(filter) = &toml.logging.filter {
                println!("  filter = \"{}\"", filter);
            }
            println!();

            println!("Effective values (with env overrides):");
            println!("  slack api_url = \"{}\"", toml.slack_api_url());
            println!(
                "  slack token = {}",
                if toml.slack_token().is_some() {
                    "set"
                } else {
                    "not set"
                }
            );
            println!("  site base_url = \"{}\"", toml.base_url());
            println!();
            if !config_path.exists() {
                println!("Run 'zoo config init' to create a zoo.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let toml = if config_path.exists() {
                ZooToml::load(&config_path)?
            } else {
                println!("No zoo.toml found. Checking defaults.");
                ZooToml::default()
            };
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("zoo.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !zoo_dir.exists() {
                std::fs::create_dir_all(&zoo_dir)?;
            }

            ZooToml::default().save(&config_path)?;

            println!("Created zoo.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [database] path");
            println!("  - [slack] enabled, api_url, timeout_secs (token via {})", ENV_SLACK_TOKEN);
            println!("  - [site] base_url used in notification links");
            println!("  - [logging] format, filter");
            println!();
        }
    }

    Ok(())
}
