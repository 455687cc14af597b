//! CLI command implementations.
//!
//! | Module    | Commands handled                 |
//! |-----------|----------------------------------|
//! | `catalog` | `Repo`, `Service`                |
//! | `audit`   | `Audit`                          |
//! | `issues`  | `Report`, `Wontfix`, `Kinds`     |
//! | `config`  | `Config`                         |

pub mod audit;
pub mod catalog;
pub mod config;
pub mod issues;

pub use audit::cmd_audit;
pub use catalog::{cmd_repo, cmd_service};
pub use config::cmd_config;
pub use issues::{cmd_kinds, cmd_report, cmd_wontfix};

use anyhow::Result;
use zoo::catalog::CatalogDb;
use zoo::config::ZooConfig;

/// Open the catalog database the configuration points at.
fn open_db(config: &ZooConfig) -> Result<CatalogDb> {
    CatalogDb::new(&config.db_path())
}
