//! Catalog persistence: repositories, the services they back and the issues
//! audits have recorded against them.

pub mod db;
pub mod models;

pub use db::{CatalogDb, DbHandle, slugify};
pub use models::*;
