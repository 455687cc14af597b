//! Checks that ship with zoo.
//!
//! Each check only reads the checked-out tree under `CheckContext::path`.

pub mod docker;
pub mod files;

use super::check::CheckSet;

/// The default check set run by `zoo audit`, in execution order.
pub fn builtin() -> CheckSet {
    CheckSet::new()
        .with_fn("files::required_files", files::required_files)
        .with_fn("files::ci_pipeline", files::ci_pipeline)
        .with_fn("docker::latest_tag", docker::latest_tag)
}
