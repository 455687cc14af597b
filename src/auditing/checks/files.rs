use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::glob;
use serde_json::json;

use crate::auditing::check::CheckOutput;
use crate::auditing::context::{CheckContext, CheckResult};
use crate::catalog::Details;

/// Files every repository is expected to carry, by issue key.
/// Names are matched case-insensitively on the file stem.
const REQUIRED_FILES: &[(&str, &[&str])] = &[
    ("missing:readme", &["readme"]),
    ("missing:gitignore", &[".gitignore"]),
    ("missing:license", &["license", "licence", "copying"]),
];

/// One result per required file, produced lazily.
pub fn required_files(ctx: &CheckContext) -> Result<CheckOutput> {
    let root = ctx.path.clone();
    if !root.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }
    let ctx = ctx.clone();
    Ok(CheckOutput::lazy(REQUIRED_FILES.iter().map(
        move |(key, stems)| -> Result<CheckResult> {
            if has_top_level_file(&root, stems)? {
                Ok(ctx.not_found(key))
            } else {
                let mut details = Details::new();
                details.insert("expected".into(), json!(stems));
                Ok(ctx.found(key, details))
            }
        },
    )))
}

fn has_top_level_file(root: &Path, stems: &[&str]) -> Result<bool> {
    let entries = std::fs::read_dir(root)
        .with_context(|| format!("Failed to list {}", root.display()))?;
    for entry in entries {
        let entry = entry.context("Failed to read directory entry")?;
        if !entry.path().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        let stem = match name.split_once('.') {
            // dotfiles keep their full name
            Some(("", _)) => name.as_str(),
            Some((stem, _)) => stem,
            None => name.as_str(),
        };
        if stems.contains(&stem) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// `ci:missing_pipeline`: no GitLab CI file and no GitHub Actions workflow.
/// Libraries are not required to have one.
pub fn ci_pipeline(ctx: &CheckContext) -> Result<CheckOutput> {
    const KEY: &str = "ci:missing_pipeline";
    if ctx.project_type == "library" {
        return Ok(ctx.inconclusive(KEY).into());
    }

    let pipelines = pipeline_files(&ctx.path)?;
    if pipelines.is_empty() {
        let mut details = Details::new();
        details.insert(
            "expected".into(),
            json!([".gitlab-ci.yml", ".github/workflows/*.yml"]),
        );
        Ok(ctx.found(KEY, details).into())
    } else {
        Ok(ctx.not_found(KEY).into())
    }
}

fn pipeline_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let gitlab = root.join(".gitlab-ci.yml");
    if gitlab.is_file() {
        found.push(gitlab);
    }
    for ext in ["yml", "yaml"] {
        let pattern = root
            .join(".github/workflows")
            .join(format!("*.{}", ext))
            .to_string_lossy()
            .to_string();
        found.extend(
            glob(&pattern)
                .context("Failed to read glob pattern")?
                .filter_map(|entry| entry.ok()),
        );
    }
    Ok(found)
}
