use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::json;
use walkdir::WalkDir;

use crate::auditing::check::CheckOutput;
use crate::auditing::context::CheckContext;
use crate::catalog::Details;

const KEY: &str = "docker:latest_tag";

static FROM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*FROM\s+(?:--\S+\s+)*(\S+)(?:\s+AS\s+(\S+))?").unwrap()
});

const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "vendor", "target"];

/// A `FROM` line whose image is neither tagged nor pinned by digest,
/// or is tagged `latest`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnpinnedImage {
    pub file: String,
    pub line: usize,
    pub image: String,
}

/// `docker:latest_tag` across every Dockerfile in the tree.
/// Inconclusive when there is no Dockerfile at all.
pub fn latest_tag(ctx: &CheckContext) -> Result<CheckOutput> {
    let dockerfiles = find_dockerfiles(&ctx.path);
    if dockerfiles.is_empty() {
        return Ok(ctx.inconclusive(KEY).into());
    }

    let mut offenders = Vec::new();
    for file in &dockerfiles {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let relative = file.strip_prefix(&ctx.path).unwrap_or(file);
        offenders.extend(unpinned_images(&relative.to_string_lossy(), &content));
    }

    if offenders.is_empty() {
        return Ok(ctx.not_found(KEY).into());
    }
    let mut details = Details::new();
    details.insert(
        "images".into(),
        offenders
            .iter()
            .map(|o| json!({"file": o.file, "line": o.line, "image": o.image}))
            .collect(),
    );
    Ok(ctx.found(KEY, details).into())
}

fn find_dockerfiles(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !SKIPPED_DIRS.iter().any(|d| e.file_name() == *d))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_dockerfile(&e.file_name().to_string_lossy()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

fn is_dockerfile(name: &str) -> bool {
    name.starts_with("Dockerfile") || name.ends_with(".dockerfile")
}

/// Scan one Dockerfile for base images that float.
pub fn unpinned_images(file: &str, content: &str) -> Vec<UnpinnedImage> {
    let mut stages = HashSet::new();
    let mut offenders = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let Some(caps) = FROM_REGEX.captures(line) else {
            continue;
        };
        let image = &caps[1];
        let floating = !stages.contains(&image.to_lowercase()) && is_floating(image);
        if let Some(alias) = caps.get(2) {
            stages.insert(alias.as_str().to_lowercase());
        }
        if floating {
            offenders.push(UnpinnedImage {
                file: file.to_string(),
                line: idx + 1,
                image: image.to_string(),
            });
        }
    }
    offenders
}

fn is_floating(image: &str) -> bool {
    if image.eq_ignore_ascii_case("scratch") || image.contains('$') || image.contains('@') {
        return false;
    }
    let name = image.rsplit('/').next().unwrap_or(image);
    match name.split_once(':') {
        Some((_, tag)) => tag == "latest",
        None => true,
    }
}
