//! Metadata describing each kind of issue a check can report.
//!
//! A `Kind` is keyed by the same `namespace:name` string a check puts in
//! `CheckResult::issue_key`. Titles end up in chat notifications, categories
//! group the audit report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Advice,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::Warning => write!(f, "warning"),
            Severity::Advice => write!(f, "advice"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Effort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effort::Low => write!(f, "low"),
            Effort::Medium => write!(f, "medium"),
            Effort::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kind {
    pub key: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub severity: Severity,
    pub effort: Effort,
}

impl Kind {
    pub fn new(
        key: &str,
        title: &str,
        description: &str,
        category: &str,
        severity: Severity,
        effort: Effort,
    ) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            category: category.to_string(),
            severity,
            effort,
        }
    }

    /// The part of the key before the first `:`.
    pub fn namespace(&self) -> &str {
        namespace_of(&self.key)
    }
}

pub fn namespace_of(key: &str) -> &str {
    key.split_once(':').map(|(ns, _)| ns).unwrap_or(key)
}

/// Lookup table of known kinds.
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    kinds: BTreeMap<String, Kind>,
}

impl KindRegistry {
    pub const UNCATEGORIZED: &'static str = "Uncategorized";

    pub fn new() -> Self {
        Self::default()
    }

    /// Kinds reported by the built-in checks.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Kind::new(
            "missing:readme",
            "Missing README",
            "The repository has no README describing what it is and how to run it.",
            "Repository hygiene",
            Severity::Warning,
            Effort::Low,
        ));
        registry.register(Kind::new(
            "missing:gitignore",
            "Missing .gitignore",
            "Without a .gitignore build artifacts and local files end up committed.",
            "Repository hygiene",
            Severity::Advice,
            Effort::Low,
        ));
        registry.register(Kind::new(
            "missing:license",
            "Missing license",
            "The repository does not declare a license.",
            "Repository hygiene",
            Severity::Advice,
            Effort::Low,
        ));
        registry.register(Kind::new(
            "docker:latest_tag",
            "Unpinned Docker base image",
            "A Dockerfile builds FROM an image without a tag or with the `latest` tag.",
            "Docker",
            Severity::Warning,
            Effort::Low,
        ));
        registry.register(Kind::new(
            "ci:missing_pipeline",
            "Missing CI pipeline",
            "No GitLab CI or GitHub Actions configuration was found.",
            "Continuous integration",
            Severity::Critical,
            Effort::Medium,
        ));
        registry
    }

    pub fn register(&mut self, kind: Kind) {
        self.kinds.insert(kind.key.clone(), kind);
    }

    pub fn get(&self, key: &str) -> Option<&Kind> {
        self.kinds.get(key)
    }

    /// Human-readable title, falling back to the raw key for unknown kinds.
    pub fn title_of<'a>(&'a self, key: &'a str) -> &'a str {
        self.get(key).map(|k| k.title.as_str()).unwrap_or(key)
    }

    pub fn category_of(&self, key: &str) -> &str {
        self.get(key)
            .map(|k| k.category.as_str())
            .unwrap_or(Self::UNCATEGORIZED)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Kind> {
        self.kinds.values()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
