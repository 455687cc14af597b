//! The contract every audit check satisfies.
//!
//! A check inspects a checked-out repository through a [`CheckContext`] and
//! reports one result, several results, or a lazily produced sequence of
//! results. Any `Err` (or panic) only affects that check; the runner logs it
//! and moves on.

use std::sync::Arc;

use anyhow::Result;

use super::context::{CheckContext, CheckResult};

/// What a check hands back to the runner.
pub enum CheckOutput {
    Single(CheckResult),
    Many(Vec<CheckResult>),
    /// Finite, consumed exactly once. Items may fail individually, and an
    /// `Err` item fails the whole check.
    Lazy(Box<dyn Iterator<Item = Result<CheckResult>> + Send>),
}

impl CheckOutput {
    pub fn lazy<I>(iter: I) -> Self
    where
        I: Iterator<Item = Result<CheckResult>> + Send + 'static,
    {
        Self::Lazy(Box::new(iter))
    }

    /// Drain the output, stopping at the first failing item.
    pub fn collect_results(self) -> Result<Vec<CheckResult>> {
        match self {
            Self::Single(result) => Ok(vec![result]),
            Self::Many(results) => Ok(results),
            Self::Lazy(iter) => iter.collect(),
        }
    }
}

impl From<CheckResult> for CheckOutput {
    fn from(result: CheckResult) -> Self {
        Self::Single(result)
    }
}

impl From<Vec<CheckResult>> for CheckOutput {
    fn from(results: Vec<CheckResult>) -> Self {
        Self::Many(results)
    }
}

/// A unit of analysis run against a repository's source tree.
pub trait Check: Send + Sync {
    /// Stable identifier used in logs, e.g. `files::required_files`.
    fn name(&self) -> &str;

    fn run(&self, context: &CheckContext) -> Result<CheckOutput>;
}

/// Adapts a plain function into a [`Check`].
pub struct FnCheck {
    name: String,
    func: fn(&CheckContext) -> Result<CheckOutput>,
}

impl FnCheck {
    pub fn new(name: &str, func: fn(&CheckContext) -> Result<CheckOutput>) -> Self {
        Self {
            name: name.to_string(),
            func,
        }
    }
}

impl Check for FnCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, context: &CheckContext) -> Result<CheckOutput> {
        (self.func)(context)
    }
}

/// Ordered collection of checks to run in one audit batch.
///
/// Always passed in explicitly by the caller; there is no process-wide list.
#[derive(Clone, Default)]
pub struct CheckSet {
    checks: Vec<Arc<dyn Check>>,
}

impl CheckSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, check: impl Check + 'static) -> Self {
        self.push(check);
        self
    }

    pub fn with_fn(self, name: &str, func: fn(&CheckContext) -> Result<CheckOutput>) -> Self {
        self.with(FnCheck::new(name, func))
    }

    pub fn push(&mut self, check: impl Check + 'static) {
        self.checks.push(Arc::new(check));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Check>> {
        self.checks.iter()
    }

    pub fn as_slice(&self) -> &[Arc<dyn Check>] {
        &self.checks
    }

    pub fn names(&self) -> Vec<&str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}
