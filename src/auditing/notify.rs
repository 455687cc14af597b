//! Chat fan-out when an issue changes status.
//!
//! Every service backed by the issue's repository gets its own message in its
//! own channel. Sends are independent: one failing channel is logged and the
//! rest still go out. Nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use super::kinds::KindRegistry;
use super::urls::UrlReverser;
use crate::catalog::{DbHandle, Issue, Repository, Service};
use crate::errors::{AuditError, ChatError};

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers one plain-text message to one chat channel.
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send(&self, channel: &str, text: &str) -> Result<(), ChatError>;
}

/// How a fan-out went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyOutcome {
    pub sent: usize,
    pub failed: usize,
}

pub struct Notifier {
    db: DbHandle,
    chat: Arc<dyn ChatSender>,
    urls: UrlReverser,
    kinds: Arc<KindRegistry>,
    timeout: Duration,
}

impl Notifier {
    pub fn new(
        db: DbHandle,
        chat: Arc<dyn ChatSender>,
        urls: UrlReverser,
        kinds: Arc<KindRegistry>,
    ) -> Self {
        Self {
            db,
            chat,
            urls,
            kinds,
            timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Tell every owning team that `issue` moved to its current status.
    ///
    /// Owners are looked up now, not when the issue was created. Errors only
    /// come from loading the catalog; delivery failures are counted in the
    /// outcome.
    pub async fn notify_status_change(&self, issue: &Issue) -> Result<NotifyOutcome> {
        let repository_id = issue.repository_id;
        let (repository, services) = self
            .db
            .call(move |db| {
                let repository = db
                    .get_repository(repository_id)?
                    .ok_or(AuditError::RepositoryNotFound { id: repository_id })?;
                let services = db.services_for_repository(repository_id)?;
                Ok((repository, services))
            })
            .await?;

        let mut outcome = NotifyOutcome::default();
        for service in &services {
            let Some(channel) = service.chat_channel() else {
                continue;
            };
            match self.notify_service(issue, &repository, service, channel).await {
                Ok(()) => outcome.sent += 1,
                Err(e) => {
                    tracing::error!(
                        repo_id = repository.id,
                        service = %service.name,
                        channel,
                        error = %e,
                        "auditing.update_issue.slack_error"
                    );
                    outcome.failed += 1;
                }
            }
        }
        Ok(outcome)
    }

    async fn notify_service(
        &self,
        issue: &Issue,
        repository: &Repository,
        service: &Service,
        channel: &str,
    ) -> Result<(), ChatError> {
        let url = self
            .urls
            .audit_report_url(service)
            .map_err(|e| ChatError::NotConfigured(e.to_string()))?;
        let text = self.message_text(issue, repository, &url);

        match tokio::time::timeout(self.timeout, self.chat.send(channel, &text)).await {
            Ok(result) => result,
            Err(_) => Err(ChatError::Timeout {
                secs: self.timeout.as_secs(),
            }),
        }
    }

    pub fn message_text(&self, issue: &Issue, repository: &Repository, report_url: &str) -> String {
        format!(
            "Issue *{}* in repository *{}/{}* is now `{}`. Audit report: {}",
            self.kinds.title_of(&issue.kind_key),
            repository.owner,
            repository.name,
            issue.status,
            report_url
        )
    }
}
