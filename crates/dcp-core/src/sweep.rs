//! Paginated bulk deletion of one channel's history.
//!
//! One request in flight at a time. The provider's per-channel delete limit
//! is the ceiling, so the loop paces itself with a fixed delay after every
//! delete and gives rate-limited deletes a single retry after a cooldown.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    config::{Config, PAGE_SIZE},
    domain::{ChannelId, MessageId},
    ports::{ChannelApi, DeleteStatus, Sleeper},
    retry::RetryPolicy,
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct SweepSettings {
    pub page_size: usize,
    /// Paid after every delete attempt, whatever the outcome.
    pub delete_delay: Duration,
    pub rate_limit_cooldown: Duration,
    /// Extra attempts for a listing call that got no response at all.
    pub fetch_retries: u32,
    pub dry_run: bool,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            delete_delay: crate::config::DEFAULT_DELETE_DELAY,
            rate_limit_cooldown: crate::config::DEFAULT_RATE_LIMIT_COOLDOWN,
            fetch_retries: 0,
            dry_run: false,
        }
    }
}

impl From<&Config> for SweepSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            page_size: PAGE_SIZE,
            delete_delay: cfg.delete_delay,
            rate_limit_cooldown: cfg.rate_limit_cooldown,
            fetch_retries: cfg.fetch_retries,
            dry_run: cfg.dry_run,
        }
    }
}

/// Aggregate counts of one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// In a dry run: messages that would have been deleted.
    pub deleted: u64,
    pub failed: u64,
    /// Non-empty pages processed.
    pub batches: u64,
    /// Listing calls issued, retries excluded.
    pub fetches: u64,
    pub cancelled: bool,
    pub dry_run: bool,
}

impl SweepReport {
    /// The very first page came back empty.
    pub fn nothing_to_delete(&self) -> bool {
        self.batches == 0 && !self.cancelled
    }
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nothing_to_delete() {
            return writeln!(f, "Nothing to delete.");
        }

        let deleted_label = if self.dry_run {
            "Would delete"
        } else {
            "Deleted"
        };
        let status = if self.cancelled {
            "cancelled"
        } else {
            "complete"
        };

        writeln!(f, "Purge {status}")?;
        writeln!(f, "  {:<14}{:>8}", deleted_label, self.deleted)?;
        writeln!(f, "  {:<14}{:>8}", "Failed", self.failed)?;
        writeln!(f, "  {:<14}{:>8}", "Batches", self.batches)
    }
}

/// Bulk deletion driver.
pub struct Sweeper {
    api: Arc<dyn ChannelApi>,
    sleeper: Arc<dyn Sleeper>,
    settings: SweepSettings,
    cancel: CancellationToken,
}

impl Sweeper {
    pub fn new(
        api: Arc<dyn ChannelApi>,
        sleeper: Arc<dyn Sleeper>,
        settings: SweepSettings,
    ) -> Self {
        Self {
            api,
            sleeper,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop between messages once `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Validate a raw channel id, then sweep it. Nothing is sent when the id
    /// is malformed.
    pub async fn sweep(&self, channel: &str) -> Result<SweepReport> {
        let channel = ChannelId::parse(channel)?;
        self.run(&channel).await
    }

    /// Delete every message in `channel`.
    ///
    /// Returns `Err` only when a listing call fails; per-message failures are
    /// counted in the report.
    pub async fn run(&self, channel: &ChannelId) -> Result<SweepReport> {
        let SweepSettings {
            page_size,
            delete_delay,
            rate_limit_cooldown,
            fetch_retries,
            dry_run,
        } = self.settings;

        let mut report = SweepReport {
            dry_run,
            ..SweepReport::default()
        };
        let mut before: Option<MessageId> = None;

        let sleeper = CancellableSleeper {
            inner: self.sleeper.as_ref(),
            cancel: &self.cancel,
        };
        let fetch_policy = RetryPolicy::new(fetch_retries.saturating_add(1), rate_limit_cooldown);
        let delete_policy = RetryPolicy::rate_limited_delete(rate_limit_cooldown);
        let api = self.api.as_ref();
        let cancel = &self.cancel;

        tracing::info!(%channel, dry_run, "starting purge");

        'pages: loop {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let batch = report.batches + 1;
            report.fetches += 1;
            let cursor = before.as_ref();
            tracing::debug!(batch, before = ?cursor.map(MessageId::as_str), "fetching page");

            let page = fetch_policy
                .run_unless(
                    &sleeper,
                    || cancel.is_cancelled(),
                    |res: &Result<Vec<MessageId>>| {
                        let retry = matches!(res, Err(e) if e.is_transport());
                        if retry {
                            tracing::warn!(batch, "listing request failed, retrying");
                        }
                        retry
                    },
                    move || api.list_messages(channel, cursor, page_size),
                )
                .await
                .map_err(|e| {
                    tracing::error!(batch, error = %e, "fetching messages failed, aborting");
                    e
                })?;

            if page.is_empty() {
                if report.batches == 0 {
                    tracing::info!(%channel, "nothing to delete");
                } else {
                    tracing::info!(%channel, "no more messages");
                }
                break;
            }

            report.batches = batch;
            let page_len = page.len();
            tracing::info!(batch, messages = page_len, "processing batch");

            let mut last: Option<MessageId> = None;
            for (idx, msg) in page.into_iter().enumerate() {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break 'pages;
                }

                let created = msg.created_at().map(|t| t.to_rfc3339());
                if dry_run {
                    report.deleted += 1;
                    tracing::info!(
                        batch,
                        n = idx + 1,
                        of = page_len,
                        message = %msg,
                        created = created.as_deref().unwrap_or("?"),
                        "would delete"
                    );
                    last = Some(msg);
                    continue;
                }

                let target = &msg;
                let outcome = delete_policy
                    .run_unless(
                        &sleeper,
                        || cancel.is_cancelled(),
                        |res: &Result<DeleteStatus>| matches!(res, Ok(s) if s.is_rate_limited()),
                        move || async move {
                            let res = api.delete_message(channel, target).await;
                            if let Ok(DeleteStatus::RateLimited { retry_after }) = &res {
                                tracing::warn!(
                                    message = %target,
                                    retry_after_ms = retry_after.map(|d| d.as_millis() as u64),
                                    cooldown_ms = rate_limit_cooldown.as_millis() as u64,
                                    "rate limited"
                                );
                            }
                            res
                        },
                    )
                    .await;

                match outcome {
                    Ok(DeleteStatus::Deleted) => {
                        report.deleted += 1;
                        tracing::info!(
                            batch,
                            n = idx + 1,
                            of = page_len,
                            message = %msg,
                            created = created.as_deref().unwrap_or("?"),
                            "deleted"
                        );
                    }
                    Ok(DeleteStatus::RateLimited { .. }) => {
                        report.failed += 1;
                        tracing::warn!(message = %msg, "still rate limited after retry");
                    }
                    Ok(DeleteStatus::Failed { status }) => {
                        report.failed += 1;
                        tracing::warn!(message = %msg, status, "delete failed");
                    }
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(message = %msg, error = %e, "delete request failed");
                    }
                }

                sleeper.sleep(delete_delay).await;
                last = Some(msg);
            }

            if page_len < page_size {
                break;
            }
            before = last;
        }

        tracing::info!(
            deleted = report.deleted,
            failed = report.failed,
            batches = report.batches,
            cancelled = report.cancelled,
            "purge finished"
        );
        Ok(report)
    }
}

/// Sleeps that end early once the sweep is cancelled.
struct CancellableSleeper<'a> {
    inner: &'a dyn Sleeper,
    cancel: &'a CancellationToken,
}

#[async_trait]
impl<'a> Sleeper for CancellableSleeper<'a> {
    async fn sleep(&self, duration: Duration) {
        tokio::select! {
            _ = self.inner.sleep(duration) => {}
            _ = self.cancel.cancelled() => {}
        }
    }
}
