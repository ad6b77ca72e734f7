use std::time::Duration;

use async_trait::async_trait;

use crate::{
    domain::{ChannelId, MessageId},
    Result,
};

/// Outcome of a single delete call.
///
/// Non-success statuses are values, not errors: the sweep keeps going.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteStatus {
    /// 204 No Content.
    Deleted,
    /// 429 Too Many Requests.
    RateLimited { retry_after: Option<Duration> },
    /// Any other status.
    Failed { status: u16 },
}

impl DeleteStatus {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, DeleteStatus::RateLimited { .. })
    }
}

/// Hexagonal port for the provider's channel message endpoints.
#[async_trait]
pub trait ChannelApi: Send + Sync {
    /// Up to `limit` most recent messages, newest first, strictly older than
    /// `before` when given.
    async fn list_messages(
        &self,
        channel: &ChannelId,
        before: Option<&MessageId>,
        limit: usize,
    ) -> Result<Vec<MessageId>>;

    /// `Err` only when no HTTP response was obtained.
    async fn delete_message(&self, channel: &ChannelId, message: &MessageId)
        -> Result<DeleteStatus>;
}

/// Blocking pause on the sweep task. Behind a trait so tests can record
/// pauses instead of waiting them out.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if duration > Duration::ZERO {
            tokio::time::sleep(duration).await;
        }
    }
}
