//! Discord adapter (REST v10).
//!
//! Implements the `dcp-core` ChannelApi port with plain `reqwest` calls. Only
//! the two endpoints the purge needs are covered.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use dcp_core::{
    config::Config,
    domain::{ChannelId, MessageId},
    errors::Error,
    ports::{ChannelApi, DeleteStatus},
    Result,
};

const USER_AGENT: &str = concat!("DiscordBot (dcp, ", env!("CARGO_PKG_VERSION"), ")");
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Clone, Debug)]
pub struct DiscordClient {
    api_base: String,
    authorization: String,
    http: reqwest::Client,
}

impl DiscordClient {
    pub fn new(api_base: impl Into<String>, token: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            authorization: authorization_header(token),
            http,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(cfg.api_base.clone(), &cfg.token, cfg.http_timeout)
    }

    fn messages_url(&self, channel: &ChannelId) -> String {
        format!("{}/channels/{}/messages", self.api_base, channel)
    }

    fn message_url(&self, channel: &ChannelId, message: &MessageId) -> String {
        format!("{}/{}", self.messages_url(channel), message)
    }
}

#[async_trait]
impl ChannelApi for DiscordClient {
    async fn list_messages(
        &self,
        channel: &ChannelId,
        before: Option<&MessageId>,
        limit: usize,
    ) -> Result<Vec<MessageId>> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(id) = before {
            query.push(("before", id.to_string()));
        }

        let resp = self
            .http
            .get(self.messages_url(channel))
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .query(&query)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("discord list request error: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Transport(format!("discord list body error: {e}")))?;

        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        parse_message_page(&body)
    }

    async fn delete_message(
        &self,
        channel: &ChannelId,
        message: &MessageId,
    ) -> Result<DeleteStatus> {
        let resp = self
            .http
            .delete(self.message_url(channel, message))
            .header(reqwest::header::AUTHORIZATION, &self.authorization)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("discord delete request error: {e}")))?;

        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);

        let status = classify_delete(resp.status().as_u16(), retry_after);
        if let DeleteStatus::Failed { status: code } = status {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(
                status = code,
                body = %body.chars().take(ERROR_BODY_LIMIT).collect::<String>(),
                "delete rejected"
            );
        }
        Ok(status)
    }
}

/// Raw tokens are bot tokens; values that already name a scheme pass through.
pub fn authorization_header(token: &str) -> String {
    let token = token.trim();
    if token.starts_with("Bot ") || token.starts_with("Bearer ") {
        token.to_string()
    } else {
        format!("Bot {token}")
    }
}

#[derive(Deserialize)]
struct MessageStub {
    id: String,
}

/// Parse a listing body: a JSON array of message objects. Only `id` is read.
pub fn parse_message_page(body: &str) -> Result<Vec<MessageId>> {
    let stubs: Vec<MessageStub> = serde_json::from_str(body).map_err(|e| {
        Error::MalformedResponse(format!(
            "expected a JSON array of messages ({e}): {}",
            body.chars().take(ERROR_BODY_LIMIT).collect::<String>()
        ))
    })?;
    Ok(stubs.into_iter().map(|m| MessageId(m.id)).collect())
}

pub fn classify_delete(status: u16, retry_after: Option<Duration>) -> DeleteStatus {
    match status {
        200..=299 => DeleteStatus::Deleted,
        429 => DeleteStatus::RateLimited { retry_after },
        other => DeleteStatus::Failed { status: other },
    }
}

/// `Retry-After` in (possibly fractional) seconds.
fn parse_retry_after(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
}
