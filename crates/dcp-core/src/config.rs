use std::{env, time::Duration};

use crate::{domain::ChannelId, errors::Error, Result};

/// Messages requested per listing call (provider maximum).
pub const PAGE_SIZE: usize = 100;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
pub const DEFAULT_DELETE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(5);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Typed configuration for one purge run.
#[derive(Clone, Debug)]
pub struct Config {
    pub token: String,
    pub channel: ChannelId,
    pub api_base: String,
    pub http_timeout: Duration,

    // Pacing
    pub delete_delay: Duration,
    pub rate_limit_cooldown: Duration,
    pub fetch_retries: u32,

    pub dry_run: bool,
}

impl Config {
    /// Load from the process environment, honoring `./.env`. Variables
    /// already set win over the file.
    pub fn load(channel: &str) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(channel, |key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Validation happens here, before
    /// anything touches the network.
    pub fn from_lookup(channel: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token = lookup("DISCORD_TOKEN")
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config("DISCORD_TOKEN environment variable is required".to_string())
            })?;

        let channel = ChannelId::parse(channel)?;

        let api_base = lookup("DISCORD_API_BASE")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let delete_delay = match lookup("DELETE_DELAY") {
            Some(raw) => parse_seconds("DELETE_DELAY", &raw)?,
            None => DEFAULT_DELETE_DELAY,
        };
        let rate_limit_cooldown = match lookup("RATE_LIMIT_COOLDOWN") {
            Some(raw) => parse_seconds("RATE_LIMIT_COOLDOWN", &raw)?,
            None => DEFAULT_RATE_LIMIT_COOLDOWN,
        };
        let http_timeout = match lookup("HTTP_TIMEOUT_SECS") {
            Some(raw) => {
                let timeout = parse_seconds("HTTP_TIMEOUT_SECS", &raw)?;
                if timeout.is_zero() {
                    return Err(Error::Config(
                        "HTTP_TIMEOUT_SECS must be greater than zero".to_string(),
                    ));
                }
                timeout
            }
            None => DEFAULT_HTTP_TIMEOUT,
        };
        let fetch_retries = match lookup("FETCH_RETRIES") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                Error::Config(format!("FETCH_RETRIES must be a non-negative integer, got {raw:?}"))
            })?,
            None => 0,
        };

        Ok(Self {
            token,
            channel,
            api_base,
            http_timeout,
            delete_delay,
            rate_limit_cooldown,
            fetch_retries,
            dry_run: false,
        })
    }

    /// Apply a `--delay` style override given in seconds.
    pub fn with_delete_delay_secs(mut self, secs: f64) -> Result<Self> {
        self.delete_delay = seconds_to_duration("--delay", secs)?;
        Ok(self)
    }
}

/// Parse a non-negative, finite number of seconds.
pub fn parse_seconds(key: &str, raw: &str) -> Result<Duration> {
    let secs = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::Config(format!("{key} must be a number of seconds, got {raw:?}")))?;
    seconds_to_duration(key, secs)
}

fn seconds_to_duration(key: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| Error::Config(format!("{key} must be a non-negative duration, got {secs}")))
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.trim().to_string())
    }
}
