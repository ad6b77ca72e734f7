use std::{fmt, sync::OnceLock};

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::{errors::Error, Result};

/// Discord epoch (2015-01-01T00:00:00Z) in unix milliseconds.
const DISCORD_EPOCH_MS: u64 = 1_420_070_400_000;

fn snowflake_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{17,19}$").expect("static snowflake regex"))
}

/// 17 to 19 ASCII digits.
pub fn is_snowflake(s: &str) -> bool {
    snowflake_re().is_match(s)
}

/// Creation time encoded in a snowflake, if it fits in 64 bits.
pub fn snowflake_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let raw = s.parse::<u64>().ok()?;
    let ms = (raw >> 22) + DISCORD_EPOCH_MS;
    DateTime::<Utc>::from_timestamp_millis(i64::try_from(ms).ok()?)
}

/// Validated channel id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn parse(raw: &str) -> Result<Self> {
        if !is_snowflake(raw) {
            return Err(Error::Config(format!(
                "invalid channel id {raw:?}: expected 17-19 digits"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque message id as returned by the listing endpoint.
///
/// Not validated: the provider is the source of truth, and the id is only
/// echoed back as a delete target or a `before` cursor.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        snowflake_timestamp(&self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
