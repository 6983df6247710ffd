use bytes::Bytes;
use std::str;
use tokio::time::{Duration, Instant};

use crate::commands::executable::{Context, Executable};
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::Error;

/// Set `key` to hold the string `value`. If `key` already holds a value, it is overwritten, and
/// any previous expiration is discarded. `PX milliseconds` sets the key to expire after the
/// given time.
///
/// Ref: <https://redis.io/docs/latest/commands/set/>
#[derive(Debug, PartialEq)]
pub struct Set {
    pub key: String,
    pub value: Bytes,
    pub expires_at: Option<Instant>,
}

impl Executable for Set {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        ctx.store.set(self.key, self.value, self.expires_at);

        Ok(Frame::Simple("OK".to_string()))
    }
}

impl TryFrom<&mut CommandParser> for Set {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let value = parser.next_bytes()?;

        let Some(option) = parser.next_optional() else {
            return Ok(Self {
                key,
                value,
                expires_at: None,
            });
        };

        if !option.eq_ignore_ascii_case(b"PX") {
            return Err(invalid_option(&option));
        }

        let Some(millis) = parser.next_optional() else {
            return Err(invalid_option(&option));
        };

        let invalid_expiry = || CommandParserError::InvalidExpiry {
            value: String::from_utf8_lossy(&millis).into_owned(),
        };

        let millis = str::from_utf8(&millis)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(invalid_expiry)?;

        let expires_at = parser
            .now()
            .checked_add(Duration::from_millis(millis))
            .ok_or_else(invalid_expiry)?;

        if let Some(extra) = parser.next_optional() {
            return Err(invalid_option(&extra));
        }

        Ok(Self {
            key,
            value,
            expires_at: Some(expires_at),
        })
    }
}

fn invalid_option(option: &[u8]) -> CommandParserError {
    CommandParserError::InvalidOption {
        command: "set".to_string(),
        option: String::from_utf8_lossy(option).into_owned(),
    }
}
