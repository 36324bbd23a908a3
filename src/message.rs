//! Incoming messages and the line parser.
//!
//! Device lines look like `#7:255=33 [DSCR]` or `#1:11=5 [OK]$4C`. The leading
//! `#`, the description and the checksum are all optional, which also lets
//! the parser read back what [`crate::command::CommandStringBuilder`] writes
//! for set commands.

use serde::Serialize;

use crate::address::Address;
use crate::checksum;
use crate::config::config as global_config;
use crate::error::CtLabError;

/// Conversion between typed values and the raw strings on the wire.
pub trait RawValue: Sized {
    /// Name used in `Conversion` errors.
    const TYPE_NAME: &'static str;

    fn to_raw(&self) -> String;

    fn from_raw(raw: &str) -> Result<Self, CtLabError>;
}

fn conversion<T: RawValue>(raw: &str) -> CtLabError {
    CtLabError::Conversion {
        raw: raw.to_string(),
        target: T::TYPE_NAME,
    }
}

macro_rules! impl_raw_value_int {
    ($($t:ty),*) => {$(
        impl RawValue for $t {
            const TYPE_NAME: &'static str = stringify!($t);

            fn to_raw(&self) -> String {
                self.to_string()
            }

            fn from_raw(raw: &str) -> Result<Self, CtLabError> {
                raw.trim().parse::<$t>().map_err(|_| conversion::<$t>(raw))
            }
        }
    )*};
}

impl_raw_value_int!(i16, u16, i32, u32);

impl RawValue for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn to_raw(&self) -> String {
        // Display is locale independent and round-trips
        self.to_string()
    }

    fn from_raw(raw: &str) -> Result<Self, CtLabError> {
        raw.trim().parse::<f64>().map_err(|_| conversion::<f64>(raw))
    }
}

impl RawValue for String {
    const TYPE_NAME: &'static str = "string";

    fn to_raw(&self) -> String {
        self.clone()
    }

    fn from_raw(raw: &str) -> Result<Self, CtLabError> {
        Ok(raw.to_string())
    }
}

impl RawValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn to_raw(&self) -> String {
        let raw = if *self { "1" } else { "0" };
        raw.to_string()
    }

    fn from_raw(raw: &str) -> Result<Self, CtLabError> {
        match raw.trim() {
            "0" => Ok(false),
            "1" => Ok(true),
            _ => Err(conversion::<bool>(raw)),
        }
    }
}

/// One parsed device line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub address: Address,
    pub raw_value: String,
    pub description: String,
}

impl Message {
    #[must_use]
    pub fn new(address: Address, raw_value: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            address,
            raw_value: raw_value.into(),
            description: description.into(),
        }
    }

    /// Convert the raw value.
    pub fn value<T: RawValue>(&self) -> Result<T, CtLabError> {
        T::from_raw(&self.raw_value)
    }

    /// Device-side rendering of this message (`#c:s=v [desc]`), optionally
    /// followed by `$HH`.
    #[must_use]
    pub fn to_line(&self, with_checksum: bool) -> String {
        let mut line = format!("#{}={}", self.address, self.raw_value);
        if !self.description.is_empty() {
            line.push_str(" [");
            line.push_str(&self.description);
            line.push(']');
        }
        if with_checksum {
            let sum = checksum::calculate(&line);
            line.push('$');
            line.push_str(&checksum::to_hex(sum));
        }
        line
    }
}

/// Parser for received lines. Never panics; every failure is a typed error.
#[derive(Debug, Clone, Copy)]
pub struct MessageParser {
    require_checksum: bool,
}

impl MessageParser {
    /// Parser using the process default (`CTLAB_REQUIRE_MESSAGE_CHECKSUM`).
    #[must_use]
    pub fn new() -> Self {
        Self {
            require_checksum: global_config().require_message_checksum,
        }
    }

    /// Reject lines that carry no `$HH` suffix.
    #[must_use]
    pub const fn with_require_checksum(mut self, on: bool) -> Self {
        self.require_checksum = on;
        self
    }

    /// Parse one line.
    ///
    /// # Errors
    ///
    /// `MalformedLine` for grammar violations (including out-of-range
    /// addresses), `ChecksumMismatch` when the `$HH` suffix is wrong.
    pub fn parse(&self, line: &str) -> Result<Message, CtLabError> {
        let malformed = || CtLabError::MalformedLine(line.to_string());
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(malformed());
        }

        let payload = match split_checksum(trimmed) {
            Some((payload, hex)) => {
                let expected = checksum::parse_hex(hex).ok_or_else(malformed)?;
                let actual = checksum::calculate(payload);
                if expected != actual {
                    return Err(CtLabError::ChecksumMismatch { expected, actual });
                }
                payload
            }
            None if self.require_checksum => return Err(malformed()),
            None => trimmed,
        };

        let body = payload.trim_end();
        let body = body.strip_prefix('#').unwrap_or(body);
        let (channel, rest) = body.split_once(':').ok_or_else(malformed)?;
        let (subchannel, rest) = rest.split_once('=').ok_or_else(malformed)?;
        let channel = channel.trim().parse::<u32>().map_err(|_| malformed())?;
        let subchannel = subchannel.trim().parse::<u32>().map_err(|_| malformed())?;
        let address = Address::try_new(channel, subchannel).map_err(|_| malformed())?;

        let rest = rest.trim_start();
        let end = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '[' | ']' | ';' | '$'))
            .unwrap_or(rest.len());
        let (value, rest) = rest.split_at(end);
        if value.is_empty() {
            return Err(malformed());
        }

        let rest = rest.trim();
        let description = if rest.is_empty() {
            ""
        } else if let Some(inner) = rest.strip_prefix('[') {
            inner.strip_suffix(']').ok_or_else(malformed)?.trim()
        } else if let Some(comment) = rest.strip_prefix(';') {
            comment.trim()
        } else {
            return Err(malformed());
        };

        Ok(Message::new(address, value, description))
    }

    /// Parse every non-blank line of a delivery. A single read from the
    /// device may contain several lines.
    pub fn parse_all(&self, text: &str) -> Vec<Result<Message, CtLabError>> {
        text.split(['\r', '\n'])
            .filter(|l| !l.trim().is_empty())
            .map(|l| self.parse(l))
            .collect()
    }
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `payload$HH`. A `$` inside a bracketed description does not start a
/// checksum.
fn split_checksum(line: &str) -> Option<(&str, &str)> {
    let pos = line.rfind('$')?;
    let (payload, rest) = line.split_at(pos);
    let hex = rest[1..].trim();
    if hex.contains(']') {
        return None;
    }
    Some((payload, hex))
}
