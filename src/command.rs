//! Outgoing commands and their wire representation.
//!
//! ```text
//! 1:15=2.5$HH     set subchannel 15 of channel 1
//! 1:11?$34        query subchannel 11 of channel 1
//! 20=1            set on the default channel (no prefix)
//! *:25=1          broadcast
//! 1:20=2!$HH      set with acknowledge request
//! ```

use crate::address::{Address, BROADCAST_CHANNEL, DEFAULT_CHANNEL};
use crate::checksum;
use crate::config::config as global_config;
use crate::error::CtLabError;

/// Characters that delimit fields of a command or message line.
const RESERVED: &[char] = &[':', '=', '?', '!', '$', '[', ']', ';', '\r', '\n'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Set,
    Query,
}

/// A single command. Built, serialized and dropped per send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub address: Address,
    pub kind: CommandKind,
    pub value: Option<String>,
}

impl Command {
    #[must_use]
    pub fn set(address: Address, value: impl Into<String>) -> Self {
        Self {
            address,
            kind: CommandKind::Set,
            value: Some(value.into()),
        }
    }

    #[must_use]
    pub const fn query(address: Address) -> Self {
        Self {
            address,
            kind: CommandKind::Query,
            value: None,
        }
    }
}

/// Check that a set value can be placed on the wire unchanged.
pub fn validate_value(value: &str) -> Result<(), CtLabError> {
    if value.is_empty() {
        return Err(CtLabError::InvalidValue("empty value".into()));
    }
    if let Some(c) = value
        .chars()
        .find(|c| RESERVED.contains(c) || c.is_whitespace())
    {
        return Err(CtLabError::InvalidValue(format!(
            "value {value:?} contains reserved character {c:?}"
        )));
    }
    Ok(())
}

/// Serializes [`Command`]s into wire strings.
#[derive(Debug, Clone, Copy)]
pub struct CommandStringBuilder {
    checksum: bool,
    acknowledge: bool,
}

impl CommandStringBuilder {
    /// Builder with the process defaults: checksum on (unless
    /// `CTLAB_COMMAND_CHECKSUM=0`), no acknowledge request.
    #[must_use]
    pub fn new() -> Self {
        Self {
            checksum: global_config().command_checksum,
            acknowledge: false,
        }
    }

    #[must_use]
    pub const fn with_checksum(mut self, on: bool) -> Self {
        self.checksum = on;
        self
    }

    /// Ask the device to echo every set command. Has no effect on queries.
    #[must_use]
    pub const fn with_acknowledge(mut self, on: bool) -> Self {
        self.acknowledge = on;
        self
    }

    #[must_use]
    pub const fn checksum(&self) -> bool {
        self.checksum
    }

    #[must_use]
    pub const fn acknowledge(&self) -> bool {
        self.acknowledge
    }

    /// Serialize `cmd`.
    ///
    /// # Errors
    ///
    /// `InvalidValue` when a set command has no value or a value that would
    /// break the line grammar, or when a query carries a value.
    pub fn build(&self, cmd: &Command) -> Result<String, CtLabError> {
        let mut line = match cmd.address.channel {
            DEFAULT_CHANNEL => String::new(),
            BROADCAST_CHANNEL => "*:".to_string(),
            ch => format!("{ch}:"),
        };
        line.push_str(&cmd.address.subchannel.to_string());

        match cmd.kind {
            CommandKind::Set => {
                let value = cmd.value.as_deref().ok_or_else(|| {
                    CtLabError::InvalidValue(format!("set command for {} without value", cmd.address))
                })?;
                validate_value(value)?;
                line.push('=');
                line.push_str(value);
                if self.acknowledge {
                    line.push('!');
                }
            }
            CommandKind::Query => {
                if let Some(v) = &cmd.value {
                    return Err(CtLabError::InvalidValue(format!(
                        "query for {} must not carry a value (got {v:?})",
                        cmd.address
                    )));
                }
                line.push('?');
            }
        }

        if self.checksum {
            let sum = checksum::calculate(&line);
            line.push('$');
            line.push_str(&checksum::to_hex(sum));
        }
        Ok(line)
    }

    /// Like [`build`](Self::build) but takes an unchecked channel/subchannel pair.
    ///
    /// # Errors
    ///
    /// `InvalidAddress` when the pair does not fit the wire ranges, plus
    /// everything [`build`](Self::build) reports.
    pub fn build_raw(
        &self,
        channel: u32,
        subchannel: u32,
        kind: CommandKind,
        value: Option<&str>,
    ) -> Result<String, CtLabError> {
        let address = Address::try_new(channel, subchannel)?;
        self.build(&Command {
            address,
            kind,
            value: value.map(str::to_string),
        })
    }
}

impl Default for CommandStringBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A command as seen by the device side of the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: Command,
    pub acknowledge: bool,
    /// Checksum found on the line (already verified).
    pub checksum: Option<u8>,
}

/// Parse a command line the way a device would receive it. Inverse of
/// [`CommandStringBuilder::build`].
///
/// # Errors
///
/// `MalformedLine` for grammar violations, `ChecksumMismatch` when a `$HH`
/// suffix does not match the payload.
pub fn parse_command(line: &str) -> Result<ParsedCommand, CtLabError> {
    let malformed = || CtLabError::MalformedLine(line.to_string());
    let trimmed = line.trim();

    let (payload, checksum) = match trimmed.rfind('$') {
        Some(pos) => {
            let (payload, rest) = trimmed.split_at(pos);
            let expected = checksum::parse_hex(rest[1..].trim()).ok_or_else(malformed)?;
            let actual = checksum::calculate(payload);
            if expected != actual {
                return Err(CtLabError::ChecksumMismatch { expected, actual });
            }
            (payload, Some(expected))
        }
        None => (trimmed, None),
    };

    let (payload, acknowledge) = match payload.strip_suffix('!') {
        Some(p) => (p, true),
        None => (payload, false),
    };

    let (target, kind, value) = if let Some(q) = payload.strip_suffix('?') {
        (q, CommandKind::Query, None)
    } else {
        let (t, v) = payload.split_once('=').ok_or_else(malformed)?;
        let v = v.trim();
        if v.is_empty() {
            return Err(malformed());
        }
        (t, CommandKind::Set, Some(v.to_string()))
    };

    let address = match target.split_once(':') {
        Some(_) => target.parse::<Address>()?,
        None => {
            let sub = target.trim().parse::<u32>().map_err(|_| malformed())?;
            Address::try_new(u32::from(DEFAULT_CHANNEL), sub)?
        }
    };

    Ok(ParsedCommand {
        command: Command {
            address,
            kind,
            value,
        },
        acknowledge,
        checksum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> CommandStringBuilder {
        CommandStringBuilder::new().with_checksum(false)
    }

    #[test]
    fn query_with_checksum() {
        let b = CommandStringBuilder::new().with_checksum(true);
        let s = b
            .build(&Command::query(Address::new(1, 11)))
            .expect("build");
        assert_eq!(s, "1:11?$34");
    }

    #[test]
    fn set_forms() {
        let b = plain();
        assert_eq!(
            b.build(&Command::set(Address::new(1, 15), "2.5"))
                .expect("set"),
            "1:15=2.5"
        );
        assert_eq!(
            b.build(&Command::set(Address::new(DEFAULT_CHANNEL, 20), "1"))
                .expect("default"),
            "20=1"
        );
        assert_eq!(
            b.build(&Command::query(Address::new(DEFAULT_CHANNEL, 30)))
                .expect("default query"),
            "30?"
        );
        assert_eq!(
            b.build(&Command::set(Address::new(BROADCAST_CHANNEL, 25), "1"))
                .expect("broadcast"),
            "*:25=1"
        );
        assert_eq!(
            b.with_acknowledge(true)
                .build(&Command::set(Address::new(1, 20), "2"))
                .expect("ack"),
            "1:20=2!"
        );
    }

    #[test]
    fn checksum_covers_acknowledge_mark() {
        let s = CommandStringBuilder::new()
            .with_checksum(true)
            .with_acknowledge(true)
            .build(&Command::set(Address::new(1, 20), "2"))
            .expect("build");
        let (payload, hex) = s.split_once('$').expect("has checksum");
        assert_eq!(payload, "1:20=2!");
        assert_eq!(checksum::parse_hex(hex), Some(checksum::calculate("1:20=2!")));
    }

    #[test]
    fn acknowledge_ignored_for_queries() {
        let s = plain()
            .with_acknowledge(true)
            .build(&Command::query(Address::new(7, 255)))
            .expect("build");
        assert_eq!(s, "7:255?");
    }

    #[test]
    fn rejects_bad_values() {
        let b = plain();
        for v in ["", "1=2", "a$b", "x y", "3\n", "[x]"] {
            assert!(
                matches!(
                    b.build(&Command::set(Address::new(1, 1), v)),
                    Err(CtLabError::InvalidValue(_))
                ),
                "value {v:?} should be rejected"
            );
        }
        let mut q = Command::query(Address::new(1, 1));
        q.value = Some("1".into());
        assert!(matches!(b.build(&q), Err(CtLabError::InvalidValue(_))));
    }

    #[test]
    fn build_raw_checks_ranges() {
        let b = plain();
        assert_eq!(
            b.build_raw(7, 16, CommandKind::Query, None).expect("ok"),
            "7:16?"
        );
        assert!(matches!(
            b.build_raw(300, 1, CommandKind::Query, None),
            Err(CtLabError::InvalidAddress { .. })
        ));
        assert!(matches!(
            b.build_raw(1, 70_000, CommandKind::Set, Some("1")),
            Err(CtLabError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn parse_command_inverts_build() {
        let b = CommandStringBuilder::new()
            .with_checksum(true)
            .with_acknowledge(true);
        let cmd = Command::set(Address::new(7, 17), "1073741824");
        let line = b.build(&cmd).expect("build");
        let parsed = parse_command(&line).expect("parse");
        assert_eq!(parsed.command, cmd);
        assert!(parsed.acknowledge);
        assert!(parsed.checksum.is_some());

        let q = parse_command("30?").expect("default query");
        assert_eq!(q.command, Command::query(Address::new(DEFAULT_CHANNEL, 30)));
        let bc = parse_command("*:25=1").expect("broadcast");
        assert!(bc.command.address.is_broadcast());
    }

    #[test]
    fn parse_command_rejects_bad_checksum() {
        assert!(matches!(
            parse_command("1:11?$35"),
            Err(CtLabError::ChecksumMismatch {
                expected: 0x35,
                actual: 0x34
            })
        ));
        assert!(matches!(
            parse_command("1:11"),
            Err(CtLabError::MalformedLine(_))
        ));
    }
}
