use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::CtLabError;

/// Channel number that makes the command builder omit the channel prefix.
/// The device then applies the command to its own channel.
pub const DEFAULT_CHANNEL: u8 = 254;
/// Channel number rendered as `*`: every device on the bus handles the command.
pub const BROADCAST_CHANNEL: u8 = 255;

/// A (channel, subchannel) pair naming one value on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Address {
    pub channel: u8,
    pub subchannel: u16,
}

impl Address {
    #[must_use]
    pub const fn new(channel: u8, subchannel: u16) -> Self {
        Self {
            channel,
            subchannel,
        }
    }

    /// Build an address from wider integers, rejecting values that do not fit
    /// the wire ranges (`u8` channel, `u16` subchannel).
    pub fn try_new(channel: u32, subchannel: u32) -> Result<Self, CtLabError> {
        match (u8::try_from(channel), u16::try_from(subchannel)) {
            (Ok(c), Ok(s)) => Ok(Self::new(c, s)),
            _ => Err(CtLabError::InvalidAddress {
                channel,
                subchannel,
            }),
        }
    }

    #[must_use]
    pub const fn is_default_channel(&self) -> bool {
        self.channel == DEFAULT_CHANNEL
    }

    #[must_use]
    pub const fn is_broadcast(&self) -> bool {
        self.channel == BROADCAST_CHANNEL
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.subchannel)
    }
}

impl FromStr for Address {
    type Err = CtLabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CtLabError::MalformedLine(s.to_string());
        let (ch, sub) = s.split_once(':').ok_or_else(malformed)?;
        let ch = ch.trim();
        let channel = if ch == "*" {
            u32::from(BROADCAST_CHANNEL)
        } else {
            ch.parse::<u32>().map_err(|_| malformed())?
        };
        let subchannel = sub.trim().parse::<u32>().map_err(|_| malformed())?;
        Self::try_new(channel, subchannel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_new_rejects_out_of_range() {
        assert_eq!(Address::try_new(7, 255).expect("fits"), Address::new(7, 255));
        assert!(matches!(
            Address::try_new(256, 1),
            Err(CtLabError::InvalidAddress {
                channel: 256,
                subchannel: 1
            })
        ));
        assert!(Address::try_new(1, 65_536).is_err());
    }

    #[test]
    fn display_and_parse() {
        let a: Address = "1:11".parse().expect("parse");
        assert_eq!(a, Address::new(1, 11));
        assert_eq!(a.to_string(), "1:11");
        let b: Address = "*:25".parse().expect("broadcast");
        assert!(b.is_broadcast());
        assert!("1-11".parse::<Address>().is_err());
    }
}
