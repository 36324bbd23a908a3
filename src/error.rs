use thiserror::Error;

use crate::address::Address;

#[derive(Error, Debug)]
pub enum CtLabError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid address {channel}:{subchannel}")]
    InvalidAddress { channel: u32, subchannel: u32 },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("malformed line: {0:?}")]
    MalformedLine(String),

    #[error("checksum mismatch: expected {expected:02X}, got {actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("cannot convert {raw:?} to {target}")]
    Conversion { raw: String, target: &'static str },

    #[error("no value available for {0}")]
    NoValueAvailable(Address),

    #[error("unknown register {0}")]
    UnknownRegister(u16),

    #[error("value out of range: {0}")]
    OutOfRange(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),
}
