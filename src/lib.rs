#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::doc_markdown,
    clippy::too_long_first_doc_paragraph
)]

//! ctlab_protocol
//!
//! Client side of the c't Lab line protocol: building `channel:subchannel`
//! set/query commands, parsing `#c:s=value [description]$HH` messages,
//! caching the latest message per address and register-level access to the
//! FPGA lab board (DDS signal generator, universal counter, scope storage).
//!
//! The byte transport is not part of this crate; it is plugged in through
//! the [`transport::StringSender`] and [`transport::StringReceiver`] traits.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ctlab_protocol::{Address, CommandSender, CommandStringBuilder};
//! # fn demo(link: Arc<dyn ctlab_protocol::transport::StringSender>) -> Result<(), ctlab_protocol::CtLabError> {
//! let sender = CommandSender::new(CommandStringBuilder::new(), link);
//! sender.set(Address::new(7, 15), "100")?;
//! sender.query(Address::new(7, 5))?;
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod cache;
pub mod checksum;
pub mod command;
pub mod config;
pub mod error;
pub mod fpga;
pub mod message;
pub mod receiver;
pub mod register_table;
pub mod scheduler;
pub mod scope;
pub mod sender;
pub mod signal;
pub mod subchannel;
pub mod test_utils;
pub mod toml_helpers;
pub mod transport;

pub use address::Address;
pub use cache::MessageCache;
pub use command::{Command, CommandKind, CommandStringBuilder};
pub use error::CtLabError;
pub use fpga::{FpgaConnection, FpgaValueGetter, FpgaValueSetter, QueryMode};
pub use message::{Message, MessageParser, RawValue};
pub use receiver::MessageReceiver;
pub use register_table::RegisterTable;
pub use scheduler::QueryScheduler;
pub use sender::CommandSender;
pub use signal::{SignalGenerator, SignalGeneratorRegisters};
pub use subchannel::{SubchannelReader, SubchannelWriter};
