use std::sync::Arc;

use crate::address::Address;
use crate::command::{Command, CommandStringBuilder};
use crate::config::config as global_config;
use crate::error::CtLabError;
use crate::transport::StringSender;

/// Builds command strings and hands them to the transport, one send per call.
/// There is no reply correlation; answers arrive through the receiver.
pub struct CommandSender {
    builder: CommandStringBuilder,
    transport: Arc<dyn StringSender>,
}

impl CommandSender {
    pub fn new(builder: CommandStringBuilder, transport: Arc<dyn StringSender>) -> Self {
        Self { builder, transport }
    }

    #[must_use]
    pub const fn builder(&self) -> &CommandStringBuilder {
        &self.builder
    }

    /// # Errors
    ///
    /// Builder errors (`InvalidValue`) and whatever the transport reports.
    pub fn send(&self, cmd: &Command) -> Result<(), CtLabError> {
        let line = self.builder.build(cmd)?;
        if global_config().log_traffic {
            log::debug!("[CTLAB send] {line}");
        }
        self.transport.send(&line)
    }

    pub fn set(&self, address: Address, value: impl Into<String>) -> Result<(), CtLabError> {
        self.send(&Command::set(address, value))
    }

    pub fn query(&self, address: Address) -> Result<(), CtLabError> {
        self.send(&Command::query(address))
    }
}
