//! Sample storage of the FPGA scope.
//!
//! The storage is reached through four registers: a value, an address, a
//! mode and a read-only state. Writes go out as a burst of set commands;
//! reads are requested and the result arrives later in the cache.

use std::sync::Arc;

use crate::error::CtLabError;
use crate::fpga::{FpgaConnection, FpgaValueGetter, FpgaValueSetter, QueryMode};
use crate::sender::CommandSender;
use crate::signal::enums::ScopeSource;

/// Storage controller mode register values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum StorageMode {
    #[default]
    Idle = 0,
    Read = 1,
    Write = 2,
}

/// Bits of the storage state register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageState(pub u32);

impl StorageState {
    pub const READING: u32 = 0x1;
    pub const WRITING: u32 = 0x2;
    pub const READY: u32 = 0x4;

    #[must_use]
    pub const fn reading(self) -> bool {
        self.0 & Self::READING != 0
    }

    #[must_use]
    pub const fn writing(self) -> bool {
        self.0 & Self::WRITING != 0
    }

    #[must_use]
    pub const fn ready(self) -> bool {
        self.0 & Self::READY != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeRegisters {
    pub storage_value: u16,
    pub storage_address: u16,
    pub storage_mode: u16,
    pub storage_state: u16,
    pub configuration: u16,
}

impl Default for ScopeRegisters {
    fn default() -> Self {
        Self {
            storage_value: 32,
            storage_address: 33,
            storage_mode: 34,
            storage_state: 35,
            configuration: 36,
        }
    }
}

pub struct StorageController {
    value_setter: FpgaValueSetter,
    address_setter: FpgaValueSetter,
    mode_setter: FpgaValueSetter,
    value_getter: FpgaValueGetter,
    state_getter: FpgaValueGetter,
    sender: Arc<CommandSender>,
}

impl StorageController {
    /// Value and state are passive: they are only refreshed by explicit
    /// read requests.
    pub fn new(connection: &FpgaConnection, registers: &ScopeRegisters) -> Result<Self, CtLabError> {
        Ok(Self {
            value_setter: connection.create_value_setter(registers.storage_value)?,
            address_setter: connection.create_value_setter(registers.storage_address)?,
            mode_setter: connection.create_value_setter(registers.storage_mode)?,
            value_getter: connection.create_value_getter(registers.storage_value, QueryMode::Passive)?,
            state_getter: connection.create_value_getter(registers.storage_state, QueryMode::Passive)?,
            sender: Arc::clone(connection.sender()),
        })
    }

    pub fn set_mode(&self, mode: StorageMode) -> Result<(), CtLabError> {
        self.mode_setter.set_u32(u32::from(mode as u8))
    }

    pub fn prepare_write_access(&self, address: u32, value: u32) -> Result<(), CtLabError> {
        self.address_setter.set_u32(address)?;
        self.value_setter.set_u32(value)
    }

    pub fn prepare_read_access(&self, address: u32) -> Result<(), CtLabError> {
        self.address_setter.set_u32(address)
    }

    /// Last stored value reported by the device.
    pub fn value(&self) -> Result<u32, CtLabError> {
        self.value_getter.value_as_u32()
    }

    pub fn state(&self) -> Result<StorageState, CtLabError> {
        self.state_getter.value_as_u32().map(StorageState)
    }

    fn query_result(&self) -> Result<(), CtLabError> {
        self.sender.query(self.value_getter.address())?;
        self.sender.query(self.state_getter.address())
    }
}

/// Scope configuration register: `input_source << 8`.
pub struct ScopeConfigurationWriter {
    setter: FpgaValueSetter,
    input_source: ScopeSource,
}

impl ScopeConfigurationWriter {
    #[must_use]
    pub const fn new(setter: FpgaValueSetter) -> Self {
        Self {
            setter,
            input_source: ScopeSource::Dds0,
        }
    }

    #[must_use]
    pub fn value(&self) -> u32 {
        u32::from(self.input_source as u8) << 8
    }

    #[must_use]
    pub const fn input_source(&self) -> ScopeSource {
        self.input_source
    }

    pub fn set_input_source(&mut self, source: ScopeSource) -> Result<(), CtLabError> {
        self.input_source = source;
        self.setter.set_u32(self.value())
    }
}

pub struct Scope {
    storage: StorageController,
    configuration: ScopeConfigurationWriter,
}

impl Scope {
    pub fn new(connection: &FpgaConnection, registers: &ScopeRegisters) -> Result<Self, CtLabError> {
        Ok(Self {
            storage: StorageController::new(connection, registers)?,
            configuration: ScopeConfigurationWriter::new(
                connection.create_value_setter(registers.configuration)?,
            ),
        })
    }

    #[must_use]
    pub const fn storage(&self) -> &StorageController {
        &self.storage
    }

    #[must_use]
    pub const fn input_source(&self) -> ScopeSource {
        self.configuration.input_source()
    }

    pub fn set_input_source(&mut self, source: ScopeSource) -> Result<(), CtLabError> {
        self.configuration.set_input_source(source)
    }

    /// Store `values` at consecutive addresses starting at `start`. Each
    /// sample is latched by a write cycle and the controller is left idle.
    /// Nothing is sent when the block would run past the last address.
    pub fn write(&self, start: u32, values: &[u32]) -> Result<(), CtLabError> {
        let Some(last) = values.len().checked_sub(1) else {
            return Ok(());
        };
        let end = u32::try_from(last)
            .ok()
            .and_then(|last| start.checked_add(last))
            .ok_or_else(|| {
                CtLabError::OutOfRange(format!("scope address {start} + {last}"))
            })?;
        for (address, value) in (start..=end).zip(values) {
            self.storage.prepare_write_access(address, *value)?;
            self.storage.set_mode(StorageMode::Write)?;
            self.storage.set_mode(StorageMode::Idle)?;
        }
        Ok(())
    }

    /// Ask the device for the sample at `address`. The answer updates
    /// [`StorageController::value`] and [`StorageController::state`].
    pub fn request_read(&self, address: u32) -> Result<(), CtLabError> {
        self.storage.prepare_read_access(address)?;
        self.storage.set_mode(StorageMode::Read)?;
        self.storage.query_result()
    }
}
