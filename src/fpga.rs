//! Register-level access to the FPGA board.
//!
//! A register number is resolved once through the [`RegisterTable`]; the
//! setter and getter returned afterwards only carry the resolved address.

use std::sync::{Arc, Mutex};

use crate::address::Address;
use crate::cache::MessageCache;
use crate::error::CtLabError;
use crate::message::{Message, RawValue};
use crate::receiver::MessageHandler;
use crate::register_table::RegisterTable;
use crate::sender::CommandSender;
use crate::subchannel::{SubchannelReader, SubchannelWriter};
use crate::transport::{lock, SubscriptionId};

/// How a getter's value is kept up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMode {
    /// Re-queried periodically by a [`crate::scheduler::QueryScheduler`].
    Active,
    /// Updated by unsolicited device messages only.
    Passive,
}

/// A getter known to the connection, as seen by `refresh_getters` predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetterInfo {
    pub register: u16,
    pub address: Address,
    pub mode: QueryMode,
}

pub struct FpgaConnection {
    table: Arc<RegisterTable>,
    cache: Arc<MessageCache>,
    sender: Arc<CommandSender>,
    getters: Mutex<Vec<GetterInfo>>,
}

impl FpgaConnection {
    pub fn new(table: Arc<RegisterTable>, cache: Arc<MessageCache>, sender: Arc<CommandSender>) -> Self {
        Self {
            table,
            cache,
            sender,
            getters: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn table(&self) -> &RegisterTable {
        &self.table
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<MessageCache> {
        &self.cache
    }

    #[must_use]
    pub fn sender(&self) -> &Arc<CommandSender> {
        &self.sender
    }

    /// # Errors
    ///
    /// `UnknownRegister` when the table cannot resolve `register`.
    pub fn create_value_setter(&self, register: u16) -> Result<FpgaValueSetter, CtLabError> {
        let address = self.table.resolve(register)?;
        Ok(FpgaValueSetter {
            register,
            address,
            sender: Arc::clone(&self.sender),
        })
    }

    /// Create a getter and remember it for [`refresh_getters`](Self::refresh_getters).
    /// Asking twice for the same register keeps one entry; `Active` wins.
    pub fn create_value_getter(
        &self,
        register: u16,
        mode: QueryMode,
    ) -> Result<FpgaValueGetter, CtLabError> {
        let address = self.table.resolve(register)?;
        {
            let mut getters = lock(&self.getters, "getter list");
            match getters.iter_mut().find(|g| g.address == address) {
                Some(existing) => {
                    if mode == QueryMode::Active {
                        existing.mode = QueryMode::Active;
                    }
                }
                None => getters.push(GetterInfo {
                    register,
                    address,
                    mode,
                }),
            }
        }
        Ok(FpgaValueGetter {
            register,
            mode,
            reader: SubchannelReader::new(address, Arc::clone(&self.cache)),
        })
    }

    #[must_use]
    pub fn getters(&self) -> Vec<GetterInfo> {
        lock(&self.getters, "getter list").clone()
    }

    #[must_use]
    pub fn query_addresses(&self, mode: QueryMode) -> Vec<Address> {
        lock(&self.getters, "getter list")
            .iter()
            .filter(|g| g.mode == mode)
            .map(|g| g.address)
            .collect()
    }

    /// Send one query per known getter accepted by `predicate`. All matching
    /// queries are attempted; the first failure is returned afterwards.
    pub fn refresh_getters<P>(&self, predicate: P) -> Result<usize, CtLabError>
    where
        P: Fn(&GetterInfo) -> bool,
    {
        let targets: Vec<GetterInfo> = lock(&self.getters, "getter list")
            .iter()
            .filter(|g| predicate(*g))
            .copied()
            .collect();
        let mut sent = 0;
        let mut first_err = None;
        for g in targets {
            match self.sender.query(g.address) {
                Ok(()) => sent += 1,
                Err(e) => {
                    log::warn!("[CTLAB fpga] query for register {} failed: {e}", g.register);
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(sent),
        }
    }

    /// Forget all getters and drop cached values of the board's channel.
    pub fn detach(&self) {
        lock(&self.getters, "getter list").clear();
        self.cache.remove_channel(self.table.default_channel());
    }
}

/// Writes one register. Every call sends a set command.
pub struct FpgaValueSetter {
    register: u16,
    address: Address,
    sender: Arc<CommandSender>,
}

impl FpgaValueSetter {
    #[must_use]
    pub const fn register(&self) -> u16 {
        self.register
    }

    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    pub fn set<T: RawValue>(&self, value: T) -> Result<(), CtLabError> {
        SubchannelWriter::<T>::new(self.address, Arc::clone(&self.sender)).set(value)
    }

    pub fn set_i32(&self, value: i32) -> Result<(), CtLabError> {
        self.set(value)
    }

    pub fn set_u32(&self, value: u32) -> Result<(), CtLabError> {
        self.set(value)
    }

    pub fn set_f64(&self, value: f64) -> Result<(), CtLabError> {
        self.set(value)
    }

    pub fn set_bool(&self, value: bool) -> Result<(), CtLabError> {
        self.set(value)
    }
}

/// Reads one register from the cache.
pub struct FpgaValueGetter {
    register: u16,
    mode: QueryMode,
    reader: SubchannelReader<String>,
}

impl FpgaValueGetter {
    #[must_use]
    pub const fn register(&self) -> u16 {
        self.register
    }

    #[must_use]
    pub fn address(&self) -> Address {
        self.reader.address()
    }

    #[must_use]
    pub const fn query_mode(&self) -> QueryMode {
        self.mode
    }

    pub fn value<T: RawValue>(&self) -> Result<T, CtLabError> {
        self.message()
            .ok_or(CtLabError::NoValueAvailable(self.address()))?
            .value::<T>()
    }

    pub fn value_as_i32(&self) -> Result<i32, CtLabError> {
        self.value()
    }

    pub fn value_as_u32(&self) -> Result<u32, CtLabError> {
        self.value()
    }

    pub fn value_as_f64(&self) -> Result<f64, CtLabError> {
        self.value()
    }

    pub fn value_as_bool(&self) -> Result<bool, CtLabError> {
        self.value()
    }

    #[must_use]
    pub fn message(&self) -> Option<Message> {
        self.reader.message()
    }

    pub fn on_updated(&self, handler: MessageHandler) -> SubscriptionId {
        self.reader.on_change(handler)
    }

    pub fn remove_handler(&self, id: SubscriptionId) -> bool {
        self.reader.remove_handler(id)
    }
}
