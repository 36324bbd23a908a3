use std::marker::PhantomData;
use std::sync::Arc;

use crate::address::Address;
use crate::cache::MessageCache;
use crate::error::CtLabError;
use crate::message::{Message, RawValue};
use crate::receiver::MessageHandler;
use crate::sender::CommandSender;
use crate::transport::SubscriptionId;

/// Typed read access to one address. Holds no value of its own; every read
/// goes to the cache.
pub struct SubchannelReader<T> {
    address: Address,
    cache: Arc<MessageCache>,
    _value: PhantomData<fn() -> T>,
}

impl<T: RawValue> SubchannelReader<T> {
    pub fn new(address: Address, cache: Arc<MessageCache>) -> Self {
        Self {
            address,
            cache,
            _value: PhantomData,
        }
    }

    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// # Errors
    ///
    /// `NoValueAvailable` before the first message for the address arrived,
    /// `Conversion` when the cached raw value is not a `T`.
    pub fn value(&self) -> Result<T, CtLabError> {
        self.message()
            .ok_or(CtLabError::NoValueAvailable(self.address))?
            .value::<T>()
    }

    /// The full cached message (value and description).
    #[must_use]
    pub fn message(&self) -> Option<Message> {
        self.cache.try_get(self.address)
    }

    pub fn on_change(&self, handler: MessageHandler) -> SubscriptionId {
        self.cache.subscribe(self.address, handler)
    }

    pub fn remove_handler(&self, id: SubscriptionId) -> bool {
        self.cache.unsubscribe(self.address, id)
    }
}

/// Typed write access to one address. Every `set` sends, even when the value
/// did not change.
pub struct SubchannelWriter<T> {
    address: Address,
    sender: Arc<CommandSender>,
    _value: PhantomData<fn(T)>,
}

impl<T: RawValue> SubchannelWriter<T> {
    pub fn new(address: Address, sender: Arc<CommandSender>) -> Self {
        Self {
            address,
            sender,
            _value: PhantomData,
        }
    }

    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    pub fn set(&self, value: T) -> Result<(), CtLabError> {
        self.sender.set(self.address, value.to_raw())
    }
}
