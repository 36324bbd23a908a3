use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::address::Address;
use crate::message::Message;
use crate::receiver::{MessageHandler, MessageReceiver};
use crate::transport::{lock, SubscriptionId};

/// Latest message per address, with per-address change notification.
///
/// Readers always get a snapshot (`Message` by value). Handlers are called
/// after the entry has been replaced and outside the entry and subscription
/// locks, so they may read the cache and (un)subscribe. Updates are delivered
/// one at a time: handlers see the values in the order they were stored and
/// must not call [`update`](Self::update) on the same cache.
#[derive(Default)]
pub struct MessageCache {
    entries: Mutex<HashMap<Address, Message>>,
    subscriptions: Mutex<HashMap<Address, Vec<(SubscriptionId, MessageHandler)>>>,
    // held from insert until the last handler returned
    delivery: Mutex<()>,
}

impl MessageCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `message` (last write wins) and notify the address's subscribers.
    pub fn update(&self, message: Message) {
        let address = message.address;
        let _delivery = lock(&self.delivery, "cache delivery");
        lock(&self.entries, "cache entries").insert(address, message.clone());
        let handlers: Vec<MessageHandler> = lock(&self.subscriptions, "cache subscriptions")
            .get(&address)
            .map(|subs| subs.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();
        for handler in handlers {
            handler(&message);
        }
    }

    #[must_use]
    pub fn try_get(&self, address: Address) -> Option<Message> {
        lock(&self.entries, "cache entries").get(&address).cloned()
    }

    pub fn subscribe(&self, address: Address, handler: MessageHandler) -> SubscriptionId {
        let id = SubscriptionId::next();
        lock(&self.subscriptions, "cache subscriptions")
            .entry(address)
            .or_default()
            .push((id, handler));
        id
    }

    pub fn unsubscribe(&self, address: Address, id: SubscriptionId) -> bool {
        let mut subs = lock(&self.subscriptions, "cache subscriptions");
        let Some(list) = subs.get_mut(&address) else {
            return false;
        };
        let before = list.len();
        list.retain(|(sid, _)| *sid != id);
        let removed = list.len() != before;
        if list.is_empty() {
            subs.remove(&address);
        }
        removed
    }

    /// Forget every entry and subscription of `channel`, e.g. when a device
    /// is detached from the bus. Returns the number of dropped entries.
    pub fn remove_channel(&self, channel: u8) -> usize {
        let mut entries = lock(&self.entries, "cache entries");
        let before = entries.len();
        entries.retain(|a, _| a.channel != channel);
        let removed = before - entries.len();
        drop(entries);
        lock(&self.subscriptions, "cache subscriptions").retain(|a, _| a.channel != channel);
        log::debug!("[CTLAB cache] removed channel {channel} ({removed} entries)");
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.entries, "cache entries").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached addresses in ascending order.
    #[must_use]
    pub fn addresses(&self) -> Vec<Address> {
        let mut v: Vec<Address> = lock(&self.entries, "cache entries").keys().copied().collect();
        v.sort_unstable();
        v
    }

    /// All cached messages ordered by address, as JSON (for diagnostics).
    pub fn to_json(&self) -> serde_json::Value {
        let mut messages: Vec<Message> = lock(&self.entries, "cache entries")
            .values()
            .cloned()
            .collect();
        messages.sort_unstable_by_key(|m| m.address);
        serde_json::json!({ "messages": messages })
    }

    /// Feed every message from `receiver` into this cache.
    pub fn attach(self: &Arc<Self>, receiver: &MessageReceiver) -> SubscriptionId {
        let cache = Arc::downgrade(self);
        receiver.subscribe(Arc::new(move |m: &Message| {
            if let Some(cache) = cache.upgrade() {
                cache.update(m.clone());
            }
        }))
    }

    pub fn detach(&self, receiver: &MessageReceiver, id: SubscriptionId) -> bool {
        receiver.unsubscribe(id)
    }
}
