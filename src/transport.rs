//! Boundary to the physical link (serial port, SPI bridge, TCP).
//!
//! The core never opens a device itself; it is handed something that can send
//! a line and something that reports received text. Implementations must not
//! hold their own locks while invoking handlers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::CtLabError;

/// Handler for raw text delivered by a transport. One delivery may contain
/// several lines.
pub type StringHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Token returned by every `subscribe` in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

impl SubscriptionId {
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed))
    }
}

/// Sends one command line to the device.
pub trait StringSender: Send + Sync {
    fn send(&self, text: &str) -> Result<(), CtLabError>;
}

/// Source of received text.
pub trait StringReceiver: Send + Sync {
    fn subscribe(&self, handler: StringHandler) -> SubscriptionId;

    /// Returns false when `id` was not subscribed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// Lock a mutex, recovering the data if a handler panicked while holding it.
pub(crate) fn lock<'a, T>(m: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    m.lock().unwrap_or_else(|poisoned| {
        log::warn!("[CTLAB] recovering poisoned lock: {what}");
        poisoned.into_inner()
    })
}
