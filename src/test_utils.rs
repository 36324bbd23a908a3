//! In-memory transport doubles for tests and demos.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;

use crate::cache::MessageCache;
use crate::command::CommandStringBuilder;
use crate::error::CtLabError;
use crate::fpga::FpgaConnection;
use crate::register_table::RegisterTable;
use crate::sender::CommandSender;
use crate::transport::{lock, StringHandler, StringReceiver, StringSender, SubscriptionId};

/// Print a concise test banner so it's easy to see what is running in CI logs.
pub fn announce(name: &str, description: &str) {
    let ts = SystemTime::now().duration_since(UNIX_EPOCH).ok();
    if let Some(d) = ts {
        info!("[TEST START] {name} - {description} (ts={})", d.as_secs());
    } else {
        info!("[TEST START] {name} - {description}");
    }
}

/// Sender that keeps every line it was asked to send.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<String>>,
    fail_next: Mutex<Option<String>>,
}

impl RecordingSender {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        lock(&self.sent, "recorded lines").clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<String> {
        lock(&self.sent, "recorded lines").last().cloned()
    }

    pub fn clear(&self) {
        lock(&self.sent, "recorded lines").clear();
    }

    /// Make the next `send` fail with a transport error.
    pub fn fail_next(&self, reason: &str) {
        *lock(&self.fail_next, "fail flag") = Some(reason.to_string());
    }
}

impl StringSender for RecordingSender {
    fn send(&self, text: &str) -> Result<(), CtLabError> {
        if let Some(reason) = lock(&self.fail_next, "fail flag").take() {
            return Err(CtLabError::Transport(reason));
        }
        lock(&self.sent, "recorded lines").push(text.to_string());
        Ok(())
    }
}

/// Receiver driven by the test: `deliver` calls every subscribed handler on
/// the current thread. Counts (un)subscribe calls so lazy wiring can be
/// checked.
#[derive(Default)]
pub struct ManualTransport {
    handlers: Mutex<Vec<(SubscriptionId, StringHandler)>>,
    subscribe_calls: AtomicUsize,
    unsubscribe_calls: AtomicUsize,
}

impl ManualTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliver(&self, text: &str) {
        let handlers: Vec<StringHandler> = lock(&self.handlers, "transport handlers")
            .iter()
            .map(|(_, h)| h.clone())
            .collect();
        for h in handlers {
            h(text);
        }
    }

    #[must_use]
    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        lock(&self.handlers, "transport handlers").len()
    }
}

impl StringReceiver for ManualTransport {
    fn subscribe(&self, handler: StringHandler) -> SubscriptionId {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let id = SubscriptionId::next();
        lock(&self.handlers, "transport handlers").push((id, handler));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        let mut handlers = lock(&self.handlers, "transport handlers");
        let before = handlers.len();
        handlers.retain(|(sid, _)| *sid != id);
        handlers.len() != before
    }
}

/// An [`FpgaConnection`] over an identity register table whose commands
/// (without checksum) end up in the returned [`RecordingSender`].
pub fn recording_connection(
    channel: u8,
) -> Result<(Arc<RecordingSender>, Arc<FpgaConnection>), CtLabError> {
    let rec = Arc::new(RecordingSender::new());
    let sender = Arc::new(CommandSender::new(
        CommandStringBuilder::new().with_checksum(false),
        rec.clone(),
    ));
    let table = RegisterTable::identity(channel)?;
    let conn = FpgaConnection::new(Arc::new(table), Arc::new(MessageCache::new()), sender);
    Ok((rec, Arc::new(conn)))
}
