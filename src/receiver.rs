//! Turns transport text into [`Message`] events.
//!
//! The receiver is only wired to the transport while somebody listens: the
//! first `subscribe` registers with the transport, the last `unsubscribe`
//! removes that registration again.

use std::sync::{Arc, Mutex, Weak};

use crate::config::config as global_config;
use crate::message::{Message, MessageParser};
use crate::transport::{lock, StringHandler, StringReceiver, SubscriptionId};

pub type MessageHandler = Arc<dyn Fn(&Message) + Send + Sync>;

#[derive(Default)]
struct State {
    subscribers: Vec<(SubscriptionId, MessageHandler)>,
    // Some(..) exactly while subscribers is non-empty
    transport_subscription: Option<SubscriptionId>,
}

pub struct MessageReceiver {
    transport: Arc<dyn StringReceiver>,
    parser: MessageParser,
    state: Mutex<State>,
    me: Weak<MessageReceiver>,
}

impl MessageReceiver {
    pub fn new(transport: Arc<dyn StringReceiver>, parser: MessageParser) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            transport,
            parser,
            state: Mutex::new(State::default()),
            me: me.clone(),
        })
    }

    /// Add a handler for decoded messages. Wires the receiver to the
    /// transport when this is the first subscriber.
    pub fn subscribe(&self, handler: MessageHandler) -> SubscriptionId {
        let id = SubscriptionId::next();
        let mut state = lock(&self.state, "receiver state");
        if state.subscribers.is_empty() {
            let me = self.me.clone();
            let on_text: StringHandler = Arc::new(move |text: &str| {
                if let Some(receiver) = me.upgrade() {
                    receiver.dispatch(text);
                }
            });
            state.transport_subscription = Some(self.transport.subscribe(on_text));
            log::debug!("[CTLAB recv] attached to transport");
        }
        state.subscribers.push((id, handler));
        id
    }

    /// Remove a handler. Detaches from the transport when it was the last one.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = lock(&self.state, "receiver state");
        let before = state.subscribers.len();
        state.subscribers.retain(|(sid, _)| *sid != id);
        if state.subscribers.len() == before {
            return false;
        }
        if state.subscribers.is_empty() {
            if let Some(tid) = state.transport_subscription.take() {
                self.transport.unsubscribe(tid);
                log::debug!("[CTLAB recv] detached from transport");
            }
        }
        true
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        lock(&self.state, "receiver state")
            .transport_subscription
            .is_some()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.state, "receiver state").subscribers.len()
    }

    /// Parse a delivery and raise one event per valid line. Invalid lines are
    /// treated as line noise and dropped.
    pub fn dispatch(&self, text: &str) {
        for result in self.parser.parse_all(text) {
            let message = match result {
                Ok(m) => m,
                Err(e) => {
                    log::debug!("[CTLAB recv] dropped line: {e}");
                    continue;
                }
            };
            if global_config().log_traffic {
                log::debug!("[CTLAB recv] {}", message.to_line(false));
            }
            let handlers: Vec<MessageHandler> = lock(&self.state, "receiver state")
                .subscribers
                .iter()
                .map(|(_, h)| Arc::clone(h))
                .collect();
            for handler in handlers {
                handler(&message);
            }
        }
    }
}

impl Drop for MessageReceiver {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(tid) = state.transport_subscription.take() {
            self.transport.unsubscribe(tid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::cache::MessageCache;
    use crate::test_utils::ManualTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (Arc<AtomicUsize>, MessageHandler) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handler: MessageHandler = Arc::new(move |_m: &Message| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, handler)
    }

    #[test]
    fn wires_lazily() {
        let transport = Arc::new(ManualTransport::new());
        let receiver = MessageReceiver::new(transport.clone(), MessageParser::new());
        assert_eq!(transport.subscribe_calls(), 0);
        assert!(!receiver.is_active());

        let (_c1, h1) = counting();
        let (_c2, h2) = counting();
        let a = receiver.subscribe(h1);
        let b = receiver.subscribe(h2);
        assert_eq!(transport.subscribe_calls(), 1);

        assert!(receiver.unsubscribe(a));
        assert_eq!(transport.unsubscribe_calls(), 0);
        assert!(receiver.unsubscribe(b));
        assert_eq!(transport.unsubscribe_calls(), 1);
        assert!(!receiver.unsubscribe(b));

        let (_c3, h3) = counting();
        receiver.subscribe(h3);
        assert_eq!(transport.subscribe_calls(), 2);
        assert_eq!(transport.handler_count(), 1);
    }

    #[test]
    fn dispatches_valid_lines_only() {
        let transport = Arc::new(ManualTransport::new());
        let receiver = MessageReceiver::new(
            transport.clone(),
            MessageParser::new().with_require_checksum(false),
        );
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        receiver.subscribe(Arc::new(move |m: &Message| {
            s.lock().expect("lock").push(m.clone());
        }));

        transport.deliver("#7:255=33 [DSCR]\n#garbage\n#1:11=5 [OK]$00\n#6:254=22");
        let seen = seen.lock().expect("lock");
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].address, Address::new(7, 255));
        assert_eq!(seen[1].address, Address::new(6, 254));
    }

    #[test]
    fn nothing_dispatched_while_idle() {
        let transport = Arc::new(ManualTransport::new());
        let receiver = MessageReceiver::new(transport.clone(), MessageParser::new());
        let (count, h) = counting();
        let id = receiver.subscribe(h);
        receiver.unsubscribe(id);
        transport.deliver("#1:1=1");
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_may_unsubscribe_itself() {
        let transport = Arc::new(ManualTransport::new());
        let receiver = MessageReceiver::new(
            transport.clone(),
            MessageParser::new().with_require_checksum(false),
        );
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let (r, s) = (Arc::downgrade(&receiver), slot.clone());
        let id = receiver.subscribe(Arc::new(move |_m: &Message| {
            let id = s.lock().expect("lock").take();
            if let (Some(r), Some(id)) = (r.upgrade(), id) {
                r.unsubscribe(id);
            }
        }));
        *slot.lock().expect("lock") = Some(id);
        transport.deliver("#1:1=1");
        assert!(!receiver.is_active());
        assert_eq!(transport.unsubscribe_calls(), 1);
    }

    #[test]
    fn delivery_thread_races_subscriber_churn() {
        const LINES: usize = 2000;
        let transport = Arc::new(ManualTransport::new());
        let receiver = MessageReceiver::new(
            transport.clone(),
            MessageParser::new().with_require_checksum(false),
        );
        let cache = Arc::new(MessageCache::new());
        let cache_id = cache.attach(&receiver);
        let address = Address::new(7, 4);

        let delivery = {
            let transport = transport.clone();
            std::thread::spawn(move || {
                for i in 0..LINES {
                    transport.deliver(&format!("#7:4={i}"));
                }
            })
        };
        let mut extra_seen = 0;
        while !delivery.is_finished() {
            let (count, h) = counting();
            let id = receiver.subscribe(h);
            let _ = cache.try_get(address);
            assert!(receiver.unsubscribe(id));
            extra_seen += count.load(Ordering::SeqCst);
        }
        delivery.join().expect("delivery thread");

        assert!(extra_seen <= LINES);
        assert_eq!(
            cache.try_get(address).map(|m| m.raw_value),
            Some((LINES - 1).to_string())
        );
        assert_eq!(transport.handler_count(), 1);
        assert!(cache.detach(&receiver, cache_id));
        assert_eq!(transport.handler_count(), 0);
        assert!(!receiver.is_active());
    }
}
