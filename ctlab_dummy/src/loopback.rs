//! Transport that talks to a [`DummyDevice`] without any I/O.
//!
//! Sent lines are queued to a worker thread that runs them through the
//! device and hands the replies to the subscribed handlers, so replies
//! arrive asynchronously like they would from a serial port.

use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use ctlab_protocol::transport::{StringHandler, StringReceiver, StringSender, SubscriptionId};
use ctlab_protocol::CtLabError;

use crate::device::DummyDevice;

type Handlers = Arc<Mutex<Vec<(SubscriptionId, StringHandler)>>>;

enum Job {
    Line(String),
    Flush(mpsc::Sender<()>),
}

pub struct LoopbackTransport {
    device: DummyDevice,
    jobs: Mutex<Option<mpsc::Sender<Job>>>,
    handlers: Handlers,
    worker: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl LoopbackTransport {
    #[must_use]
    pub fn new(device: DummyDevice) -> Arc<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let handlers: Handlers = Arc::new(Mutex::new(Vec::new()));
        let worker = {
            let device = device.clone();
            let handlers = Arc::clone(&handlers);
            std::thread::spawn(move || {
                for job in rx {
                    match job {
                        Job::Line(line) => {
                            for reply in device.handle_line(&line) {
                                deliver(&handlers, &reply);
                            }
                        }
                        Job::Flush(done) => {
                            let _ = done.send(());
                        }
                    }
                }
                tracing::debug!("loopback worker finished");
            })
        };
        Arc::new(Self {
            device,
            jobs: Mutex::new(Some(tx)),
            handlers,
            worker: Mutex::new(Some(worker)),
        })
    }

    #[must_use]
    pub const fn device(&self) -> &DummyDevice {
        &self.device
    }

    /// Block until every line sent so far has been answered and its replies
    /// delivered.
    pub fn flush(&self) {
        let (done_tx, done_rx) = mpsc::channel();
        let queued = lock(&self.jobs)
            .as_ref()
            .is_some_and(|tx| tx.send(Job::Flush(done_tx)).is_ok());
        if queued {
            let _ = done_rx.recv();
        }
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        lock(&self.handlers).len()
    }

    /// Push unsolicited device text to the subscribers, e.g. a status line
    /// the module sends on its own.
    pub fn inject(&self, text: &str) {
        deliver(&self.handlers, text);
    }
}

fn deliver(handlers: &Handlers, text: &str) {
    let snapshot: Vec<StringHandler> = lock(handlers).iter().map(|(_, h)| Arc::clone(h)).collect();
    for handler in snapshot {
        handler(text);
    }
}

impl StringSender for LoopbackTransport {
    fn send(&self, text: &str) -> Result<(), CtLabError> {
        let jobs = lock(&self.jobs);
        let tx = jobs
            .as_ref()
            .ok_or_else(|| CtLabError::Transport("loopback closed".into()))?;
        tx.send(Job::Line(text.to_string()))
            .map_err(|_| CtLabError::Transport("loopback worker stopped".into()))
    }
}

impl StringReceiver for LoopbackTransport {
    fn subscribe(&self, handler: StringHandler) -> SubscriptionId {
        let id = SubscriptionId::next();
        lock(&self.handlers).push((id, handler));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = lock(&self.handlers);
        let before = handlers.len();
        handlers.retain(|(sid, _)| *sid != id);
        handlers.len() != before
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        // closing the queue ends the worker loop
        lock(&self.jobs).take();
        if let Some(worker) = lock(&self.worker).take() {
            if worker.join().is_err() {
                tracing::warn!("loopback worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replies_reach_subscribers() {
        let transport = LoopbackTransport::new(DummyDevice::new(7));
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let s = Arc::clone(&seen);
        let id = transport.subscribe(Arc::new(move |t: &str| {
            s.lock().expect("lock").push(t.to_string());
        }));
        transport.send("7:15=100").expect("send");
        transport.send("7:15?").expect("send");
        transport.flush();
        {
            let seen = seen.lock().expect("lock");
            assert_eq!(seen.len(), 1);
            assert!(seen[0].starts_with("#7:15=100 [OK]$"));
        }
        assert!(transport.unsubscribe(id));
        assert!(!transport.unsubscribe(id));
        assert_eq!(transport.handler_count(), 0);
    }

    #[test]
    fn inject_bypasses_device() {
        let transport = LoopbackTransport::new(DummyDevice::new(7));
        let count = Arc::new(Mutex::new(0usize));
        let c = Arc::clone(&count);
        transport.subscribe(Arc::new(move |_t: &str| *c.lock().expect("lock") += 1));
        transport.inject("#7:4=1 [OK]");
        assert_eq!(*count.lock().expect("lock"), 1);
        assert!(transport.device().received().is_empty());
    }
}
