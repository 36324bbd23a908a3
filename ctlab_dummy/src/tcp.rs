//! Line transport over TCP (serial-to-network bridge or `ctlab_dummy serve`).

use std::sync::{Arc, Mutex, MutexGuard};

use ctlab_protocol::transport::{StringHandler, StringReceiver, StringSender, SubscriptionId};
use ctlab_protocol::CtLabError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type Handlers = Arc<Mutex<Vec<(SubscriptionId, StringHandler)>>>;

/// Line terminator appended to every sent command.
pub const LINE_END: &str = "\r\n";

pub struct TcpLineTransport {
    outgoing: mpsc::UnboundedSender<String>,
    handlers: Handlers,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Next line without its terminator, `None` at end of stream. Bytes that are
/// not UTF-8 are replaced so a corrupted line still reaches the parser as
/// noise instead of ending the read loop.
pub(crate) async fn read_line_lossy<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

impl TcpLineTransport {
    /// Connect and start the reader and writer tasks on the current runtime.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> anyhow::Result<Arc<Self>> {
        let stream = TcpStream::connect(addr).await?;
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        tracing::info!(%peer, "connected");
        let (read_half, mut write_half) = stream.into_split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let handlers: Handlers = Arc::new(Mutex::new(Vec::new()));

        let writer = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                let framed = format!("{line}{LINE_END}");
                if let Err(e) = write_half.write_all(framed.as_bytes()).await {
                    tracing::warn!("write to {peer} failed: {e}");
                    break;
                }
            }
        });

        let reader = {
            let handlers = Arc::clone(&handlers);
            tokio::spawn(async move {
                let mut reader = BufReader::new(read_half);
                let mut buf = Vec::new();
                loop {
                    match read_line_lossy(&mut reader, &mut buf).await {
                        Ok(Some(line)) => {
                            if line.trim().is_empty() {
                                continue;
                            }
                            let snapshot: Vec<StringHandler> =
                                lock(&handlers).iter().map(|(_, h)| Arc::clone(h)).collect();
                            for handler in snapshot {
                                handler(&line);
                            }
                        }
                        Ok(None) => {
                            tracing::info!(%peer, "connection closed by peer");
                            break;
                        }
                        Err(e) => {
                            tracing::warn!("read from {peer} failed: {e}");
                            break;
                        }
                    }
                }
            })
        };

        Ok(Arc::new(Self {
            outgoing: tx,
            handlers,
            reader,
            writer,
        }))
    }

    /// False once the connection was closed from either side.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.reader.is_finished() && !self.writer.is_finished()
    }
}

impl StringSender for TcpLineTransport {
    fn send(&self, text: &str) -> Result<(), CtLabError> {
        self.outgoing
            .send(text.to_string())
            .map_err(|_| CtLabError::Transport("tcp connection closed".into()))
    }
}

impl StringReceiver for TcpLineTransport {
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

impl Drop for TcpLineTransport {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
