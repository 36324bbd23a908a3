//! TCP front end for a [`DummyDevice`]: one command per line in, reply lines
//! out, any number of clients sharing the same registers.

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::device::DummyDevice;
use crate::tcp::read_line_lossy;

/// Bind `addr` and serve until the task is cancelled.
pub async fn serve(device: DummyDevice, addr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "dummy device listening");
    run_listener_on(device, listener).await
}

/// Accept loop on an already bound listener (tests bind port 0 themselves).
pub async fn run_listener_on(device: DummyDevice, listener: TcpListener) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        tracing::debug!(%peer, "client connected");
        let device = device.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(device, socket).await {
                tracing::warn!(%peer, "client error: {e}");
            }
            tracing::debug!(%peer, "client disconnected");
        });
    }
}

async fn handle_client(device: DummyDevice, socket: TcpStream) -> anyhow::Result<()> {
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();
    while let Some(line) = read_line_lossy(&mut reader, &mut buf).await? {
        if line.trim().is_empty() {
            continue;
        }
        tracing::trace!(line = %line, "received");
        for reply in device.handle_line(&line) {
            write_half.write_all(reply.as_bytes()).await?;
            write_half.write_all(b"\r\n").await?;
        }
    }
    Ok(())
}
