use std::sync::Arc;
use std::time::Duration;

use ctlab_dummy::{server, DummyDevice, TcpLineTransport};
use ctlab_protocol::{Address, MessageCache, MessageParser, MessageReceiver};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

async fn wait_cached(cache: &MessageCache, address: Address) -> Option<String> {
    for _ in 0..200 {
        if let Some(m) = cache.try_get(address) {
            return Some(m.raw_value);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}

#[tokio::test]
async fn invalid_utf8_from_device_keeps_transport_reading() -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let _ = socket.write_all(b"\xff\xfe noise\r\n#7:4=1 [OK]\r\n").await;
            // keep the socket open until the test is done
            let _ = done_rx.await;
        }
    });

    let transport = TcpLineTransport::connect(("127.0.0.1", port)).await?;
    let receiver = MessageReceiver::new(transport.clone(), MessageParser::new());
    let cache = Arc::new(MessageCache::new());
    cache.attach(&receiver);

    assert_eq!(wait_cached(&cache, Address::new(7, 4)).await.as_deref(), Some("1"));
    assert_eq!(cache.len(), 1);
    assert!(transport.is_open());
    let _ = done_tx.send(());
    Ok(())
}

#[tokio::test]
async fn invalid_utf8_from_client_keeps_session_alive() -> Result<(), Box<dyn std::error::Error>> {
    let device = DummyDevice::new(7);
    device.set_value(Address::new(7, 15), "42");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    tokio::spawn(server::run_listener_on(device.clone(), listener));

    let socket = tokio::net::TcpStream::connect(("127.0.0.1", port)).await?;
    let (read_half, mut write_half) = socket.into_split();
    write_half.write_all(b"\xff\xfe\r\n7:15?\r\n").await?;

    let mut reply = String::new();
    let read = tokio::time::timeout(
        Duration::from_secs(2),
        BufReader::new(read_half).read_line(&mut reply),
    )
    .await??;
    assert!(read > 0, "server closed the session");
    assert!(reply.starts_with("#7:15=42 [OK]"), "{reply}");
    assert_eq!(device.received().len(), 2);
    Ok(())
}
