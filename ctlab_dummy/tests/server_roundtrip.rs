use std::sync::Arc;
use std::time::Duration;

use ctlab_dummy::{server, DummyDevice, TcpLineTransport};
use ctlab_protocol::{Address, CommandSender, CommandStringBuilder, MessageCache, MessageParser, MessageReceiver};

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
async fn set_and_query_over_tcp() -> Result<(), Box<dyn std::error::Error>> {
    let device = DummyDevice::new(7);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let srv = device.clone();
    tokio::spawn(async move {
        let _ = server::run_listener_on(srv, listener).await;
    });

    let transport = TcpLineTransport::connect(("127.0.0.1", port)).await?;
    let receiver = MessageReceiver::new(transport.clone(), MessageParser::new());
    let cache = Arc::new(MessageCache::new());
    cache.attach(&receiver);
    let sender = CommandSender::new(CommandStringBuilder::new().with_checksum(true), transport.clone());

    let addr = Address::new(7, 15);
    sender.set(addr, "100")?;
    sender.query(addr)?;
    assert_eq!(wait_cached(&cache, addr).await.as_deref(), Some("100"));
    assert_eq!(device.value(addr).as_deref(), Some("100"));
    assert!(transport.is_open());
    Ok(())
}

#[tokio::test]
async fn clients_share_registers() -> Result<(), Box<dyn std::error::Error>> {
    let device = DummyDevice::new(7);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    tokio::spawn(server::run_listener_on(device.clone(), listener));

    let writer = TcpLineTransport::connect(("127.0.0.1", port)).await?;
    let writer_sender = CommandSender::new(
        CommandStringBuilder::new().with_acknowledge(true),
        writer.clone(),
    );
    let ack_receiver = MessageReceiver::new(writer.clone(), MessageParser::new());
    let ack_cache = Arc::new(MessageCache::new());
    ack_cache.attach(&ack_receiver);

    let addr = Address::new(7, 20);
    writer_sender.set(addr, "3")?;
    // the acknowledge proves the set was applied before the second client asks
    assert_eq!(wait_cached(&ack_cache, addr).await.as_deref(), Some("3"));

    let reader = TcpLineTransport::connect(("127.0.0.1", port)).await?;
    let receiver = MessageReceiver::new(reader.clone(), MessageParser::new());
    let cache = Arc::new(MessageCache::new());
    cache.attach(&receiver);
    CommandSender::new(CommandStringBuilder::new(), reader.clone()).query(addr)?;
    assert_eq!(wait_cached(&cache, addr).await.as_deref(), Some("3"));
    Ok(())
}
