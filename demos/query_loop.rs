use std::env;
use std::sync::Arc;
use std::time::Duration;

use ctlab_dummy::{DummyDevice, LoopbackTransport, TcpLineTransport};
use ctlab_protocol::transport::{StringReceiver, StringSender};
use ctlab_protocol::{
    CommandSender, CommandStringBuilder, FpgaConnection, MessageCache, MessageParser,
    MessageReceiver, QueryScheduler, RegisterTable, SignalGenerator, SignalGeneratorRegisters,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // CTLAB_LOG_TRAFFIC=1 RUST_LOG=debug shows every line on the wire
    env_logger::init();

    // CTLAB_ADDR=host:port talks to a real bridge; otherwise an in-process dummy
    let (sender_link, receiver_link): (Arc<dyn StringSender>, Arc<dyn StringReceiver>) =
        match env::var("CTLAB_ADDR") {
            Ok(addr) => {
                let t = TcpLineTransport::connect(addr).await?;
                let s: Arc<dyn StringSender> = t.clone();
                let r: Arc<dyn StringReceiver> = t;
                (s, r)
            }
            Err(_) => {
                let device = DummyDevice::new(7);
                device.set_value("7:5".parse()?, "100000");
                device.set_value("7:4".parse()?, "1");
                let t = LoopbackTransport::new(device);
                let s: Arc<dyn StringSender> = t.clone();
                let r: Arc<dyn StringReceiver> = t;
                (s, r)
            }
        };

    let receiver = MessageReceiver::new(receiver_link, MessageParser::new());
    let cache = Arc::new(MessageCache::new());
    cache.attach(&receiver);
    let sender = Arc::new(CommandSender::new(CommandStringBuilder::new(), sender_link));
    let table = Arc::new(RegisterTable::builtin()?.clone());
    let connection = Arc::new(FpgaConnection::new(table, cache.clone(), sender));

    let sg = SignalGenerator::new(connection.clone(), &SignalGeneratorRegisters::default())?;
    let counter = sg.universal_counter();
    counter.on_value_changed(Arc::new(|v: f64| println!("counter: {v} Hz")));
    counter.on_input_signal_active_changed(Arc::new(|a: bool| println!("input active: {a}")));

    let mut scheduler = QueryScheduler::new(connection);
    scheduler.start(Some(Duration::from_millis(250)));
    tokio::time::sleep(Duration::from_secs(2)).await;
    scheduler.stop();

    println!("{}", serde_json::to_string_pretty(&cache.to_json())?);
    Ok(())
}
