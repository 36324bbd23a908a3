use std::sync::{Arc, Mutex};

use ctlab_dummy::{DummyDevice, LoopbackTransport};
use ctlab_protocol::signal::{PrescalerMode, Waveform};
use ctlab_protocol::test_utils::announce;
use ctlab_protocol::transport::StringSender;
use ctlab_protocol::{
    Address, CommandSender, CommandStringBuilder, FpgaConnection, Message, MessageCache,
    MessageParser, MessageReceiver, QueryScheduler, RegisterTable, SignalGenerator,
    SignalGeneratorRegisters, SubchannelReader, SubchannelWriter,
};

struct Bench {
    transport: Arc<LoopbackTransport>,
    receiver: Arc<MessageReceiver>,
    cache: Arc<MessageCache>,
    sender: Arc<CommandSender>,
}

fn bench(device: DummyDevice) -> Bench {
    let transport = LoopbackTransport::new(device);
    let receiver = MessageReceiver::new(transport.clone(), MessageParser::new().with_require_checksum(true));
    let cache = Arc::new(MessageCache::new());
    cache.attach(&receiver);
    let sender = Arc::new(CommandSender::new(
        CommandStringBuilder::new().with_checksum(true),
        transport.clone(),
    ));
    Bench {
        transport,
        receiver,
        cache,
        sender,
    }
}

#[test]
fn subchannel_round_trip_through_dummy() -> Result<(), Box<dyn std::error::Error>> {
    announce("subchannel_round_trip_through_dummy", "set, query and cache a subchannel");
    let b = bench(DummyDevice::new(3));
    let addr = Address::new(3, 11);
    let writer = SubchannelWriter::<f64>::new(addr, b.sender.clone());
    let reader = SubchannelReader::<f64>::new(addr, b.cache.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = seen.clone();
    reader.on_change(Arc::new(move |m: &Message| {
        s.lock().expect("lock").push(m.raw_value.clone());
    }));

    writer.set(2.5)?;
    b.sender.query(addr)?;
    b.transport.flush();

    assert_eq!(reader.value()?, 2.5);
    assert_eq!(*seen.lock().expect("lock"), vec!["2.5".to_string()]);
    assert_eq!(b.transport.device().received().len(), 2);
    assert!(b.receiver.is_active());
    Ok(())
}

#[test]
fn unsolicited_lines_update_cache() {
    announce("unsolicited_lines_update_cache", "device pushes status without a query");
    let b = bench(DummyDevice::new(7));
    // missing checksum is rejected in strict mode
    b.transport.inject("#7:4=1 [OK]\r\n");
    assert!(b.cache.is_empty());
    let line = Message::new(Address::new(7, 4), "1", "OK").to_line(true);
    b.transport.inject(&line);
    assert_eq!(
        b.cache.try_get(Address::new(7, 4)).map(|m| m.raw_value),
        Some("1".to_string())
    );
}

#[test]
fn signal_generator_on_dummy_board() -> Result<(), Box<dyn std::error::Error>> {
    announce("signal_generator_on_dummy_board", "reset, program and read the counter");
    let device = DummyDevice::new(7);
    let b = bench(device.clone());
    let table = Arc::new(RegisterTable::builtin()?.clone());
    let connection = Arc::new(FpgaConnection::new(table, b.cache.clone(), b.sender.clone()));
    let mut sg = SignalGenerator::new(connection.clone(), &SignalGeneratorRegisters::default())?;

    sg.reset()?;
    sg.dds_generator_mut(1)?.set_frequency(25e6)?;
    sg.dds_generator_mut(1)?.set_waveform(Waveform::Rectangle)?;
    sg.universal_counter_mut()
        .set_prescaler_mode(PrescalerMode::GatePeriod10s)?;
    b.transport.flush();

    assert_eq!(device.value(Address::new(7, 21)).as_deref(), Some("1073741824"));
    assert_eq!(device.value(Address::new(7, 3)).as_deref(), Some("16"));
    assert_eq!(device.value(Address::new(7, 12)).as_deref(), Some("1"));

    // the counter registers are actively queried
    device.set_value(Address::new(7, 5), "4711");
    device.set_value(Address::new(7, 4), "3");
    let scheduler = QueryScheduler::new(connection);
    assert_eq!(scheduler.send_immediately()?, 2);
    b.transport.flush();

    let counter = sg.universal_counter();
    assert!((counter.value()? - 471.1).abs() < 1e-9);
    assert!(counter.overflow()?);
    assert!(counter.input_signal_active()?);
    Ok(())
}

#[test]
fn checksum_error_is_reported_by_device() -> Result<(), Box<dyn std::error::Error>> {
    announce("checksum_error_is_reported_by_device", "corrupted command line");
    let b = bench(DummyDevice::new(7));
    b.transport.send("7:15=100$00")?;
    b.transport.flush();
    let m = b.cache.try_get(Address::new(7, 15)).ok_or("no reply")?;
    assert_eq!(m.description, "CHKSUM");
    assert_eq!(b.transport.device().value(Address::new(7, 15)), None);
    Ok(())
}

#[test]
fn receiver_detaches_when_cache_detaches() {
    announce("receiver_detaches_when_cache_detaches", "lazy transport wiring end to end");
    let transport = LoopbackTransport::new(DummyDevice::new(7));
    let receiver = MessageReceiver::new(transport.clone(), MessageParser::new());
    let cache = Arc::new(MessageCache::new());
    let id = cache.attach(&receiver);
    assert_eq!(transport.handler_count(), 1);
    assert!(cache.detach(&receiver, id));
    assert_eq!(transport.handler_count(), 0);
    assert!(!receiver.is_active());
}
