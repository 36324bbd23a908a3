use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use ctlab_dummy::{server, DummyDevice, TcpLineTransport};
use ctlab_protocol::{
    Address, CommandSender, CommandStringBuilder, FpgaConnection, Message, MessageCache,
    MessageParser, MessageReceiver, RegisterTable, SignalGenerator, SignalGeneratorRegisters,
};

#[derive(Parser, Debug)]
#[command(name = "ctlab_dummy", about = "c't Lab dummy device and line client")]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Serve a dummy device over TCP
    Serve {
        #[arg(long, default_value = "127.0.0.1:10001")]
        listen: String,
        /// Channel the device answers on
        #[arg(long, default_value_t = 7)]
        channel: u8,
        /// TOML file with initial register values
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Query one subchannel and print the reply
    Query {
        #[arg(long, default_value = "127.0.0.1:10001")]
        addr: String,
        /// `channel:subchannel`
        address: Address,
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
    },
    /// Set one subchannel
    Set {
        #[arg(long, default_value = "127.0.0.1:10001")]
        addr: String,
        address: Address,
        value: String,
        /// Request an acknowledge and wait for it
        #[arg(long)]
        ack: bool,
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
    },
    /// Program a DDS generator of the FPGA board
    Dds {
        #[arg(long, default_value = "127.0.0.1:10001")]
        addr: String,
        #[arg(long, default_value_t = 0)]
        generator: usize,
        #[arg(long)]
        frequency: f64,
        #[arg(long)]
        amplitude: Option<i16>,
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
    },
}

struct Client {
    transport: Arc<TcpLineTransport>,
    sender: Arc<CommandSender>,
    cache: Arc<MessageCache>,
    _receiver: Arc<MessageReceiver>,
}

impl Client {
    async fn connect(addr: &str, builder: CommandStringBuilder) -> anyhow::Result<Self> {
        let transport = TcpLineTransport::connect(addr)
            .await
            .with_context(|| format!("connect {addr}"))?;
        let receiver = MessageReceiver::new(transport.clone(), MessageParser::new());
        let cache = Arc::new(MessageCache::new());
        cache.attach(&receiver);
        let sender = Arc::new(CommandSender::new(builder, transport.clone()));
        Ok(Self {
            transport,
            sender,
            cache,
            _receiver: receiver,
        })
    }

    /// Wait until a message for `address` is cached.
    async fn wait_for(&self, address: Address, timeout: Duration) -> anyhow::Result<Message> {
        let poll = async {
            loop {
                if let Some(m) = self.cache.try_get(address) {
                    return m;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        let message = tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| anyhow!("no reply for {address} within {timeout:?}"))?;
        if message.description == "CHKSUM" {
            bail!("device reported a checksum error for {address}");
        }
        Ok(message)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_max_level(cli.log_level).init();

    match cli.command {
        Cmd::Serve {
            listen,
            channel,
            state,
        } => {
            let device = DummyDevice::new(channel);
            if let Some(path) = state {
                let n = device.load_state(&path)?;
                tracing::info!(path = %path.display(), values = n, "state loaded");
            }
            server::serve(device, &listen).await
        }
        Cmd::Query {
            addr,
            address,
            timeout_ms,
        } => {
            let client = Client::connect(&addr, CommandStringBuilder::new()).await?;
            client.sender.query(address)?;
            let m = client
                .wait_for(address, Duration::from_millis(timeout_ms))
                .await?;
            println!("{}", serde_json::to_string(&m)?);
            Ok(())
        }
        Cmd::Set {
            addr,
            address,
            value,
            ack,
            timeout_ms,
        } => {
            let client =
                Client::connect(&addr, CommandStringBuilder::new().with_acknowledge(ack)).await?;
            client.sender.set(address, value)?;
            if ack {
                let m = client
                    .wait_for(address, Duration::from_millis(timeout_ms))
                    .await?;
                println!("{}", serde_json::to_string(&m)?);
            } else {
                // give the writer task a chance to flush before exit
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Ok(())
        }
        Cmd::Dds {
            addr,
            generator,
            frequency,
            amplitude,
            timeout_ms,
        } => {
            let client = Client::connect(&addr, CommandStringBuilder::new()).await?;
            let table = Arc::new(RegisterTable::builtin()?.clone());
            let connection = Arc::new(FpgaConnection::new(
                table,
                Arc::clone(&client.cache),
                Arc::clone(&client.sender),
            ));
            let registers = SignalGeneratorRegisters::SERIAL;
            let mut sg = SignalGenerator::new(Arc::clone(&connection), &registers)?;
            let dds = sg.dds_generator_mut(generator)?;
            dds.set_frequency(frequency)?;
            if let Some(a) = amplitude {
                dds.set_amplitude(a)?;
            }
            let increment = dds.phase_increment();

            // read back the phase increment to confirm the write went through
            let base = registers
                .dds_bases
                .get(generator)
                .copied()
                .ok_or_else(|| anyhow!("no DDS generator {generator}"))?;
            let address = connection.table().resolve(base + 1)?;
            client.sender.query(address)?;
            let m = client
                .wait_for(address, Duration::from_millis(timeout_ms))
                .await?;
            println!(
                "dds{generator}: {frequency} Hz -> phase increment {increment} (device: {})",
                m.raw_value
            );
            if !client.transport.is_open() {
                tracing::warn!("connection closed");
            }
            Ok(())
        }
    }
}
