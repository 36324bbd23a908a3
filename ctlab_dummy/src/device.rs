//! In-memory c't Lab device: a register store that speaks the line protocol.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use ctlab_protocol::address::{Address, BROADCAST_CHANNEL, DEFAULT_CHANNEL};
use ctlab_protocol::command::{parse_command, CommandKind};
use ctlab_protocol::{CtLabError, Message};
use serde::{Deserialize, Serialize};

/// Description attached to every regular reply.
pub const REPLY_OK: &str = "OK";
/// Description of the reply to a line whose checksum did not match.
pub const REPLY_CHECKSUM: &str = "CHKSUM";

/// Unset registers read as this value.
const UNSET_VALUE: &str = "0";

/// Number of recent command lines kept for inspection.
pub const RECEIVED_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct State {
    channels: Vec<u8>,
    values: BTreeMap<Address, String>,
    received: VecDeque<String>,
}

/// On-disk form of the register store (`serve --state FILE`).
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StateFile {
    /// `"channel:subchannel" = "value"`
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

/// Cheap to clone; all clones share the same registers.
#[derive(Clone, Debug)]
pub struct DummyDevice {
    default_channel: u8,
    state: Arc<Mutex<State>>,
}

impl DummyDevice {
    /// A device answering on `default_channel` (also the target of commands
    /// without a channel prefix).
    #[must_use]
    pub fn new(default_channel: u8) -> Self {
        Self {
            default_channel,
            state: Arc::new(Mutex::new(State {
                channels: vec![default_channel],
                ..State::default()
            })),
        }
    }

    /// Answer on an additional channel, e.g. to emulate several modules on
    /// one bus.
    #[must_use]
    pub fn with_channel(self, channel: u8) -> Self {
        {
            let mut st = self.lock();
            if !st.channels.contains(&channel) {
                st.channels.push(channel);
            }
        }
        self
    }

    #[must_use]
    pub const fn default_channel(&self) -> u8 {
        self.default_channel
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[must_use]
    pub fn value(&self, address: Address) -> Option<String> {
        self.lock().values.get(&address).cloned()
    }

    pub fn set_value(&self, address: Address, value: impl Into<String>) {
        self.lock().values.insert(address, value.into());
    }

    /// The last [`RECEIVED_CAPACITY`] lines handed to
    /// [`handle_line`](Self::handle_line), oldest first.
    #[must_use]
    pub fn received(&self) -> Vec<String> {
        self.lock().received.iter().cloned().collect()
    }

    /// Load register values from a TOML state file.
    pub fn load_state(&self, path: &Path) -> anyhow::Result<usize> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read state file {}", path.display()))?;
        let file: StateFile =
            toml::from_str(&text).with_context(|| format!("parse state file {}", path.display()))?;
        let mut st = self.lock();
        for (key, value) in &file.values {
            let address: Address = key
                .parse()
                .with_context(|| format!("state file {}: bad address {key}", path.display()))?;
            st.values.insert(address, value.clone());
        }
        Ok(file.values.len())
    }

    #[must_use]
    pub fn snapshot(&self) -> StateFile {
        StateFile {
            values: self
                .lock()
                .values
                .iter()
                .map(|(a, v)| (a.to_string(), v.clone()))
                .collect(),
        }
    }

    /// Feed a chunk of text that may hold several lines; replies are returned
    /// in order.
    #[must_use]
    pub fn handle_text(&self, text: &str) -> Vec<String> {
        text.split(['\r', '\n'])
            .filter(|l| !l.trim().is_empty())
            .flat_map(|l| self.handle_line(l))
            .collect()
    }

    /// Execute one command line and return the reply lines.
    ///
    /// - query: `#c:s=value [OK]$HH`
    /// - set: stored; echoed like a query only when `!` was requested
    /// - checksum mismatch: `#c:s=0 [CHKSUM]$HH` when the address is readable
    /// - anything else unparsable is ignored
    #[must_use]
    pub fn handle_line(&self, line: &str) -> Vec<String> {
        {
            let mut st = self.lock();
            if st.received.len() == RECEIVED_CAPACITY {
                st.received.pop_front();
            }
            st.received.push_back(line.to_string());
        }
        let parsed = match parse_command(line) {
            Ok(p) => p,
            Err(CtLabError::ChecksumMismatch { expected, actual }) => {
                tracing::warn!(line, expected, actual, "checksum mismatch");
                return self.checksum_reply(line);
            }
            Err(e) => {
                tracing::debug!(line, "ignored line: {e}");
                return Vec::new();
            }
        };
        let command = parsed.command;
        let targets = self.targets(command.address);
        let mut st = self.lock();
        match command.kind {
            CommandKind::Set => {
                let value = command.value.unwrap_or_default();
                for address in &targets {
                    st.values.insert(*address, value.clone());
                }
                if parsed.acknowledge {
                    targets.iter().map(|a| reply(*a, &value, REPLY_OK)).collect()
                } else {
                    Vec::new()
                }
            }
            CommandKind::Query => targets
                .iter()
                .map(|a| {
                    let value = st.values.get(a).map_or(UNSET_VALUE, String::as_str);
                    reply(*a, value, REPLY_OK)
                })
                .collect(),
        }
    }

    fn targets(&self, address: Address) -> Vec<Address> {
        match address.channel {
            DEFAULT_CHANNEL => vec![Address::new(self.default_channel, address.subchannel)],
            BROADCAST_CHANNEL => self
                .lock()
                .channels
                .iter()
                .map(|c| Address::new(*c, address.subchannel))
                .collect(),
            c if self.lock().channels.contains(&c) => vec![address],
            _ => Vec::new(),
        }
    }

    fn checksum_reply(&self, line: &str) -> Vec<String> {
        let Some((payload, _)) = line.trim().rsplit_once('$') else {
            return Vec::new();
        };
        match parse_command(payload) {
            Ok(p) => self
                .targets(p.command.address)
                .into_iter()
                .map(|a| reply(a, UNSET_VALUE, REPLY_CHECKSUM))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

fn reply(address: Address, value: &str, description: &str) -> String {
    Message::new(address, value, description).to_line(true)
}
