use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::address::{Address, BROADCAST_CHANNEL, DEFAULT_CHANNEL};
use crate::error::CtLabError;
use crate::toml_helpers::describe_toml_error;

#[derive(Debug, Deserialize)]
struct RegisterFile {
    default_channel: u32,
    #[serde(default)]
    identity_fallback: bool,
    #[serde(default, rename = "register")]
    registers: Vec<RegisterRaw>,
}

#[derive(Debug, Deserialize)]
struct RegisterRaw {
    register: u16,
    name: String,
    // falls back to default_channel
    channel: Option<u32>,
    subchannel: u32,
    description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterEntry {
    pub register: u16,
    pub name: String,
    pub address: Address,
    pub description: Option<String>,
}

static BUILTIN: OnceCell<RegisterTable> = OnceCell::new();

/// Static register → address mapping. Immutable once built.
#[derive(Debug, Clone)]
pub struct RegisterTable {
    default_channel: u8,
    identity_fallback: bool,
    by_register: HashMap<u16, RegisterEntry>,
    by_name: HashMap<String, u16>,
}

fn device_channel(channel: u32, subchannel: u32) -> Result<Address, CtLabError> {
    let address = Address::try_new(channel, subchannel)?;
    // pseudo channels only exist on the command side
    if matches!(address.channel, DEFAULT_CHANNEL | BROADCAST_CHANNEL) {
        return Err(CtLabError::InvalidAddress {
            channel,
            subchannel,
        });
    }
    Ok(address)
}

impl RegisterTable {
    /// Parse a register TOML document.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, CtLabError> {
        let file: RegisterFile = toml::from_str(s)
            .map_err(|e| CtLabError::Config(describe_toml_error("registers.toml", s, &e)))?;
        Self::from_file(file)
    }

    /// Load and parse a register TOML from a filesystem path.
    pub fn from_path(path: &Path) -> Result<Self, CtLabError> {
        let s = fs::read_to_string(path).map_err(|e| {
            CtLabError::Config(format!("read register table {}: {e}", path.display()))
        })?;
        s.parse::<Self>()
    }

    /// Check a document without keeping the result.
    pub fn validate_str(s: &str) -> Result<(), CtLabError> {
        Self::from_str(s).map(|_| ())
    }

    /// The map of the FPGA lab board, embedded at compile time.
    pub fn builtin() -> Result<&'static Self, CtLabError> {
        BUILTIN.get_or_try_init(|| {
            Self::from_str(include_str!("registers.toml")).inspect_err(|e| {
                log::error!("[CTLAB] embedded registers.toml is invalid: {e}");
            })
        })
    }

    /// Every register `n` maps to `(channel, n)`.
    pub fn identity(channel: u8) -> Result<Self, CtLabError> {
        device_channel(u32::from(channel), 0)?;
        Ok(Self {
            default_channel: channel,
            identity_fallback: true,
            by_register: HashMap::new(),
            by_name: HashMap::new(),
        })
    }

    fn from_file(file: RegisterFile) -> Result<Self, CtLabError> {
        let default_channel = device_channel(file.default_channel, 0)?.channel;
        let mut by_register = HashMap::new();
        let mut by_name = HashMap::new();
        let mut names = HashSet::new();
        for raw in file.registers {
            let name = raw.name.trim().to_string();
            if name.is_empty() {
                return Err(CtLabError::Config(format!(
                    "register {r}: name is empty",
                    r = raw.register
                )));
            }
            if !names.insert(name.clone()) {
                return Err(CtLabError::Config(format!("duplicate register name: {name}")));
            }
            let channel = raw.channel.unwrap_or(u32::from(default_channel));
            let address = device_channel(channel, raw.subchannel)?;
            let entry = RegisterEntry {
                register: raw.register,
                name: name.clone(),
                address,
                description: raw.description,
            };
            if by_register.insert(raw.register, entry).is_some() {
                return Err(CtLabError::Config(format!(
                    "duplicate register number: {r}",
                    r = raw.register
                )));
            }
            by_name.insert(name, raw.register);
        }
        Ok(Self {
            default_channel,
            identity_fallback: file.identity_fallback,
            by_register,
            by_name,
        })
    }

    #[must_use]
    pub const fn default_channel(&self) -> u8 {
        self.default_channel
    }

    /// Address of `register`.
    ///
    /// # Errors
    ///
    /// `UnknownRegister` when the register is not listed and the table has no
    /// identity fallback.
    pub fn resolve(&self, register: u16) -> Result<Address, CtLabError> {
        if let Some(e) = self.by_register.get(&register) {
            return Ok(e.address);
        }
        if self.identity_fallback {
            return Ok(Address::new(self.default_channel, register));
        }
        Err(CtLabError::UnknownRegister(register))
    }

    #[must_use]
    pub fn get(&self, register: u16) -> Option<&RegisterEntry> {
        self.by_register.get(&register)
    }

    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&RegisterEntry> {
        self.by_name.get(name).and_then(|r| self.by_register.get(r))
    }

    /// Listed entries ordered by register number.
    #[must_use]
    pub fn entries(&self) -> Vec<&RegisterEntry> {
        let mut v: Vec<&RegisterEntry> = self.by_register.values().collect();
        v.sort_by_key(|e| e.register);
        v
    }
}

impl std::str::FromStr for RegisterTable {
    type Err = CtLabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"
default_channel = 7

[[register]]
register = 1
name = "uc_config"
subchannel = 12

[[register]]
register = 2
name = "remote"
channel = 3
subchannel = 40
"#;

    #[test]
    fn resolves_listed_registers() {
        let t: RegisterTable = SMALL.parse().expect("parse");
        assert_eq!(t.default_channel(), 7);
        assert_eq!(t.resolve(1).expect("1"), Address::new(7, 12));
        assert_eq!(t.resolve(2).expect("2"), Address::new(3, 40));
        assert!(matches!(t.resolve(9), Err(CtLabError::UnknownRegister(9))));
        assert_eq!(t.by_name("remote").map(|e| e.register), Some(2));
        assert_eq!(t.entries().len(), 2);
    }

    #[test]
    fn identity_fallback() {
        let t = RegisterTable::identity(7).expect("identity");
        assert_eq!(t.resolve(17).expect("17"), Address::new(7, 17));
        assert!(RegisterTable::identity(DEFAULT_CHANNEL).is_err());
    }

    #[test]
    fn rejects_duplicates_and_pseudo_channels() {
        let dup = "default_channel = 7\n[[register]]\nregister = 1\nname = \"a\"\nsubchannel = 1\n[[register]]\nregister = 1\nname = \"b\"\nsubchannel = 2\n";
        assert!(matches!(
            RegisterTable::validate_str(dup),
            Err(CtLabError::Config(_))
        ));
        let dup_name = "default_channel = 7\n[[register]]\nregister = 1\nname = \"a\"\nsubchannel = 1\n[[register]]\nregister = 2\nname = \"a\"\nsubchannel = 2\n";
        assert!(RegisterTable::validate_str(dup_name).is_err());
        assert!(matches!(
            RegisterTable::validate_str("default_channel = 255\n"),
            Err(CtLabError::InvalidAddress { channel: 255, .. })
        ));
        assert!(matches!(
            RegisterTable::validate_str("default_channel = 7\n[[register]]\nregister = 1\nname = \"a\"\nsubchannel = 70000\n"),
            Err(CtLabError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn syntax_error_has_position() {
        let err = RegisterTable::validate_str("default_channel = 7\n[[register]\n").expect_err("bad");
        let CtLabError::Config(msg) = err else {
            panic!("unexpected error kind");
        };
        assert!(msg.contains("parse error at 2:"), "{msg}");
    }

    #[test]
    fn builtin_table_maps_fpga_board() {
        let t = RegisterTable::builtin().expect("builtin");
        assert_eq!(t.default_channel(), 7);
        assert_eq!(
            t.by_name("dds0_phase_increment").map(|e| e.address),
            Some(Address::new(7, 17))
        );
        assert_eq!(t.resolve(200).expect("fallback"), Address::new(7, 200));
    }
}
