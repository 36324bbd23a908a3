use once_cell::sync::Lazy;

#[derive(Debug)]
pub struct Config {
    /// Log every outgoing command and incoming line (`CTLAB_LOG_TRAFFIC=1`).
    pub log_traffic: bool,
    /// Reject received lines without a `$HH` checksum.
    pub require_message_checksum: bool,
    /// Append a checksum to outgoing commands unless disabled with `CTLAB_COMMAND_CHECKSUM=0`.
    pub command_checksum: bool,
    pub query_period_ms: u64,
}

impl Config {
    fn from_env() -> Self {
        let log_traffic = std::env::var("CTLAB_LOG_TRAFFIC")
            .map(|v| v == "1")
            .unwrap_or(false);
        let require_message_checksum = std::env::var("CTLAB_REQUIRE_MESSAGE_CHECKSUM")
            .map(|v| v == "1")
            .unwrap_or(false);
        let command_checksum = std::env::var("CTLAB_COMMAND_CHECKSUM")
            .map(|v| v != "0")
            .unwrap_or(true);
        let query_period_ms = std::env::var("CTLAB_QUERY_PERIOD_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(500u64);
        Self {
            log_traffic,
            require_message_checksum,
            command_checksum,
            query_period_ms,
        }
    }
}

/// Global config loaded once from environment at first access.
pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::from_env);

/// Convenience accessor
pub fn config() -> &'static Config {
    &GLOBAL_CONFIG
}
