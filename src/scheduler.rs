//! Periodic re-query of active getters.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::config as global_config;
use crate::error::CtLabError;
use crate::fpga::{FpgaConnection, QueryMode};

/// Sends a query for every `Active` getter of a connection, either on demand
/// or on a fixed period.
pub struct QueryScheduler {
    connection: Arc<FpgaConnection>,
    task: Option<JoinHandle<()>>,
}

impl QueryScheduler {
    #[must_use]
    pub const fn new(connection: Arc<FpgaConnection>) -> Self {
        Self {
            connection,
            task: None,
        }
    }

    /// Query all active getters once. Returns how many queries were sent.
    pub fn send_immediately(&self) -> Result<usize, CtLabError> {
        self.connection
            .refresh_getters(|g| g.mode == QueryMode::Active)
    }

    /// Start periodic sending (`CTLAB_QUERY_PERIOD_MS` when `period` is None).
    /// A running schedule is replaced. Must be called inside a tokio runtime.
    pub fn start(&mut self, period: Option<Duration>) {
        self.stop();
        let period =
            period.unwrap_or_else(|| Duration::from_millis(global_config().query_period_ms));
        let connection = Arc::clone(&self.connection);
        tracing::debug!(?period, "query scheduler started");
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = connection.refresh_getters(|g| g.mode == QueryMode::Active) {
                    tracing::warn!("scheduled query failed: {e}");
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("query scheduler stopped");
        }
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for QueryScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
