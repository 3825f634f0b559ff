use std::time::Duration;

use serde::Deserialize;

// ═══════════════════════════════════════════════════════════════
//  Consumer Config
// ═══════════════════════════════════════════════════════════════

/// What the event loop does after the handler fails on a record.
/// The record is never committed in either case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerErrorPolicy {
    /// Log, count, keep consuming.
    #[default]
    Skip,
    /// Return the handler error from `EventLoop::run`.
    Stop,
}

/// `[consumer]` section: event loop tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerConfig {
    /// Upper bound of one wait for the next message.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    #[serde(default)]
    pub on_handler_error: HandlerErrorPolicy,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout_ms(),
            on_handler_error: HandlerErrorPolicy::default(),
        }
    }
}

impl ConsumerConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

fn default_poll_timeout_ms() -> u64 {
    1000
}

// ═══════════════════════════════════════════════════════════════
//  Producer Config
// ═══════════════════════════════════════════════════════════════

/// `[producer]` section: synthetic event ticker.
#[derive(Debug, Clone, Deserialize)]
pub struct ProducerConfig {
    /// Pause between two produced events.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

impl ProducerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_interval_ms() -> u64 {
    1000
}
