//! Session configuration

use meshlink_proto::DEFAULT_HOP_LIMIT;
use std::time::Duration;

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Default deadline for requests that wait for a reply
    pub request_timeout: Duration,

    /// Default deadline for pings
    pub ping_timeout: Duration,

    /// Deadline for the initial config dump
    pub configure_timeout: Duration,

    /// Deadline for the transport to report `Connected` after `start`
    pub connect_timeout: Duration,

    /// Ack records kept before the oldest is evicted
    pub ack_log_capacity: usize,

    /// Text messages kept in the message log
    pub message_log_capacity: usize,

    /// Hop limit stamped on originated packets
    pub hop_limit: u32,

    /// Keepalive interval for stream links (`None` disables heartbeats)
    pub heartbeat_interval: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            ping_timeout: Duration::from_secs(30),
            configure_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            ack_log_capacity: 1024,
            message_log_capacity: 500,
            hop_limit: DEFAULT_HOP_LIMIT,
            heartbeat_interval: None,
        }
    }
}

impl SessionConfig {
    /// Set the default request deadline
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the default ping deadline
    #[must_use]
    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    /// Enable periodic heartbeats
    #[must_use]
    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    /// Set the ack log capacity
    #[must_use]
    pub fn with_ack_log_capacity(mut self, capacity: usize) -> Self {
        self.ack_log_capacity = capacity;
        self
    }
}
