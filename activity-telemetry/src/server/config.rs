use crate::{broadcast::DEFAULT_SUBSCRIBER_BUFFER, store::DEFAULT_CAPACITY};
use std::{net::SocketAddr, str::FromStr};

/// Entries replayed to a newly connected subscriber by default.
pub const DEFAULT_BACKLOG: usize = 100;

/// Server wiring read from `ACTIVITY_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// `ACTIVITY_WS_ADDR` (default: 0.0.0.0:9002)
    pub ws_addr: SocketAddr,
    /// `ACTIVITY_HTTP_ADDR` (default: 0.0.0.0:9003)
    pub http_addr: SocketAddr,
    /// `ACTIVITY_CAPACITY` (default: 1000)
    pub capacity: usize,
    /// `ACTIVITY_BACKLOG` (default: 100)
    pub backlog: usize,
    /// `ACTIVITY_SUBSCRIBER_BUFFER` (default: 256)
    pub subscriber_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_addr: SocketAddr::from(([0, 0, 0, 0], 9002)),
            http_addr: SocketAddr::from(([0, 0, 0, 0], 9003)),
            capacity: DEFAULT_CAPACITY,
            backlog: DEFAULT_BACKLOG,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Missing or unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            ws_addr: parse_or(lookup("ACTIVITY_WS_ADDR"), defaults.ws_addr),
            http_addr: parse_or(lookup("ACTIVITY_HTTP_ADDR"), defaults.http_addr),
            capacity: parse_or(lookup("ACTIVITY_CAPACITY"), defaults.capacity),
            backlog: parse_or(lookup("ACTIVITY_BACKLOG"), defaults.backlog),
            subscriber_buffer: parse_or(
                lookup("ACTIVITY_SUBSCRIBER_BUFFER"),
                defaults.subscriber_buffer,
            ),
        }
    }

    pub fn with_ws_addr(mut self, addr: SocketAddr) -> Self {
        self.ws_addr = addr;
        self
    }

    pub fn with_http_addr(mut self, addr: SocketAddr) -> Self {
        self.http_addr = addr;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_backlog(mut self, backlog: usize) -> Self {
        self.backlog = backlog;
        self
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
