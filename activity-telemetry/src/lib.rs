//! # Activity Telemetry
//! Real-time observability for a multi-platform scanning pipeline. Scanners append
//! [`ActivityLogEntry`]s to a bounded [`EventStore`], which fans each one out to live
//! subscribers while a rolling-window [`RollingStats`] view is recomputed on demand.
//!
//! The crate covers both ends of the wire:
//! * **Server**: [`EventStore`], [`Broadcaster`], [`StatsAggregator`], the WebSocket
//!   [`StreamServer`](server::StreamServer) with backlog replay and the HTTP API.
//! * **Client**: a reconnecting [`StreamClient`] with pause/resume and dedup, the
//!   [`EntryFilter`] pipeline, and a fixed-cadence [`StatsPoller`].

/// Closed activity enumerations and the [`ActivityLogEntry`] record.
pub mod entry;

/// All [`Error`](std::error::Error)s generated in activity-telemetry.
pub mod error;

/// Bounded per-subscriber fan-out.
pub mod broadcast;

/// Bounded retention buffer in front of the [`Broadcaster`].
pub mod store;

/// Rolling-window statistics.
pub mod stats;

/// Order-preserving view filtering.
pub mod filter;

/// Wire frames, commands, envelopes and endpoint paths.
pub mod protocol;

/// Stream endpoint, HTTP API and service wiring.
pub mod server;

/// Stream client, stats poller and HTTP API client.
pub mod client;

/// `tracing` subscriber setup for binaries.
pub mod logging;

pub use broadcast::{Broadcaster, Delivery, Subscription};
pub use client::{
    ActivityApi, ClientStreamState, ConnectionStatus, StatsPoller, StatsPollerConfig,
    StreamClient, StreamClientConfig,
};
pub use entry::{ActivityLogEntry, EntryMetrics, EntryType, Platform, Severity};
pub use error::{TelemetryError, ValidationError};
pub use filter::EntryFilter;
pub use server::{ServerConfig, TelemetryService};
pub use stats::{RollingStats, StatsAggregator};
pub use store::EventStore;
