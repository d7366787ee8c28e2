/// HTTP query and command client.
pub mod api;

/// Periodic stats polling.
pub mod poller;

/// Client-owned live view with pause buffer and dedup.
pub mod state;

/// Idle read timeout for the stream transport.
pub mod timeout;

/// Reconnecting activity stream client.
pub mod websocket;

pub use api::ActivityApi;
pub use poller::{StatsPoller, StatsPollerConfig};
pub use state::{ClientStreamState, ConnectionStatus, DEFAULT_MAX_LOGS, Received};
pub use websocket::{StreamClient, StreamClientConfig};
