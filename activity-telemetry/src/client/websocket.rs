//! Activity stream client
//!
//! Connects to the activity stream endpoint, reconnects after a fixed delay whenever the
//! connection fails or drops, and feeds every received entry into a shared
//! [`ClientStreamState`].
use crate::{
    client::{
        api::ActivityApi,
        state::{ClientStreamState, ConnectionStatus, DEFAULT_MAX_LOGS, Received},
        timeout::{DEFAULT_READ_TIMEOUT, TimeoutStream},
    },
    entry::ActivityLogEntry,
    error::TelemetryError,
    filter::EntryFilter,
    protocol::StreamMessage,
};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::{
    net::TcpStream,
    sync::watch,
    task::JoinHandle,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Stream client configuration
#[derive(Debug, Clone)]
pub struct StreamClientConfig {
    /// Activity stream URL
    pub url: String,
    /// HTTP API base URL, used for the clear command
    pub api_url: String,
    /// Fixed delay between a failed or closed connection and the next attempt
    pub reconnect_delay: Duration,
    /// Ping interval to keep the connection alive
    pub ping_interval: Duration,
    /// Idle period after which the connection is considered dead
    pub read_timeout: Duration,
    /// Cap on the live view
    pub max_logs: usize,
}

impl Default for StreamClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:9002".to_string(),
            api_url: "http://127.0.0.1:9003".to_string(),
            reconnect_delay: Duration::from_secs(5),
            ping_interval: Duration::from_secs(30),
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_logs: DEFAULT_MAX_LOGS,
        }
    }
}

impl StreamClientConfig {
    /// Create a new configuration with custom stream and API URLs
    pub fn new(url: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_url: api_url.into(),
            ..Default::default()
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_max_logs(mut self, max_logs: usize) -> Self {
        self.max_logs = max_logs;
        self
    }
}

/// Running stream client. Dropping it stops the reconnect loop.
#[derive(Debug)]
pub struct StreamClient {
    state: Arc<Mutex<ClientStreamState>>,
    api: ActivityApi,
    status_rx: watch::Receiver<ConnectionStatus>,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl StreamClient {
    /// Spawn the connection loop and return a handle to its state
    pub fn start(config: StreamClientConfig) -> Self {
        let state = Arc::new(Mutex::new(ClientStreamState::new(config.max_logs)));
        let api = ActivityApi::new(config.api_url.clone());
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_stream_loop(
            config,
            Arc::clone(&state),
            status_tx,
            shutdown_rx,
        ));

        Self {
            state,
            api,
            status_rx,
            shutdown_tx,
            task: Some(task),
        }
    }

    /// HTTP client sharing this client's API base URL
    pub fn api(&self) -> &ActivityApi {
        &self.api
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Receiver notified on every connection status change
    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    pub fn pause(&self) {
        self.state.lock().pause();
    }

    pub fn resume(&self) {
        self.state.lock().resume();
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().is_paused()
    }

    pub fn set_max_logs(&self, max_logs: usize) {
        self.state.lock().set_max_logs(max_logs);
    }

    /// Current live view through `filter`, newest first
    pub fn entries(&self, filter: &EntryFilter) -> Vec<ActivityLogEntry> {
        self.state.lock().view(filter)
    }

    /// Number of entries held back while paused
    pub fn paused_len(&self) -> usize {
        self.state.lock().paused_len()
    }

    /// Ask the server to clear its store, then empty the local view regardless of outcome
    pub async fn clear(&self) {
        if let Err(error) = self.api.clear().await {
            warn!(%error, "clear command failed, clearing local view anyway");
        }
        self.state.lock().clear_live();
    }

    /// Stop the reconnect loop and wait for the connection to be released
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                error!(%error, "activity stream task failed");
            }
        }
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

enum ConnectionEnd {
    Shutdown,
    Dropped(TelemetryError),
}

fn set_status(
    state: &Mutex<ClientStreamState>,
    status_tx: &watch::Sender<ConnectionStatus>,
    status: ConnectionStatus,
) {
    state.lock().set_status(status);
    status_tx.send_replace(status);
}

/// Connection loop with a fixed reconnect delay
async fn run_stream_loop(
    config: StreamClientConfig,
    state: Arc<Mutex<ClientStreamState>>,
    status_tx: watch::Sender<ConnectionStatus>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!("Starting activity stream client for {}", config.url);

    loop {
        set_status(&state, &status_tx, ConnectionStatus::Connecting);

        let connected = tokio::select! {
            result = connect_async(config.url.as_str()) => result,
            _ = shutdown_rx.changed() => break,
        };

        match connected {
            Ok((ws_stream, _)) => {
                info!("Connected to activity stream at {}", config.url);
                set_status(&state, &status_tx, ConnectionStatus::Connected);

                let end = consume_connection(ws_stream, &config, &state, &mut shutdown_rx).await;
                set_status(&state, &status_tx, ConnectionStatus::Disconnected);

                match end {
                    ConnectionEnd::Shutdown => break,
                    ConnectionEnd::Dropped(error) => {
                        warn!(%error, "Connection lost, will reconnect...");
                    }
                }
            }
            Err(error) => {
                error!("Failed to connect to {}: {}", config.url, error);
                set_status(&state, &status_tx, ConnectionStatus::Disconnected);
            }
        }

        debug!("Waiting {:?} before reconnecting...", config.reconnect_delay);
        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = shutdown_rx.changed() => break,
        }
    }

    set_status(&state, &status_tx, ConnectionStatus::Disconnected);
    info!("Activity stream client stopped");
}

/// Read frames from one connection until it ends or shutdown is requested
async fn consume_connection(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    config: &StreamClientConfig,
    state: &Mutex<ClientStreamState>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> ConnectionEnd {
    let (mut write, read) = ws_stream.split();
    let mut read = TimeoutStream::new(read, config.read_timeout);

    let mut ping = tokio::time::interval(config.ping_interval);
    // First tick completes immediately
    ping.tick().await;
    let mut frame_errors = 0;

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                let _ = write.send(Message::Close(None)).await;
                return ConnectionEnd::Shutdown;
            }
            _ = ping.tick() => {
                if let Err(error) = write.send(Message::Ping(Vec::new().into())).await {
                    debug!("Failed to send ping, connection likely dead");
                    return ConnectionEnd::Dropped(error.into());
                }
            }
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    frame_errors = 0;
                    handle_frame(&text, state);
                }
                Some(Ok(Message::Close(_))) => {
                    info!("Server closed connection");
                    return ConnectionEnd::Dropped(TelemetryError::Socket(
                        "server sent closing frame".to_string(),
                    ));
                }
                Some(Ok(_)) => {
                    // Ping/Pong/Binary - tungstenite answers pings automatically
                }
                Some(Err(error)) => {
                    let error = TelemetryError::from(error);
                    frame_errors += 1;
                    if should_reconnect(&error, frame_errors) {
                        error!("WebSocket error: {}", error);
                        return ConnectionEnd::Dropped(error);
                    }
                    warn!(%error, frame_errors, "Skipping unreadable frame");
                }
                None if read.timed_out() => {
                    return ConnectionEnd::Dropped(TelemetryError::Socket(format!(
                        "read timeout after {:?}",
                        config.read_timeout
                    )));
                }
                None => {
                    return ConnectionEnd::Dropped(TelemetryError::Socket(
                        "stream closed".to_string(),
                    ));
                }
            },
        }
    }
}

/// Consecutive non-terminal read errors tolerated before reconnecting
const MAX_FRAME_ERRORS: usize = 3;

/// Terminal socket errors end the connection at once, anything else only after
/// `MAX_FRAME_ERRORS` in a row
fn should_reconnect(error: &TelemetryError, consecutive_errors: usize) -> bool {
    error.is_terminal() || consecutive_errors >= MAX_FRAME_ERRORS
}

/// Decode one text frame and route it into the client state
fn handle_frame(text: &str, state: &Mutex<ClientStreamState>) {
    match serde_json::from_str::<StreamMessage>(text) {
        Ok(StreamMessage::Connected { timestamp }) => {
            debug!(server_time = timestamp, "Received connected message");
        }
        Ok(StreamMessage::Log { data }) => {
            if let Err(error) = data.validate() {
                warn!(%error, id = %data.id, "Discarding invalid activity entry");
                return;
            }
            let id = data.id.clone();
            let received = state.lock().receive(data);
            if received == Received::Duplicate {
                debug!(%id, "Dropped re-delivered activity entry");
            }
        }
        Err(error) => {
            error!("Failed to parse message: {}", error);
            debug!("Raw message: {}", text);
        }
    }
}
