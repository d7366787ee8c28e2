use crate::{
    broadcast::Broadcaster,
    error::TelemetryError,
    store::EventStore,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info};

/// Environment driven server configuration.
pub mod config;

/// HTTP query and command API.
pub mod http;

/// WebSocket activity stream endpoint.
pub mod stream;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use stream::StreamServer;

/// Running activity telemetry service: one shared [`EventStore`] served over the stream
/// endpoint and the HTTP API.
#[derive(Debug)]
pub struct TelemetryService {
    store: Arc<EventStore>,
    stream_addr: SocketAddr,
    api_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    stream_task: JoinHandle<()>,
    api_task: JoinHandle<()>,
}

impl TelemetryService {
    /// Construct the store and broadcaster from `config`, bind both listeners and start
    /// serving.
    pub async fn start(config: &ServerConfig) -> Result<Self, TelemetryError> {
        let store = Arc::new(EventStore::new(
            config.capacity,
            Broadcaster::new(config.subscriber_buffer),
        ));
        Self::start_with_store(config, store).await
    }

    /// Serve an existing store. Useful when producers live in the same process.
    pub async fn start_with_store(
        config: &ServerConfig,
        store: Arc<EventStore>,
    ) -> Result<Self, TelemetryError> {
        let stream = StreamServer::bind(config.ws_addr, Arc::clone(&store), config.backlog).await?;
        let api = HttpServer::bind(config.http_addr, Arc::clone(&store)).await?;

        let stream_addr = stream.local_addr()?;
        let api_addr = api.local_addr()?;

        info!(
            capacity = store.capacity(),
            backlog = config.backlog,
            subscriber_buffer = config.subscriber_buffer,
            "Activity stream listening on ws://{}",
            stream_addr
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let stream_task = tokio::spawn(stream.run_until(shutdown_signal(shutdown_rx.clone())));
        let api_task = tokio::spawn(async move {
            if let Err(error) = api.run_until(shutdown_signal(shutdown_rx)).await {
                error!(%error, "Activity API stopped");
            }
        });

        Ok(Self {
            store,
            stream_addr,
            api_addr,
            shutdown_tx,
            stream_task,
            api_task,
        })
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    pub fn stream_addr(&self) -> SocketAddr {
        self.stream_addr
    }

    pub fn api_addr(&self) -> SocketAddr {
        self.api_addr
    }

    /// Stop accepting and release the listeners. Returns once every subscriber connection
    /// is closed and its subscription released.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);

        if let Err(error) = self.stream_task.await {
            error!(%error, "activity stream task failed");
        }
        if let Err(error) = self.api_task.await {
            error!(%error, "activity API task failed");
        }

        info!(
            retained = self.store.len(),
            subscribers = self.store.subscriber_count(),
            "Activity telemetry service stopped"
        );
    }
}

/// Resolves once shutdown is requested or the service handle is gone
async fn shutdown_signal(mut shutdown_rx: watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}
