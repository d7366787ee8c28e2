//! WebSocket endpoint streaming the activity feed to dashboard subscribers.
//!
//! Every connection first receives a `connected` frame, then the most recent `backlog`
//! entries oldest-first, then live entries as they are appended.

use crate::{
    broadcast::Delivery,
    client::timeout::{DEFAULT_READ_TIMEOUT, TimeoutStream},
    entry::now_millis,
    error::TelemetryError,
    protocol::{ActivityCommand, StreamMessage},
    store::EventStore,
};
use futures::{SinkExt, StreamExt};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinSet,
};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub struct StreamServer {
    listener: TcpListener,
    store: Arc<EventStore>,
    backlog: usize,
    idle_timeout: Duration,
}

impl StreamServer {
    pub async fn bind(
        addr: SocketAddr,
        store: Arc<EventStore>,
        backlog: usize,
    ) -> Result<Self, TelemetryError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|error| TelemetryError::Bind {
                addr: addr.to_string(),
                reason: error.to_string(),
            })?;

        Ok(Self {
            listener,
            store,
            backlog,
            idle_timeout: DEFAULT_READ_TIMEOUT,
        })
    }

    /// Drop a subscriber that sends nothing (not even a ping) for `idle_timeout`
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TelemetryError> {
        self.listener
            .local_addr()
            .map_err(|error| TelemetryError::Socket(error.to_string()))
    }

    /// Accept connections forever
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves, then close every open connection and
    /// wait for each subscription to be released.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        info!("New activity stream connection from {}", peer_addr);
                        connections.spawn(handle_client(
                            stream,
                            peer_addr,
                            Arc::clone(&self.store),
                            self.backlog,
                            self.idle_timeout,
                        ));
                    }
                    Err(error) => {
                        warn!(%error, "Failed to accept activity stream connection");
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        let open = connections.len();
        connections.shutdown().await;
        info!(closed = open, "Activity stream stopped");
    }
}

/// Handle individual subscriber connection. Both directions run inside this future, so
/// dropping it closes the socket and releases the subscription.
async fn handle_client(
    stream: TcpStream,
    peer_addr: SocketAddr,
    store: Arc<EventStore>,
    backlog: usize,
    idle_timeout: Duration,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake failed for {}: {}", peer_addr, e);
            return;
        }
    };

    let (mut ws_sender, ws_receiver) = ws_stream.split();
    let mut ws_receiver = TimeoutStream::new(ws_receiver, idle_timeout);

    // Registered before anything is sent, so the connected frame marks the point after
    // which no appended entry can be missed
    let (replay, mut subscription) = store.subscribe_with_backlog(backlog);
    info!(
        subscriber = subscription.id(),
        replay = replay.len(),
        "Activity subscriber {} ready",
        peer_addr
    );

    let send = async {
        let connected = StreamMessage::Connected {
            timestamp: now_millis(),
        };
        if send_message(&mut ws_sender, &connected).await.is_err() {
            return;
        }

        for data in replay {
            if send_message(&mut ws_sender, &StreamMessage::Log { data })
                .await
                .is_err()
            {
                return;
            }
        }

        while let Some(delivery) = subscription.recv().await {
            match delivery {
                Delivery::Entry(data) => {
                    if send_message(&mut ws_sender, &StreamMessage::Log { data })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Delivery::Lagged(skipped) => {
                    // Slow subscriber, keep going from the oldest entry still queued
                    warn!("Subscriber {} lagged, skipped {} entries", peer_addr, skipped);
                }
            }
        }
    };

    let recv = async {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(Message::Text(text)) => handle_command(&text, &store, peer_addr),
                Ok(Message::Ping(_)) => {
                    debug!("Received ping from {}", peer_addr);
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", peer_addr, e);
                    break;
                }
                _ => {}
            }
        }
        if ws_receiver.timed_out() {
            warn!("Subscriber {} idle for {:?}, closing", peer_addr, idle_timeout);
        }
    };

    tokio::select! {
        _ = send => {
            info!("Send half completed for {}", peer_addr);
        }
        _ = recv => {
            info!("Receive half completed for {}", peer_addr);
        }
    }

    info!("Activity subscriber {} disconnected", peer_addr);
}

async fn send_message<S>(sink: &mut S, message: &StreamMessage) -> Result<(), TelemetryError>
where
    S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let json = serde_json::to_string(message)?;
    sink.send(Message::Text(json.into())).await?;
    Ok(())
}

/// Out-of-band commands a subscriber may send on the stream
fn handle_command(text: &str, store: &EventStore, peer_addr: SocketAddr) {
    match serde_json::from_str::<ActivityCommand>(text) {
        Ok(ActivityCommand::Clear) => {
            info!("Clear requested by subscriber {}", peer_addr);
            store.clear();
        }
        Ok(ActivityCommand::Log { .. }) => {
            debug!("Ignoring log command on stream from {}, use the HTTP API", peer_addr);
        }
        Err(error) => {
            debug!(%error, "Ignoring unrecognised text from {}: {}", peer_addr, text);
        }
    }
}
