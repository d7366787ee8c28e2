//! HTTP query and command API.
//!
//! Every response is wrapped in an [`ApiEnvelope`]. Rejected commands and unparsable query
//! strings answer `400` with `success: false` and the reason.

use crate::{
    entry::ActivityLogEntry,
    error::{TelemetryError, ValidationError},
    protocol::{
        ACTIVITY_PATH, ActivityCommand, ApiEnvelope, DEFAULT_RECENT_LIMIT, HEALTH_PATH,
        HealthReport, STATS_PATH,
    },
    stats::{DEFAULT_WINDOW_MS, RollingStats, StatsAggregator},
    store::EventStore,
};
use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct ApiState {
    store: Arc<EventStore>,
    stats: StatsAggregator,
}

#[derive(Debug, Deserialize)]
struct RecentQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct StatsQuery {
    time_range: Option<i64>,
}

/// Build the API router over a shared store
pub fn router(store: Arc<EventStore>) -> Router {
    let state = ApiState {
        stats: StatsAggregator::new(Arc::clone(&store)),
        store,
    };

    Router::new()
        .route(ACTIVITY_PATH, get(recent).post(command))
        .route(STATS_PATH, get(stats))
        .route(HEALTH_PATH, get(health))
        .with_state(state)
}

type ApiResponse<T> = (StatusCode, Json<ApiEnvelope<T>>);

fn bad_request<T>(error: impl std::fmt::Display) -> ApiResponse<T> {
    warn!(%error, "Rejected activity request");
    (
        StatusCode::BAD_REQUEST,
        Json(ApiEnvelope::failure(error.to_string())),
    )
}

async fn recent(
    State(state): State<ApiState>,
    query: Result<Query<RecentQuery>, QueryRejection>,
) -> ApiResponse<Vec<ActivityLogEntry>> {
    match query {
        Ok(Query(query)) => {
            let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
            (StatusCode::OK, Json(ApiEnvelope::ok(state.store.recent(limit))))
        }
        Err(rejection) => bad_request(rejection.body_text()),
    }
}

async fn stats(
    State(state): State<ApiState>,
    query: Result<Query<StatsQuery>, QueryRejection>,
) -> ApiResponse<RollingStats> {
    match query {
        Ok(Query(query)) => {
            let window_ms = query.time_range.unwrap_or(DEFAULT_WINDOW_MS);
            (StatusCode::OK, Json(ApiEnvelope::ok(state.stats.compute(window_ms))))
        }
        Err(rejection) => bad_request(rejection.body_text()),
    }
}

async fn health(State(state): State<ApiState>) -> Json<ApiEnvelope<HealthReport>> {
    Json(ApiEnvelope::ok(HealthReport {
        entries: state.store.len(),
        subscribers: state.store.subscriber_count(),
    }))
}

/// Body is decoded by hand so malformed commands get the envelope, not a framework rejection
async fn command(State(state): State<ApiState>, body: String) -> ApiResponse<()> {
    let result = serde_json::from_str::<ActivityCommand>(&body)
        .map_err(|error| ValidationError::Malformed(error.to_string()))
        .and_then(|command| match command {
            ActivityCommand::Clear => {
                state.store.clear();
                Ok(())
            }
            ActivityCommand::Log { entry } => {
                debug!(id = %entry.id, kind = %entry.kind, "ingesting activity entry");
                state.store.append(entry)
            }
        });

    match result {
        Ok(()) => (StatusCode::OK, Json(ApiEnvelope::ack())),
        Err(error) => bad_request(error),
    }
}

#[derive(Debug)]
pub struct HttpServer {
    listener: TcpListener,
    router: Router,
}

impl HttpServer {
    pub async fn bind(addr: SocketAddr, store: Arc<EventStore>) -> Result<Self, TelemetryError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|error| TelemetryError::Bind {
                addr: addr.to_string(),
                reason: error.to_string(),
            })?;

        Ok(Self {
            listener,
            router: router(store),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TelemetryError> {
        self.listener
            .local_addr()
            .map_err(|error| TelemetryError::Socket(error.to_string()))
    }

    pub async fn run(self) -> Result<(), TelemetryError> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves, then finish in-flight requests and close idle
    /// connections.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), TelemetryError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Activity API listening on http://{}", self.local_addr()?);
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|error| TelemetryError::Socket(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        broadcast::Broadcaster,
        client::ActivityApi,
        entry::{EntryMetrics, EntryType, Platform, Severity},
    };

    async fn serve(store: Arc<EventStore>) -> ActivityApi {
        let server = HttpServer::bind(SocketAddr::from(([127, 0, 0, 1], 0)), store)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        ActivityApi::new(format!("http://{addr}"))
    }

    fn entry(id: &str, severity: Severity) -> ActivityLogEntry {
        let mut entry = ActivityLogEntry::new(
            EntryType::SymbolDetection,
            Platform::Twitter,
            "twitter-scanner",
            "$JUP mentioned",
            severity,
        )
        .with_symbols(["JUP"])
        .with_duration_ms(40);
        entry.id = id.to_string();
        entry
    }

    #[tokio::test]
    async fn test_append_recent_stats_clear() {
        let store = Arc::new(EventStore::new(10, Broadcaster::default()));
        let api = serve(Arc::clone(&store)).await;

        api.append(entry("a", Severity::Info)).await.unwrap();
        api.append(entry("b", Severity::Error)).await.unwrap();
        api.append(entry("c", Severity::Info)).await.unwrap();

        let recent = api.recent(2).await.unwrap();
        let ids = recent.iter().map(|entry| entry.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["c", "b"]);

        let stats = api.stats(60_000).await.unwrap();
        assert_eq!(stats.total_logs, 3);
        assert_eq!(stats.total_symbols, 3);
        assert_eq!(stats.unique_symbols, 1);
        assert_eq!(stats.avg_duration_ms, 40.0);
        assert!((stats.error_rate - 1.0 / 3.0).abs() < 1e-9);

        assert_eq!(
            api.health().await.unwrap(),
            HealthReport {
                entries: 3,
                subscribers: 0
            }
        );

        api.clear().await.unwrap();
        assert!(api.recent(10).await.unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_entries_rejected() {
        let store = Arc::new(EventStore::default());
        let api = serve(Arc::clone(&store)).await;

        let mut empty_id = entry("x", Severity::Info);
        empty_id.id.clear();
        assert!(matches!(api.append(empty_id).await, Err(TelemetryError::Validation(_))));

        let non_finite = entry("y", Severity::Info).with_metrics(EntryMetrics {
            sentiment: Some(f64::NAN),
            ..Default::default()
        });
        assert!(matches!(
            api.append(non_finite).await,
            Err(TelemetryError::Validation(ValidationError::NonFiniteMetric(_)))
        ));

        // Bypassing the client check still cannot get an empty id past the server
        let url = format!("{}{}", api.base_url(), ACTIVITY_PATH);
        let mut empty_id = entry("x", Severity::Info);
        empty_id.id.clear();
        let response = reqwest::Client::new()
            .post(&url)
            .json(&ActivityCommand::Log { entry: empty_id })
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_query_is_enveloped_bad_request() {
        let api = serve(Arc::new(EventStore::default())).await;
        let base = api.base_url().to_string();

        struct TestCase {
            path: String,
        }

        let cases = vec![
            // TC0: non-numeric limit
            TestCase {
                path: format!("{ACTIVITY_PATH}?limit=abc"),
            },
            // TC1: negative limit
            TestCase {
                path: format!("{ACTIVITY_PATH}?limit=-1"),
            },
            // TC2: non-numeric window
            TestCase {
                path: format!("{STATS_PATH}?time_range=x"),
            },
        ];

        for (index, test) in cases.into_iter().enumerate() {
            let response = reqwest::get(format!("{base}{}", test.path)).await.unwrap();
            assert_eq!(response.status().as_u16(), 400, "TC{} failed", index);

            let envelope = response.json::<serde_json::Value>().await.unwrap();
            assert_eq!(envelope["success"], false, "TC{} failed", index);
            assert!(envelope["error"].is_string(), "TC{} failed", index);
        }
    }

    #[tokio::test]
    async fn test_malformed_command_is_bad_request() {
        let store = Arc::new(EventStore::default());
        let api = serve(store).await;
        let url = format!("{}{}", api.base_url(), ACTIVITY_PATH);

        let response = reqwest::Client::new()
            .post(&url)
            .body(r#"{"action":"log","entry":{"id":"z","type":"moon_alert"}}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);

        let envelope = response.json::<ApiEnvelope<()>>().await.unwrap();
        assert!(!envelope.success);
        assert!(envelope.error.is_some());
    }

    #[tokio::test]
    async fn test_query_defaults() {
        let store = Arc::new(EventStore::default());
        for index in 0..(DEFAULT_RECENT_LIMIT + 5) {
            store
                .append(entry(&format!("e{index}"), Severity::Info))
                .unwrap();
        }
        let api = serve(store).await;
        let base = api.base_url().to_string();

        let recent = reqwest::get(format!("{base}{ACTIVITY_PATH}"))
            .await
            .unwrap()
            .json::<ApiEnvelope<Vec<ActivityLogEntry>>>()
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(recent.len(), DEFAULT_RECENT_LIMIT);

        let stats = reqwest::get(format!("{base}{STATS_PATH}"))
            .await
            .unwrap()
            .json::<ApiEnvelope<RollingStats>>()
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(stats.window_ms, DEFAULT_WINDOW_MS);
    }
}
