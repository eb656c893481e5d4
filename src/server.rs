use crate::constants::SERVICE_NAME;
use crate::feed::FeedService;
use crate::graphql::{create_schema, GraphQLSchema};
use crate::types::CycleReport;
use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    extract::Path,
    http::{Method, StatusCode},
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Extension, Router,
};
use hyper::Server;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Result of `POST /admin/scrape`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub events_stored: usize,
    pub events_deleted: usize,
    pub duplicates_collapsed: usize,
    pub skipped_rows: usize,
    pub error: Option<String>,
}

impl From<&CycleReport> for TriggerResponse {
    fn from(report: &CycleReport) -> Self {
        Self {
            success: true,
            events_stored: report.events_stored(),
            events_deleted: report.deleted,
            duplicates_collapsed: report.duplicates_collapsed,
            skipped_rows: report.rows_skipped(),
            error: None,
        }
    }
}

fn error_body(message: String) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "error": message }))
}

/// Health check endpoint
async fn health(Extension(feed): Extension<Arc<FeedService>>) -> impl IntoResponse {
    match feed.storage().count_events().await {
        Ok(count) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "healthy",
                "service": SERVICE_NAME,
                "version": env!("CARGO_PKG_VERSION"),
                "events_stored": count,
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "unhealthy",
                "service": SERVICE_NAME,
                "version": env!("CARGO_PKG_VERSION"),
                "error": e.to_string(),
            })),
        ),
    }
}

/// Recent window, most recent first
async fn list_events(Extension(feed): Extension<Arc<FeedService>>) -> impl IntoResponse {
    match feed.list_recent().await {
        Ok(recent) => Json(recent).into_response(),
        Err(e) => {
            error!("Failed to read recent events: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("failed to fetch events".to_string()),
            )
                .into_response()
        }
    }
}

async fn get_event(
    Extension(feed): Extension<Arc<FeedService>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match feed.get_event(&id).await {
        Ok(Some(event)) => Json(event).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, error_body(format!("no event {}", id))).into_response(),
        Err(e) => {
            error!("Failed to read event {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("failed to fetch event".to_string()),
            )
                .into_response()
        }
    }
}

/// Runs one scrape cycle on demand
async fn trigger_scrape(Extension(feed): Extension<Arc<FeedService>>) -> impl IntoResponse {
    match feed.trigger().await {
        Ok(report) => (StatusCode::OK, Json(TriggerResponse::from(&report))),
        Err(e) => {
            let status = if e.is_upstream() {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (
                status,
                Json(TriggerResponse {
                    success: false,
                    events_stored: 0,
                    events_deleted: 0,
                    duplicates_collapsed: 0,
                    skipped_rows: 0,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

/// GraphQL handler (supports GET and POST)
async fn graphql_handler(
    Extension(schema): Extension<GraphQLSchema>,
    req: GraphQLRequest,
) -> GraphQLResponse {
    schema.execute(req.into_inner()).await.into()
}

async fn graphiql() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint("/graphql").finish())
}

/// Create the HTTP router with all routes, including GraphQL
pub fn create_server(feed: Arc<FeedService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let schema = create_schema(feed.clone());

    Router::new()
        .route("/health", get(health))
        .route("/api/events", get(list_events))
        .route("/api/events/:id", get(get_event))
        .route("/admin/scrape", post(trigger_scrape))
        .route("/graphql", post(graphql_handler).get(graphql_handler))
        .route("/graphiql", get(graphiql))
        .layer(Extension(schema))
        .layer(Extension(feed))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Runs a scrape cycle every `every` until the returned task is aborted.
pub fn spawn_scheduler(feed: Arc<FeedService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match feed.trigger().await {
                Ok(report) => info!(
                    stored = report.events_stored(),
                    deleted = report.deleted,
                    "Scheduled scrape complete"
                ),
                Err(e) => warn!(kind = e.kind(), "Scheduled scrape failed: {}", e),
            }
        }
    })
}

/// Start the HTTP server on the specified port
pub async fn start_server(
    feed: Arc<FeedService>,
    port: u16,
    refresh_interval: Option<Duration>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let scheduler = refresh_interval.map(|every| {
        info!("Scheduling a scrape every {:?}", every);
        spawn_scheduler(feed.clone(), every)
    });

    let app = create_server(feed);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server running on http://localhost:{}", port);
    info!("Recent events: http://localhost:{}/api/events", port);
    info!("GraphQL:       http://localhost:{}/graphql", port);

    let served = Server::bind(&addr).serve(app.into_make_service()).await;
    if let Some(task) = scheduler {
        task.abort();
    }
    served?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::{FeedError, Result};
    use crate::feed::FeedSettings;
    use crate::pipeline::{CycleSettings, ScrapeCycle};
    use crate::source::DocumentSource;
    use crate::storage::{InMemoryStorage, Storage};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct PageSource(Option<&'static str>);

    struct CountingSource(AtomicUsize);

    #[async_trait]
    impl DocumentSource for CountingSource {
        fn describe(&self) -> String {
            "counting".to_string()
        }

        async fn fetch_document(&self) -> Result<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(PAGE.to_string())
        }
    }

    #[async_trait]
    impl DocumentSource for PageSource {
        fn describe(&self) -> String {
            "page".to_string()
        }

        async fn fetch_document(&self) -> Result<String> {
            self.0
                .map(str::to_string)
                .ok_or(FeedError::UpstreamStatus { status: 503 })
        }
    }

    const PAGE: &str = "<table>\
        <tr><td>01 November 2025 - 04:12 PM</td><td>14.52</td><td>120.98</td><td>010</td><td>2.1</td><td>Batangas</td></tr>\
        <tr><td>01 November 2025 - 04:12 PM</td><td>14.52</td><td>120.98</td><td>010</td><td>2.1</td><td>Batangas</td></tr>\
        <tr><td>01 November 2025 - 03:00 PM</td><td>9.80</td><td>126.10</td><td>020</td><td>abc</td><td>Surigao</td></tr>\
        </table>";

    fn app(page: Option<&'static str>) -> Router {
        create_server(feed_with(Arc::new(PageSource(page))))
    }

    fn feed_with(source: Arc<dyn DocumentSource>) -> Arc<FeedService> {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 11, 1, 9, 0, 0).unwrap(),
        ));
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let cycle = Arc::new(ScrapeCycle::new(
            source,
            storage,
            clock.clone(),
            CycleSettings::default(),
        ));
        Arc::new(FeedService::new(cycle, clock, FeedSettings::default()))
    }

    async fn call(app: Router, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn trigger_reports_counts() {
        let (status, body) = call(app(Some(PAGE)), Method::POST, "/admin/scrape").await;
        assert_eq!(status, StatusCode::OK);
        let resp: TriggerResponse = serde_json::from_value(body).unwrap();
        assert!(resp.success);
        assert_eq!(resp.events_stored, 1);
        assert_eq!(resp.duplicates_collapsed, 1);
        assert_eq!(resp.skipped_rows, 1);
        assert_eq!(resp.error, None);
    }

    #[tokio::test]
    async fn trigger_surfaces_upstream_failure() {
        let (status, body) = call(app(None), Method::POST, "/admin/scrape").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn events_endpoint_serves_even_when_upstream_is_down() {
        let (status, body) = call(app(None), Method::GET, "/api/events").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["events"].as_array().unwrap().len(), 0);
        assert!(body["last_updated"].is_null());
    }

    #[tokio::test]
    async fn events_endpoint_refreshes_and_lists() {
        let app = app(Some(PAGE));
        let (status, body) = call(app.clone(), Method::GET, "/api/events").await;
        assert_eq!(status, StatusCode::OK);
        let events = body["events"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["id"], "2025_11_01T08_12_00_1452_12098");
        assert_eq!(events[0]["occurred_at"], "2025-11-01T08:12:00Z");

        let (status, _) = call(app.clone(), Method::GET, "/api/events/2025_11_01T08_12_00_1452_12098").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(app, Method::GET, "/api/events/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reports_row_count() {
        let (status, body) = call(app(None), Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], SERVICE_NAME);
        assert_eq!(body["events_stored"], 0);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_scrapes_on_every_tick() {
        let source = Arc::new(CountingSource(AtomicUsize::new(0)));
        let feed = feed_with(source.clone());

        // ticks at 0s and 60s
        let task = spawn_scheduler(feed.clone(), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(90)).await;
        task.abort();

        assert_eq!(source.0.load(Ordering::SeqCst), 2);
        assert_eq!(feed.storage().count_events().await.unwrap(), 1);
    }
}
