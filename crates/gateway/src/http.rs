use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use snowdex_contracts::Document;
use snowdex_store::{DocumentStore, DynamoDocumentStore, DynamoStoreConfig, StoreError};
use tower_http::catch_panic::CatchPanicLayer;

use crate::config::{GatewayConfig, StartupError};
use crate::log_sink::{LogSink, LogglySink, TracingSink};

mod access_log;
mod search;

use self::access_log::AccessLogState;
use self::search::first_query_value;

pub use self::access_log::{AccessLogLine, StatusCapture, StatusRecorder, client_ip};
pub use self::search::{PRODUCTS_ATTRIBUTE, ProductTerm, SearchResultEntry, extract_products};

#[derive(Clone)]
pub struct AppState {
    table_name: String,
    store: Arc<dyn DocumentStore>,
    store_timeout: Duration,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Builds the production router: DynamoDB store plus the configured log sink.
pub async fn router(config: GatewayConfig) -> Result<Router, StartupError> {
    let store = DynamoDocumentStore::connect(&DynamoStoreConfig {
        region: config.aws_region.clone(),
        endpoint_url: config.dynamodb_endpoint.clone(),
        follow_pages: config.scan_follow_pages,
    })
    .await;

    let sink: Arc<dyn LogSink> = match config.loggly.as_ref() {
        Some(loggly) => Arc::new(LogglySink::spawn(loggly).map_err(|err| StartupError {
            code: "ERR_LOG_SINK_UNAVAILABLE",
            message: format!("failed to initialize loggly sink: {}", err),
        })?),
        None => Arc::new(TracingSink),
    };

    Ok(router_with(&config, Arc::new(store), sink))
}

/// Builds the router around an explicit store and log sink.
pub fn router_with(
    config: &GatewayConfig,
    store: Arc<dyn DocumentStore>,
    sink: Arc<dyn LogSink>,
) -> Router {
    let state = AppState {
        table_name: config.table_name.clone(),
        store,
        store_timeout: config.store_timeout(),
    };

    let mut route_labels = vec![
        (config.route("status"), "status"),
        (config.route("search"), "search"),
        (config.route("all"), "all"),
    ];

    let mut routes = Router::new()
        .route(&config.route("status"), get(status))
        .route(&config.route("search"), get(search))
        .route(&config.route("all"), get(all));
    if config.metrics_enabled {
        routes = routes.route("/metrics", get(metrics));
        route_labels.push(("/metrics".to_string(), "metrics"));
    }

    routes
        .fallback(not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(
            AccessLogState::new(sink, route_labels),
            access_log::access_log,
        ))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    #[serde(rename = "Table Name")]
    table_name: String,
    #[serde(rename = "RecordCount")]
    record_count: String,
}

async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let count = call_store(&state, "scan_count", state.store.scan_count(&state.table_name))
        .await
        .map_err(|_| {
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to count items",
            )
        })?;

    Ok(Json(StatusResponse {
        table_name: state.table_name.clone(),
        record_count: count.to_string(),
    }))
}

async fn all(State(state): State<AppState>) -> Result<Json<Vec<Document>>, ApiError> {
    let documents = call_store(&state, "scan_all", state.store.scan_all(&state.table_name))
        .await
        .map_err(|_| json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to scan items"))?;

    Ok(Json(documents))
}

async fn search(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<Vec<SearchResultEntry>>, ApiError> {
    let pairs = query.map(|Query(pairs)| pairs).unwrap_or_default();
    let raw_term = first_query_value(&pairs, "q").unwrap_or_default();

    let Some(term) = ProductTerm::parse(raw_term) else {
        return Err(json_error(StatusCode::BAD_REQUEST, "Invalid Query"));
    };

    let filter = term.filter();
    let documents = call_store(
        &state,
        "scan_filtered",
        state.store.scan_filtered(&state.table_name, &filter),
    )
    .await
    .map_err(|_| json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to scan items"))?;

    Ok(Json(extract_products(&documents, term)))
}

async fn metrics() -> impl IntoResponse {
    match crate::metrics::render() {
        Ok((body, content_type)) => {
            let mut headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(content_type.as_str()) {
                headers.insert(header::CONTENT_TYPE, value);
            }
            (headers, body).into_response()
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "404 Not Found")
}

/// Runs one store call under the configured timeout. Failures are logged here
/// and handed back for the caller to map onto its fixed error body.
async fn call_store<T, F>(
    state: &AppState,
    operation: &'static str,
    call: F,
) -> Result<T, StoreError>
where
    F: std::future::Future<Output = Result<T, StoreError>>,
{
    let result = tokio::time::timeout(state.store_timeout, call)
        .await
        .unwrap_or(Err(StoreError::Timeout));

    match &result {
        Ok(_) => crate::metrics::observe_store_call(operation, "ok"),
        Err(err) => {
            tracing::warn!(
                operation,
                table = %state.table_name,
                error = %err,
                "document store call failed"
            );
            let outcome = if matches!(err, StoreError::Timeout) {
                "timeout"
            } else {
                "error"
            };
            crate::metrics::observe_store_call(operation, outcome);
        }
    }

    result
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: u16,
    message: String,
}

fn json_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: status.as_u16(),
            message: message.into(),
        }),
    )
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| err.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    tracing::error!(detail = %detail, "request handler panicked");

    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}
