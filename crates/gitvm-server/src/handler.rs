use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Json, Response};
use gitvm_ledger::{Ledger, LedgerError, SliceOptions};
use gitvm_types::Receipt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

pub const ROOT_HEADER: HeaderName = HeaderName::from_static("x-gitvm-root");
pub const CURSOR_HEADER: HeaderName = HeaderName::from_static("x-gitvm-cursor");
pub const FILE_SIZE_HEADER: HeaderName = HeaderName::from_static("x-gitvm-file-size");

const NDJSON: &str = "application/x-ndjson";

/// Shared handler state: the ledger handle and the limits applied to queries.
#[derive(Clone, Debug)]
pub struct AppState {
    pub ledger: Ledger,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            ledger: Ledger::with_config(&config.ledger_dir, config.ledger.clone()),
            config: Arc::new(config),
        }
    }
}

/// Run a blocking ledger call off the async runtime.
async fn blocking<T, F>(ledger: &Ledger, f: F) -> ServerResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Ledger) -> Result<T, LedgerError> + Send + 'static,
{
    let ledger = ledger.clone();
    tokio::task::spawn_blocking(move || f(&ledger))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .map_err(ServerError::from)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub root: String,
}

/// Current root as `{"root": ...}`, or as a bare line for `Accept: text/plain`.
pub async fn root_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let root = blocking(&state.ledger, Ledger::get_root).await?;
    let wants_text = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/plain"));
    if wants_text {
        Ok(format!("{root}\n").into_response())
    } else {
        Ok(Json(RootResponse { root }).into_response())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

/// The most recent receipts, oldest first.
pub async fn receipts_handler(
    State(state): State<AppState>,
    query: Result<Query<RecentQuery>, QueryRejection>,
) -> ServerResult<Json<Vec<Receipt>>> {
    let Query(query) = query.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let n = state.config.clamp_recent(query.limit);
    let receipts = blocking(&state.ledger, move |ledger| ledger.recent(n)).await?;
    Ok(Json(receipts))
}

/// Raw log lines as NDJSON, with the resume cursor in `X-GitVM-Cursor`.
pub async fn stream_handler(
    State(state): State<AppState>,
    query: Result<Query<SliceOptions>, QueryRejection>,
) -> ServerResult<Response> {
    let Query(mut options) = query.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    options.limit = Some(state.config.clamp_stream(options.limit));

    // Root first: the log is append-only and the root is published after its
    // line, so the advertised root always names a line within `file_size`.
    let (slice, root) = blocking(&state.ledger, move |ledger| {
        let root = ledger.get_root()?;
        Ok((ledger.read_slice(&options)?, root))
    })
    .await?;
    debug!(
        lines = slice.lines.len(),
        next_cursor = slice.next_cursor,
        file_size = slice.file_size,
        "stream page served"
    );

    let mut body = String::with_capacity(slice.lines.iter().map(|l| l.len() + 1).sum());
    for line in &slice.lines {
        body.push_str(line);
        body.push('\n');
    }

    let root = HeaderValue::from_str(&root)
        .map_err(|e| ServerError::Internal(format!("root is not a valid header value: {e}")))?;
    let headers = [
        (CONTENT_TYPE, HeaderValue::from_static(NDJSON)),
        (ROOT_HEADER, root),
        (CURSOR_HEADER, HeaderValue::from(slice.next_cursor)),
        (FILE_SIZE_HEADER, HeaderValue::from(slice.file_size)),
    ];
    Ok((headers, body).into_response())
}
