//! HTTP API for the node service
//!
//! - `GET /ping`
//! - `GET /stats`
//! - `POST /group`, `DELETE /group` with a `{"groupId": ..}` body
//! - `GET /group/:group_id`
//!
//! The target table is chosen by the `node` header; `DELETE` and `POST` honour
//! an optional `timestamp` header.

use crate::common::tracing_middleware::request_tracing_middleware;
use crate::common::{Error, Timestamp};
use crate::node::table::NodeTables;
use crate::node::{NODE_HEADER, TIMESTAMP_HEADER};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard};

/// Randomized transient failures, applied to every `/group` request
#[derive(Debug, Clone, Copy)]
pub struct FaultInjector {
    failure_rate: f64,
}

impl FaultInjector {
    pub fn new(failure_rate: f64) -> Self {
        Self {
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    pub fn disabled() -> Self {
        Self::new(0.0)
    }

    /// Returns the status to fail with, if this request loses the roll
    pub fn roll(&self) -> Option<StatusCode> {
        if self.failure_rate <= 0.0 {
            return None;
        }
        let mut rng = rand::thread_rng();
        if rng.gen::<f64>() < self.failure_rate {
            if rng.gen_bool(0.5) {
                Some(StatusCode::INTERNAL_SERVER_ERROR)
            } else {
                Some(StatusCode::REQUEST_TIMEOUT)
            }
        } else {
            None
        }
    }
}

#[derive(Clone)]
pub struct NodeState {
    pub tables: Arc<Mutex<NodeTables>>,
    pub faults: FaultInjector,
}

impl NodeState {
    pub fn new(tables: NodeTables, faults: FaultInjector) -> Self {
        Self {
            tables: Arc::new(Mutex::new(tables)),
            faults,
        }
    }

    fn tables(&self) -> MutexGuard<'_, NodeTables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// JSON error body, `{"message": .., "status": ..}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self::new(e.to_http_status(), e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = axum::Json(json!({
            "message": self.message,
            "status": self.status.as_u16(),
        }));
        (self.status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct GroupBody {
    #[serde(rename = "groupId")]
    group_id: String,
}

pub fn create_router(state: NodeState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/stats", get(stats))
        .route("/group", axum::routing::post(create_group).delete(delete_group))
        .route("/group/:group_id", get(read_group))
        .layer(axum::middleware::from_fn(request_tracing_middleware))
        .with_state(state)
}

async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "PONG\n")
}

async fn stats(State(state): State<NodeState>) -> impl IntoResponse {
    let stats = state.tables().stats();
    axum::Json(stats)
}

async fn create_group(
    State(state): State<NodeState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    inject_fault(&state)?;
    let node = node_header(&headers)?;
    let timestamp = timestamp_header(&headers)?;
    let body = parse_body(&body)?;

    let mut tables = state.tables();
    let table = tables.table_mut(&node)?;
    if !table.insert(&body.group_id, timestamp) {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Perhaps the object exists.",
        ));
    }
    tracing::info!(node = %node, group_id = %body.group_id, "Created group");
    Ok((StatusCode::CREATED, "CREATED\n").into_response())
}

async fn delete_group(
    State(state): State<NodeState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    inject_fault(&state)?;
    let node = node_header(&headers)?;
    let timestamp = timestamp_header(&headers)?;
    let body = parse_body(&body)?;

    let mut tables = state.tables();
    let table = tables.table_mut(&node)?;
    if !table.remove(&body.group_id, timestamp) {
        let message = match timestamp {
            Some(ts) => format!(
                "No group record found with id '{}' and timestamp '{}'",
                body.group_id, ts
            ),
            None => format!("No group record found with id '{}'", body.group_id),
        };
        return Err(ApiError::new(StatusCode::NOT_FOUND, message));
    }
    tracing::info!(node = %node, group_id = %body.group_id, "Deleted group");
    Ok((StatusCode::OK, "OK\n").into_response())
}

async fn read_group(
    State(state): State<NodeState>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
) -> Result<Response, ApiError> {
    inject_fault(&state)?;
    let node = node_header(&headers)?;

    let tables = state.tables();
    match tables.table(&node)?.get(&group_id) {
        Some(record) => Ok((StatusCode::OK, axum::Json(record)).into_response()),
        None => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("No group record found with id '{}'", group_id),
        )),
    }
}

fn inject_fault(state: &NodeState) -> Result<(), ApiError> {
    match state.faults.roll() {
        Some(status) => Err(ApiError::new(
            status,
            format!("{} due to random behavior", status),
        )),
        None => Ok(()),
    }
}

fn node_header(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(NODE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::NOT_ACCEPTABLE,
                "provide node parameter in request headers",
            )
        })
}

fn timestamp_header(headers: &HeaderMap) -> Result<Option<Timestamp>, ApiError> {
    match headers.get(TIMESTAMP_HEADER) {
        None => Ok(None),
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| Error::InvalidTimestamp("non-ascii header".into()))?;
            Ok(Some(raw.parse()?))
        }
    }
}

fn parse_body(body: &[u8]) -> Result<GroupBody, ApiError> {
    serde_json::from_slice::<GroupBody>(body).map_err(|_| {
        ApiError::new(
            StatusCode::NOT_ACCEPTABLE,
            "Invalid Request, missing groupId in body",
        )
    })
}
