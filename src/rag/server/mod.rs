// SPDX-License-Identifier: MIT

//! HTTP API over the engine

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::adk::error::RagError;
use crate::rag::graph::{Engine, StepName, TurnOutcome};
use crate::rag::state::{Citation, Route};

type AppState = Arc<Engine>;

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/conversations/{id}", get(get_conversation))
        .route("/api/conversations/{id}/turns", post(create_turn))
        .route("/api/conversations/{id}/turns/stream", post(stream_turn))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(engine)
}

pub async fn serve(engine: Arc<Engine>, port: u16) -> Result<(), RagError> {
    let app = router(engine);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub message: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub conversation_id: String,
    pub answer: String,
    pub citations: Vec<Citation>,
    pub trace: Vec<StepName>,
    pub route: Option<Route>,
    pub retry_count: u32,
    pub low_confidence: bool,
    pub durable: bool,
}

impl From<TurnOutcome> for TurnResponse {
    fn from(outcome: TurnOutcome) -> Self {
        let state = outcome.state;
        Self {
            conversation_id: outcome.conversation_id,
            answer: state.answer,
            citations: state.citations,
            trace: state.trace,
            route: state.route,
            retry_count: state.retry_count,
            low_confidence: state.low_confidence,
            durable: outcome.durable,
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Engine(RagError),
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        ApiError::Engine(err)
    }
}

/// HTTP status for an engine error; gateway failures map to 502
pub fn status_for(err: &RagError) -> StatusCode {
    match err {
        RagError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        RagError::ModelUnavailable { .. } | RagError::RetrievalUnavailable { .. } => {
            StatusCode::BAD_GATEWAY
        }
        RagError::StepFailure { cause, .. } => status_for(cause),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("{} not found", what), "retry_safe": false })),
            )
                .into_response(),
            ApiError::Engine(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    log::error!("Request failed: {}", err);
                }
                let mut body = json!({
                    "error": err.to_string(),
                    "retry_safe": err.is_retry_safe(),
                });
                if let Some(step) = err.failed_step() {
                    body["step"] = json!(step);
                }
                (status, Json(body)).into_response()
            }
        }
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn get_conversation(
    State(engine): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match engine.load(&id).await? {
        Some(state) => Ok(Json(serde_json::to_value(state).map_err(RagError::from)?)),
        None => Err(ApiError::NotFound(format!("conversation {}", id))),
    }
}

async fn create_turn(
    State(engine): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, ApiError> {
    let user_id = payload
        .user_id
        .unwrap_or_else(|| engine.default_user().to_string());
    let outcome = engine.run_turn_as(&user_id, &id, &payload.message).await?;
    Ok(Json(TurnResponse::from(outcome)))
}

async fn stream_turn(
    State(engine): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<TurnRequest>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let (tx, rx) = mpsc::channel(100);

    tokio::spawn(async move {
        log::info!("Starting streaming turn for conversation {}", id);
        let user_id = payload
            .user_id
            .unwrap_or_else(|| engine.default_user().to_string());
        // the outcome is also delivered as the final event
        if let Err(e) = engine
            .run_turn_stream(&user_id, &id, &payload.message, tx)
            .await
        {
            log::warn!("Streaming turn for {} failed: {}", id, e);
        }
    });

    let stream = ReceiverStream::new(rx).map(|event| Event::default().json_data(event));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(1)))
}
