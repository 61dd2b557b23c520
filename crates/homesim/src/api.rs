use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderName;
use axum::http::StatusCode;
use axum::http::header;
use axum::middleware;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde::Deserialize;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::engine::Engine;
use crate::engine::SimError;
use crate::engine::SimulationState;
use crate::engine::light_id_from_number;
use crate::engine::parse_light_id;
use crate::engine::state::CurrentReadings;
use crate::engine::state::Histories;
use crate::engine::state::LightEvent;

const X_POWERED_BY: HeaderName = HeaderName::from_static("x-powered-by");

/// Shared application state
#[derive(Clone)]
struct AppState {
    engine: Engine,
    version: &'static str,
}

/// A light id as sent by clients, either `"1"` or `1`.
///
/// Any JSON number or string is accepted here; whether it names a light is
/// decided by [`LightIdInput::resolve`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LightIdInput {
    Number(serde_json::Number),
    Text(String),
}

impl LightIdInput {
    pub fn resolve(&self) -> Result<u8, SimError> {
        match self {
            LightIdInput::Number(n) => light_id_from_number(n),
            LightIdInput::Text(s) => parse_light_id(s),
        }
    }
}

/// Request body for POST /update-light
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLightRequest {
    pub light_id: LightIdInput,
    pub state: bool,
}

/// Response for POST /update-light
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLightResponse {
    pub success: bool,
    pub light_id: LightIdInput,
    pub new_state: bool,
    pub history: Vec<LightEvent>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Errors surfaced to HTTP clients
#[derive(Debug)]
enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl From<SimError> for ApiError {
    fn from(e: SimError) -> Self {
        match e {
            SimError::LightNotFound(_) => ApiError::NotFound(e.to_string()),
            SimError::Store(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(detail) => {
                tracing::error!("Request failed: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

/// Handler for GET /
#[tracing::instrument(skip(state))]
async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        "homesim {} running on {}. Routes: GET /current (current readings), \
         GET /history (history), POST /generate (force a tick), \
         POST /update-light (switch a light)",
        state.version, hostname
    )
}

/// Handler for GET /current
#[tracing::instrument(skip(state))]
async fn current(State(state): State<Arc<AppState>>) -> Json<CurrentReadings> {
    tracing::debug!("Handling /current request");
    let snapshot = state.engine.snapshot().await;
    Json(CurrentReadings::from(&snapshot))
}

/// Handler for GET /history
#[tracing::instrument(skip(state))]
async fn history(State(state): State<Arc<AppState>>) -> Json<Histories> {
    tracing::debug!("Handling /history request");
    Json(Histories::from(state.engine.snapshot().await))
}

/// Handler for POST /generate
#[tracing::instrument(skip(state))]
async fn generate(State(state): State<Arc<AppState>>) -> Result<Json<SimulationState>, ApiError> {
    tracing::debug!("Handling /generate request");
    Ok(Json(state.engine.tick().await?))
}

/// Handler for POST /update-light
#[tracing::instrument(skip(state, payload))]
async fn update_light(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UpdateLightRequest>, JsonRejection>,
) -> Result<Json<UpdateLightResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    tracing::debug!("Handling /update-light request: {:?}", request);

    let light_id = request.light_id.resolve()?;
    let history = state.engine.set_light(light_id, request.state).await?;

    Ok(Json(UpdateLightResponse {
        success: true,
        light_id: request.light_id,
        new_state: request.state,
        history,
    }))
}

/// Remove headers that identify the server software
async fn strip_identifying_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.remove(header::SERVER);
    headers.remove(X_POWERED_BY);
    response
}

/// Create the API router with all endpoints
pub fn create_router(engine: Engine) -> Router {
    let state = Arc::new(AppState {
        engine,
        version: env!("CARGO_PKG_VERSION"),
    });

    Router::new()
        .route("/", get(index))
        .route("/current", get(current))
        .route("/history", get(history))
        .route("/generate", post(generate))
        .route("/update-light", post(update_light))
        .layer(middleware::map_response(strip_identifying_headers))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// This function will bind to the specified address and serve the API endpoints.
/// It will run until the provided shutdown signal is triggered.
///
/// # Arguments
/// * `listen` - The IP address to listen on (e.g., "127.0.0.1")
/// * `port` - The port to listen on (e.g., 3000)
/// * `engine` - The simulation engine backing the endpoints
/// * `shutdown_rx` - A oneshot receiver that will trigger graceful shutdown
pub async fn serve(
    listen: &str,
    port: u16,
    engine: Engine,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(engine);

    let addr: SocketAddr = format!("{}:{}", listen, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", listen, port))?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}
