//! HTTP surface of the text-to-CAD pipeline.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use cad_pipeline::{
    ArtifactStore, GenerationStatus, Orchestrator, PipelineError, QuotaSummary,
};
use cad_script::ValidationIssue;
use http::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

mod config;

pub use config::ServerConfig;

pub const DEFAULT_LOG_FILTER: &str = "cad_server=info,cad_pipeline=info,cad_ai=info,tower_http=info";

/// Shortest id the download route will look up.
const MIN_MODEL_ID_LEN: usize = 10;

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    cors_origins: Arc<[String]>,
    admin: AdminPolicy,
}

#[derive(Clone)]
enum AdminPolicy {
    Open,
    Token(Arc<str>),
    Locked,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, config: &ServerConfig) -> Self {
        let admin = match (&config.admin_api_key, config.enable_auth) {
            (Some(key), _) => AdminPolicy::Token(Arc::from(key.as_str())),
            (None, true) => AdminPolicy::Locked,
            (None, false) => AdminPolicy::Open,
        };
        Self {
            orchestrator: Arc::new(orchestrator),
            cors_origins: config.cors_origins.clone().into(),
            admin,
        }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    fn authorize_admin(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let expected = match &self.admin {
            AdminPolicy::Open => return Ok(()),
            AdminPolicy::Locked => {
                return Err(ApiError::Unauthorized(
                    "admin API key is not configured".to_string(),
                ));
            }
            AdminPolicy::Token(key) => key,
        };
        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim);
        match presented {
            Some(token) if token == &**expected => Ok(()),
            Some(_) => Err(ApiError::Unauthorized("invalid admin token".to_string())),
            None => Err(ApiError::Unauthorized(
                "missing bearer token".to_string(),
            )),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let admin = Router::new()
        .route("/users/{user_id}/reset-count", post(reset_user_count))
        .route("/users/{user_id}", delete(delete_user))
        .route("/summary", get(admin_summary))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(health))
        .route("/api/generate", post(generate))
        .route("/api/execute", post(execute))
        .route("/api/validate", post(validate))
        .route("/api/download/{model_id}", get(download))
        .nest("/api/admin", admin)
        .layer(cors_layer(&state.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Initializes the global subscriber; JSON lines when `json` is set.
pub fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };
    if let Err(err) = result {
        eprintln!("tracing subscriber already installed: {err}");
    }
}

/// Periodically drops artifacts older than `max_age`.
pub fn spawn_eviction(
    store: Arc<ArtifactStore>,
    every: Duration,
    max_age: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let evicted = store.evict_older_than(max_age);
            debug!(evicted, remaining = store.len(), "artifact eviction sweep");
        }
    })
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    prompt: String,
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    #[serde(default)]
    code: String,
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValidateRequest {
    #[serde(default)]
    code: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    success: bool,
    model_id: String,
    script: String,
    message: String,
    generation_status: GenerationStatus,
}

#[derive(Debug, Serialize)]
struct ExecuteResponse {
    success: bool,
    model_id: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct ValidateResponse {
    valid: bool,
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct AdminResponse {
    success: bool,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Quota(quota) => ApiError::Forbidden(quota.to_string()),
            PipelineError::Storage(storage) => ApiError::Internal(storage.to_string()),
            client => ApiError::BadRequest(client.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    state.authorize_admin(request.headers())?;
    Ok(next.run(request).await)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn generate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<GenerateResponse>, ApiError> {
    let request: GenerateRequest = parse_json(&body)?;
    let outcome = state
        .orchestrator
        .generate(&request.prompt, request.user_id.as_deref())
        .await?;
    Ok(Json(GenerateResponse {
        success: true,
        model_id: outcome.artifact_id,
        script: outcome.script,
        message: outcome.message,
        generation_status: outcome.status,
    }))
}

async fn execute(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let request: ExecuteRequest = parse_json(&body)?;
    let outcome = state
        .orchestrator
        .execute(&request.code, request.user_id.as_deref())
        .await?;
    Ok(Json(ExecuteResponse {
        success: true,
        model_id: outcome.artifact_id,
        message: outcome.message,
    }))
}

async fn validate(body: Bytes) -> Result<Json<ValidateResponse>, ApiError> {
    let request: ValidateRequest = parse_json(&body)?;
    let (valid, reason) = ValidationIssue::verdict(&request.code);
    Ok(Json(ValidateResponse { valid, reason }))
}

async fn download(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> Result<Response, ApiError> {
    let not_found = || ApiError::NotFound(format!("Model {model_id} not found"));
    if model_id.len() < MIN_MODEL_ID_LEN {
        return Err(not_found());
    }
    let path = state
        .orchestrator
        .store()
        .resolve(&model_id)
        .ok_or_else(not_found)?;
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) if !bytes.is_empty() => bytes,
        Ok(_) => {
            warn!(model_id = %model_id, "refusing to serve empty artifact");
            return Err(not_found());
        }
        Err(err) => {
            warn!(model_id = %model_id, error = %err, "artifact unreadable");
            return Err(not_found());
        }
    };

    Ok((
        [
            (CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"model_{model_id}.stl\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn reset_user_count(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<AdminResponse>, ApiError> {
    if !state.orchestrator.quota().reset(&user_id) {
        return Err(ApiError::NotFound(format!("User {user_id} not found")));
    }
    info!(user_id = %user_id, "reset model count");
    Ok(Json(AdminResponse {
        success: true,
        message: format!("Reset model count for user {user_id}"),
    }))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<AdminResponse>, ApiError> {
    if !state.orchestrator.quota().remove(&user_id) {
        return Err(ApiError::NotFound(format!("User {user_id} not found")));
    }
    info!(user_id = %user_id, "deleted user quota record");
    Ok(Json(AdminResponse {
        success: true,
        message: format!("Deleted user {user_id}"),
    }))
}

async fn admin_summary(State(state): State<AppState>) -> Json<QuotaSummary> {
    Json(state.orchestrator.quota().summary())
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("request body is required".to_string()));
    }

    serde_json::from_slice(body)
        .map_err(|err| ApiError::BadRequest(format!("invalid JSON body: {err}")))
}
