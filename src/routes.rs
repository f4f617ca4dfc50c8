//! HTTP routes, request/response DTOs, and the error→status mapping.
//!
//! Every pipeline error is caught here, logged with its endpoint, and
//! mapped to one generic client-facing message per class; no stack
//! traces or raw model output ever reach a client.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::panel::{Opinion, Persona};
use crate::server::AppState;
use crate::service::PipelineError;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Request for `/api/generate-personas`.
#[derive(Debug, Deserialize)]
pub struct GeneratePersonasRequest {
    /// Topic to build a panel for.
    pub topic: String,
}

/// Response for `/api/generate-personas`.
#[derive(Debug, Serialize)]
pub struct GeneratePersonasResponse {
    /// The generated panel.
    pub personas: Vec<Persona>,
    /// The sanitized topic the panel was generated for.
    pub prompt: String,
}

/// Request for `/api/confirm-personas`.
#[derive(Debug, Deserialize)]
pub struct ConfirmPersonasRequest {
    /// Topic the panel belongs to.
    pub topic: String,
    /// The confirmed (possibly edited) panel.
    pub personas: Vec<Persona>,
}

/// Response for `/api/confirm-personas`.
#[derive(Debug, Serialize)]
pub struct ConfirmPersonasResponse {
    /// Acknowledgment.
    pub message: String,
    /// The stored panel, ids assigned.
    pub personas: Vec<Persona>,
}

/// Request for `/api/simulate`.
#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
    /// Topic to simulate opinions on.
    pub topic: String,
    /// Panel to poll; the built-in panel is used when absent.
    #[serde(default)]
    pub personas: Option<Vec<Persona>>,
}

/// Request for `/api/update-personas-and-simulate`.
#[derive(Debug, Deserialize)]
pub struct UpdateAndSimulateRequest {
    /// Topic to simulate opinions on.
    pub topic: String,
    /// The edited panel to re-poll.
    pub personas: Vec<Persona>,
}

/// Response for both simulation endpoints.
#[derive(Debug, Serialize)]
pub struct SimulateResponse {
    /// One opinion per panel member.
    pub opinions: Vec<Opinion>,
}

/// Request for `/api/persona-chat`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaChatRequest {
    /// Opaque persona id, echoed for client-side bookkeeping.
    pub persona_id: String,
    /// Name of the persona to talk to.
    pub persona_name: String,
    /// The visitor's message.
    pub user_message: String,
}

/// Response for `/api/persona-chat`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaChatResponse {
    /// The persona's in-character reply.
    pub persona_response: String,
}

/// Response for `/api/health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" when the service answers.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Seconds since the server started.
    pub uptime_seconds: u64,
    /// Live response-cache entries.
    pub cached_entries: usize,
}

/// Uniform error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Client-facing message.
    pub error: String,
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Client-facing error, already reduced to a status and a safe message.
#[derive(Debug)]
pub enum ApiError {
    /// 400 with the violated constraints.
    BadRequest(String),
    /// 429 from the rate limiter.
    TooManyRequests,
    /// 500 with a generic message; detail lives in the logs.
    Internal,
}

impl ApiError {
    /// Map a pipeline error onto an HTTP class, logging the detail that
    /// must not reach the client.
    pub fn from_pipeline(endpoint: &'static str, error: PipelineError) -> Self {
        match error {
            PipelineError::Validation(e) => {
                warn!(endpoint, error = %e, "request rejected");
                Self::BadRequest(e.to_string())
            }
            PipelineError::Provider(e) => {
                error!(endpoint, error = %e, "model call failed");
                Self::Internal
            }
            PipelineError::Parse(e) => {
                error!(endpoint, error = %e, "model output rejected");
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests. Please slow down.".to_owned(),
            ),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "The simulation service hit an internal error. Please retry.".to_owned(),
            ),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// JSON extractor that reports body and deserialization failures as 400
/// instead of axum's default 422, matching the API's error contract.
#[derive(Debug)]
pub struct ApiJson<T>(
    /// The deserialized payload.
    pub T,
);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(bad_json(rejection)),
        }
    }
}

fn bad_json(rejection: JsonRejection) -> ApiError {
    warn!(error = %rejection.body_text(), "malformed request body");
    ApiError::BadRequest(rejection.body_text())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn generate_personas(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<GeneratePersonasRequest>,
) -> Result<Json<GeneratePersonasResponse>, ApiError> {
    let generated = state
        .service
        .generate_personas(&req.topic)
        .await
        .map_err(|e| ApiError::from_pipeline("generate-personas", e))?;
    Ok(Json(GeneratePersonasResponse {
        personas: generated.personas,
        prompt: generated.topic,
    }))
}

async fn confirm_personas(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ConfirmPersonasRequest>,
) -> Result<Json<ConfirmPersonasResponse>, ApiError> {
    let personas = state
        .service
        .confirm_personas(&req.topic, req.personas)
        .await
        .map_err(|e| ApiError::from_pipeline("confirm-personas", e))?;
    Ok(Json(ConfirmPersonasResponse {
        message: "Personas confirmed.".to_owned(),
        personas,
    }))
}

async fn simulate(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SimulateRequest>,
) -> Result<Json<SimulateResponse>, ApiError> {
    let opinions = state
        .service
        .simulate(&req.topic, req.personas)
        .await
        .map_err(|e| ApiError::from_pipeline("simulate", e))?;
    Ok(Json(SimulateResponse { opinions }))
}

async fn update_personas_and_simulate(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<UpdateAndSimulateRequest>,
) -> Result<Json<SimulateResponse>, ApiError> {
    let opinions = state
        .service
        .update_personas_and_simulate(&req.topic, req.personas)
        .await
        .map_err(|e| ApiError::from_pipeline("update-personas-and-simulate", e))?;
    Ok(Json(SimulateResponse { opinions }))
}

async fn persona_chat(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PersonaChatRequest>,
) -> Result<Json<PersonaChatResponse>, ApiError> {
    let persona_response = state
        .service
        .persona_chat(&req.persona_name, &req.user_message)
        .await
        .map_err(|e| ApiError::from_pipeline("persona-chat", e))?;
    Ok(Json(PersonaChatResponse { persona_response }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        cached_entries: state.service.cache().len().await,
    })
}

// ---------------------------------------------------------------------------
// Routers
// ---------------------------------------------------------------------------

/// Rate-limited pipeline routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/generate-personas", post(generate_personas))
        .route("/api/confirm-personas", post(confirm_personas))
        .route("/api/simulate", post(simulate))
        .route(
            "/api/update-personas-and-simulate",
            post(update_personas_and_simulate),
        )
        .route("/api/persona-chat", post(persona_chat))
}

/// Health route, exempt from rate limiting.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}
