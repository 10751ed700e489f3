//! HTTP request handlers for the server.
//!
//! Maps the relationship operations onto JSON endpoints using axum. Every
//! friend endpoint resolves the calling principal from the bearer token
//! before touching the service.

use crate::session::{bearer_token, SessionManager};
use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequestParts, Path, Query, State,
    },
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router as AxumRouter,
};
use quire_domain::traits::{IdentityStore, RequestContext};
use quire_domain::{NewIdentity, PublicProfile, UserId};
use quire_social::{
    require_principal, AnnotatedProfile, ErrorKind, RelationshipService, SocialError,
};
use quire_store::{SqliteStore, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Session manager for JWT token operations
    pub session_manager: Arc<SessionManager>,
    /// Relationship engine
    pub service: Arc<RelationshipService<SqliteStore>>,
    /// Whether `POST /session/establish` is served
    pub allow_id_sessions: bool,
}

/// Registration request
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Name shown to other users
    pub display_name: String,
    /// Optional external profile handle
    #[serde(default)]
    pub external_handle: Option<String>,
}

/// Registration response
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// New identity id
    pub id: String,
    /// Session token for the new identity
    pub token: String,
}

/// Session establishment request
#[derive(Debug, Deserialize)]
pub struct EstablishSessionRequest {
    /// Existing identity id
    pub user_id: String,
}

/// Session establishment response
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    /// JWT session token
    pub token: String,
}

/// Friend request body
#[derive(Debug, Deserialize)]
pub struct FriendRequestBody {
    /// Identity to send the request to
    pub target_id: String,
}

/// Search query parameters
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// Search text (empty browses the directory)
    #[serde(default)]
    pub q: String,
    /// Maximum results
    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

fn default_search_limit() -> usize {
    20
}

/// Success acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct AckResponse {
    /// Always true
    pub ok: bool,
}

impl AckResponse {
    fn ok() -> Json<Self> {
        Json(Self { ok: true })
    }
}

/// Public projection of an identity
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileDto {
    /// Identity id
    pub id: String,
    /// Display name
    pub display_name: String,
    /// External profile handle
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub external_handle: Option<String>,
}

impl From<PublicProfile> for ProfileDto {
    fn from(profile: PublicProfile) -> Self {
        Self {
            id: profile.id.to_string(),
            display_name: profile.display_name,
            external_handle: profile.external_handle,
        }
    }
}

/// Profile annotated with the caller's relationship status
#[derive(Debug, Serialize, Deserialize)]
pub struct AnnotatedProfileDto {
    /// Candidate projection
    #[serde(flatten)]
    pub profile: ProfileDto,
    /// One of friends, request_sent, request_received, none
    pub status: String,
}

impl From<AnnotatedProfile> for AnnotatedProfileDto {
    fn from(annotated: AnnotatedProfile) -> Self {
        Self {
            profile: annotated.profile.into(),
            status: annotated.status.as_str().to_string(),
        }
    }
}

/// Relationship status response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Candidate id
    pub id: String,
    /// One of friends, request_sent, request_received, none
    pub status: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Overall health status
    pub status: String,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Stable error code
    pub code: String,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Relationship or validation error
    Social(SocialError),
    /// Token could not be issued
    Session(crate::session::SessionError),
    /// Endpoint switched off by configuration
    Disabled,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            AppError::Social(e) => {
                let status = match e.kind() {
                    ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
                    ErrorKind::Validation => StatusCode::BAD_REQUEST,
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::StateConflict => StatusCode::CONFLICT,
                    ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string(), e.code())
            }
            AppError::Session(e) => {
                error!(error = %e, "failed to issue session token");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                    "internal",
                )
            }
            AppError::Disabled => (StatusCode::NOT_FOUND, "Not found".to_string(), "not_found"),
        };

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<SocialError> for AppError {
    fn from(e: SocialError) -> Self {
        AppError::Social(e)
    }
}

impl From<crate::session::SessionError> for AppError {
    fn from(e: crate::session::SessionError) -> Self {
        AppError::Session(e)
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::Social(SocialError::Validation(e.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(e: PathRejection) -> Self {
        AppError::Social(SocialError::Validation(e.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self {
        AppError::Social(SocialError::Validation(e.body_text()))
    }
}

fn store_error(operation: &'static str, e: StoreError) -> AppError {
    match e {
        StoreError::InvalidData(msg) => AppError::Social(SocialError::Validation(msg)),
        e => {
            error!(operation, error = %e, "store call failed");
            AppError::Social(SocialError::Internal("store unavailable".to_string()))
        }
    }
}

fn parse_id(raw: &str) -> Result<UserId, AppError> {
    raw.parse::<UserId>()
        .map_err(|e| AppError::Social(SocialError::Validation(e)))
}

/// The authenticated caller
#[derive(Debug, Clone, Copy)]
pub struct Principal(pub UserId);

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let context = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .map(RequestContext::with_token)
            .unwrap_or_default();
        let principal = require_principal(state.session_manager.as_ref(), &context)?;
        Ok(Principal(principal))
    }
}

/// POST /users - Register a new identity and open a session for it
async fn register(
    State(state): State<AppState>,
    request: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let Json(request) = request?;
    let mut identity = NewIdentity::new(request.display_name);
    if let Some(handle) = request.external_handle.filter(|h| !h.trim().is_empty()) {
        identity = identity.with_external_handle(handle);
    }

    let record = state
        .service
        .store()
        .create(identity)
        .await
        .map_err(|e| store_error("register", e))?;
    let token = state.session_manager.generate_token(record.id)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: record.id.to_string(),
            token,
        }),
    ))
}

/// POST /session/establish - Issue a token for an existing identity
///
/// Served only when `allow_id_sessions` is configured.
async fn establish_session(
    State(state): State<AppState>,
    request: Result<Json<EstablishSessionRequest>, JsonRejection>,
) -> Result<Json<SessionResponse>, AppError> {
    if !state.allow_id_sessions {
        return Err(AppError::Disabled);
    }
    let Json(request) = request?;
    let user_id = parse_id(&request.user_id)?;
    let exists = state
        .service
        .store()
        .get(user_id)
        .await
        .map_err(|e| store_error("establish_session", e))?
        .is_some();
    if !exists {
        return Err(SocialError::NotFound(user_id).into());
    }

    let token = state.session_manager.generate_token(user_id)?;
    Ok(Json(SessionResponse { token }))
}

/// POST /friends/requests - Send a friend request
async fn request_connection(
    State(state): State<AppState>,
    Principal(principal): Principal,
    body: Result<Json<FriendRequestBody>, JsonRejection>,
) -> Result<Json<AckResponse>, AppError> {
    let Json(body) = body?;
    let target = parse_id(&body.target_id)?;
    state.service.request_connection(principal, target).await?;
    Ok(AckResponse::ok())
}

/// POST /friends/requests/:id/accept - Accept a pending request
async fn accept_connection(
    State(state): State<AppState>,
    Principal(principal): Principal,
    requester: Result<Path<String>, PathRejection>,
) -> Result<Json<AckResponse>, AppError> {
    let Path(requester) = requester?;
    let requester = parse_id(&requester)?;
    state.service.accept_connection(principal, requester).await?;
    Ok(AckResponse::ok())
}

/// POST /friends/requests/:id/reject - Decline a pending request
async fn reject_connection(
    State(state): State<AppState>,
    Principal(principal): Principal,
    requester: Result<Path<String>, PathRejection>,
) -> Result<Json<AckResponse>, AppError> {
    let Path(requester) = requester?;
    let requester = parse_id(&requester)?;
    state.service.reject_connection(principal, requester).await?;
    Ok(AckResponse::ok())
}

/// DELETE /friends/:id - Remove a friend
async fn remove_connection(
    State(state): State<AppState>,
    Principal(principal): Principal,
    friend: Result<Path<String>, PathRejection>,
) -> Result<Json<AckResponse>, AppError> {
    let Path(friend) = friend?;
    let friend = parse_id(&friend)?;
    state.service.remove_connection(principal, friend).await?;
    Ok(AckResponse::ok())
}

fn profiles(list: Vec<PublicProfile>) -> Json<Vec<ProfileDto>> {
    Json(list.into_iter().map(ProfileDto::from).collect())
}

/// GET /friends
async fn list_friends(
    State(state): State<AppState>,
    Principal(principal): Principal,
) -> Result<Json<Vec<ProfileDto>>, AppError> {
    Ok(profiles(state.service.list_friends(principal).await?))
}

/// GET /friends/requests/incoming
async fn list_incoming(
    State(state): State<AppState>,
    Principal(principal): Principal,
) -> Result<Json<Vec<ProfileDto>>, AppError> {
    Ok(profiles(state.service.list_incoming(principal).await?))
}

/// GET /friends/requests/outgoing
async fn list_outgoing(
    State(state): State<AppState>,
    Principal(principal): Principal,
) -> Result<Json<Vec<ProfileDto>>, AppError> {
    Ok(profiles(state.service.list_outgoing(principal).await?))
}

/// GET /users/search?q=&limit= - Directory search annotated with status
async fn search_users(
    State(state): State<AppState>,
    Principal(principal): Principal,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<Vec<AnnotatedProfileDto>>, AppError> {
    let Query(params) = params?;
    let hits = state
        .service
        .search(principal, &params.q, params.limit)
        .await?;
    Ok(Json(hits.into_iter().map(AnnotatedProfileDto::from).collect()))
}

/// GET /users/:id/status
async fn relationship_status(
    State(state): State<AppState>,
    Principal(principal): Principal,
    candidate: Result<Path<String>, PathRejection>,
) -> Result<Json<StatusResponse>, AppError> {
    let Path(candidate) = candidate?;
    let candidate = parse_id(&candidate)?;
    let status = state.service.status(principal, candidate).await?;
    Ok(Json(StatusResponse {
        id: candidate.to_string(),
        status: status.as_str().to_string(),
    }))
}

/// GET /health
async fn health_check() -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
    })
}

/// Create the axum router with all routes
pub fn create_router(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route("/users", post(register))
        .route("/users/search", get(search_users))
        .route("/users/:id/status", get(relationship_status))
        .route("/session/establish", post(establish_session))
        .route("/friends", get(list_friends))
        .route("/friends/:id", delete(remove_connection))
        .route("/friends/requests", post(request_connection))
        .route("/friends/requests/incoming", get(list_incoming))
        .route("/friends/requests/outgoing", get(list_outgoing))
        .route("/friends/requests/:id/accept", post(accept_connection))
        .route("/friends/requests/:id/reject", post(reject_connection))
        .route("/health", get(health_check))
        .with_state(state)
}
