use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

use homeset_core::{ErrorKind, HomeError, HomeService, Settings};
use homeset_types::api::{
    DeleteHomeResponse, ErrorResponse, HomeListResponse, SetHomeRequest, SetHomeResponse,
    SetSharedRequest, SetSharedResponse,
};
use homeset_types::models::{HomeName, TeleportOutcome};

use crate::bridge::BridgeHost;
use crate::gateway;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub service: HomeService,
    pub bridge: BridgeHost,
    /// When set, bridge clients must Identify with this token first.
    pub bridge_token: Option<String>,
    /// When set, command routes require `Authorization: Bearer <token>`.
    pub api_token: Option<String>,
    /// Open bridge connections; players are dropped when the last one closes.
    pub bridge_connections: AtomicUsize,
}

impl AppStateInner {
    pub fn new(
        service: HomeService,
        bridge: BridgeHost,
        bridge_token: Option<String>,
        api_token: Option<String>,
    ) -> Self {
        Self {
            service,
            bridge,
            bridge_token,
            api_token,
            bridge_connections: AtomicUsize::new(0),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/users/{user}/homes", get(list_personal))
        .route(
            "/users/{user}/homes/{name}",
            put(set_home).delete(delete_home),
        )
        .route("/users/{user}/homes/{name}/teleport", post(teleport))
        .route("/users/{user}/homes/{name}/shared", put(set_shared))
        .route("/homes/shared", get(list_shared))
        .route("/admin/reload", post(reload))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    // The bridge authenticates with its own Identify handshake.
    let public_routes = Router::new()
        .route("/bridge", get(gateway::bridge_upgrade))
        .route("/health", get(health));

    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Check the bearer token on command routes. Open when no token is configured.
pub async fn require_token(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.api_token.as_deref() else {
        return Ok(next.run(req).await);
    };

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if token != expected {
        warn!(path = %req.uri().path(), "Rejected request with a wrong API token");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

// ── Error mapping ───────────────────────────────────────────────────────

pub struct ApiError(HomeError);

impl From<HomeError> for ApiError {
    fn from(err: HomeError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = match (&err, err.kind()) {
            (HomeError::InvalidName(_), _) => StatusCode::BAD_REQUEST,
            (_, ErrorKind::Persistence) => StatusCode::INTERNAL_SERVER_ERROR,
            (_, ErrorKind::NotFound) => StatusCode::NOT_FOUND,
            (_, ErrorKind::Conflict) => StatusCode::CONFLICT,
            (_, ErrorKind::Cooldown) => StatusCode::TOO_MANY_REQUESTS,
        };
        let remaining_secs = match &err {
            HomeError::CoolingDown { remaining_secs, .. } => Some(*remaining_secs),
            _ => None,
        };

        // Display of Persistence is generic; the cause was logged where it happened.
        let body = ErrorResponse {
            error: err.to_string(),
            remaining_secs,
        };
        (status, Json(body)).into_response()
    }
}

// ── Handlers ────────────────────────────────────────────────────────────

pub async fn list_personal(
    State(state): State<AppState>,
    Path(user): Path<Uuid>,
) -> Result<Json<HomeListResponse>, ApiError> {
    let homes = state.service.request_list_personal(user).await?;
    Ok(Json(HomeListResponse { homes }))
}

pub async fn list_shared(
    State(state): State<AppState>,
) -> Result<Json<HomeListResponse>, ApiError> {
    let homes = state.service.request_list_shared().await?;
    Ok(Json(HomeListResponse { homes }))
}

pub async fn set_home(
    State(state): State<AppState>,
    Path((user, name)): Path<(Uuid, String)>,
    Json(req): Json<SetHomeRequest>,
) -> Result<Json<SetHomeResponse>, ApiError> {
    let outcome = state
        .service
        .request_set_home(user, &name, req.location, req.share)
        .await?;

    Ok(Json(SetHomeResponse {
        home: outcome.home,
        sharing_denied: outcome.sharing_denied,
    }))
}

pub async fn delete_home(
    State(state): State<AppState>,
    Path((user, name)): Path<(Uuid, String)>,
) -> Result<Json<DeleteHomeResponse>, ApiError> {
    let deleted = state.service.request_delete(user, &name).await?;
    Ok(Json(DeleteHomeResponse { deleted }))
}

pub async fn teleport(
    State(state): State<AppState>,
    Path((user, name)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.service.request_teleport(user, &name).await?;
    let status = match outcome {
        TeleportOutcome::Scheduled { .. } => StatusCode::ACCEPTED,
        _ => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}

pub async fn set_shared(
    State(state): State<AppState>,
    Path((user, name)): Path<(Uuid, String)>,
    Json(req): Json<SetSharedRequest>,
) -> Result<Json<SetSharedResponse>, ApiError> {
    let name = HomeName::parse(&name).map_err(HomeError::from)?;
    let outcome = state
        .service
        .request_set_shared(user, name.as_str(), req.shared)
        .await?;

    Ok(Json(SetSharedResponse {
        name,
        shared: outcome.shared,
        sharing_denied: outcome.sharing_denied,
    }))
}

/// Re-read settings from the environment. The share policy is fixed at startup.
pub async fn reload(State(state): State<AppState>) -> Response {
    match Settings::from_env() {
        Ok(settings) => {
            state.service.reload(settings.clone()).await;
            Json(settings_json(&settings)).into_response()
        }
        Err(e) => {
            warn!("Settings reload rejected: {:#}", e);
            let body = ErrorResponse {
                error: format!("{:#}", e),
                remaining_secs: None,
            };
            (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
        }
    }
}

pub async fn health() -> &'static str {
    "ok"
}

fn settings_json(settings: &Settings) -> serde_json::Value {
    serde_json::json!({
        "cooldown_secs": settings.cooldown_secs,
        "teleport_delay_secs": settings.teleport_delay_secs,
        "max_homes": settings.max_homes,
    })
}
