use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tether_core::models::{EntityKind, RecordId};
use tether_core::protocol::{RemoveRequest, SnapshotEntry};
use tether_core::util::user_fingerprint;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{extract_bearer_token, AuthenticatedUser, SessionTokenVerifier};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::rate_limit::{EndpointRateLimiter, ProtectedEndpoint, RateLimitMetricsSnapshot};
use crate::reconciler::Reconciler;
use crate::store::ServerStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    verifier: Arc<SessionTokenVerifier>,
    reconciler: Arc<Reconciler>,
    endpoint_rate_limiter: Arc<EndpointRateLimiter>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, store: ServerStore) -> Self {
        Self {
            verifier: Arc::new(SessionTokenVerifier::new(&config)),
            reconciler: Arc::new(Reconciler::new(store, config.sync_grace)),
            endpoint_rate_limiter: Arc::new(EndpointRateLimiter::from_config(config.as_ref())),
            config,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/sync/{entity}", post(sync_entity))
        .route("/{entity}", post(create_record))
        .route("/{entity}/remove", post(remove_records))
        .route("/{entity}/{id}", put(update_record))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v1", protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    rate_limit: RateLimitMetricsSnapshot,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        rate_limit: state.endpoint_rate_limiter.metrics_snapshot(),
    })
}

async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;
    let user = state.verifier.verify_access_token(token)?;
    tracing::debug!(
        user = user_fingerprint(&user.user_id),
        session = user.session_id.as_deref().unwrap_or("none"),
        "Authenticated request"
    );
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

async fn sync_entity(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(entity): Path<String>,
    body: Result<Json<Vec<SnapshotEntry>>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let kind: EntityKind = entity.parse()?;
    let Json(snapshot) = body.map_err(reject_body)?;
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::Sync, &user.user_id)
        .await?;

    let ops = state
        .reconciler
        .reconcile(&user.user_id, kind, &snapshot)
        .await?;
    Ok(Json(ops))
}

async fn create_record(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(entity): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let kind: EntityKind = entity.parse()?;
    let Json(record) = body.map_err(reject_body)?;
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::Mutation, &user.user_id)
        .await?;

    state.reconciler.create(&user.user_id, kind, record).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update_record(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((entity, id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let kind: EntityKind = entity.parse()?;
    let id: RecordId = id
        .parse()
        .map_err(|_| AppError::bad_request(format!("invalid record id `{id}`")))?;
    let Json(record) = body.map_err(reject_body)?;
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::Mutation, &user.user_id)
        .await?;

    state
        .reconciler
        .update(&user.user_id, kind, id, record)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_records(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(entity): Path<String>,
    body: Result<Json<RemoveRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let kind: EntityKind = entity.parse()?;
    let Json(request) = body.map_err(reject_body)?;
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::Mutation, &user.user_id)
        .await?;

    state
        .reconciler
        .remove(&user.user_id, kind, &request.ids)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn reject_body(rejection: JsonRejection) -> AppError {
    AppError::bad_request(rejection.body_text())
}
