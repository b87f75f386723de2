//! REST API layer for Hood Hive using Axum.
//!
//! HTTP/JSON endpoints over the storage layer:
//! - public reads (project list, project detail, comments),
//! - authenticated writes (submit, delete, comment, vote),
//! - register/login issuing bearer tokens.
//!
//! Handlers validate payload shape before any store access and translate
//! domain errors to status codes; see `error::ApiError` for the mapping.

use axum::{
    extract::{Path, State},
    http::{header, Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{create_jwt, hash_password, validate_jwt, verify_password};
use crate::error::ApiError;
use crate::models::{AuthPayload, Comment, InsertComment, InsertProject, Project, User};
use crate::storage::Storage;

/// Shared app state for REST handlers (Arc-wrapped for concurrency).
#[derive(Clone)]
pub struct AppState {
    storage: Arc<Storage>,
    jwt_secret: Vec<u8>,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// User as exposed over the wire; the stored credential hash stays behind.
#[derive(Serialize)]
pub struct UserResponse {
    pub id: u64,
    pub username: String,
    pub reputation: i64,
    pub avatar: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            reputation: user.reputation,
            avatar: user.avatar,
        }
    }
}

#[derive(Deserialize)]
pub struct VotePayload {
    pub value: i64,
}

async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?;
    let claims = validate_jwt(token, &state.jwt_secret).map_err(|_| ApiError::Unauthorized)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Create the Axum router. The storage client is constructed by the caller
/// and injected here; handlers never reach for globals.
pub fn create_router(storage: Storage, jwt_secret: &str) -> Router {
    let state = Arc::new(AppState {
        storage: Arc::new(storage),
        jwt_secret: jwt_secret.as_bytes().to_vec(),
    });

    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/api/register", post(register_handler))
        .route("/api/login", post(login_handler))
        .route("/api/projects", get(list_projects_handler))
        .route("/api/projects/:id", get(get_project_handler))
        .route("/api/projects/:id/comments", get(list_comments_handler));

    let protected_routes = Router::new()
        .route("/api/user", get(current_user_handler))
        .route("/api/projects", post(create_project_handler))
        .route("/api/projects/:id", delete(delete_project_handler))
        .route("/api/projects/:id/comments", post(create_comment_handler))
        .route("/api/projects/:id/vote", post(vote_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health_handler() -> StatusCode {
    StatusCode::OK
}

// --- Auth ---

async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Credentials>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::Validation(
            "username and password are required".to_string(),
        ));
    }

    let hash =
        hash_password(&payload.password).map_err(|e| ApiError::Internal(e.to_string()))?;
    let user = state.storage.create_user(payload.username.trim(), &hash)?;
    tracing::info!(user_id = user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Credentials>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state
        .storage
        .get_user_by_username(&payload.username)?
        .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&payload.password, &user.password_hash).unwrap_or(false) {
        return Err(ApiError::Unauthorized);
    }

    let token = create_jwt(&user.username, user.id, &state.jwt_secret)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(LoginResponse { token }))
}

async fn current_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .storage
        .get_user(claims.uid)?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(user.into()))
}

// --- Projects ---

async fn list_projects_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(state.storage.get_all_projects()?))
}

async fn get_project_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<Project>, ApiError> {
    let project = state.storage.get_project(id)?.ok_or(ApiError::NotFound)?;
    Ok(Json(project))
}

fn validate_project(insert: &InsertProject) -> Result<(), ApiError> {
    if insert.title.trim().is_empty() {
        return Err(ApiError::Validation("title is required".to_string()));
    }
    if insert.description.trim().is_empty() {
        return Err(ApiError::Validation("description is required".to_string()));
    }
    if insert.category.trim().is_empty() {
        return Err(ApiError::Validation("category is required".to_string()));
    }
    if !(-90.0..=90.0).contains(&insert.location.lat)
        || !(-180.0..=180.0).contains(&insert.location.lng)
    {
        return Err(ApiError::Validation(
            "location is out of range".to_string(),
        ));
    }
    if let Some(area) = &insert.area {
        // A drawn polygon needs at least a triangle and a display color.
        if area.coordinates.len() < 3 {
            return Err(ApiError::Validation(
                "area needs at least 3 vertices".to_string(),
            ));
        }
        if area.color.trim().is_empty() {
            return Err(ApiError::Validation("area color is required".to_string()));
        }
    }
    if insert.donation_requirement.is_some_and(|d| d < 0.0) {
        return Err(ApiError::Validation(
            "donation requirement cannot be negative".to_string(),
        ));
    }
    Ok(())
}

async fn create_project_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Json(payload): Json<InsertProject>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    validate_project(&payload)?;
    let project = state.storage.create_project(payload, claims.uid)?;
    tracing::info!(project_id = project.id, user_id = claims.uid, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

async fn delete_project_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    if !state.storage.delete_project(id, claims.uid)? {
        return Err(ApiError::Forbidden);
    }
    tracing::info!(project_id = id, user_id = claims.uid, "project deleted");
    Ok(StatusCode::OK)
}

// --- Comments ---

async fn list_comments_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    Ok(Json(state.storage.get_project_comments(id)?))
}

async fn create_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(id): Path<u64>,
    Json(payload): Json<InsertComment>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    if payload.content.trim().is_empty() {
        return Err(ApiError::Validation("content is required".to_string()));
    }
    let comment = state.storage.create_comment(payload, id, claims.uid)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

// --- Votes ---

async fn vote_handler(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<AuthPayload>,
    Path(id): Path<u64>,
    Json(payload): Json<VotePayload>,
) -> Result<Json<Project>, ApiError> {
    if payload.value != 1 && payload.value != -1 {
        return Err(ApiError::Validation("value must be -1 or 1".to_string()));
    }
    let project = state.storage.record_vote(id, claims.uid, payload.value)?;
    tracing::info!(
        project_id = id,
        user_id = claims.uid,
        value = payload.value,
        "vote recorded"
    );
    Ok(Json(project))
}
