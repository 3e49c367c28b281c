// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Upload session routes.
//!
//! A session is one review screen: the latest upload's state, its map
//! layers, and the geometry that "Sync & Process" registers.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{DisplayState, FieldMetadata, IngestState, RegisteredField};
use crate::routes::fields::{read_body, UploadQuery, REGISTERING_ROLES};
use crate::services::map_session::{MapView, OverlayKind};
use crate::services::registry::register_field;
use crate::services::session::SessionKey;
use crate::AppState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

const MAX_SESSION_ID_LEN: usize = 64;

/// Session routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/sessions/{id}", get(get_state).delete(delete_session))
        .route("/api/sessions/{id}/upload", put(upload))
        .route("/api/sessions/{id}/reset", post(reset))
        .route("/api/sessions/{id}/map", get(get_map))
        .route("/api/sessions/{id}/register", post(register))
}

fn session_key(user: &AuthUser, id: String) -> Result<SessionKey> {
    let valid = !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if !valid {
        return Err(AppError::BadRequest(
            "Session id must be 1-64 characters of [A-Za-z0-9_-]".to_string(),
        ));
    }
    Ok(SessionKey::new(user.user_id.clone(), id))
}

/// Submit a file to the session, replacing whatever it held.
async fn upload(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Query(params): Query<UploadQuery>,
    body: Body,
) -> Result<Json<DisplayState>> {
    let key = session_key(&user, id)?;

    let ingestion = state
        .sessions
        .submit(
            key,
            &params.filename,
            read_body(body, state.config.max_upload_bytes),
        )
        .await?;

    Ok(Json(ingestion.display()))
}

async fn get_state(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<IngestState>> {
    let key = session_key(&user, id)?;
    Ok(Json(state.sessions.state(&key)))
}

async fn reset(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<IngestState>> {
    let key = session_key(&user, id)?;
    state.sessions.reset(&key);
    Ok(Json(state.sessions.state(&key)))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let key = session_key(&user, id)?;
    if state.sessions.remove(&key) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Session {} not found", key.session)))
    }
}

#[derive(Deserialize)]
struct MapQuery {
    layer: Option<OverlayKind>,
}

/// Map layers for the session's ready geometry.
async fn get_map(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Query(params): Query<MapQuery>,
) -> Result<Json<MapView>> {
    let key = session_key(&user, id)?;
    state
        .sessions
        .map_view(&key, params.layer)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No processed field in session {}", key.session)))
}

/// Register the session's ready geometry.
async fn register(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(metadata): Json<FieldMetadata>,
) -> Result<Json<RegisteredField>> {
    user.require_role(REGISTERING_ROLES)?;
    let key = session_key(&user, id)?;

    let ingestion = state.sessions.ingestion(&key).ok_or_else(|| {
        AppError::BadRequest("Upload a valid field geometry file first".to_string())
    })?;

    let field = register_field(state.registry.as_ref(), ingestion.geometry, metadata).await?;
    Ok(Json(field))
}
