// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stateless field routes: upload preview and registration.

use crate::error::Result;
use crate::middleware::auth::{AuthUser, Role};
use crate::models::{DisplayState, FieldMetadata, RegisteredField};
use crate::services::cancellation::CancellationToken;
use crate::services::decode::decode_geojson_value;
use crate::services::normalize::normalize;
use crate::services::pipeline::{self, IngestError};
use crate::services::registry::register_field;
use crate::AppState;
use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    routing::post,
    Extension, Json, Router,
};
use futures_util::StreamExt;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;

/// Roles allowed to register fields.
pub const REGISTERING_ROLES: &[Role] = &[Role::Assessor, Role::Admin];

/// Field routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/fields", post(create_field))
        .route("/api/fields/preview", post(preview_upload))
}

#[derive(Deserialize)]
pub(crate) struct UploadQuery {
    pub filename: String,
}

/// Read the request body, failing once it grows past `limit` bytes.
pub(crate) fn read_body(
    body: Body,
    limit: usize,
) -> impl Future<Output = std::result::Result<Bytes, IngestError>> {
    async move {
        let mut chunks = body.into_data_stream();
        let mut buf = Vec::new();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| IngestError::UploadRead(e.to_string()))?;
            if buf.len() + chunk.len() > limit {
                return Err(IngestError::TooLarge { limit });
            }
            buf.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(buf))
    }
}

// ─── Preview ─────────────────────────────────────────────────

/// Process an uploaded file and return what the upload screen shows.
async fn preview_upload(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<UploadQuery>,
    body: Body,
) -> Result<Json<DisplayState>> {
    tracing::debug!(user_id = %user.user_id, filename = %params.filename, "Previewing upload");

    let token = CancellationToken::new();
    let ingestion = pipeline::run(
        &params.filename,
        read_body(body, state.config.max_upload_bytes),
        &token,
        |_| {},
    )
    .await?;

    Ok(Json(ingestion.display()))
}

// ─── Registration ────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateFieldRequest {
    /// Any GeoJSON shape; normalized again before registering.
    geometry: serde_json::Value,
    metadata: FieldMetadata,
}

/// Register a field boundary with the field registry.
async fn create_field(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateFieldRequest>,
) -> Result<Json<RegisteredField>> {
    user.require_role(REGISTERING_ROLES)?;

    let geometry = normalize(decode_geojson_value(request.geometry)?)?;

    tracing::info!(
        user_id = %user.user_id,
        field_name = %request.metadata.field_name,
        features = geometry.feature_count(),
        "Registering field"
    );

    let field = register_field(state.registry.as_ref(), geometry, request.metadata).await?;
    Ok(Json(field))
}
