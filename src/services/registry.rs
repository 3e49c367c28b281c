// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Field registration with the remote field-management API.
//!
//! `FieldRegistry` is the port the rest of the crate depends on. Production
//! uses `EosdaRegistry`; local runs without credentials use
//! `SimulatedRegistry`, which waits a fixed delay and hands out sequential
//! IDs; tests substitute their own fakes.

use crate::error::AppError;
use crate::models::{
    AreaResult, CanonicalFeatureCollection, FieldId, FieldMetadata, RegisteredField,
};
use chrono::Datelike;
use futures_util::future::{BoxFuture, FutureExt};
use geo::{Geometry, MultiPolygon, Polygon};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use validator::Validate;

/// Remote registry that assigns field IDs.
pub trait FieldRegistry: Send + Sync {
    fn register<'a>(
        &'a self,
        geometry: &'a CanonicalFeatureCollection,
        metadata: &'a FieldMetadata,
    ) -> BoxFuture<'a, Result<FieldId, RegistrationError>>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Shown when the boundary encloses no measurable area.
pub const ZERO_AREA_MESSAGE: &str = "Please upload a valid field geometry file";

/// Validate, measure and register a field. Boundaries whose area rounds
/// to zero hectares (points, lines, degenerate rings) are refused.
pub async fn register_field(
    registry: &dyn FieldRegistry,
    geometry: CanonicalFeatureCollection,
    metadata: FieldMetadata,
) -> Result<RegisteredField, AppError> {
    metadata
        .validate()
        .map_err(|e| AppError::BadRequest(format!("Invalid field metadata: {}", e)))?;

    let area = AreaResult::compute(&geometry);
    if area.area_hectares == 0.0 {
        return Err(AppError::BadRequest(ZERO_AREA_MESSAGE.to_string()));
    }

    let field_id = registry
        .register(&geometry, &metadata)
        .await
        .map_err(|e| {
            tracing::warn!(registry = registry.name(), error = %e, "Field registration failed");
            AppError::RegistrationFailed(e.to_string())
        })?;

    tracing::info!(
        registry = registry.name(),
        field_id = %field_id,
        area_hectares = area.area_hectares,
        "Field registered"
    );

    Ok(RegisteredField {
        field_id,
        area_hectares: area.area_hectares,
        feature_count: area.feature_count,
        metadata,
        registered_at: chrono::Utc::now().to_rfc3339(),
    })
}

// ─── Simulated ───────────────────────────────────────────────

/// Stand-in registry for local development.
pub struct SimulatedRegistry {
    delay: Duration,
    next_id: AtomicU64,
}

impl SimulatedRegistry {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_id: AtomicU64::new(1000),
        }
    }
}

impl FieldRegistry for SimulatedRegistry {
    fn register<'a>(
        &'a self,
        _geometry: &'a CanonicalFeatureCollection,
        _metadata: &'a FieldMetadata,
    ) -> BoxFuture<'a, Result<FieldId, RegistrationError>> {
        async move {
            tokio::time::sleep(self.delay).await;
            let n = self.next_id.fetch_add(1, Ordering::Relaxed);
            Ok(FieldId(format!("FLD-{}", n)))
        }
        .boxed()
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

// ─── EOSDA ───────────────────────────────────────────────────

/// Client for the EOSDA field-management API.
#[derive(Clone)]
pub struct EosdaRegistry {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct CreateFieldResponse {
    id: serde_json::Value,
}

impl EosdaRegistry {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    async fn create_field(
        &self,
        geometry: &CanonicalFeatureCollection,
        metadata: &FieldMetadata,
    ) -> Result<FieldId, RegistrationError> {
        let boundary = field_boundary(geometry).ok_or(RegistrationError::NoPolygon)?;
        let body = serde_json::json!({
            "type": "Feature",
            "properties": {
                "name": metadata.field_name,
                "group": metadata.farmer_name,
                "years_data": [{
                    "crop_type": metadata.crop_type.as_deref().unwrap_or("Other"),
                    "year": chrono::Utc::now().year(),
                }],
            },
            "geometry": boundary,
        });

        let url = format!("{}/field-management", self.base_url);
        let response = self
            .http
            .post(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| RegistrationError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RegistrationError::Rejected { status, body });
        }

        let created: CreateFieldResponse = response
            .json()
            .await
            .map_err(|e| RegistrationError::InvalidResponse(e.to_string()))?;

        match created.id {
            serde_json::Value::Number(n) => Ok(FieldId(n.to_string())),
            serde_json::Value::String(s) if !s.is_empty() => Ok(FieldId(s)),
            other => Err(RegistrationError::InvalidResponse(format!(
                "unexpected field id: {}",
                other
            ))),
        }
    }
}

impl FieldRegistry for EosdaRegistry {
    fn register<'a>(
        &'a self,
        geometry: &'a CanonicalFeatureCollection,
        metadata: &'a FieldMetadata,
    ) -> BoxFuture<'a, Result<FieldId, RegistrationError>> {
        self.create_field(geometry, metadata).boxed()
    }

    fn name(&self) -> &'static str {
        "eosda"
    }
}

/// Merge every polygon in the collection into one boundary geometry.
fn field_boundary(geometry: &CanonicalFeatureCollection) -> Option<geojson::Geometry> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    for value in geometry
        .features()
        .iter()
        .filter_map(|f| f.geometry.as_ref())
    {
        if let Ok(g) = Geometry::<f64>::try_from(value.value.clone()) {
            collect_polygons(g, &mut polygons);
        }
    }

    let boundary = match polygons.len() {
        0 => return None,
        1 => Geometry::Polygon(polygons.remove(0)),
        _ => Geometry::MultiPolygon(MultiPolygon(polygons)),
    };
    Some(geojson::Geometry::new(geojson::Value::from(&boundary)))
}

fn collect_polygons(geometry: Geometry<f64>, polygons: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(p) => polygons.push(p),
        Geometry::MultiPolygon(mp) => polygons.extend(mp.0),
        Geometry::Rect(r) => polygons.push(r.to_polygon()),
        Geometry::Triangle(t) => polygons.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for g in gc.0 {
                collect_polygons(g, polygons);
            }
        }
        _ => {}
    }
}

/// Errors from the field registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Registry request failed: {0}")]
    Transport(String),

    #[error("Registry rejected field (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Unexpected registry response: {0}")]
    InvalidResponse(String),

    #[error("Field geometry has no polygon boundary")]
    NoPolygon,
}
