// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Field geometry as it moves through the ingestion pipeline.

use axum::body::Bytes;
use geojson::{Feature, FeatureCollection, Geometry};
use serde::Serialize;

/// A file picked by the user, held only for one ingestion call.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Output of a format decoder, before normalization.
///
/// GeoJSON files may hold any of the three top-level shapes, while KML
/// always decodes to a collection. `Empty` covers blank files and a bare
/// JSON `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedGeometry {
    Empty,
    Feature(Feature),
    Geometry(Geometry),
    FeatureCollection(FeatureCollection),
}

impl From<CanonicalFeatureCollection> for DecodedGeometry {
    fn from(canonical: CanonicalFeatureCollection) -> Self {
        DecodedGeometry::FeatureCollection(canonical.0)
    }
}

/// A feature collection with at least one feature, where every feature
/// carries a geometry.
///
/// Only `services::normalize::normalize` builds one, so holding a value of
/// this type is proof the invariant was checked.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CanonicalFeatureCollection(FeatureCollection);

impl CanonicalFeatureCollection {
    /// Wrap a collection the caller has already validated.
    pub(crate) fn new_unchecked(collection: FeatureCollection) -> Self {
        debug_assert!(!collection.features.is_empty());
        debug_assert!(collection.features.iter().all(|f| f.geometry.is_some()));
        Self(collection)
    }

    pub fn features(&self) -> &[Feature] {
        &self.0.features
    }

    pub fn feature_count(&self) -> usize {
        self.0.features.len()
    }

    pub fn as_collection(&self) -> &FeatureCollection {
        &self.0
    }

    pub fn into_inner(self) -> FeatureCollection {
        self.0
    }
}

/// Area derived from a canonical collection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AreaResult {
    /// Hectares, rounded to two decimals.
    pub area_hectares: f64,
    pub feature_count: usize,
}

/// Bounding box as `[min_lon, min_lat, max_lon, max_lat]`.
pub type Bounds = [f64; 4];
