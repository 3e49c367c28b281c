// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Field area in hectares.
//!
//! Areas use the spherical-excess (Chamberlain–Duquette) formula on a sphere
//! of radius 6 378 137 m. That is an estimate for display, not a survey
//! measurement, and only the value rounded to two decimals is kept.

use crate::models::{AreaResult, CanonicalFeatureCollection};
use geo::{ChamberlainDuquetteArea, Geometry, LineString, Polygon};
use geojson::FeatureCollection;
use std::collections::HashSet;

pub const SQUARE_METERS_PER_HECTARE: f64 = 10_000.0;

/// Unrounded area of every polygon ring in the collection, in m².
pub fn area_square_meters(collection: &FeatureCollection) -> f64 {
    collection
        .features
        .iter()
        .filter_map(|f| f.geometry.as_ref())
        .map(|g| match Geometry::<f64>::try_from(g.value.clone()) {
            Ok(geometry) => geometry_area(&geometry),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping geometry that cannot be converted");
                0.0
            }
        })
        .sum()
}

/// Area in hectares, rounded to two decimals.
pub fn compute_area_hectares(collection: &FeatureCollection) -> f64 {
    round_hectares(area_square_meters(collection) / SQUARE_METERS_PER_HECTARE)
}

fn round_hectares(hectares: f64) -> f64 {
    (hectares * 100.0).round() / 100.0
}

fn geometry_area(geometry: &Geometry<f64>) -> f64 {
    match geometry {
        Geometry::Polygon(polygon) => polygon_area(polygon),
        Geometry::MultiPolygon(multi) => multi.iter().map(polygon_area).sum(),
        Geometry::Rect(rect) => polygon_area(&rect.to_polygon()),
        Geometry::Triangle(triangle) => polygon_area(&triangle.to_polygon()),
        Geometry::GeometryCollection(collection) => collection.iter().map(geometry_area).sum(),
        Geometry::Point(_)
        | Geometry::MultiPoint(_)
        | Geometry::Line(_)
        | Geometry::LineString(_)
        | Geometry::MultiLineString(_) => 0.0,
    }
}

/// Degenerate rings (fewer than 3 distinct vertices) count as zero.
fn polygon_area(polygon: &Polygon<f64>) -> f64 {
    let distinct: HashSet<(u64, u64)> = polygon
        .exterior()
        .coords()
        .map(|c| (c.x.to_bits(), c.y.to_bits()))
        .collect();
    if distinct.len() < 3 {
        return 0.0;
    }

    // Holes are subtracted by magnitude so ring winding order does not matter.
    let holes: f64 = polygon.interiors().iter().map(ring_area).sum();
    let area = ring_area(polygon.exterior()) - holes;
    if area.is_finite() {
        area.max(0.0)
    } else {
        0.0
    }
}

fn ring_area(ring: &LineString<f64>) -> f64 {
    Polygon::new(ring.clone(), vec![]).chamberlain_duquette_unsigned_area()
}

impl AreaResult {
    pub fn compute(collection: &CanonicalFeatureCollection) -> Self {
        Self {
            area_hectares: compute_area_hectares(collection.as_collection()),
            feature_count: collection.feature_count(),
        }
    }
}
