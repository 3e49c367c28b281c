// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shape pipeline output for the upload screen and map viewport.

use crate::models::{AreaResult, Bounds, CanonicalFeatureCollection, DisplayState};
use geo::{BoundingRect, Geometry};

/// Build the display state for a processed upload.
pub fn present(collection: &CanonicalFeatureCollection, area: &AreaResult) -> DisplayState {
    DisplayState {
        geometry: collection.clone(),
        area_hectares: area.area_hectares,
        feature_count: area.feature_count,
        bounds: bounds(collection),
        message: format!("Field geometry captured. Area: {:.2} ha", area.area_hectares),
    }
}

/// Bounding box over every feature, or `None` if nothing has coordinates.
pub fn bounds(collection: &CanonicalFeatureCollection) -> Option<Bounds> {
    collection
        .features()
        .iter()
        .filter_map(|f| f.geometry.as_ref())
        .filter_map(|g| Geometry::<f64>::try_from(g.value.clone()).ok())
        .filter_map(|g| g.bounding_rect())
        .map(|rect| [rect.min().x, rect.min().y, rect.max().x, rect.max().y])
        .reduce(|a, b| {
            [
                a[0].min(b[0]),
                a[1].min(b[1]),
                a[2].max(b[2]),
                a[3].max(b[3]),
            ]
        })
}
