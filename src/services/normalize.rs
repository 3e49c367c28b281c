// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reconcile decoded GeoJSON shapes into one canonical collection.

use crate::models::{CanonicalFeatureCollection, DecodedGeometry};
use crate::services::pipeline::IngestError;
use geojson::{Feature, FeatureCollection, JsonObject};

/// Coerce any decoded shape into a non-empty feature collection whose
/// features all carry a geometry.
pub fn normalize(decoded: DecodedGeometry) -> Result<CanonicalFeatureCollection, IngestError> {
    let collection = match decoded {
        DecodedGeometry::Empty => return Err(IngestError::NoValidGeometry),
        DecodedGeometry::Feature(feature) => single(feature),
        DecodedGeometry::FeatureCollection(collection) => collection,
        DecodedGeometry::Geometry(geometry) => single(Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: Some(JsonObject::new()),
            foreign_members: None,
        }),
    };

    let total = collection.features.len();
    let features: Vec<Feature> = collection
        .features
        .into_iter()
        .filter(|f| f.geometry.is_some())
        .collect();

    if features.len() < total {
        tracing::debug!(
            dropped = total - features.len(),
            kept = features.len(),
            "Dropped features without geometry"
        );
    }

    if features.is_empty() {
        return Err(IngestError::NoValidGeometry);
    }

    Ok(CanonicalFeatureCollection::new_unchecked(FeatureCollection {
        bbox: collection.bbox,
        features,
        foreign_members: collection.foreign_members,
    }))
}

fn single(feature: Feature) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: vec![feature],
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::decode::decode_geojson;
    use geojson::{Geometry, Value};

    fn square() -> Geometry {
        Geometry::new(Value::Polygon(vec![vec![
            vec![30.0, -1.0],
            vec![30.01, -1.0],
            vec![30.01, -1.01],
            vec![30.0, -1.01],
            vec![30.0, -1.0],
        ]]))
    }

    fn feature(geometry: Option<Geometry>) -> Feature {
        Feature {
            bbox: None,
            geometry,
            id: None,
            properties: None,
            foreign_members: None,
        }
    }

    #[test]
    fn test_empty_fails() {
        assert!(matches!(
            normalize(DecodedGeometry::Empty),
            Err(IngestError::NoValidGeometry)
        ));
    }

    #[test]
    fn test_feature_is_wrapped() {
        let fc = normalize(DecodedGeometry::Feature(feature(Some(square())))).unwrap();
        assert_eq!(fc.feature_count(), 1);
        assert_eq!(fc.features()[0].geometry, Some(square()));
    }

    #[test]
    fn test_bare_geometry_gets_empty_properties() {
        let fc = normalize(DecodedGeometry::Geometry(square())).unwrap();
        assert_eq!(fc.feature_count(), 1);
        assert_eq!(fc.features()[0].properties, Some(JsonObject::new()));
    }

    #[test]
    fn test_feature_without_geometry_fails() {
        assert!(matches!(
            normalize(DecodedGeometry::Feature(feature(None))),
            Err(IngestError::NoValidGeometry)
        ));
    }

    #[test]
    fn test_mixed_collection_keeps_only_geometries() {
        let decoded = DecodedGeometry::FeatureCollection(FeatureCollection {
            bbox: None,
            features: vec![
                feature(None),
                feature(Some(square())),
                feature(None),
                feature(Some(Geometry::new(Value::Point(vec![30.0, -1.0])))),
            ],
            foreign_members: None,
        });

        let fc = normalize(decoded).unwrap();
        assert_eq!(fc.feature_count(), 2);
        assert!(fc.features().iter().all(|f| f.geometry.is_some()));
    }

    #[test]
    fn test_malformed_features_never_survive() {
        let text = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": null},
            {"type": "Feature", "geometry": {"type": "Polygon"}},
            {"type": "Feature", "geometry": {"coordinates": [[0, 0], [1, 1]]}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1, 2]}}
        ]}"#;

        let fc = normalize(decode_geojson(text).unwrap()).unwrap();
        assert_eq!(fc.feature_count(), 1);
        assert!(fc.features().iter().all(|f| f.geometry.is_some()));
    }

    #[test]
    fn test_all_invalid_collection_fails() {
        let text = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": null}
        ]}"#;
        assert!(matches!(
            normalize(decode_geojson(text).unwrap()),
            Err(IngestError::NoValidGeometry)
        ));

        let empty = r#"{"type": "FeatureCollection", "features": []}"#;
        assert!(matches!(
            normalize(decode_geojson(empty).unwrap()),
            Err(IngestError::NoValidGeometry)
        ));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = vec![
            DecodedGeometry::Geometry(square()),
            DecodedGeometry::Feature(feature(Some(square()))),
            DecodedGeometry::FeatureCollection(FeatureCollection {
                bbox: None,
                features: vec![feature(Some(square())), feature(None)],
                foreign_members: None,
            }),
        ];

        for input in inputs {
            let once = normalize(input).unwrap();
            let twice = normalize(DecodedGeometry::from(once.clone())).unwrap();
            assert_eq!(once, twice);
        }
    }
}
