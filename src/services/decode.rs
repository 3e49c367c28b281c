// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Format-specific decoders producing `DecodedGeometry`.
//!
//! Decoding is lenient about individual features: a feature whose geometry
//! is missing or unreadable is kept with `geometry: None` and left for the
//! normalizer to drop. Only a document that cannot be read at all is an
//! error.

use crate::models::DecodedGeometry;
use crate::services::format::FormatKind;
use crate::services::pipeline::IngestError;
use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue};
use kml::types::Geometry as KmlGeometry;
use kml::Kml;

/// Decode raw upload bytes with the decoder for `kind`.
pub fn decode(kind: FormatKind, bytes: &[u8]) -> Result<DecodedGeometry, IngestError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| IngestError::MalformedInput(format!("file is not valid UTF-8: {}", e)))?;

    match kind {
        FormatKind::GeoJson => decode_geojson(text),
        FormatKind::Kml => decode_kml(text),
    }
}

// ─── GeoJSON ─────────────────────────────────────────────────

/// Decode GeoJSON text into whichever top-level shape it holds.
pub fn decode_geojson(text: &str) -> Result<DecodedGeometry, IngestError> {
    let text = text.trim_start_matches('\u{feff}');
    if text.trim().is_empty() {
        return Ok(DecodedGeometry::Empty);
    }

    let value: JsonValue = serde_json::from_str(text)
        .map_err(|e| IngestError::MalformedInput(format!("invalid JSON: {}", e)))?;

    decode_geojson_value(value)
}

/// Decode an already-parsed GeoJSON value.
pub fn decode_geojson_value(value: JsonValue) -> Result<DecodedGeometry, IngestError> {
    let object = match value {
        JsonValue::Null => return Ok(DecodedGeometry::Empty),
        JsonValue::Object(object) => object,
        other => {
            return Err(IngestError::MalformedInput(format!(
                "expected a GeoJSON object, found {}",
                json_kind(&other)
            )))
        }
    };

    match object.get("type").and_then(|t| t.as_str()) {
        Some("FeatureCollection") => {
            let features = match object.get("features") {
                Some(JsonValue::Array(items)) => items.iter().map(decode_feature).collect(),
                Some(JsonValue::Null) | None => Vec::new(),
                Some(other) => {
                    return Err(IngestError::MalformedInput(format!(
                        "\"features\" must be an array, found {}",
                        json_kind(other)
                    )))
                }
            };
            Ok(DecodedGeometry::FeatureCollection(FeatureCollection {
                bbox: None,
                features,
                foreign_members: None,
            }))
        }
        Some("Feature") => Ok(DecodedGeometry::Feature(decode_feature(&JsonValue::Object(
            object,
        )))),
        Some(_) => serde_json::from_value::<Geometry>(JsonValue::Object(object))
            .map(DecodedGeometry::Geometry)
            .map_err(|e| IngestError::MalformedInput(format!("invalid GeoJSON geometry: {}", e))),
        None => Err(IngestError::MalformedInput(
            "GeoJSON object has no \"type\" member".to_string(),
        )),
    }
}

/// Read one feature, keeping it even when its geometry is unusable.
fn decode_feature(value: &JsonValue) -> Feature {
    let object = value.as_object();

    let geometry = object
        .and_then(|o| o.get("geometry"))
        .filter(|g| g.get("type").and_then(|t| t.as_str()).is_some())
        .and_then(|g| serde_json::from_value::<Geometry>(g.clone()).ok());

    let properties = object
        .and_then(|o| o.get("properties"))
        .and_then(|p| p.as_object())
        .cloned();

    let id = match object.and_then(|o| o.get("id")) {
        Some(JsonValue::String(s)) => Some(Id::String(s.clone())),
        Some(JsonValue::Number(n)) => Some(Id::Number(n.clone())),
        _ => None,
    };

    Feature {
        bbox: None,
        geometry,
        id,
        properties,
        foreign_members: None,
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

// ─── KML ─────────────────────────────────────────────────────

/// Decode KML text into a feature collection, one feature per placemark.
pub fn decode_kml(text: &str) -> Result<DecodedGeometry, IngestError> {
    let kml: Kml = text
        .parse()
        .map_err(|e: kml::Error| IngestError::MalformedInput(format!("invalid KML: {}", e)))?;

    let mut features = Vec::new();
    collect_features(&kml, &mut features);

    tracing::debug!(features = features.len(), "Decoded KML");
    Ok(DecodedGeometry::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }))
}

/// Walk documents and folders, collecting placemarks and loose geometries.
fn collect_features(kml: &Kml, features: &mut Vec<Feature>) {
    match kml {
        Kml::KmlDocument(doc) => doc
            .elements
            .iter()
            .for_each(|element| collect_features(element, features)),
        Kml::Document { elements, .. } => elements
            .iter()
            .for_each(|element| collect_features(element, features)),
        Kml::Folder(folder) => folder
            .elements
            .iter()
            .for_each(|element| collect_features(element, features)),
        Kml::Placemark(placemark) => {
            let mut properties = JsonObject::new();
            if let Some(name) = &placemark.name {
                properties.insert("name".to_string(), JsonValue::from(name.clone()));
            }
            if let Some(description) = &placemark.description {
                properties.insert(
                    "description".to_string(),
                    JsonValue::from(description.clone()),
                );
            }

            features.push(Feature {
                bbox: None,
                geometry: placemark.geometry.as_ref().and_then(to_geojson),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            });
        }
        Kml::Point(point) => push_loose(features, KmlGeometry::Point(point.clone())),
        Kml::LineString(line) => push_loose(features, KmlGeometry::LineString(line.clone())),
        Kml::LinearRing(ring) => push_loose(features, KmlGeometry::LinearRing(ring.clone())),
        Kml::Polygon(polygon) => push_loose(features, KmlGeometry::Polygon(polygon.clone())),
        Kml::MultiGeometry(multi) => {
            push_loose(features, KmlGeometry::MultiGeometry(multi.clone()))
        }
        _ => {}
    }
}

fn push_loose(features: &mut Vec<Feature>, geometry: KmlGeometry) {
    features.push(Feature {
        bbox: None,
        geometry: to_geojson(&geometry),
        id: None,
        properties: Some(JsonObject::new()),
        foreign_members: None,
    });
}

fn to_geojson(geometry: &KmlGeometry) -> Option<Geometry> {
    to_geo(geometry).map(|g| Geometry::new(geojson::Value::from(&g)))
}

fn to_geo(geometry: &KmlGeometry) -> Option<geo::Geometry<f64>> {
    match geometry {
        KmlGeometry::Point(point) => Some(geo::Point::from(point.clone()).into()),
        KmlGeometry::LineString(line) => Some(geo::LineString::from(line.clone()).into()),
        KmlGeometry::LinearRing(ring) => Some(geo::LineString::from(ring.clone()).into()),
        KmlGeometry::Polygon(polygon) => Some(geo::Polygon::from(polygon.clone()).into()),
        KmlGeometry::MultiGeometry(multi) => Some(geo::Geometry::GeometryCollection(
            geo::GeometryCollection(multi.geometries.iter().filter_map(to_geo).collect()),
        )),
        _ => None,
    }
}
