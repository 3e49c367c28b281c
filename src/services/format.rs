// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Upload format detection from the file name.

use crate::services::pipeline::IngestError;
use std::path::Path;

/// Extensions the upload control accepts.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["geojson", "json", "kml"];

/// Decoder to use for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    GeoJson,
    Kml,
}

impl FormatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatKind::GeoJson => "geojson",
            FormatKind::Kml => "kml",
        }
    }
}

/// Pick a decoder from the file extension (case-insensitive).
pub fn detect(filename: &str) -> Result<FormatKind, IngestError> {
    let extension = Path::new(filename.trim())
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("geojson") | Some("json") => Ok(FormatKind::GeoJson),
        Some("kml") => Ok(FormatKind::Kml),
        Some("kmz") => Err(IngestError::UnsupportedFormat {
            filename: filename.to_string(),
            hint: "KMZ archives are not supported; extract the KML from the archive first"
                .to_string(),
        }),
        _ => Err(IngestError::UnsupportedFormat {
            filename: filename.to_string(),
            hint: format!("accepted extensions: .{}", ACCEPTED_EXTENSIONS.join(", .")),
        }),
    }
}
