// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Field registration model.

use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Season label pre-filled by the registration form.
pub const DEFAULT_SEASON: &str = "Season B";

/// Identifier assigned by the field registry (e.g. "FLD-4821").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(transparent)]
pub struct FieldId(pub String);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Descriptive data sent alongside a field boundary.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FieldMetadata {
    #[validate(length(min = 1, max = 100))]
    pub field_name: String,
    #[validate(length(min = 1, max = 100))]
    pub farmer_name: String,
    #[serde(default = "default_season")]
    #[validate(length(min = 1, max = 50))]
    pub season: String,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub crop_type: Option<String>,
}

fn default_season() -> String {
    DEFAULT_SEASON.to_string()
}

/// A field accepted by the registry.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RegisteredField {
    pub field_id: FieldId,
    pub area_hectares: f64,
    pub feature_count: usize,
    pub metadata: FieldMetadata,
    pub registered_at: String,
}
