// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shapes returned to the dashboard after ingestion.

use super::geometry::{Bounds, CanonicalFeatureCollection};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// What the upload screen shows once a file has been processed.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DisplayState {
    #[cfg_attr(feature = "binding-generation", ts(type = "GeoJSON.FeatureCollection"))]
    pub geometry: CanonicalFeatureCollection,
    pub area_hectares: f64,
    pub feature_count: usize,
    /// Viewport to fit the boundary overlay; `None` when no coordinates exist.
    pub bounds: Option<Bounds>,
    pub message: String,
}

/// Pipeline state for one upload slot.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestState {
    #[default]
    Idle,
    Detecting,
    Normalizing,
    Computing,
    Ready {
        display: DisplayState,
    },
    Failed {
        reason: String,
    },
}

impl IngestState {
    /// Ready and Failed are terminal until the next submission.
    pub fn is_terminal(&self) -> bool {
        matches!(self, IngestState::Ready { .. } | IngestState::Failed { .. })
    }

    pub fn display(&self) -> Option<&DisplayState> {
        match self {
            IngestState::Ready { display } => Some(display),
            _ => None,
        }
    }
}
