// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Map layer ownership for one field review.
//!
//! A `MapSession` exclusively owns the boundary overlay and the raster
//! overlay handed to the map renderer. Replacing a layer releases the old
//! handle; `dispose` releases everything at a known point.

use crate::models::{Bounds, CanonicalFeatureCollection};
use crate::services::present::bounds;
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};

/// Raster overlays the field map can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    #[default]
    Ndvi,
    Weed,
    Pest,
    Damage,
}

/// One row of a map legend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LegendEntry {
    pub color: &'static str,
    pub label: &'static str,
}

const fn entry(color: &'static str, label: &'static str) -> LegendEntry {
    LegendEntry { color, label }
}

const NDVI_LEGEND: &[LegendEntry] = &[
    entry("hsl(var(--success))", "Healthy"),
    entry("hsl(var(--warning))", "Moderate"),
    entry("hsl(var(--destructive))", "Stress"),
];

const WEED_LEGEND: &[LegendEntry] = &[
    entry("hsl(var(--success))", "Clean"),
    entry("hsl(142 76% 50%)", "Low Weed"),
    entry("hsl(38 92% 50%)", "Moderate Weed"),
    entry("hsl(280 75% 55%)", "High Weed"),
];

const PEST_LEGEND: &[LegendEntry] = &[
    entry("hsl(var(--success))", "Clean"),
    entry("hsl(38 92% 50%)", "Low Pest"),
    entry("hsl(14 85% 58%)", "Moderate Pest"),
    entry("hsl(0 85% 45%)", "High Pest"),
];

const DAMAGE_LEGEND: &[LegendEntry] = &[
    entry("hsl(var(--destructive))", "Affected Area"),
    entry("hsl(var(--success) / 0.3)", "Normal Area"),
];

impl OverlayKind {
    pub fn label(&self) -> &'static str {
        match self {
            OverlayKind::Ndvi => "Plant Health (NDVI)",
            OverlayKind::Weed => "Weed Detection",
            OverlayKind::Pest => "Pest Areas",
            OverlayKind::Damage => "Damage Assessment",
        }
    }

    pub fn legend(&self) -> &'static [LegendEntry] {
        match self {
            OverlayKind::Ndvi => NDVI_LEGEND,
            OverlayKind::Weed => WEED_LEGEND,
            OverlayKind::Pest => PEST_LEGEND,
            OverlayKind::Damage => DAMAGE_LEGEND,
        }
    }
}

/// Opaque handle for a layer owned by a `MapSession`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LayerHandle(u64);

#[derive(Debug)]
struct BoundaryLayer {
    handle: LayerHandle,
    geometry: FeatureCollection,
    bounds: Option<Bounds>,
}

#[derive(Debug)]
struct OverlayLayer {
    handle: LayerHandle,
    kind: OverlayKind,
}

/// Layers currently attached to the map, in draw order.
#[derive(Debug, Clone, Serialize)]
pub struct LayerView {
    pub handle: LayerHandle,
    pub kind: &'static str,
    pub label: &'static str,
}

/// Everything the renderer needs to draw the field map.
#[derive(Debug, Clone, Serialize)]
pub struct MapView {
    pub bounds: Option<Bounds>,
    pub boundary: Option<FeatureCollection>,
    pub layers: Vec<LayerView>,
    pub legend: &'static [LegendEntry],
}

#[derive(Debug, Default)]
pub struct MapSession {
    boundary: Option<BoundaryLayer>,
    overlay: Option<OverlayLayer>,
    next_handle: u64,
    released: usize,
    disposed: bool,
}

impl MapSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw the field boundary, replacing any previous one.
    pub fn set_boundary(
        &mut self,
        geometry: &CanonicalFeatureCollection,
    ) -> Result<LayerHandle, MapSessionError> {
        let handle = self.allocate()?;
        if let Some(old) = self.boundary.replace(BoundaryLayer {
            handle,
            geometry: geometry.as_collection().clone(),
            bounds: bounds(geometry),
        }) {
            self.release(old.handle);
        }
        Ok(handle)
    }

    /// Show a raster overlay, replacing any previous one.
    pub fn set_overlay(&mut self, kind: OverlayKind) -> Result<LayerHandle, MapSessionError> {
        if let Some(current) = &self.overlay {
            if current.kind == kind {
                return Ok(current.handle);
            }
        }

        let handle = self.allocate()?;
        if let Some(old) = self.overlay.replace(OverlayLayer { handle, kind }) {
            self.release(old.handle);
        }
        Ok(handle)
    }

    /// Viewport that fits the boundary overlay.
    pub fn viewport(&self) -> Option<Bounds> {
        self.boundary.as_ref().and_then(|b| b.bounds)
    }

    pub fn view(&self) -> Result<MapView, MapSessionError> {
        if self.disposed {
            return Err(MapSessionError::Disposed);
        }

        let mut layers = Vec::new();
        if let Some(overlay) = &self.overlay {
            layers.push(LayerView {
                handle: overlay.handle,
                kind: "overlay",
                label: overlay.kind.label(),
            });
        }
        if let Some(boundary) = &self.boundary {
            layers.push(LayerView {
                handle: boundary.handle,
                kind: "boundary",
                label: "Field Boundary",
            });
        }

        Ok(MapView {
            bounds: self.viewport(),
            boundary: self.boundary.as_ref().map(|b| b.geometry.clone()),
            layers,
            legend: self.overlay.as_ref().map(|o| o.kind.legend()).unwrap_or(&[]),
        })
    }

    /// Number of handles released so far, including by `dispose`.
    pub fn released(&self) -> usize {
        self.released
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Release every layer handle. Returns how many were released by this call.
    pub fn dispose(&mut self) -> Result<usize, MapSessionError> {
        if self.disposed {
            return Err(MapSessionError::Disposed);
        }

        let before = self.released;
        if let Some(boundary) = self.boundary.take() {
            self.release(boundary.handle);
        }
        if let Some(overlay) = self.overlay.take() {
            self.release(overlay.handle);
        }
        self.disposed = true;
        Ok(self.released - before)
    }

    fn allocate(&mut self) -> Result<LayerHandle, MapSessionError> {
        if self.disposed {
            return Err(MapSessionError::Disposed);
        }
        self.next_handle += 1;
        Ok(LayerHandle(self.next_handle))
    }

    fn release(&mut self, handle: LayerHandle) {
        tracing::trace!(handle = handle.0, "Released map layer");
        self.released += 1;
    }
}

impl Drop for MapSession {
    fn drop(&mut self) {
        if !self.disposed {
            if let Ok(count) = self.dispose() {
                tracing::debug!(released = count, "Map session dropped without dispose");
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MapSessionError {
    #[error("Map session has been disposed")]
    Disposed,
}
