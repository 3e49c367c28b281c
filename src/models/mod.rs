// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod display;
pub mod field;
pub mod geometry;

pub use display::{DisplayState, IngestState};
pub use field::{FieldId, FieldMetadata, RegisteredField};
pub use geometry::{AreaResult, Bounds, CanonicalFeatureCollection, DecodedGeometry, UploadedFile};
