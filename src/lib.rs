// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! AgriGuard Fields: field-boundary ingestion for crop insurance assessment
//!
//! This crate turns uploaded GeoJSON and KML field boundaries into a
//! canonical feature collection with a derived area in hectares, and
//! registers accepted fields with the remote field-management API.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use services::{FieldRegistry, IngestSessions};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub registry: Arc<dyn FieldRegistry>,
    pub sessions: IngestSessions,
}
