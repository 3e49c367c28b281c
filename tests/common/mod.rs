// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use agriguard_fields::config::Config;
use agriguard_fields::middleware::auth::{create_jwt, Role};
use agriguard_fields::models::{CanonicalFeatureCollection, FieldId, FieldMetadata};
use agriguard_fields::routes::create_router;
use agriguard_fields::services::{
    FieldRegistry, IngestSessions, RegistrationError, SimulatedRegistry,
};
use agriguard_fields::AppState;
use futures_util::future::{BoxFuture, FutureExt};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Registry that records what it was asked to register.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingRegistry {
    pub fail: bool,
    pub calls: Mutex<Vec<(usize, String)>>,
}

impl FieldRegistry for RecordingRegistry {
    fn register<'a>(
        &'a self,
        geometry: &'a CanonicalFeatureCollection,
        metadata: &'a FieldMetadata,
    ) -> BoxFuture<'a, Result<FieldId, RegistrationError>> {
        async move {
            if self.fail {
                return Err(RegistrationError::Rejected {
                    status: 503,
                    body: "maintenance".to_string(),
                });
            }
            let mut calls = self.calls.lock().unwrap();
            calls.push((geometry.feature_count(), metadata.field_name.clone()));
            Ok(FieldId(format!("FLD-TEST-{}", calls.len())))
        }
        .boxed()
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Create a test app backed by an instant simulated registry.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with_registry(Arc::new(SimulatedRegistry::new(Duration::ZERO)))
}

/// Create a test app with the given registry.
#[allow(dead_code)]
pub fn create_test_app_with_registry(
    registry: Arc<dyn FieldRegistry>,
) -> (axum::Router, Arc<AppState>) {
    create_test_app_with(Config::test_default(), registry)
}

/// Create a test app with the given config and registry.
#[allow(dead_code)]
pub fn create_test_app_with(
    config: Config,
    registry: Arc<dyn FieldRegistry>,
) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState {
        config,
        registry,
        sessions: IngestSessions::new(),
    });

    (create_router(state.clone()), state)
}

/// Create a session token for `user_id`.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, role: Role, signing_key: &[u8]) -> String {
    create_jwt(user_id, role, signing_key).expect("Failed to create JWT")
}

/// Load a file from `tests/fixtures`.
#[allow(dead_code)]
pub fn fixture(name: &str) -> Vec<u8> {
    let path = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("Failed to read {}: {}", path, e))
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
