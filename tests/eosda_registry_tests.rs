// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! EOSDA registry client against a local stand-in server.

use agriguard_fields::models::{FieldMetadata, UploadedFile};
use agriguard_fields::services::{ingest, EosdaRegistry, FieldRegistry, RegistrationError};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

mod common;

#[derive(Clone, Default)]
struct Received {
    bodies: Arc<Mutex<Vec<Value>>>,
}

async fn create_field(
    State(received): State<Received>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if params.get("api_key").map(String::as_str) != Some("test-key") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "bad api key" })),
        );
    }
    received.bodies.lock().unwrap().push(body);
    (StatusCode::OK, Json(json!({ "id": 9876543 })))
}

/// Serve the stand-in API on an ephemeral port and return its base URL.
async fn start_server(received: Received) -> String {
    let app = Router::new()
        .route("/field-management", post(create_field))
        .with_state(received);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn metadata() -> FieldMetadata {
    serde_json::from_value(json!({
        "field_name": "Nyagatare plot 4",
        "farmer_name": "Jean Uwimana"
    }))
    .unwrap()
}

#[tokio::test]
async fn test_register_posts_boundary() {
    let received = Received::default();
    let base_url = start_server(received.clone()).await;
    let registry = EosdaRegistry::new(format!("{}/", base_url), "test-key");

    let ingestion = ingest(&UploadedFile::new("field.kml", common::fixture("field.kml"))).unwrap();
    let field_id = registry
        .register(&ingestion.geometry, &metadata())
        .await
        .unwrap();
    assert_eq!(field_id.0, "9876543");

    let bodies = received.bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    let body = &bodies[0];
    assert_eq!(body["type"], "Feature");
    assert_eq!(body["properties"]["name"], "Nyagatare plot 4");
    assert_eq!(body["properties"]["group"], "Jean Uwimana");
    assert_eq!(body["properties"]["years_data"][0]["crop_type"], "Other");
    // The gate point is not part of the boundary
    assert_eq!(body["geometry"]["type"], "Polygon");
}

#[tokio::test]
async fn test_register_surfaces_rejection() {
    let base_url = start_server(Received::default()).await;
    let registry = EosdaRegistry::new(base_url, "wrong-key");

    let ingestion = ingest(&UploadedFile::new(
        "field.geojson",
        common::fixture("field.geojson"),
    ))
    .unwrap();
    let err = registry
        .register(&ingestion.geometry, &metadata())
        .await
        .unwrap_err();

    match err {
        RegistrationError::Rejected { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("bad api key"));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_register_unreachable_is_transport_error() {
    // Bind and drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let registry = EosdaRegistry::new(format!("http://{}", addr), "test-key");
    let ingestion = ingest(&UploadedFile::new(
        "field.geojson",
        common::fixture("field.geojson"),
    ))
    .unwrap();

    let err = registry
        .register(&ingestion.geometry, &metadata())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrationError::Transport(_)));
}
