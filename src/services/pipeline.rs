// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Geometry ingestion pipeline: detect → decode/normalize → area → present.
//!
//! Stages run strictly in order with no backtracking. Decoding belongs to
//! the detecting stage, so unreadable input fails before normalization. The
//! only await point is reading the upload body; everything after it is
//! synchronous.

use crate::models::{
    AreaResult, CanonicalFeatureCollection, DisplayState, IngestState, UploadedFile,
};
use crate::services::cancellation::CancellationToken;
use crate::services::decode::decode;
use crate::services::format::{detect, FormatKind};
use crate::services::normalize::normalize;
use crate::services::present::present;
use axum::body::Bytes;
use std::future::Future;

/// Successful pipeline output.
#[derive(Debug, Clone)]
pub struct Ingestion {
    pub format: FormatKind,
    pub geometry: CanonicalFeatureCollection,
    pub area: AreaResult,
}

impl Ingestion {
    pub fn display(&self) -> DisplayState {
        present(&self.geometry, &self.area)
    }
}

/// Run the pipeline over a file already in memory.
pub fn ingest(file: &UploadedFile) -> Result<Ingestion, IngestError> {
    let format = detect(&file.filename)?;
    process(format, &file.bytes, &mut |_| {})
}

/// Run the pipeline, awaiting `read` for the file bytes and reporting every
/// state transition to `observer`.
///
/// Detection happens before `read` is polled, so an unsupported file name
/// fails without touching the body. If `token` is cancelled while the read
/// is pending, the run stops with `IngestError::Superseded` and reports
/// nothing further.
pub async fn run<R, F>(
    filename: &str,
    read: R,
    token: &CancellationToken,
    mut observer: F,
) -> Result<Ingestion, IngestError>
where
    R: Future<Output = Result<Bytes, IngestError>>,
    F: FnMut(&IngestState),
{
    observer(&IngestState::Detecting);
    let outcome = stages(filename, read, token, &mut observer).await;

    match &outcome {
        Ok(ingestion) => {
            tracing::info!(
                filename,
                format = ingestion.format.as_str(),
                features = ingestion.area.feature_count,
                area_hectares = ingestion.area.area_hectares,
                "Field geometry ingested"
            );
            observer(&IngestState::Ready {
                display: ingestion.display(),
            });
        }
        Err(IngestError::Superseded) => {
            tracing::debug!(filename, "Upload superseded by a newer submission");
        }
        Err(e) => {
            tracing::warn!(filename, error = %e, "Field geometry ingestion failed");
            observer(&IngestState::Failed {
                reason: e.to_string(),
            });
        }
    }

    outcome
}

async fn stages<R, F>(
    filename: &str,
    read: R,
    token: &CancellationToken,
    observer: &mut F,
) -> Result<Ingestion, IngestError>
where
    R: Future<Output = Result<Bytes, IngestError>>,
    F: FnMut(&IngestState),
{
    let format = detect(filename)?;
    tracing::debug!(filename, format = format.as_str(), "Detected upload format");

    let bytes = read.await?;
    if token.is_cancelled() {
        return Err(IngestError::Superseded);
    }

    process(format, &bytes, observer)
}

fn process<F>(format: FormatKind, bytes: &[u8], observer: &mut F) -> Result<Ingestion, IngestError>
where
    F: FnMut(&IngestState),
{
    let decoded = decode(format, bytes)?;

    observer(&IngestState::Normalizing);
    let geometry = normalize(decoded)?;

    observer(&IngestState::Computing);
    let area = AreaResult::compute(&geometry);

    Ok(Ingestion {
        format,
        geometry,
        area,
    })
}

/// Errors from geometry ingestion. All are terminal for the upload.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Unsupported file format for {filename:?}: {hint}")]
    UnsupportedFormat { filename: String, hint: String },

    #[error("No valid geometry found in file")]
    NoValidGeometry,

    #[error("Could not read file: {0}")]
    MalformedInput(String),

    #[error("Failed to read upload: {0}")]
    UploadRead(String),

    #[error("File is larger than the {limit}-byte upload limit")]
    TooLarge { limit: usize },

    #[error("Upload was superseded by a newer file")]
    Superseded,
}
