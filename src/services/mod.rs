// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod area;
pub mod cancellation;
pub mod decode;
pub mod format;
pub mod map_session;
pub mod normalize;
pub mod pipeline;
pub mod present;
pub mod registry;
pub mod session;

pub use cancellation::CancellationToken;
pub use format::{detect, FormatKind};
pub use map_session::{MapSession, OverlayKind};
pub use normalize::normalize;
pub use pipeline::{ingest, IngestError, Ingestion};
pub use registry::{EosdaRegistry, FieldRegistry, RegistrationError, SimulatedRegistry};
pub use session::{IngestSessions, SessionKey};
