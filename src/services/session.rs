// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user upload slots.
//!
//! Each slot holds the latest pipeline state for one review session. A new
//! submission cancels the slot's previous run; a run only writes to the slot
//! while its own token is still the live one, so a slow stale upload can
//! never overwrite a newer result. Slots nobody has touched for the idle
//! timeout are evicted, and each user holds at most a fixed number of them.

use crate::models::IngestState;
use crate::services::cancellation::CancellationToken;
use crate::services::map_session::{MapSession, MapSessionError, MapView, OverlayKind};
use crate::services::pipeline::{self, IngestError, Ingestion};
use axum::body::Bytes;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Slots untouched for this long are evicted.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Most slots one user may hold at once.
pub const DEFAULT_MAX_SLOTS_PER_USER: usize = 8;

/// Failure reported when a submission is dropped before it finishes.
pub const ABORTED_REASON: &str = "Upload aborted before processing finished";

/// Identifies one upload slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub user: String,
    pub session: String,
}

impl SessionKey {
    pub fn new(user: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            session: session.into(),
        }
    }
}

struct SessionSlot {
    state: IngestState,
    token: CancellationToken,
    ingestion: Option<Ingestion>,
    map: Option<MapSession>,
    touched: Instant,
}

impl Default for SessionSlot {
    fn default() -> Self {
        Self {
            state: IngestState::Idle,
            token: CancellationToken::new(),
            ingestion: None,
            map: None,
            touched: Instant::now(),
        }
    }
}

impl SessionSlot {
    fn touch(&mut self) {
        self.touched = Instant::now();
    }

    fn clear(&mut self) {
        self.token.cancel();
        self.state = IngestState::Idle;
        self.ingestion = None;
        self.dispose_map();
    }

    fn dispose_map(&mut self) {
        if let Some(mut map) = self.map.take() {
            match map.dispose() {
                Ok(released) => tracing::debug!(released, "Disposed map session"),
                Err(e) => tracing::warn!(error = %e, "Map session already disposed"),
            }
        }
    }
}

/// All active upload slots.
#[derive(Clone)]
pub struct IngestSessions {
    slots: Arc<DashMap<SessionKey, SessionSlot>>,
    idle_timeout: Duration,
    max_slots_per_user: usize,
}

impl Default for IngestSessions {
    fn default() -> Self {
        Self::with_limits(DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_SLOTS_PER_USER)
    }
}

impl IngestSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(idle_timeout: Duration, max_slots_per_user: usize) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            idle_timeout,
            max_slots_per_user: max_slots_per_user.max(1),
        }
    }

    /// Run the pipeline for a new upload in `key`'s slot.
    ///
    /// The slot resets to `Idle` immediately and any in-flight run for the
    /// same slot is cancelled. Returns `IngestError::Superseded` if another
    /// submission (or a reset) replaced this one before it finished.
    pub async fn submit<R>(
        &self,
        key: SessionKey,
        filename: &str,
        read: R,
    ) -> Result<Ingestion, IngestError>
    where
        R: Future<Output = Result<Bytes, IngestError>>,
    {
        self.evict_idle();
        self.make_room(&key);

        let token = CancellationToken::new();
        {
            let mut slot = self.slots.entry(key.clone()).or_default();
            slot.clear();
            slot.token = token.clone();
            slot.touch();
        }

        tracing::debug!(
            user = %key.user,
            session = %key.session,
            filename,
            "Upload submitted"
        );

        // Armed until the run returns; if this future is dropped first
        // the slot is failed instead of left mid-pipeline.
        let mut abort = AbortGuard {
            sessions: self,
            key: &key,
            token: &token,
            armed: true,
        };

        let result = pipeline::run(filename, read, &token, |state| {
            self.commit(&key, &token, |slot| slot.state = state.clone());
        })
        .await;
        abort.armed = false;

        let ingestion = result?;
        let committed = self.commit(&key, &token, |slot| {
            slot.map = attach_map(&ingestion);
            slot.ingestion = Some(ingestion.clone());
        });

        if committed {
            Ok(ingestion)
        } else {
            Err(IngestError::Superseded)
        }
    }

    /// Current state of a slot; unknown slots are `Idle`.
    pub fn state(&self, key: &SessionKey) -> IngestState {
        self.slots
            .get(key)
            .map(|slot| slot.state.clone())
            .unwrap_or_default()
    }

    /// The ready ingestion held by a slot, if any.
    pub fn ingestion(&self, key: &SessionKey) -> Option<Ingestion> {
        self.slots.get(key).and_then(|slot| slot.ingestion.clone())
    }

    /// Return a slot to `Idle`, cancelling any run and releasing its map.
    pub fn reset(&self, key: &SessionKey) {
        if let Some(mut slot) = self.slots.get_mut(key) {
            slot.clear();
            slot.touch();
        }
    }

    /// Drop a slot entirely. Returns false if it did not exist.
    pub fn remove(&self, key: &SessionKey) -> bool {
        match self.slots.remove(key) {
            Some((_, mut slot)) => {
                slot.clear();
                true
            }
            None => false,
        }
    }

    /// Map view for a ready slot, optionally switching the raster overlay.
    pub fn map_view(
        &self,
        key: &SessionKey,
        overlay: Option<OverlayKind>,
    ) -> Result<Option<MapView>, MapSessionError> {
        let Some(mut slot) = self.slots.get_mut(key) else {
            return Ok(None);
        };
        slot.touch();
        let Some(map) = slot.map.as_mut() else {
            return Ok(None);
        };

        if let Some(kind) = overlay {
            map.set_overlay(kind)?;
        }
        map.view().map(Some)
    }

    /// Drop every slot idle for longer than the timeout, cancelling any
    /// run still attached to it. Returns how many were evicted.
    pub fn evict_idle(&self) -> usize {
        let timeout = self.idle_timeout;
        let before = self.slots.len();
        self.slots.retain(|key, slot| {
            if slot.touched.elapsed() < timeout {
                return true;
            }
            tracing::debug!(user = %key.user, session = %key.session, "Evicting idle upload slot");
            slot.clear();
            false
        });
        before.saturating_sub(self.slots.len())
    }

    /// Evict `key.user`'s least recently touched slots until a new slot
    /// for `key` fits under the per-user cap.
    fn make_room(&self, key: &SessionKey) {
        if self.slots.contains_key(key) {
            return;
        }

        let mut owned: Vec<(Instant, SessionKey)> = self
            .slots
            .iter()
            .filter(|entry| entry.key().user == key.user)
            .map(|entry| (entry.value().touched, entry.key().clone()))
            .collect();
        if owned.len() < self.max_slots_per_user {
            return;
        }

        owned.sort_by_key(|(touched, _)| *touched);
        let excess = owned.len() + 1 - self.max_slots_per_user;
        for (_, oldest) in owned.into_iter().take(excess) {
            tracing::debug!(
                user = %oldest.user,
                session = %oldest.session,
                "Evicting oldest upload slot over per-user limit"
            );
            self.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Apply `update` only while `token` is still the slot's live token.
    fn commit<F>(&self, key: &SessionKey, token: &CancellationToken, update: F) -> bool
    where
        F: FnOnce(&mut SessionSlot),
    {
        match self.slots.get_mut(key) {
            Some(mut slot) if slot.token.same_as(token) && !token.is_cancelled() => {
                update(&mut slot);
                slot.touch();
                true
            }
            _ => false,
        }
    }
}

/// Fails the slot if a submission is dropped while its run is in flight.
struct AbortGuard<'a> {
    sessions: &'a IngestSessions,
    key: &'a SessionKey,
    token: &'a CancellationToken,
    armed: bool,
}

impl Drop for AbortGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let failed = self.sessions.commit(self.key, self.token, |slot| {
            slot.state = IngestState::Failed {
                reason: ABORTED_REASON.to_string(),
            };
            slot.ingestion = None;
            slot.dispose_map();
        });
        if failed {
            tracing::warn!(
                user = %self.key.user,
                session = %self.key.session,
                "Upload dropped before processing finished"
            );
        }
        self.token.cancel();
    }
}

fn attach_map(ingestion: &Ingestion) -> Option<MapSession> {
    let mut map = MapSession::new();
    let attached = map
        .set_boundary(&ingestion.geometry)
        .and_then(|_| map.set_overlay(OverlayKind::default()));

    match attached {
        Ok(_) => Some(map),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to attach map layers");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    const FIELD: &str = r#"{"type":"Polygon","coordinates":[[[30.455,-1.59],[30.46,-1.59],[30.46,-1.595],[30.455,-1.595],[30.455,-1.59]]]}"#;
    const OTHER_FIELD: &str = r#"{"type":"Polygon","coordinates":[[[30.0,-2.0],[30.01,-2.0],[30.01,-2.01],[30.0,-2.01],[30.0,-2.0]]]}"#;

    fn ready(bytes: &'static str) -> impl Future<Output = Result<Bytes, IngestError>> {
        async move { Ok(Bytes::from_static(bytes.as_bytes())) }
    }

    #[tokio::test]
    async fn test_submit_reaches_ready_with_map() {
        let sessions = IngestSessions::new();
        let key = SessionKey::new("assessor-1", "upload");

        let ingestion = sessions
            .submit(key.clone(), "field.geojson", ready(FIELD))
            .await
            .unwrap();
        assert_eq!(ingestion.area.feature_count, 1);

        let state = sessions.state(&key);
        let display = state.display().expect("slot should be ready");
        assert!((display.area_hectares - 30.97).abs() < 0.02);

        let view = sessions
            .map_view(&key, Some(OverlayKind::Weed))
            .unwrap()
            .expect("ready slot has a map");
        assert_eq!(view.bounds, Some([30.455, -1.595, 30.46, -1.59]));
        assert_eq!(view.layers[0].label, "Weed Detection");
    }

    #[tokio::test]
    async fn test_failure_is_terminal_until_next_submit() {
        let sessions = IngestSessions::new();
        let key = SessionKey::new("assessor-1", "upload");

        let err = sessions
            .submit(key.clone(), "report.kmz", ready(FIELD))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat { .. }));
        assert!(matches!(sessions.state(&key), IngestState::Failed { .. }));
        assert!(sessions.map_view(&key, None).unwrap().is_none());

        sessions
            .submit(key.clone(), "field.json", ready(FIELD))
            .await
            .unwrap();
        assert!(matches!(sessions.state(&key), IngestState::Ready { .. }));
    }

    #[tokio::test]
    async fn test_stale_upload_cannot_overwrite_newer_one() {
        let sessions = IngestSessions::new();
        let key = SessionKey::new("assessor-1", "upload");
        let (release_slow, slow_body) = oneshot::channel::<()>();

        let slow = {
            let sessions = sessions.clone();
            let key = key.clone();
            tokio::spawn(async move {
                sessions
                    .submit(key, "slow.geojson", async move {
                        let _ = slow_body.await;
                        Ok(Bytes::from_static(FIELD.as_bytes()))
                    })
                    .await
            })
        };

        // Let the slow upload register itself and block on its body.
        while !matches!(sessions.state(&key), IngestState::Detecting) {
            tokio::task::yield_now().await;
        }

        let fast = sessions
            .submit(key.clone(), "fast.geojson", ready(OTHER_FIELD))
            .await
            .unwrap();

        release_slow.send(()).unwrap();
        let slow_result = slow.await.unwrap();
        assert!(matches!(slow_result, Err(IngestError::Superseded)));

        let held = sessions.ingestion(&key).expect("newer upload is kept");
        assert_eq!(held.geometry, fast.geometry);
    }

    #[tokio::test]
    async fn test_reset_and_remove() {
        let sessions = IngestSessions::new();
        let key = SessionKey::new("farmer-9", "upload");

        sessions
            .submit(key.clone(), "field.geojson", ready(FIELD))
            .await
            .unwrap();
        sessions.reset(&key);
        assert!(matches!(sessions.state(&key), IngestState::Idle));
        assert!(sessions.ingestion(&key).is_none());
        assert!(sessions.map_view(&key, None).unwrap().is_none());

        assert!(sessions.remove(&key));
        assert!(!sessions.remove(&key));
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_slots_are_isolated_per_user() {
        let sessions = IngestSessions::new();
        let mine = SessionKey::new("assessor-1", "upload");
        let theirs = SessionKey::new("assessor-2", "upload");

        sessions
            .submit(mine.clone(), "field.geojson", ready(FIELD))
            .await
            .unwrap();

        assert!(matches!(sessions.state(&theirs), IngestState::Idle));
        assert_eq!(sessions.len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_submission_fails_slot() {
        let sessions = IngestSessions::new();
        let key = SessionKey::new("assessor-1", "upload");

        let pending = sessions.submit(key.clone(), "field.geojson", async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok::<_, IngestError>(Bytes::from_static(FIELD.as_bytes()))
        });
        let outcome = tokio::time::timeout(Duration::from_millis(20), pending).await;
        assert!(outcome.is_err(), "body read should still be pending");

        match sessions.state(&key) {
            IngestState::Failed { reason } => assert_eq!(reason, ABORTED_REASON),
            other => panic!("expected failed slot, got {:?}", other),
        }
        assert!(sessions.ingestion(&key).is_none());

        sessions
            .submit(key.clone(), "field.geojson", ready(FIELD))
            .await
            .unwrap();
        assert!(matches!(sessions.state(&key), IngestState::Ready { .. }));
    }

    #[tokio::test]
    async fn test_dropping_stale_submission_keeps_newer_result() {
        let sessions = IngestSessions::new();
        let key = SessionKey::new("assessor-1", "upload");

        let slow = {
            let sessions = sessions.clone();
            let key = key.clone();
            tokio::spawn(async move {
                sessions
                    .submit(key, "slow.geojson", async {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Ok::<_, IngestError>(Bytes::from_static(FIELD.as_bytes()))
                    })
                    .await
            })
        };

        while !matches!(sessions.state(&key), IngestState::Detecting) {
            tokio::task::yield_now().await;
        }

        let fast = sessions
            .submit(key.clone(), "fast.geojson", ready(OTHER_FIELD))
            .await
            .unwrap();

        slow.abort();
        assert!(slow.await.unwrap_err().is_cancelled());

        assert!(matches!(sessions.state(&key), IngestState::Ready { .. }));
        assert_eq!(sessions.ingestion(&key).unwrap().geometry, fast.geometry);
    }

    #[tokio::test]
    async fn test_idle_slots_are_evicted() {
        let sessions = IngestSessions::with_limits(Duration::from_millis(200), 8);
        let key = SessionKey::new("assessor-1", "upload");

        sessions
            .submit(key.clone(), "field.geojson", ready(FIELD))
            .await
            .unwrap();
        assert_eq!(sessions.evict_idle(), 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(sessions.evict_idle(), 1);
        assert!(sessions.is_empty());
        assert!(matches!(sessions.state(&key), IngestState::Idle));
        assert!(sessions.map_view(&key, None).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_per_user_cap_evicts_oldest_slot() {
        let sessions = IngestSessions::with_limits(DEFAULT_IDLE_TIMEOUT, 2);
        let first = SessionKey::new("assessor-1", "a");
        let second = SessionKey::new("assessor-1", "b");
        let third = SessionKey::new("assessor-1", "c");
        let other_user = SessionKey::new("assessor-2", "a");

        for key in [&first, &second, &other_user, &third] {
            sessions
                .submit(key.clone(), "field.geojson", ready(FIELD))
                .await
                .unwrap();
        }

        assert_eq!(sessions.len(), 3);
        assert!(sessions.ingestion(&first).is_none());
        assert!(sessions.ingestion(&second).is_some());
        assert!(sessions.ingestion(&third).is_some());
        assert!(sessions.ingestion(&other_user).is_some());

        // Resubmitting into an existing slot never evicts
        sessions
            .submit(second.clone(), "field.geojson", ready(OTHER_FIELD))
            .await
            .unwrap();
        assert_eq!(sessions.len(), 3);
        assert!(sessions.ingestion(&third).is_some());
    }
}
