//! Shared state store
//!
//! Sole authority over the singleton stream and the viewer session
//! collection. Every operation takes the single write lock, so the
//! single-publisher check-and-set and the viewer capacity check-and-insert
//! are atomic with respect to all other state operations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{broadcast, RwLock};

use crate::config::ServerConfig;

use super::error::StateError;
use super::snapshot::StatusSnapshot;
use super::stream::{Stream, StreamMetadata};
use super::viewer::{ViewerChannel, ViewerId, ViewerSession};

/// Capacity of the change-notification channel. A receiver that falls this
/// far behind sees `RecvError::Lagged` and catches up on the next change.
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Which aspect of the state changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Stream went live/offline or its metadata changed
    Stream,

    /// Viewer count changed
    Viewer,
}

/// A state change plus the post-mutation snapshot it produced
#[derive(Debug, Clone)]
pub struct StateChange {
    pub kind: ChangeKind,
    pub snapshot: StatusSnapshot,
}

/// Outcome of one heartbeat sweep
#[derive(Debug, Default)]
pub struct ProbeSweep {
    /// Sessions removed for missing two consecutive probes; the channel is
    /// returned so the caller can force-close it
    pub expired: Vec<(ViewerId, ViewerChannel)>,

    /// Channels of surviving sessions, due for another probe
    pub probe: Vec<ViewerChannel>,
}

struct Inner {
    stream: Stream,
    viewers: HashMap<ViewerId, ViewerSession>,
}

/// The single source of truth for stream status and viewer registry
pub struct SharedState {
    inner: RwLock<Inner>,
    changes: broadcast::Sender<StateChange>,
    next_viewer_id: AtomicU64,
    max_viewers: usize,
    default_quality: String,
    tier_names: Vec<String>,
}

impl SharedState {
    /// Create the process-wide state from a validated configuration
    pub fn new(config: &ServerConfig) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: RwLock::new(Inner {
                stream: Stream::Offline,
                viewers: HashMap::new(),
            }),
            changes,
            next_viewer_id: AtomicU64::new(1),
            max_viewers: config.max_viewers,
            default_quality: config.highest_tier().name.clone(),
            tier_names: config.tiers.iter().map(|t| t.name.clone()).collect(),
        }
    }

    /// Subscribe to state changes
    ///
    /// Receivers are isolated from each other and from the mutating path:
    /// a slow or dropped receiver can never block a mutation or another
    /// subscriber.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    /// True iff no stream is currently live
    pub async fn can_publish(&self) -> bool {
        !self.inner.read().await.stream.is_live()
    }

    /// Transition offline → live
    ///
    /// Re-checks the single-publisher invariant and fails safely with
    /// [`StateError::AlreadyLive`] instead of overwriting a live stream.
    pub async fn start_stream(&self, meta: StreamMetadata) -> Result<(), StateError> {
        let mut inner = self.inner.write().await;

        if inner.stream.is_live() {
            return Err(StateError::AlreadyLive);
        }

        tracing::info!(publisher = %meta.publisher_addr, "Stream started");
        inner.stream = Stream::Live(super::stream::LiveStream::new(meta));
        self.notify(ChangeKind::Stream, &inner);
        Ok(())
    }

    /// Transition live → offline, clearing all live-only fields
    ///
    /// Idempotent: returns false and emits nothing when already offline.
    pub async fn stop_stream(&self) -> bool {
        let mut inner = self.inner.write().await;

        if !inner.stream.is_live() {
            return false;
        }

        tracing::info!("Stream stopped");
        inner.stream = Stream::Offline;
        self.notify(ChangeKind::Stream, &inner);
        true
    }

    /// Merge late-arriving metadata into the live stream
    ///
    /// No-op while offline. Sentinel values never overwrite known-good
    /// data; a notification fires only if something actually changed.
    pub async fn refresh_metadata(&self, partial: &StreamMetadata) -> bool {
        let mut inner = self.inner.write().await;

        let changed = match &mut inner.stream {
            Stream::Live(live) => live.refresh(partial),
            Stream::Offline => false,
        };

        if changed {
            tracing::debug!(
                resolution = ?partial.resolution,
                bitrate_kbps = ?partial.bitrate_kbps,
                "Stream metadata refreshed"
            );
            self.notify(ChangeKind::Stream, &inner);
        }
        changed
    }

    /// Immutable point-in-time status, duration computed fresh
    pub async fn snapshot(&self) -> StatusSnapshot {
        let inner = self.inner.read().await;
        StatusSnapshot::capture(&inner.stream, inner.viewers.len())
    }

    /// Atomic capacity check and session insert
    ///
    /// Two concurrent admissions can never both succeed for the last slot:
    /// the check and the insert happen under one write lock.
    pub async fn add_viewer(&self, channel: ViewerChannel) -> Result<ViewerId, StateError> {
        let mut inner = self.inner.write().await;

        if inner.viewers.len() >= self.max_viewers {
            return Err(StateError::RoomFull(self.max_viewers));
        }

        let id = self.next_viewer_id.fetch_add(1, Ordering::Relaxed);
        inner
            .viewers
            .insert(id, ViewerSession::new(id, self.default_quality.clone(), channel));

        tracing::info!(viewer = id, viewers = inner.viewers.len(), "Viewer admitted");
        self.notify(ChangeKind::Viewer, &inner);
        Ok(id)
    }

    /// Remove a viewer session; no-op and no notification if unknown
    pub async fn remove_viewer(&self, id: ViewerId) -> bool {
        let mut inner = self.inner.write().await;

        if inner.viewers.remove(&id).is_none() {
            return false;
        }

        tracing::info!(viewer = id, viewers = inner.viewers.len(), "Viewer removed");
        self.notify(ChangeKind::Viewer, &inner);
        true
    }

    /// Record a liveness response for a viewer
    pub async fn heartbeat(&self, id: ViewerId) -> bool {
        let mut inner = self.inner.write().await;

        match inner.viewers.get_mut(&id) {
            Some(session) => {
                session.last_heartbeat = std::time::Instant::now();
                session.missed_probes = 0;
                true
            }
            None => false,
        }
    }

    /// Change a viewer's selected quality tier
    ///
    /// Local metadata only; other viewers and global state are unaffected,
    /// so no notification fires. Unknown tiers and unknown viewers are
    /// rejected.
    pub async fn set_quality(&self, id: ViewerId, tier: &str) -> bool {
        if !self.tier_names.iter().any(|t| t == tier) {
            return false;
        }

        let mut inner = self.inner.write().await;
        match inner.viewers.get_mut(&id) {
            Some(session) => {
                session.quality = tier.to_string();
                true
            }
            None => false,
        }
    }

    /// Selected quality of a viewer, if admitted
    pub async fn quality_of(&self, id: ViewerId) -> Option<String> {
        let inner = self.inner.read().await;
        inner.viewers.get(&id).map(|s| s.quality.clone())
    }

    /// One atomic pass of the two-strike liveness rule
    ///
    /// Sessions that have missed two consecutive probes are removed and
    /// returned for force-close; every survivor gains a strike and is
    /// returned for re-probe. A liveness response ([`Self::heartbeat`])
    /// between sweeps resets the strike count.
    pub async fn sweep_probes(&self) -> ProbeSweep {
        let mut inner = self.inner.write().await;
        let mut sweep = ProbeSweep::default();

        let expired_ids: Vec<ViewerId> = inner
            .viewers
            .values()
            .filter(|s| s.missed_probes >= 2)
            .map(|s| s.id)
            .collect();

        for id in expired_ids {
            if let Some(session) = inner.viewers.remove(&id) {
                tracing::info!(viewer = id, "Viewer timed out");
                sweep.expired.push((id, session.channel));
            }
        }

        for session in inner.viewers.values_mut() {
            session.missed_probes += 1;
            sweep.probe.push(session.channel.clone());
        }

        if !sweep.expired.is_empty() {
            self.notify(ChangeKind::Viewer, &inner);
        }
        sweep
    }

    /// Current number of admitted viewers
    pub async fn viewer_count(&self) -> usize {
        self.inner.read().await.viewers.len()
    }

    /// Channels of all admitted viewers, for broadcast enumeration
    pub async fn channels(&self) -> Vec<ViewerChannel> {
        let inner = self.inner.read().await;
        inner.viewers.values().map(|s| s.channel.clone()).collect()
    }

    /// Emit a change notification carrying the post-mutation snapshot.
    /// Called with the write lock held so the snapshot content can never
    /// be stale relative to the change it reports.
    fn notify(&self, kind: ChangeKind, inner: &Inner) {
        let snapshot = StatusSnapshot::capture(&inner.stream, inner.viewers.len());
        // send() errors only when no receiver exists, which is fine.
        let _ = self.changes.send(StateChange { kind, snapshot });
    }
}
