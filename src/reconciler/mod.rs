//! Reconciler - merge authority for inbound events and snapshots
//!
//! ## Responsibilities
//!
//! - Duplicate-by-id suppression for create events (idempotent)
//! - Default substitution for partially populated incident payloads
//! - Arrival-order last-write-wins for status changes; embedded timestamps
//!   are deliberately ignored
//! - Bounded, time-boxed buffering of status events whose target id is not
//!   yet known locally
//! - Replacement (never duplication) of optimistic temp cameras when the
//!   server confirms the create
//! - Forwarding of stats frames to the telemetry feed
//!
//! Every store mutation caused by the stream flows through here, so the
//! merge rules cannot diverge between entry paths.

use crate::event_stream::{SnapshotReplaceEvent, StreamEvent};
use crate::models::{Camera, Incident, IncidentPatch, IncidentStatus, RecordId};
use crate::record_store::RecordStore;
use crate::telemetry_feed::TelemetryFeed;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Max buffered status events awaiting their create/snapshot
const STATUS_BUFFER_CAP: usize = 256;
/// How long a buffered status event may wait before being dropped
const STATUS_BUFFER_TTL_SECS: i64 = 30;

#[derive(Debug, Clone)]
struct BufferedStatus {
    status: IncidentStatus,
    buffered_at: DateTime<Utc>,
}

/// Content key used to match a server-confirmed camera against a pending
/// optimistic one (name + source locator)
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingCamera {
    name: String,
    source_url: String,
}

#[derive(Default)]
struct ReconcilerState {
    pending_status: HashMap<RecordId, BufferedStatus>,
    pending_cameras: HashMap<RecordId, PendingCamera>,
}

/// Reconciler instance
pub struct Reconciler {
    store: Arc<RecordStore>,
    telemetry: Arc<TelemetryFeed>,
    state: RwLock<ReconcilerState>,
}

impl Reconciler {
    pub fn new(store: Arc<RecordStore>, telemetry: Arc<TelemetryFeed>) -> Self {
        Self {
            store,
            telemetry,
            state: RwLock::new(ReconcilerState::default()),
        }
    }

    /// Merge one inbound event into the store
    pub async fn apply(&self, event: StreamEvent) {
        match event {
            StreamEvent::IncidentCreated(ev) => {
                let incident = ev.into_incident();
                let id = incident.id;
                if self.store.contains_incident(id).await {
                    debug!(incident_id = %id, "Duplicate incident create ignored");
                    return;
                }
                self.store.upsert_incident(incident).await;
                self.drain_buffered_status(id).await;
            }
            StreamEvent::IncidentStatusChanged(ev) => {
                let applied = self
                    .store
                    .patch_incident(ev.id, IncidentPatch::status(ev.status))
                    .await;
                if applied {
                    debug!(incident_id = %ev.id, status = %ev.status, "Status applied (arrival-order LWW)");
                } else {
                    self.buffer_status(ev.id, ev.status).await;
                }
            }
            StreamEvent::CameraCreated(camera) => {
                self.reconcile_camera_create(camera).await;
            }
            StreamEvent::Stats(frame) => {
                self.telemetry.publish(frame);
            }
            StreamEvent::SnapshotReplace(snapshot) => {
                self.apply_snapshot_replace(snapshot).await;
            }
        }
    }

    /// The single deterministic create-confirmation rule, shared by the
    /// stream path and the optimistic-mutation path: a confirmed camera that
    /// matches a pending temp entry by content replaces it, never appends.
    pub async fn reconcile_camera_create(&self, camera: Camera) {
        if self.store.contains_camera(camera.id).await {
            debug!(camera_id = %camera.id, "Duplicate camera create ignored");
            return;
        }

        let matched_temp = {
            let mut state = self.state.write().await;
            let key = PendingCamera {
                name: camera.name.clone(),
                source_url: camera.source_url.clone(),
            };
            let found = state
                .pending_cameras
                .iter()
                .find(|(_, pending)| **pending == key)
                .map(|(temp_id, _)| *temp_id);
            if let Some(temp_id) = found {
                state.pending_cameras.remove(&temp_id);
            }
            found
        };

        match matched_temp {
            Some(temp_id) => {
                info!(temp_id = %temp_id, camera_id = %camera.id, "Optimistic camera confirmed");
                self.store.replace_camera(temp_id, camera).await;
            }
            None => self.store.upsert_camera(camera).await,
        }
    }

    async fn apply_snapshot_replace(&self, snapshot: SnapshotReplaceEvent) {
        match snapshot {
            SnapshotReplaceEvent::Incidents(incidents) => self.merge_incidents(incidents).await,
            SnapshotReplaceEvent::Cameras(cameras) => self.merge_cameras(cameras).await,
        }
    }

    /// The single snapshot merge rule, shared by the SnapshotLoader and the
    /// stream's snapshot-replace event: upsert every record (fetched data
    /// wins), never delete local optimistic extras, then drain any status
    /// events that were waiting for the merged ids.
    pub async fn merge_incidents(&self, incidents: Vec<Incident>) {
        let count = incidents.len();
        let ids: Vec<RecordId> = incidents.iter().map(|i| i.id).collect();
        for incident in incidents {
            self.store.upsert_incident(incident).await;
        }
        for id in ids {
            self.drain_buffered_status(id).await;
        }
        info!(count, "Incident snapshot merged");
    }

    /// Snapshot merge rule for cameras; see [`Reconciler::merge_incidents`]
    pub async fn merge_cameras(&self, cameras: Vec<Camera>) {
        let count = cameras.len();
        for camera in cameras {
            self.store.upsert_camera(camera).await;
        }
        info!(count, "Camera snapshot merged");
    }

    // ========================================
    // Pending optimistic cameras (mutation confirm path)
    // ========================================

    /// Track a temp camera awaiting server confirmation
    pub async fn register_pending_camera(&self, temp_id: RecordId, name: &str, source_url: &str) {
        self.state.write().await.pending_cameras.insert(
            temp_id,
            PendingCamera {
                name: name.to_string(),
                source_url: source_url.to_string(),
            },
        );
    }

    /// Stop tracking a temp camera (confirmed directly or rolled back)
    pub async fn clear_pending_camera(&self, temp_id: RecordId) {
        self.state.write().await.pending_cameras.remove(&temp_id);
    }

    // ========================================
    // Status buffering (unknown target ids)
    // ========================================

    async fn buffer_status(&self, id: RecordId, status: IncidentStatus) {
        let mut state = self.state.write().await;
        prune_expired(&mut state.pending_status, Utc::now());

        if state.pending_status.len() >= STATUS_BUFFER_CAP
            && !state.pending_status.contains_key(&id)
        {
            // Evict the oldest entry to stay bounded
            if let Some(oldest) = state
                .pending_status
                .iter()
                .min_by_key(|(_, buffered)| buffered.buffered_at)
                .map(|(id, _)| *id)
            {
                state.pending_status.remove(&oldest);
                debug!(incident_id = %oldest, "Status buffer full, evicted oldest entry");
            }
        }

        // A later arrival for the same unknown id overwrites the earlier one
        state.pending_status.insert(
            id,
            BufferedStatus {
                status,
                buffered_at: Utc::now(),
            },
        );
        debug!(incident_id = %id, status = %status, "Status buffered for unknown incident");
    }

    /// Apply a buffered status when its incident finally arrives
    async fn drain_buffered_status(&self, id: RecordId) {
        let buffered = {
            let mut state = self.state.write().await;
            prune_expired(&mut state.pending_status, Utc::now());
            state.pending_status.remove(&id)
        };
        if let Some(buffered) = buffered {
            debug!(incident_id = %id, status = %buffered.status, "Applying buffered status");
            self.store
                .patch_incident(id, IncidentPatch::status(buffered.status))
                .await;
        }
    }

    #[cfg(test)]
    async fn backdate_buffered_status(&self, id: RecordId, secs: i64) {
        let mut state = self.state.write().await;
        if let Some(entry) = state.pending_status.get_mut(&id) {
            entry.buffered_at -= ChronoDuration::seconds(secs);
        }
    }

    #[cfg(test)]
    async fn buffered_status_len(&self) -> usize {
        self.state.read().await.pending_status.len()
    }
}

fn prune_expired(buffer: &mut HashMap<RecordId, BufferedStatus>, now: DateTime<Utc>) {
    let ttl = ChronoDuration::seconds(STATUS_BUFFER_TTL_SECS);
    buffer.retain(|id, buffered| {
        let keep = now - buffered.buffered_at <= ttl;
        if !keep {
            debug!(incident_id = %id, "Buffered status expired without a matching incident");
        }
        keep
    });
}
