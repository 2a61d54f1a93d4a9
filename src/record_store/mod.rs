//! RecordStore - canonical in-memory collections
//!
//! ## Responsibilities
//!
//! - Exclusive owner of the canonical Incident and Camera records
//! - Keyed insert/replace, typed partial patch, removal
//! - Synchronous change notification to subscribers in subscription order
//!
//! All other components hold only point-in-time copies; mutations go through
//! the Reconciler or the OptimisticMutationManager so merge invariants hold.
//! Camera registration order is preserved; incident order carries no meaning
//! (consumers sort by timestamp).

use crate::models::{Camera, CameraPatch, Incident, IncidentPatch, RecordId};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Which collection a notification refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Incident,
    Camera,
}

/// Change notification delivered to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeNotice {
    Upserted { kind: EntityKind, id: RecordId },
    Patched { kind: EntityKind, id: RecordId },
    Removed { kind: EntityKind, id: RecordId },
}

/// Subscriber handle returned by [`RecordStore::subscribe`]
pub type SubscriberId = Uuid;

struct Subscriber {
    id: SubscriberId,
    tx: mpsc::UnboundedSender<ChangeNotice>,
}

struct Collections {
    incidents: HashMap<RecordId, Incident>,
    cameras: HashMap<RecordId, Camera>,
    /// Camera ids in registration order
    camera_order: Vec<RecordId>,
    /// Kept in a Vec so delivery order equals subscription order
    subscribers: Vec<Subscriber>,
}

impl Collections {
    fn notify(&mut self, notice: ChangeNotice) {
        // Unbounded send never awaits, so every current subscriber gets the
        // notice before the write lock is released. Closed receivers are
        // pruned on the spot.
        self.subscribers.retain(|sub| {
            if sub.tx.send(notice).is_err() {
                tracing::debug!(subscriber_id = %sub.id, "Dropping closed store subscriber");
                false
            } else {
                true
            }
        });
    }
}

/// RecordStore instance
pub struct RecordStore {
    inner: RwLock<Collections>,
}

impl RecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Collections {
                incidents: HashMap::new(),
                cameras: HashMap::new(),
                camera_order: Vec::new(),
                subscribers: Vec::new(),
            }),
        }
    }

    // ========================================
    // Incidents
    // ========================================

    /// Insert or replace an incident by identity key
    pub async fn upsert_incident(&self, incident: Incident) {
        let id = incident.id;
        let mut inner = self.inner.write().await;
        inner.incidents.insert(id, incident);
        inner.notify(ChangeNotice::Upserted {
            kind: EntityKind::Incident,
            id,
        });
    }

    /// Merge partial fields into an incident.
    ///
    /// Silent no-op when the id is absent; returns whether anything changed.
    pub async fn patch_incident(&self, id: RecordId, patch: IncidentPatch) -> bool {
        let mut inner = self.inner.write().await;
        let Some(incident) = inner.incidents.get_mut(&id) else {
            return false;
        };
        if let Some(status) = patch.status {
            incident.status = status;
        }
        if let Some(description) = patch.description {
            incident.description = description;
        }
        if let Some(ai_summary) = patch.ai_summary {
            incident.ai_summary = Some(ai_summary);
        }
        inner.notify(ChangeNotice::Patched {
            kind: EntityKind::Incident,
            id,
        });
        true
    }

    /// Remove an incident; no-op when absent
    pub async fn remove_incident(&self, id: RecordId) -> bool {
        let mut inner = self.inner.write().await;
        if inner.incidents.remove(&id).is_none() {
            return false;
        }
        inner.notify(ChangeNotice::Removed {
            kind: EntityKind::Incident,
            id,
        });
        true
    }

    /// Point-in-time copy of all incidents (order not significant)
    pub async fn incidents(&self) -> Vec<Incident> {
        self.inner.read().await.incidents.values().cloned().collect()
    }

    pub async fn get_incident(&self, id: RecordId) -> Option<Incident> {
        self.inner.read().await.incidents.get(&id).cloned()
    }

    pub async fn contains_incident(&self, id: RecordId) -> bool {
        self.inner.read().await.incidents.contains_key(&id)
    }

    // ========================================
    // Cameras
    // ========================================

    /// Insert or replace a camera by identity key.
    ///
    /// A new id is appended to the registration order; replacing an existing
    /// id keeps its slot.
    pub async fn upsert_camera(&self, camera: Camera) {
        let id = camera.id;
        let mut inner = self.inner.write().await;
        if inner.cameras.insert(id, camera).is_none() {
            inner.camera_order.push(id);
        }
        inner.notify(ChangeNotice::Upserted {
            kind: EntityKind::Camera,
            id,
        });
    }

    /// Merge partial fields into a camera; silent no-op when absent
    pub async fn patch_camera(&self, id: RecordId, patch: CameraPatch) -> bool {
        let mut inner = self.inner.write().await;
        let Some(camera) = inner.cameras.get_mut(&id) else {
            return false;
        };
        if let Some(name) = patch.name {
            camera.name = name;
        }
        if let Some(location) = patch.location {
            camera.location = location;
        }
        if let Some(status) = patch.status {
            camera.status = status;
        }
        inner.notify(ChangeNotice::Patched {
            kind: EntityKind::Camera,
            id,
        });
        true
    }

    /// Remove a camera; no-op when absent
    pub async fn remove_camera(&self, id: RecordId) -> bool {
        let mut inner = self.inner.write().await;
        if inner.cameras.remove(&id).is_none() {
            return false;
        }
        inner.camera_order.retain(|existing| *existing != id);
        inner.notify(ChangeNotice::Removed {
            kind: EntityKind::Camera,
            id,
        });
        true
    }

    /// Confirm path: swap a temporary camera for its server record in the
    /// same registration-order slot. The temporary entry and the confirmed
    /// entry never coexist. Falls back to a plain upsert when the old id is
    /// already gone.
    pub async fn replace_camera(&self, old_id: RecordId, camera: Camera) {
        let new_id = camera.id;
        let mut inner = self.inner.write().await;
        if inner.cameras.remove(&old_id).is_some() {
            if let Some(slot) = inner.camera_order.iter().position(|id| *id == old_id) {
                inner.camera_order[slot] = new_id;
            } else {
                inner.camera_order.push(new_id);
            }
            inner.cameras.insert(new_id, camera);
            inner.notify(ChangeNotice::Removed {
                kind: EntityKind::Camera,
                id: old_id,
            });
        } else {
            if !inner.cameras.contains_key(&new_id) {
                inner.camera_order.push(new_id);
            }
            inner.cameras.insert(new_id, camera);
        }
        inner.notify(ChangeNotice::Upserted {
            kind: EntityKind::Camera,
            id: new_id,
        });
        tracing::debug!(old_id = %old_id, new_id = %new_id, "Camera identity reconciled");
    }

    /// Point-in-time copy of all cameras in registration order
    pub async fn cameras(&self) -> Vec<Camera> {
        let inner = self.inner.read().await;
        inner
            .camera_order
            .iter()
            .filter_map(|id| inner.cameras.get(id).cloned())
            .collect()
    }

    pub async fn get_camera(&self, id: RecordId) -> Option<Camera> {
        self.inner.read().await.cameras.get(&id).cloned()
    }

    pub async fn contains_camera(&self, id: RecordId) -> bool {
        self.inner.read().await.cameras.contains_key(&id)
    }

    // ========================================
    // Subscriptions
    // ========================================

    /// Register a change subscriber
    pub async fn subscribe(&self) -> (SubscriberId, mpsc::UnboundedReceiver<ChangeNotice>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.write().await.subscribers.push(Subscriber { id, tx });
        tracing::debug!(subscriber_id = %id, "Store subscriber registered");
        (id, rx)
    }

    /// Unregister a change subscriber
    pub async fn unsubscribe(&self, id: &SubscriberId) {
        self.inner
            .write()
            .await
            .subscribers
            .retain(|sub| sub.id != *id);
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CameraLiveness, IncidentStatus, Severity};
    use chrono::Utc;

    fn incident(id: i64) -> Incident {
        Incident {
            id: RecordId::Server(id),
            timestamp: Utc::now(),
            camera_id: "WEB-01".to_string(),
            category: "Loitering".to_string(),
            severity: Severity::Medium,
            confidence: 0.8,
            description: "test".to_string(),
            ai_summary: None,
            owner_id: "admin".to_string(),
            status: IncidentStatus::Active,
            snapshot_path: None,
        }
    }

    fn camera(id: RecordId, name: &str) -> Camera {
        Camera {
            id,
            name: name.to_string(),
            location: "Entrance".to_string(),
            source_url: "0".to_string(),
            owner_id: "op_1".to_string(),
            status: CameraLiveness::Active,
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = RecordStore::new();
        store.upsert_incident(incident(1)).await;
        let mut updated = incident(1);
        updated.description = "updated".to_string();
        store.upsert_incident(updated).await;

        let all = store.incidents().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].description, "updated");
    }

    #[tokio::test]
    async fn test_patch_missing_is_silent_noop() {
        let store = RecordStore::new();
        let (_id, mut rx) = store.subscribe().await;
        let patched = store
            .patch_incident(
                RecordId::Server(99),
                IncidentPatch::status(IncidentStatus::Hidden),
            )
            .await;
        assert!(!patched);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notifications_in_subscription_order() {
        let store = RecordStore::new();
        let (_a, mut rx_a) = store.subscribe().await;
        let (_b, mut rx_b) = store.subscribe().await;

        store.upsert_incident(incident(1)).await;
        store
            .patch_incident(
                RecordId::Server(1),
                IncidentPatch::status(IncidentStatus::Resolved),
            )
            .await;

        for rx in [&mut rx_a, &mut rx_b] {
            assert_eq!(
                rx.try_recv().unwrap(),
                ChangeNotice::Upserted {
                    kind: EntityKind::Incident,
                    id: RecordId::Server(1)
                }
            );
            assert_eq!(
                rx.try_recv().unwrap(),
                ChangeNotice::Patched {
                    kind: EntityKind::Incident,
                    id: RecordId::Server(1)
                }
            );
        }
    }

    #[tokio::test]
    async fn test_camera_registration_order_preserved() {
        let store = RecordStore::new();
        store.upsert_camera(camera(RecordId::Server(2), "Lobby")).await;
        store.upsert_camera(camera(RecordId::Server(1), "Yard")).await;
        store.upsert_camera(camera(RecordId::Server(3), "Dock")).await;

        let names: Vec<_> = store.cameras().await.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Lobby", "Yard", "Dock"]);
    }

    #[tokio::test]
    async fn test_replace_camera_keeps_slot_and_single_entry() {
        let store = RecordStore::new();
        let temp = RecordId::temp();
        store.upsert_camera(camera(RecordId::Server(1), "Yard")).await;
        store.upsert_camera(camera(temp, "Lobby")).await;
        store.upsert_camera(camera(RecordId::Server(9), "Dock")).await;

        store
            .replace_camera(temp, camera(RecordId::Server(5), "Lobby"))
            .await;

        let cams = store.cameras().await;
        assert_eq!(cams.len(), 3);
        assert_eq!(cams[1].id, RecordId::Server(5));
        assert_eq!(cams[1].name, "Lobby");
        assert!(!store.contains_camera(temp).await);
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_pruned() {
        let store = RecordStore::new();
        let (_id, rx) = store.subscribe().await;
        drop(rx);
        // Next mutation prunes the dead channel without error
        store.upsert_incident(incident(1)).await;
        store.upsert_incident(incident(2)).await;
        assert_eq!(store.incidents().await.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_camera_fixes_order() {
        let store = RecordStore::new();
        store.upsert_camera(camera(RecordId::Server(1), "Yard")).await;
        store.upsert_camera(camera(RecordId::Server(2), "Lobby")).await;
        assert!(store.remove_camera(RecordId::Server(1)).await);
        assert!(!store.remove_camera(RecordId::Server(1)).await);

        let names: Vec<_> = store.cameras().await.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Lobby"]);
    }
}
