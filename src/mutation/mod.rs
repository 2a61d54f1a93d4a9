//! OptimisticMutationManager - local-first writes with confirm or rollback
//!
//! ## Write discipline
//!
//! - Camera create: insert a provisional record under a temp id immediately,
//!   then POST. Confirmation replaces the temp record in place; failure
//!   removes it.
//! - Incident visibility: patch the local status immediately, then PATCH.
//!   Failure restores the exact prior status. At most one visibility
//!   mutation may be in flight per incident.
//! - Camera delete: write-through. The local record is only removed after
//!   the backend accepts the delete.

use crate::backend_client::BackendClient;
use crate::error::{Error, Result};
use crate::models::{
    CallerContext, Camera, CameraLiveness, IncidentPatch, IncidentStatus, NewCamera, RecordId,
};
use crate::record_store::RecordStore;
use crate::reconciler::Reconciler;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Mutation manager instance
pub struct OptimisticMutationManager {
    backend: BackendClient,
    store: Arc<RecordStore>,
    reconciler: Arc<Reconciler>,
    /// Incident ids with a visibility mutation awaiting the backend
    in_flight: Mutex<HashSet<RecordId>>,
}

impl OptimisticMutationManager {
    pub fn new(backend: BackendClient, store: Arc<RecordStore>, reconciler: Arc<Reconciler>) -> Self {
        Self {
            backend,
            store,
            reconciler,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Create a camera optimistically. Returns the server-confirmed record.
    ///
    /// The provisional record is visible to readers for the whole round
    /// trip. The confirmed record takes over the provisional one's position
    /// in registration order, so a rendered list never sees the camera jump.
    pub async fn create_camera(&self, ctx: &CallerContext, fields: NewCamera) -> Result<Camera> {
        if fields.name.trim().is_empty() || fields.source.trim().is_empty() {
            return Err(Error::Config(
                "Camera name and source are required".to_string(),
            ));
        }

        let temp_id = RecordId::temp();
        let provisional = Camera {
            id: temp_id,
            name: fields.name.clone(),
            location: fields.location.clone(),
            source_url: fields.source.clone(),
            owner_id: ctx.user_id.clone(),
            status: CameraLiveness::default(),
        };
        self.store.upsert_camera(provisional).await;
        self.reconciler
            .register_pending_camera(temp_id, &fields.name, &fields.source)
            .await;
        info!(temp_id = %temp_id, name = %fields.name, "Provisional camera registered");

        match self.backend.create_camera(ctx, &fields).await {
            Ok(confirmed) => {
                self.reconciler.clear_pending_camera(temp_id).await;
                if self.store.contains_camera(confirmed.id).await {
                    // The broadcast confirmation won the race and already
                    // replaced the temp record; drop it if it survived.
                    self.store.remove_camera(temp_id).await;
                } else {
                    self.store.replace_camera(temp_id, confirmed.clone()).await;
                }
                info!(temp_id = %temp_id, camera_id = %confirmed.id, "Camera create confirmed");
                Ok(confirmed)
            }
            Err(e) => {
                self.reconciler.clear_pending_camera(temp_id).await;
                self.store.remove_camera(temp_id).await;
                warn!(temp_id = %temp_id, error = %e, "Camera create failed, provisional record rolled back");
                Err(e)
            }
        }
    }

    /// Change an incident's visibility status optimistically.
    ///
    /// Rejects with [`Error::Conflict`] while a previous visibility change
    /// for the same incident is still awaiting its backend response.
    pub async fn set_incident_visibility(
        &self,
        ctx: &CallerContext,
        id: RecordId,
        status: IncidentStatus,
    ) -> Result<()> {
        {
            let mut in_flight = self.in_flight.lock().await;
            if !in_flight.insert(id) {
                return Err(Error::Conflict(format!(
                    "Visibility change for incident {} already in flight",
                    id
                )));
            }
        }

        let outcome = self.set_visibility_inner(ctx, id, status).await;
        self.in_flight.lock().await.remove(&id);
        outcome
    }

    async fn set_visibility_inner(
        &self,
        ctx: &CallerContext,
        id: RecordId,
        status: IncidentStatus,
    ) -> Result<()> {
        let prior = match self.store.get_incident(id).await {
            Some(incident) => incident.status,
            None => return Err(Error::NotFound(format!("Unknown incident {}", id))),
        };
        let server_id = match id {
            RecordId::Server(n) => n,
            RecordId::Temp(_) => {
                return Err(Error::Conflict(format!(
                    "Incident {} has no server id yet",
                    id
                )))
            }
        };

        self.store
            .patch_incident(id, IncidentPatch::status(status))
            .await;

        match self.backend.set_incident_status(ctx, server_id, status).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.store
                    .patch_incident(id, IncidentPatch::status(prior))
                    .await;
                warn!(incident_id = %id, error = %e, "Visibility change rejected, prior status restored");
                Err(e)
            }
        }
    }

    /// Delete a camera. Server-confirmed cameras are removed write-through;
    /// a still-provisional camera is simply withdrawn locally.
    pub async fn delete_camera(&self, ctx: &CallerContext, id: RecordId) -> Result<()> {
        match id {
            RecordId::Server(n) => {
                self.backend.delete_camera(ctx, n).await?;
                self.store.remove_camera(id).await;
                info!(camera_id = %id, "Camera deleted");
                Ok(())
            }
            RecordId::Temp(_) => {
                self.reconciler.clear_pending_camera(id).await;
                if !self.store.remove_camera(id).await {
                    return Err(Error::NotFound(format!("Unknown camera {}", id)));
                }
                info!(camera_id = %id, "Provisional camera withdrawn");
                Ok(())
            }
        }
    }

    #[cfg(test)]
    async fn mark_in_flight(&self, id: RecordId) {
        self.in_flight.lock().await.insert(id);
    }
}
