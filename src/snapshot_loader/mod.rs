//! SnapshotLoader - one-shot authoritative collection fetch
//!
//! Fetches the full collection over request/response and hands it to the
//! Reconciler's snapshot merge rule: every returned record is upserted
//! (fetched data always wins) and buffered status events waiting for the
//! merged ids are applied. Local entries absent from the snapshot are NOT
//! deleted: an optimistic record created just before the fetch may
//! legitimately not be visible server-side yet. Failures leave the store
//! untouched and are returned to the caller; no automatic retry.

use crate::backend_client::BackendClient;
use crate::error::Result;
use crate::models::CallerContext;
use crate::reconciler::Reconciler;
use std::sync::Arc;
use tracing::info;

/// SnapshotLoader instance
pub struct SnapshotLoader {
    backend: BackendClient,
    reconciler: Arc<Reconciler>,
}

impl SnapshotLoader {
    pub fn new(backend: BackendClient, reconciler: Arc<Reconciler>) -> Self {
        Self { backend, reconciler }
    }

    /// Load the incident snapshot; returns how many records were merged
    pub async fn load_incidents(&self, ctx: &CallerContext) -> Result<usize> {
        let incidents = self.backend.get_incidents(ctx).await?;
        let count = incidents.len();
        self.reconciler.merge_incidents(incidents).await;
        info!(count, "Incident snapshot loaded");
        Ok(count)
    }

    /// Load the camera snapshot; returns how many records were merged
    pub async fn load_cameras(&self, ctx: &CallerContext) -> Result<usize> {
        let cameras = self.backend.get_cameras(ctx).await?;
        let count = cameras.len();
        self.reconciler.merge_cameras(cameras).await;
        info!(count, "Camera snapshot loaded");
        Ok(count)
    }
}
