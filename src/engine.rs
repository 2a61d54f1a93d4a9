//! SyncEngine - wiring and lifecycle for the whole client
//!
//! Owns one instance of every component and the active caller context.
//! `start` performs the initial snapshot load and brings up the event
//! stream; `shutdown` tears the stream down exactly once. All reads go
//! through the visibility filter with the current context.

use crate::backend_client::BackendClient;
use crate::error::Result;
use crate::event_stream::{EventStreamClient, StatsFrame, StreamConfig};
use crate::models::{
    CallerContext, Camera, Incident, IncidentStatus, NewCamera, RecordId,
};
use crate::mutation::OptimisticMutationManager;
use crate::record_store::{ChangeNotice, RecordStore, SubscriberId};
use crate::reconciler::Reconciler;
use crate::snapshot_loader::SnapshotLoader;
use crate::telemetry_feed::TelemetryFeed;
use crate::visibility;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{info, warn};

/// Engine configuration, read from the environment
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// REST base URL of the dashboard backend
    pub api_url: String,
    /// WebSocket endpoint for the alert stream
    pub ws_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_url: std::env::var("SENTINEL_API_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            ws_url: std::env::var("SENTINEL_WS_URL")
                .unwrap_or_else(|_| "ws://localhost:8001/ws/alerts".to_string()),
        }
    }
}

/// The assembled synchronization engine
pub struct SyncEngine {
    store: Arc<RecordStore>,
    telemetry: Arc<TelemetryFeed>,
    snapshots: SnapshotLoader,
    mutations: OptimisticMutationManager,
    stream: EventStreamClient,
    context: RwLock<CallerContext>,
}

impl SyncEngine {
    /// Wire up all components. No I/O happens until [`SyncEngine::start`].
    pub fn new(config: EngineConfig) -> Result<Self> {
        let backend = BackendClient::new(&config.api_url)?;
        let store = Arc::new(RecordStore::new());
        let telemetry = Arc::new(TelemetryFeed::new());
        let reconciler = Arc::new(Reconciler::new(store.clone(), telemetry.clone()));

        let snapshots = SnapshotLoader::new(backend.clone(), reconciler.clone());
        let mutations =
            OptimisticMutationManager::new(backend.clone(), store.clone(), reconciler.clone());
        let stream = EventStreamClient::new(StreamConfig::new(&config.ws_url), reconciler);

        Ok(Self {
            store,
            telemetry,
            snapshots,
            mutations,
            stream,
            context: RwLock::new(CallerContext::anonymous()),
        })
    }

    /// Identity used for backend calls and read projections
    pub async fn set_context(&self, ctx: CallerContext) {
        info!(user_id = %ctx.user_id, role = ?ctx.role, "Caller context updated");
        *self.context.write().await = ctx;
    }

    pub async fn context(&self) -> CallerContext {
        self.context.read().await.clone()
    }

    /// Load the initial snapshots and bring up the event stream.
    ///
    /// A failed snapshot fetch is logged and tolerated; the stream plus a
    /// later reload can still converge the store.
    pub async fn start(&self) {
        let ctx = self.context().await;
        match self.snapshots.load_incidents(&ctx).await {
            Ok(count) => info!(count, "Initial incident snapshot loaded"),
            Err(e) => warn!(error = %e, "Initial incident snapshot failed"),
        }
        match self.snapshots.load_cameras(&ctx).await {
            Ok(count) => info!(count, "Initial camera snapshot loaded"),
            Err(e) => warn!(error = %e, "Initial camera snapshot failed"),
        }
        self.stream.start().await;
    }

    /// Re-fetch both snapshots on demand (e.g. after regaining connectivity)
    pub async fn reload(&self) -> Result<()> {
        let ctx = self.context().await;
        self.snapshots.load_incidents(&ctx).await?;
        self.snapshots.load_cameras(&ctx).await?;
        Ok(())
    }

    /// Stop the event stream. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.stream.shutdown().await;
    }

    // ========================================
    // Reads (visibility-filtered)
    // ========================================

    /// Incidents visible to the current caller, newest first
    pub async fn incidents(&self) -> Vec<Incident> {
        let ctx = self.context().await;
        visibility::visible_incidents(&self.store.incidents().await, &ctx)
    }

    /// Cameras visible to the current caller, registration order
    pub async fn cameras(&self) -> Vec<Camera> {
        let ctx = self.context().await;
        visibility::visible_cameras(&self.store.cameras().await, &ctx)
    }

    /// Most recent stats frame, if any has arrived
    pub fn latest_stats(&self) -> Option<StatsFrame> {
        self.telemetry.latest()
    }

    /// Receiver that always holds the most recent stats frame
    pub fn stats_feed(&self) -> watch::Receiver<Option<StatsFrame>> {
        self.telemetry.subscribe()
    }

    /// Change notifications for every store mutation, in apply order
    pub async fn subscribe_changes(&self) -> (SubscriberId, mpsc::UnboundedReceiver<ChangeNotice>) {
        self.store.subscribe().await
    }

    pub async fn unsubscribe_changes(&self, id: &SubscriberId) {
        self.store.unsubscribe(id).await;
    }

    // ========================================
    // Writes (optimistic)
    // ========================================

    pub async fn create_camera(&self, fields: NewCamera) -> Result<Camera> {
        let ctx = self.context().await;
        self.mutations.create_camera(&ctx, fields).await
    }

    pub async fn delete_camera(&self, id: RecordId) -> Result<()> {
        let ctx = self.context().await;
        self.mutations.delete_camera(&ctx, id).await
    }

    pub async fn set_incident_visibility(&self, id: RecordId, status: IncidentStatus) -> Result<()> {
        let ctx = self.context().await;
        self.mutations.set_incident_visibility(&ctx, id, status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_engine_starts_anonymous() {
        let engine = SyncEngine::new(EngineConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            ws_url: "ws://127.0.0.1:9/ws/alerts".to_string(),
        })
        .unwrap();
        assert!(engine.context().await.is_anonymous());
        assert!(engine.incidents().await.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_before_start_is_harmless() {
        let engine = SyncEngine::new(EngineConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            ws_url: "ws://127.0.0.1:9/ws/alerts".to_string(),
        })
        .unwrap();
        engine.shutdown().await;
        engine.shutdown().await;
    }
}
