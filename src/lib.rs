//! Sentinel Console Sync Engine
//!
//! Client-side synchronization core for the Sentinel surveillance
//! dashboard. Keeps local incident and camera collections consistent with
//! the backend across an initial REST snapshot, an unordered push event
//! stream, and optimistic local writes.
//!
//! ## Architecture (8 Components)
//!
//! 1. RecordStore - SSoT for local incidents and cameras
//! 2. BackendClient - REST transport with caller identity
//! 3. SnapshotLoader - Authoritative baseline fetch
//! 4. EventStreamClient - WebSocket intake with reconnect
//! 5. Reconciler - Merge authority for all inbound events
//! 6. OptimisticMutationManager - Local-first writes, confirm/rollback
//! 7. VisibilityFilter - Role-aware read projections
//! 8. TelemetryFeed - Most-recent-wins stats distribution
//!
//! ## Design Principles
//!
//! - SSoT: every store mutation flows through the Reconciler or the
//!   mutation manager, never directly from transport code
//! - Events may arrive duplicated, out of order, or for records not yet
//!   known; the merge rules make all of those safe

pub mod backend_client;
pub mod engine;
pub mod error;
pub mod event_stream;
pub mod models;
pub mod mutation;
pub mod record_store;
pub mod reconciler;
pub mod snapshot_loader;
pub mod telemetry_feed;
pub mod visibility;

pub use engine::{EngineConfig, SyncEngine};
pub use error::{Error, Result};
