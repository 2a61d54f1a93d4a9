//! EventStreamClient - persistent push subscription
//!
//! ## Responsibilities
//!
//! - One logical WebSocket subscription per session, shared process-wide
//! - Decode inbound frames into [`StreamEvent`] envelopes; malformed frames
//!   are logged and dropped, never fatal
//! - Reconnect with capped exponential backoff, indefinitely
//! - Exactly-once shutdown; events still in flight are discarded
//!
//! The client keeps no since-cursor. A consumer that needs gap-free state
//! after a reconnect re-runs the SnapshotLoader; upsert idempotence and
//! arrival-order status reconciliation make the overlap safe.

mod types;

pub use types::{
    IncidentCreatedEvent, IncidentStatusChangedEvent, SnapshotReplaceEvent, StatsFrame,
    StreamEvent, DEFAULT_CONFIDENCE,
};

use crate::reconciler::Reconciler;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Stream connection settings
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Full ws:// or wss:// URL of the alert channel
    pub ws_url: String,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl StreamConfig {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Next reconnect delay: doubled, capped at the ceiling
fn next_backoff(current: Duration, max: Duration) -> Duration {
    (current * 2).min(max)
}

/// EventStreamClient instance
pub struct EventStreamClient {
    config: StreamConfig,
    reconciler: Arc<Reconciler>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    closed: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl EventStreamClient {
    pub fn new(config: StreamConfig, reconciler: Arc<Reconciler>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            reconciler,
            shutdown_tx,
            shutdown_rx,
            closed: AtomicBool::new(false),
            task: Mutex::new(None),
        }
    }

    /// Open the subscription. Subsequent calls are no-ops.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return;
        }
        let config = self.config.clone();
        let reconciler = self.reconciler.clone();
        let shutdown_rx = self.shutdown_rx.clone();
        *task = Some(tokio::spawn(run_loop(config, reconciler, shutdown_rx)));
    }

    /// Close the subscription exactly once. Safe to call repeatedly; later
    /// calls return immediately. No events are forwarded after this returns.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
        info!("Event stream shut down");
    }
}

async fn run_loop(
    config: StreamConfig,
    reconciler: Arc<Reconciler>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut backoff = config.initial_backoff;

    loop {
        if *shutdown_rx.borrow() {
            return;
        }

        match connect_async(&config.ws_url).await {
            Ok((socket, _)) => {
                info!(url = %config.ws_url, "Event stream connected");
                backoff = config.initial_backoff;

                let (mut write, mut read) = socket.split();
                loop {
                    // Biased so shutdown wins even when a frame is already
                    // buffered; in-flight events are discarded, not applied
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.changed() => {
                            let _ = write.send(Message::Close(None)).await;
                            return;
                        }
                        frame = read.next() => match frame {
                            Some(Ok(Message::Text(text))) => {
                                dispatch(&reconciler, &text).await;
                            }
                            Some(Ok(Message::Ping(data))) => {
                                let _ = write.send(Message::Pong(data)).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                warn!("Event stream closed by server");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!(error = %e, "Event stream read error");
                                break;
                            }
                        }
                    }
                }
            }
            Err(e) => {
                warn!(url = %config.ws_url, error = %e, "Event stream connect failed");
            }
        }

        // Connection lost: wait out the backoff unless shutting down
        debug!(backoff_ms = backoff.as_millis() as u64, "Reconnecting after backoff");
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => return,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = next_backoff(backoff, config.max_backoff);
    }
}

/// Decode one frame and hand it to the reconciler. A frame that fails to
/// decode is dropped on its own; later frames are unaffected.
async fn dispatch(reconciler: &Reconciler, text: &str) {
    match serde_json::from_str::<StreamEvent>(text) {
        Ok(event) => reconciler.apply(event).await,
        Err(e) => {
            warn!(error = %e, frame = %truncate(text, 256), "Dropping malformed stream frame");
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
