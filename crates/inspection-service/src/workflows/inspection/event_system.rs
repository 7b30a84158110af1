//! Bounded background queue for inspection events.
//!
//! Workflows hand events to an [`InspectionEventHandle`] and return immediately. A single
//! [`InspectionEventSystem`] task owned by the process publishes them in order. When the
//! queue is full the event is dropped and counted; on shutdown whatever is still queued is
//! published until the drain timeout runs out.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, warn};

use super::events::{EventPublisher, InspectionEvent};

#[derive(Debug, Clone)]
pub struct EventSystemConfig {
    pub channel_capacity: usize,
    pub drain_timeout: Duration,
}

impl Default for EventSystemConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            drain_timeout: Duration::from_millis(5000),
        }
    }
}

enum EventCommand {
    Publish(Box<InspectionEvent>),
    Shutdown { resp: oneshot::Sender<ShutdownReport> },
}

#[derive(Default)]
struct AtomicStats {
    dispatched: AtomicU64,
    published: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventSystemStats {
    pub dispatched: u64,
    pub published: u64,
    pub failed: u64,
    pub dropped: u64,
    pub queued: usize,
    pub capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    pub success: bool,
    pub drained: u64,
    pub duration_ms: u64,
}

impl ShutdownReport {
    fn failed() -> Self {
        Self {
            success: false,
            drained: 0,
            duration_ms: 0,
        }
    }
}

/// Cloneable sender side of the queue.
#[derive(Clone)]
pub struct InspectionEventHandle {
    sender: mpsc::Sender<EventCommand>,
    stats: Arc<AtomicStats>,
    running: Arc<AtomicBool>,
}

impl std::fmt::Debug for InspectionEventHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InspectionEventHandle")
            .field("capacity", &self.sender.capacity())
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish()
    }
}

impl InspectionEventHandle {
    /// Queue an event without waiting. Returns `false` when it was dropped.
    pub fn dispatch(&self, event: InspectionEvent) -> bool {
        self.stats.dispatched.fetch_add(1, Ordering::SeqCst);
        let inspection_id = event.inspection.id;
        let event_type = event.r#type.label();

        match self.sender.try_send(EventCommand::Publish(Box::new(event))) {
            Ok(()) => {
                debug!(inspection_id, event_type, "inspection event queued");
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::SeqCst);
                warn!(
                    inspection_id,
                    event_type, "inspection event dropped: queue is full"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::SeqCst);
                error!(
                    inspection_id,
                    event_type, "inspection event dropped: event system stopped"
                );
                false
            }
        }
    }

    pub fn stats(&self) -> EventSystemStats {
        EventSystemStats {
            dispatched: self.stats.dispatched.load(Ordering::SeqCst),
            published: self.stats.published.load(Ordering::SeqCst),
            failed: self.stats.failed.load(Ordering::SeqCst),
            dropped: self.stats.dropped.load(Ordering::SeqCst),
            queued: self.sender.max_capacity() - self.sender.capacity(),
            capacity: self.sender.max_capacity(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ask the system to drain and stop, waiting for its report.
    pub async fn shutdown(&self) -> ShutdownReport {
        let (resp, rx) = oneshot::channel();
        if self
            .sender
            .send(EventCommand::Shutdown { resp })
            .await
            .is_err()
        {
            return ShutdownReport::failed();
        }
        rx.await.unwrap_or_else(|_| ShutdownReport::failed())
    }
}

/// Receiver side; spawn [`InspectionEventSystem::run`] once.
pub struct InspectionEventSystem {
    receiver: mpsc::Receiver<EventCommand>,
    publisher: Arc<dyn EventPublisher>,
    stats: Arc<AtomicStats>,
    config: EventSystemConfig,
    running: Arc<AtomicBool>,
}

impl InspectionEventSystem {
    pub fn new(
        publisher: Arc<dyn EventPublisher>,
        config: EventSystemConfig,
    ) -> (Self, InspectionEventHandle) {
        let (sender, receiver) = mpsc::channel(config.channel_capacity.max(1));
        let stats = Arc::new(AtomicStats::default());
        let running = Arc::new(AtomicBool::new(false));

        let handle = InspectionEventHandle {
            sender,
            stats: Arc::clone(&stats),
            running: Arc::clone(&running),
        };
        let system = Self {
            receiver,
            publisher,
            stats,
            config,
            running,
        };

        (system, handle)
    }

    #[instrument(skip(self), name = "inspection_event_loop")]
    pub async fn run(mut self) {
        info!("inspection event system started");
        self.running.store(true, Ordering::SeqCst);

        while let Some(command) = self.receiver.recv().await {
            match command {
                EventCommand::Publish(event) => self.publish(&event).await,
                EventCommand::Shutdown { resp } => {
                    let report = self.drain().await;
                    let _ = resp.send(report);
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("inspection event system stopped");
    }

    async fn publish(&self, event: &InspectionEvent) {
        match self.publisher.publish(event).await {
            Ok(()) => {
                self.stats.published.fetch_add(1, Ordering::SeqCst);
                debug!(
                    inspection_id = event.inspection.id,
                    event_type = event.r#type.label(),
                    "inspection event published"
                );
            }
            Err(err) => {
                self.stats.failed.fetch_add(1, Ordering::SeqCst);
                error!(
                    inspection_id = event.inspection.id,
                    event_type = event.r#type.label(),
                    error = %err,
                    "failed to publish inspection event"
                );
            }
        }
    }

    async fn drain(&mut self) -> ShutdownReport {
        let started = Instant::now();
        let deadline = started + self.config.drain_timeout;
        self.receiver.close();

        let mut drained = 0u64;
        let mut success = true;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.receiver.recv()).await {
                Ok(Some(EventCommand::Publish(event))) => {
                    self.publish(&event).await;
                    drained += 1;
                }
                Ok(Some(EventCommand::Shutdown { resp })) => {
                    let _ = resp.send(ShutdownReport {
                        success: true,
                        drained: 0,
                        duration_ms: 0,
                    });
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(drained, "inspection event drain timed out");
                    success = false;
                    break;
                }
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(drained, duration_ms, "inspection event queue drained");
        ShutdownReport {
            success,
            drained,
            duration_ms,
        }
    }
}
