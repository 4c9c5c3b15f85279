//! In-memory notification queue.
//!
//! Delivery is at-most-once: one worker drains a bounded channel, so no
//! notification is handed to the channels twice by competing drainers.
//! Nothing is persisted. `shutdown` lets the worker finish what is already
//! queued; anything still in memory when the process dies is lost.
//!
//! Notifications carrying an idempotency key are remembered in a sliding
//! window and repeats inside that window are skipped.

use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::notifications::dispatcher::{Notification, Notifier};
use crate::notifications::error::NotificationError;

#[derive(Debug, Default)]
struct QueueCounters {
    enqueued: AtomicU64,
    processed: AtomicU64,
    duplicates: AtomicU64,
    rejected: AtomicU64,
    deliveries_ok: AtomicU64,
    deliveries_failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub processed: u64,
    pub duplicates: u64,
    /// Notifications whose content could not be rendered
    pub rejected: u64,
    pub deliveries_ok: u64,
    pub deliveries_failed: u64,
}

/// Remembers the last `capacity` idempotency keys
struct DedupWindow {
    capacity: usize,
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl DedupWindow {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            seen: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// True if the key is new (and records it)
    fn insert(&mut self, key: &str) -> bool {
        if self.capacity == 0 {
            return true;
        }
        if self.seen.contains(key) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(key.to_string());
        self.order.push_back(key.to_string());
        true
    }
}

pub struct NotificationQueue {
    sender: Mutex<Option<mpsc::Sender<Notification>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<QueueCounters>,
}

impl NotificationQueue {
    /// Spawn the worker on the current tokio runtime
    pub fn start(notifier: Arc<Notifier>, capacity: usize, dedup_window: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(QueueCounters::default());

        let worker = tokio::spawn(run_worker(
            notifier,
            receiver,
            DedupWindow::new(dedup_window),
            counters.clone(),
        ));

        tracing::info!(capacity, dedup_window, "Notification queue started");

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            counters,
        }
    }

    fn sender(&self) -> Result<mpsc::Sender<Notification>, NotificationError> {
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(NotificationError::QueueClosed)
    }

    /// Waits for room in the queue
    pub async fn enqueue(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sender()?
            .send(notification)
            .await
            .map_err(|_| NotificationError::QueueClosed)?;
        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Fails immediately when the queue is full
    pub fn try_enqueue(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sender()?.try_send(notification).map_err(|e| match e {
            TrySendError::Full(_) => NotificationError::QueueFull,
            TrySendError::Closed(_) => NotificationError::QueueClosed,
        })?;
        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn stats(&self) -> QueueStats {
        let c = &self.counters;
        QueueStats {
            enqueued: c.enqueued.load(Ordering::Relaxed),
            processed: c.processed.load(Ordering::Relaxed),
            duplicates: c.duplicates.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            deliveries_ok: c.deliveries_ok.load(Ordering::Relaxed),
            deliveries_failed: c.deliveries_failed.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting work and wait until the worker has drained the queue
    pub async fn shutdown(&self) {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner()).take();
        drop(sender);

        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!("Notification worker ended abnormally: {}", e);
            }
        }

        tracing::info!(stats = ?self.stats(), "Notification queue stopped");
    }
}

async fn run_worker(
    notifier: Arc<Notifier>,
    mut receiver: mpsc::Receiver<Notification>,
    mut dedup: DedupWindow,
    counters: Arc<QueueCounters>,
) {
    while let Some(notification) = receiver.recv().await {
        if let Some(key) = notification.idempotency_key.as_deref() {
            if !dedup.insert(key) {
                tracing::debug!(idempotency_key = key, "Skipping duplicate notification");
                counters.duplicates.fetch_add(1, Ordering::Relaxed);
                counters.processed.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        }

        match notifier.dispatch(&notification).await {
            Ok(outcomes) => {
                for outcome in &outcomes {
                    if outcome.success {
                        counters.deliveries_ok.fetch_add(1, Ordering::Relaxed);
                    } else {
                        counters.deliveries_failed.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            channel = %outcome.channel,
                            recipient = %notification.recipient,
                            "Queued notification not delivered: {}",
                            outcome.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                }
            }
            Err(e) => {
                counters.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::error!(recipient = %notification.recipient, "Queued notification rejected: {}", e);
            }
        }

        counters.processed.fetch_add(1, Ordering::Relaxed);
    }

    tracing::debug!("Notification worker drained");
}
