//! Delivery acknowledgment tracking.
//!
//! Every routing packet that comes in is recorded as an ack from its sender
//! for the request id it carries, whether or not anything is waiting for it.
//! Records live in a bounded ring for the session's lifetime and are never
//! consumed, so several independent queries can observe the same ack.
//!
//! Waiters subscribe to a broadcast of new records *before* checking the log,
//! which closes the window between "not in the log yet" and "started
//! listening".

use crate::error::{RequestError, Result};
use crate::packet_id::CorrelationId;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

const NOTIFY_CAPACITY: usize = 256;

/// One delivery acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckRecord {
    /// Id of the acknowledged packet
    pub correlation_id: CorrelationId,
    /// Node that sent the ack
    pub acking_node: u32,
    /// Hops the ack travelled
    pub hops_away: u32,
    /// Routing error code carried by the ack (0 for a clean ack)
    pub error_code: i32,
    /// When the ack was recorded
    pub received_at: Instant,
}

impl AckRecord {
    /// Returns true when the ack carried no routing error.
    pub const fn is_clean(&self) -> bool {
        self.error_code == 0
    }
}

/// Append-only ring of ack records with change notification.
pub struct AckTracker {
    log: Mutex<VecDeque<AckRecord>>,
    capacity: usize,
    notify: Mutex<Option<broadcast::Sender<AckRecord>>>,
    recorded: AtomicU64,
    evicted: AtomicU64,
}

impl AckTracker {
    /// Create a tracker keeping at most `capacity` records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            log: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            notify: Mutex::new(Some(tx)),
            recorded: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    fn log(&self) -> std::sync::MutexGuard<'_, VecDeque<AckRecord>> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sender(&self) -> Option<broadcast::Sender<AckRecord>> {
        self.notify
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Record an ack. Never fails; evicts the oldest record when full.
    pub fn record_ack(
        &self,
        correlation_id: CorrelationId,
        acking_node: u32,
        hops_away: u32,
        error_code: i32,
    ) -> AckRecord {
        let record = AckRecord {
            correlation_id,
            acking_node,
            hops_away,
            error_code,
            received_at: Instant::now(),
        };
        {
            let mut log = self.log();
            if log.len() >= self.capacity {
                log.pop_front();
                self.evicted.fetch_add(1, Ordering::Relaxed);
            }
            log.push_back(record);
        }
        self.recorded.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            "Ack for packet {} from {:08x} ({} hops, code {})",
            correlation_id,
            acking_node,
            hops_away,
            error_code
        );
        if let Some(tx) = self.sender() {
            // No receivers is fine
            let _ = tx.send(record);
        }
        record
    }

    /// Most recent ack for `correlation_id` sent by `from_node`.
    pub fn find_ack(&self, correlation_id: CorrelationId, from_node: u32) -> Option<AckRecord> {
        self.log()
            .iter()
            .rev()
            .find(|r| r.correlation_id == correlation_id && r.acking_node == from_node)
            .copied()
    }

    /// Every ack recorded for `correlation_id`, oldest first.
    pub fn acks_for(&self, correlation_id: CorrelationId) -> Vec<AckRecord> {
        self.log()
            .iter()
            .filter(|r| r.correlation_id == correlation_id)
            .copied()
            .collect()
    }

    /// Subscribe to records as they are added.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<AckRecord>> {
        self.sender().map(|tx| tx.subscribe())
    }

    /// Wait until an ack for `correlation_id` from `from_node` exists.
    ///
    /// Resolves immediately if the ack was recorded before the call.
    ///
    /// # Errors
    /// `Timeout` when no ack arrives within `timeout`, `Disconnected` when
    /// the tracker is closed first.
    pub async fn wait_for_ack(
        &self,
        correlation_id: CorrelationId,
        from_node: u32,
        timeout: Duration,
    ) -> Result<AckRecord> {
        let rx = self.subscribe();
        if let Some(record) = self.find_ack(correlation_id, from_node) {
            return Ok(record);
        }
        let Some(mut rx) = rx else {
            return Err(RequestError::Disconnected);
        };

        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(r) if r.correlation_id == correlation_id && r.acking_node == from_node => {
                        return Ok(r);
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::trace!("Ack waiter lagged by {} records", skipped);
                        if let Some(record) = self.find_ack(correlation_id, from_node) {
                            return Ok(record);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(RequestError::Disconnected);
                    }
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(RequestError::timeout("wait_for_ack")),
        }
    }

    /// Stop notifying; pending and future waits fail with `Disconnected`
    /// unless the ack is already in the log.
    pub fn close(&self) {
        self.notify
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.log().len()
    }

    /// Returns true when no records are held.
    pub fn is_empty(&self) -> bool {
        self.log().is_empty()
    }

    /// Records added since creation.
    pub fn total_recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }

    /// Records evicted to respect the capacity.
    pub fn total_evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }
}
