//! Response correlator.
//!
//! Holds one waiter per outstanding request, keyed by the request's packet id,
//! and resolves it from the first inbound packet whose `request_id` matches.
//!
//! ```text
//!                 register()                 handle_packet()
//!   caller ────────────────▶ Pending ─────────────────────────▶ Resolved
//!                              │  │                             Rejected (routing error)
//!                              │  └── deadline ──────────────▶ TimedOut
//!                              └───── close() ───────────────▶ Rejected (Disconnected)
//! ```
//!
//! The live set is a `DashMap`. Whoever takes a waiter out of the map (a
//! match, the deadline, `close`, or a dropped [`PendingResponse`]) is the only
//! party that may complete it, so a waiter is completed at most once.

use crate::error::{RequestError, Result};
use crate::packet_id::CorrelationId;
use crate::routing::{Classification, classify};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use meshlink_proto::MeshPacket;
use std::borrow::Cow;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

const RECENT_CAPACITY: usize = 64;

/// What completes a waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// An application reply. Clean routing acks are ignored.
    Response,
    /// Delivery: a clean routing ack (or any reply) completes the waiter.
    Ack,
}

/// Outcome of offering a packet to the correlator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Packet carried no request id
    NotApplicable,
    /// A waiter was removed and completed
    Matched,
    /// A waiter exists for the id but did not accept this packet
    Filtered,
    /// The id belongs to a request that already completed
    Duplicate,
    /// No waiter knows the id
    Unmatched,
}

/// Correlator statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrelatorStats {
    /// Waiters registered
    pub registered: u64,
    /// Waiters resolved with a reply
    pub resolved: u64,
    /// Waiters rejected (routing errors, decode errors, disconnects)
    pub rejected: u64,
    /// Waiters that hit their deadline
    pub timed_out: u64,
    /// Waiters abandoned by their caller
    pub cancelled: u64,
    /// Packets referencing a request that already completed
    pub duplicates: u64,
    /// Packets referencing no known request
    pub unmatched: u64,
}

struct Waiter {
    token: u64,
    expected_from: Option<u32>,
    kind: ResponseKind,
    created_at: Instant,
    deadline: Instant,
    operation: Cow<'static, str>,
    sender: oneshot::Sender<Result<MeshPacket>>,
}

impl Waiter {
    fn accepts(&self, from: u32, classification: &Classification) -> bool {
        if self.expected_from.is_some_and(|expected| expected != from) {
            return false;
        }
        match classification {
            Classification::Ack => self.kind == ResponseKind::Ack,
            Classification::Reply | Classification::Rejected(_) => true,
        }
    }
}

#[derive(Default)]
struct Counters {
    registered: AtomicU64,
    resolved: AtomicU64,
    rejected: AtomicU64,
    timed_out: AtomicU64,
    cancelled: AtomicU64,
    duplicates: AtomicU64,
    unmatched: AtomicU64,
}

/// Live set of pending response waiters.
pub struct Correlator {
    waiters: DashMap<CorrelationId, Waiter>,
    closed: AtomicBool,
    next_token: AtomicU64,
    recent: Mutex<VecDeque<CorrelationId>>,
    counters: Counters,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    /// Create an open correlator with no waiters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            waiters: DashMap::new(),
            closed: AtomicBool::new(false),
            next_token: AtomicU64::new(1),
            recent: Mutex::new(VecDeque::with_capacity(RECENT_CAPACITY)),
            counters: Counters::default(),
        }
    }

    /// Register a waiter for `id`. Must be called before the request is sent.
    ///
    /// # Errors
    /// `InvalidState` if a waiter for `id` is already live, `Disconnected`
    /// if the correlator was closed.
    pub fn register(
        self: &Arc<Self>,
        id: CorrelationId,
        expected_from: Option<u32>,
        kind: ResponseKind,
        timeout: Duration,
        operation: impl Into<Cow<'static, str>>,
    ) -> Result<PendingResponse> {
        if self.is_closed() {
            return Err(RequestError::Disconnected);
        }
        if id == 0 {
            return Err(RequestError::invalid_state("correlation id 0 is reserved"));
        }

        let operation = operation.into();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let created_at = Instant::now();
        let deadline = created_at + timeout;
        let (sender, receiver) = oneshot::channel();

        match self.waiters.entry(id) {
            Entry::Occupied(_) => {
                return Err(RequestError::InvalidState(Cow::Owned(format!(
                    "request id {id} is already pending"
                ))));
            }
            Entry::Vacant(slot) => {
                slot.insert(Waiter {
                    token,
                    expected_from,
                    kind,
                    created_at,
                    deadline,
                    operation: operation.clone(),
                    sender,
                });
            }
        }

        // close() may have drained the map between the check and the insert
        if self.is_closed() && self.take(id, token).is_some() {
            return Err(RequestError::Disconnected);
        }

        self.counters.registered.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            "Registered {} waiter for packet {} ({:?}, from {:?}, {:?})",
            operation,
            id,
            kind,
            expected_from,
            timeout
        );

        Ok(PendingResponse {
            id,
            token,
            deadline,
            operation,
            receiver,
            correlator: Arc::clone(self),
            settled: false,
        })
    }

    fn take(&self, id: CorrelationId, token: u64) -> Option<Waiter> {
        self.waiters
            .remove_if(&id, |_, w| w.token == token)
            .map(|(_, w)| w)
    }

    fn remember(&self, id: CorrelationId) {
        let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        if recent.len() >= RECENT_CAPACITY {
            recent.pop_front();
        }
        recent.push_back(id);
    }

    fn recently_completed(&self, id: CorrelationId) -> bool {
        self.recent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&id)
    }

    /// Offer an inbound packet to the waiters.
    pub fn handle_packet(&self, packet: &MeshPacket) -> MatchOutcome {
        let Some(data) = packet.decoded() else {
            return MatchOutcome::NotApplicable;
        };
        let id = data.request_id;
        if id == 0 {
            return MatchOutcome::NotApplicable;
        }

        let classification = classify(packet);
        let removed = self
            .waiters
            .remove_if(&id, |_, w| w.accepts(packet.from, &classification));

        let Some((_, waiter)) = removed else {
            if self.waiters.contains_key(&id) {
                tracing::trace!(
                    "Packet from {:08x} for request {} not accepted by its waiter",
                    packet.from,
                    id
                );
                return MatchOutcome::Filtered;
            }
            if self.recently_completed(id) {
                self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Duplicate reply from {:08x} for request {}", packet.from, id);
                return MatchOutcome::Duplicate;
            }
            self.counters.unmatched.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("No waiter for request {} from {:08x}", id, packet.from);
            return MatchOutcome::Unmatched;
        };

        self.remember(id);
        let elapsed = waiter.created_at.elapsed();
        let result = match classification {
            Classification::Reply | Classification::Ack => {
                self.counters.resolved.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    "Resolved {} request {} from {:08x} after {:?}",
                    waiter.operation,
                    id,
                    packet.from,
                    elapsed
                );
                Ok(packet.clone())
            }
            Classification::Rejected(err) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    "Rejected {} request {} from {:08x}: {}",
                    waiter.operation,
                    id,
                    packet.from,
                    err
                );
                Err(err)
            }
        };
        // The caller may have gone away after the removal; nothing to do then
        let _ = waiter.sender.send(result);
        MatchOutcome::Matched
    }

    /// Reject every waiter past its deadline with `Timeout`. Returns how many
    /// were expired.
    pub fn expire_overdue(&self, now: Instant) -> usize {
        let overdue: Vec<(CorrelationId, u64)> = self
            .waiters
            .iter()
            .filter(|entry| entry.deadline <= now)
            .map(|entry| (*entry.key(), entry.token))
            .collect();

        let mut expired = 0;
        for (id, token) in overdue {
            if let Some(waiter) = self.take(id, token) {
                self.counters.timed_out.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Request {} ({}) expired", id, waiter.operation);
                let _ = waiter.sender.send(Err(RequestError::Timeout {
                    operation: waiter.operation,
                }));
                expired += 1;
            }
        }
        expired
    }

    /// Reject every live waiter with `Disconnected` and refuse new ones.
    /// Returns how many waiters were rejected.
    pub fn close(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        let ids: Vec<CorrelationId> = self.waiters.iter().map(|entry| *entry.key()).collect();
        let mut rejected = 0;
        for id in ids {
            if let Some((_, waiter)) = self.waiters.remove(&id) {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                let _ = waiter.sender.send(Err(RequestError::Disconnected));
                rejected += 1;
            }
        }
        if rejected > 0 {
            tracing::info!("Rejected {} pending requests on disconnect", rejected);
        }
        rejected
    }

    /// Returns true once `close` was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns true if a waiter for `id` is live.
    pub fn is_live(&self, id: CorrelationId) -> bool {
        self.waiters.contains_key(&id)
    }

    /// Number of live waiters.
    pub fn pending_count(&self) -> usize {
        self.waiters.len()
    }

    /// Correlator statistics.
    pub fn stats(&self) -> CorrelatorStats {
        let c = &self.counters;
        CorrelatorStats {
            registered: c.registered.load(Ordering::Relaxed),
            resolved: c.resolved.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            timed_out: c.timed_out.load(Ordering::Relaxed),
            cancelled: c.cancelled.load(Ordering::Relaxed),
            duplicates: c.duplicates.load(Ordering::Relaxed),
            unmatched: c.unmatched.load(Ordering::Relaxed),
        }
    }
}

/// A registered request waiting for its reply.
///
/// Dropping it without awaiting [`wait`](Self::wait) removes the waiter.
pub struct PendingResponse {
    id: CorrelationId,
    token: u64,
    deadline: Instant,
    operation: Cow<'static, str>,
    receiver: oneshot::Receiver<Result<MeshPacket>>,
    correlator: Arc<Correlator>,
    settled: bool,
}

impl std::fmt::Debug for PendingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResponse")
            .field("id", &self.id)
            .field("operation", &self.operation)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl PendingResponse {
    /// Packet id the waiter is keyed by.
    pub fn id(&self) -> CorrelationId {
        self.id
    }

    /// When the waiter times out.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Withdraw the waiter and reject it with `err` (used when the send
    /// failed). Returns false if it already completed.
    pub fn abort(mut self, err: RequestError) -> bool {
        self.settled = true;
        match self.correlator.take(self.id, self.token) {
            Some(waiter) => {
                self.correlator
                    .counters
                    .rejected
                    .fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Request {} ({}) aborted: {}", self.id, self.operation, err);
                drop(waiter);
                true
            }
            None => false,
        }
    }

    /// Wait for the reply, a rejection or the deadline.
    ///
    /// # Errors
    /// `Timeout` at the deadline, `Disconnected` on connection loss,
    /// `Routing`/`Decode` for error replies.
    pub async fn wait(mut self) -> Result<MeshPacket> {
        let outcome = tokio::time::timeout_at(self.deadline, &mut self.receiver).await;
        self.settled = true;
        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RequestError::Disconnected),
            Err(_) => match self.correlator.take(self.id, self.token) {
                Some(waiter) => {
                    self.correlator
                        .counters
                        .timed_out
                        .fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        "Request {} ({}) timed out after {:?}",
                        self.id,
                        waiter.operation,
                        waiter.created_at.elapsed()
                    );
                    Err(RequestError::Timeout {
                        operation: waiter.operation,
                    })
                }
                // Completed concurrently with the deadline: that result wins
                None => match (&mut self.receiver).await {
                    Ok(result) => result,
                    Err(_) => Err(RequestError::Disconnected),
                },
            },
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if self.correlator.take(self.id, self.token).is_some() {
            self.correlator
                .counters
                .cancelled
                .fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Request {} ({}) abandoned by caller", self.id, self.operation);
        }
    }
}
