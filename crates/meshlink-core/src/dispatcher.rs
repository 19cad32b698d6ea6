//! Frame dispatcher.
//!
//! Decodes raw `FromRadio` frames into [`InboundEnvelope`]s and fans each one
//! out to the handlers subscribed to its [`Category`].
//!
//! ```text
//!  raw frame ──decode──▶ InboundEnvelope ──category──▶ snapshot ──▶ handler 1
//!                                                          │       handler 2
//!                                                          └─────▶ ...
//! ```
//!
//! Each category holds an `Arc<Vec<_>>` that is replaced wholesale on
//! subscribe/unsubscribe. A dispatch pass clones the `Arc` and iterates the
//! snapshot, so handlers added or removed during the pass do not affect it,
//! and handlers may subscribe or unsubscribe from inside a callback.

use crate::envelope::{Category, InboundEnvelope};
use meshlink_proto::{CodecError, FromRadio, decode_as};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Handle returned by [`Dispatcher::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&InboundEnvelope) + Send + Sync>;
type HandlerList = Arc<Vec<(SubscriptionId, Handler)>>;

/// Dispatch statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Envelopes dispatched
    pub dispatched: u64,
    /// Frames dropped because they did not decode
    pub decode_failures: u64,
}

/// Category-keyed fan-out of inbound envelopes.
pub struct Dispatcher {
    lists: [RwLock<HandlerList>; Category::COUNT],
    next_id: AtomicU64,
    dispatched: AtomicU64,
    decode_failures: AtomicU64,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Create a dispatcher with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lists: std::array::from_fn(|_| RwLock::new(Arc::new(Vec::new()))),
            next_id: AtomicU64::new(1),
            dispatched: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
        }
    }

    fn list(&self, category: Category) -> &RwLock<HandlerList> {
        &self.lists[category.index()]
    }

    fn snapshot(&self, category: Category) -> HandlerList {
        let guard = self
            .list(category)
            .read()
            .unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Register `handler` for envelopes of `category`.
    pub fn subscribe<F>(&self, category: Category, handler: F) -> SubscriptionId
    where
        F: Fn(&InboundEnvelope) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut guard = self
            .list(category)
            .write()
            .unwrap_or_else(|e| e.into_inner());
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push((id, Arc::new(handler) as Handler));
        *guard = Arc::new(next);
        tracing::trace!("Subscribed {:?} to {:?}", id, category);
        id
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        for category in Category::ALL {
            let mut guard = self
                .list(category)
                .write()
                .unwrap_or_else(|e| e.into_inner());
            if guard.iter().any(|(sid, _)| *sid == id) {
                let next: Vec<_> = guard
                    .iter()
                    .filter(|(sid, _)| *sid != id)
                    .cloned()
                    .collect();
                *guard = Arc::new(next);
                return true;
            }
        }
        false
    }

    /// Number of handlers subscribed to `category`.
    pub fn subscriber_count(&self, category: Category) -> usize {
        self.snapshot(category).len()
    }

    /// Invoke every handler subscribed to the envelope's category. Returns
    /// the number of handlers invoked.
    pub fn dispatch(&self, envelope: &InboundEnvelope) -> usize {
        let handlers = self.snapshot(envelope.category());
        for (_, handler) in handlers.iter() {
            handler(envelope);
        }
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        handlers.len()
    }

    /// Decode a raw `FromRadio` frame and dispatch it.
    ///
    /// # Errors
    /// Returns the decode failure; the frame is dropped and the dispatcher
    /// stays usable.
    pub fn dispatch_frame(&self, bytes: &[u8]) -> Result<usize, CodecError> {
        let record: FromRadio = match decode_as(bytes) {
            Ok(record) => record,
            Err(e) => {
                self.decode_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Dropping undecodable frame ({} bytes): {}", bytes.len(), e);
                return Err(e);
            }
        };
        let envelope = InboundEnvelope::from(record);
        tracing::trace!("Dispatching {:?} envelope", envelope.category());
        Ok(self.dispatch(&envelope))
    }

    /// Dispatch statistics.
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshlink_proto::{MeshPacket, encode, from_radio};
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn packet_frame(id: u32) -> Vec<u8> {
        encode(&FromRadio {
            id: 1,
            payload_variant: Some(from_radio::PayloadVariant::Packet(MeshPacket {
                id,
                ..Default::default()
            })),
        })
    }

    #[test]
    fn test_dispatch_by_category() {
        let dispatcher = Dispatcher::new();
        let packets = Arc::new(AtomicUsize::new(0));
        let channels = Arc::new(AtomicUsize::new(0));

        let p = Arc::clone(&packets);
        dispatcher.subscribe(Category::Packet, move |_| {
            p.fetch_add(1, Ordering::SeqCst);
        });
        let c = Arc::clone(&channels);
        dispatcher.subscribe(Category::Channel, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(dispatcher.dispatch_frame(&packet_frame(7)).unwrap(), 1);
        assert_eq!(packets.load(Ordering::SeqCst), 1);
        assert_eq!(channels.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_undecodable_frame_is_dropped() {
        let dispatcher = Dispatcher::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        dispatcher.subscribe(Category::Packet, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert!(dispatcher.dispatch_frame(&[0x12, 0xff, 0x01]).is_err());
        assert_eq!(dispatcher.stats().decode_failures, 1);

        // Still dispatches afterwards
        assert_eq!(dispatcher.dispatch_frame(&packet_frame(1)).unwrap(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let dispatcher = Dispatcher::new();
        let id = dispatcher.subscribe(Category::NodeInfo, |_| {});
        assert_eq!(dispatcher.subscriber_count(Category::NodeInfo), 1);
        assert!(dispatcher.unsubscribe(id));
        assert!(!dispatcher.unsubscribe(id));
        assert_eq!(dispatcher.subscriber_count(Category::NodeInfo), 0);
    }

    #[test]
    fn test_subscribe_during_dispatch_does_not_affect_pass() {
        let dispatcher = Arc::new(Dispatcher::new());
        let calls = Arc::new(Mutex::new(Vec::new()));

        let d = Arc::clone(&dispatcher);
        let log = Arc::clone(&calls);
        dispatcher.subscribe(Category::Packet, move |_| {
            log.lock().unwrap().push("outer");
            let inner_log = Arc::clone(&log);
            d.subscribe(Category::Packet, move |_| {
                inner_log.lock().unwrap().push("inner");
            });
        });

        let envelope = InboundEnvelope::Packet(MeshPacket::default());
        assert_eq!(dispatcher.dispatch(&envelope), 1);
        assert_eq!(*calls.lock().unwrap(), vec!["outer"]);

        // The handler added during the first pass runs on the next one
        assert_eq!(dispatcher.dispatch(&envelope), 2);
        assert_eq!(*calls.lock().unwrap(), vec!["outer", "outer", "inner"]);
    }

    #[test]
    fn test_unsubscribe_during_dispatch_does_not_affect_pass() {
        let dispatcher = Arc::new(Dispatcher::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let victim = Arc::new(Mutex::new(None::<SubscriptionId>));

        let d = Arc::clone(&dispatcher);
        let v = Arc::clone(&victim);
        dispatcher.subscribe(Category::Packet, move |_| {
            if let Some(id) = v.lock().unwrap().take() {
                d.unsubscribe(id);
            }
        });
        let h = Arc::clone(&hits);
        let id = dispatcher.subscribe(Category::Packet, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        *victim.lock().unwrap() = Some(id);

        let envelope = InboundEnvelope::Packet(MeshPacket::default());
        assert_eq!(dispatcher.dispatch(&envelope), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.dispatch(&envelope), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
