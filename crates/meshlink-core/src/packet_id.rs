//! Packet id generation.

/// Correlation identifier carried in `MeshPacket.id` and echoed back in
/// `Data.request_id`. Never 0.
pub type CorrelationId = u32;

/// Random non-zero packet ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct PacketIdGenerator;

impl PacketIdGenerator {
    /// Create a generator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// A non-zero id for which `is_live` returns false.
    pub fn next(&self, is_live: impl Fn(CorrelationId) -> bool) -> CorrelationId {
        self.next_with(rand::random::<u32>, is_live)
    }

    /// Like [`next`](Self::next) with an explicit source of candidates.
    pub fn next_with(
        &self,
        mut source: impl FnMut() -> u32,
        is_live: impl Fn(CorrelationId) -> bool,
    ) -> CorrelationId {
        loop {
            let candidate = source();
            if candidate != 0 && !is_live(candidate) {
                return candidate;
            }
            tracing::trace!("Packet id {} unusable, drawing again", candidate);
        }
    }
}
