//! Monotonic sequence generator for acknowledgment correlation.

/// Generator for the rolling sequence numbers stamped on outgoing
/// envelopes.
///
/// Values cycle through `1..=127` so they fit the 7-bit field of the
/// acknowledgment byte; `0` and `128` are never emitted. Wraparound
/// means a sequence number is a correlation hint for the most recent
/// in-flight message, not a globally unique id, and nothing survives a
/// restart.
///
/// The generator is owned by the sender loop; exclusive `&mut` access
/// is the single-writer discipline.
#[derive(Debug, Default)]
pub struct SeqGenerator {
    last: u8,
}

impl SeqGenerator {
    /// Create a generator whose first value will be `1`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the next sequence number, wrapping `127 -> 1`.
    pub fn next(&mut self) -> u8 {
        self.last = if self.last >= 127 { 1 } else { self.last + 1 };
        self.last
    }
}
