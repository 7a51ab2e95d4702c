//! Single-byte acknowledgment.
//!
//! Bit layout, exact and easy to get wrong:
//!
//! ```text
//! bit 7  6  5  4  3  2  1  0
//!     [---- seq (7 bits) ---][ok]
//! ```
//!
//! The ok flag is the least significant bit; the sequence number
//! occupies bits 1..=7, which is why sequence numbers are confined to
//! `1..=127`.

/// Per-message confirmation sent by the server after applying an
/// envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Sequence number of the envelope being confirmed, `1..=127`.
    pub seq: u8,
    /// Whether the envelope was applied successfully.
    pub ok: bool,
}

impl Ack {
    /// Pack into the wire byte.
    #[must_use]
    pub fn to_byte(self) -> u8 {
        (self.seq << 1) | u8::from(self.ok)
    }

    /// Unpack from the wire byte.
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        Self {
            seq: byte >> 1,
            ok: byte & 1 == 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ack_byte_roundtrip() {
        for seq in 1..=127u8 {
            for ok in [true, false] {
                let ack = Ack { seq, ok };
                assert_eq!(Ack::from_byte(ack.to_byte()), ack);
            }
        }
    }

    #[test]
    fn ok_flag_is_low_bit() {
        let ack = Ack { seq: 5, ok: true };
        assert_eq!(ack.to_byte() & 1, 1);
        assert_eq!(ack.to_byte() >> 1, 5);

        let nack = Ack { seq: 5, ok: false };
        assert_eq!(nack.to_byte() & 1, 0);
    }
}
