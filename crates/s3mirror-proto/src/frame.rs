//! Length-prefixed frame codec.
//!
//! A frame is a fixed 4-byte magic number, a big-endian u32 body
//! length, and the body bytes. Decoding is peek-before-consume: the
//! codec never takes bytes out of the buffer until a complete frame is
//! available, so it can be re-invoked on every read-readiness event
//! without losing a partially received frame.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Fixed 4-byte magic number opening every frame.
pub const MAGIC: [u8; 4] = [10, 12, 10, 15];

/// Greeting line the server writes on connection open. The client must
/// read and match it exactly before sending any frames.
pub const GREETING: &str = "server connected\n";

/// Maximum accepted body length. Bodies carry whole object payloads,
/// so the cap bounds allocation rather than typical message size.
pub const MAX_BODY_LEN: usize = 64 * 1024 * 1024;

const HEADER_LEN: usize = MAGIC.len() + 4;

/// Errors produced while encoding or decoding frames.
///
/// An incomplete frame is not an error: `decode` reports it as
/// `Ok(None)` and leaves the buffer untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Stream does not start with the protocol magic number. Fatal for
    /// the connection.
    #[error("invalid magic number {0:?}")]
    InvalidMagic([u8; 4]),
    /// Declared body length exceeds [`MAX_BODY_LEN`].
    #[error("frame body of {0} bytes exceeds limit of {MAX_BODY_LEN}")]
    BodyTooLarge(usize),
}

/// Stateless frame encoder/decoder.
///
/// Per-connection buffering lives in the caller's `BytesMut`; the codec
/// itself holds no cross-call data.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl FrameCodec {
    /// Encode `body` into a complete frame.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::BodyTooLarge`] if `body` exceeds
    /// [`MAX_BODY_LEN`].
    pub fn encode(self, body: &[u8]) -> Result<Bytes, FrameError> {
        if body.len() > MAX_BODY_LEN {
            return Err(FrameError::BodyTooLarge(body.len()));
        }

        let mut frame = BytesMut::with_capacity(HEADER_LEN + body.len());
        frame.put_slice(&MAGIC);
        #[allow(clippy::cast_possible_truncation)]
        frame.put_u32(body.len() as u32);
        frame.put_slice(body);
        Ok(frame.freeze())
    }

    /// Try to decode one frame from the front of `buf`.
    ///
    /// Returns `Ok(None)` when `buf` does not yet hold a complete frame;
    /// no bytes are consumed in that case. On success, exactly one
    /// frame's worth of bytes is consumed and the body returned.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidMagic`] if the buffered bytes do not
    /// open with [`MAGIC`], or [`FrameError::BodyTooLarge`] if the
    /// declared length exceeds [`MAX_BODY_LEN`]. Both are fatal for the
    /// connection the buffer belongs to.
    pub fn decode(self, buf: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
        if buf.len() < HEADER_LEN {
            return Ok(None);
        }

        if buf[..MAGIC.len()] != MAGIC {
            let mut seen = [0u8; 4];
            seen.copy_from_slice(&buf[..MAGIC.len()]);
            return Err(FrameError::InvalidMagic(seen));
        }

        let body_len =
            u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
        if body_len > MAX_BODY_LEN {
            return Err(FrameError::BodyTooLarge(body_len));
        }

        if buf.len() < HEADER_LEN + body_len {
            return Ok(None);
        }

        buf.advance(HEADER_LEN);
        Ok(Some(buf.split_to(body_len).freeze()))
    }
}
