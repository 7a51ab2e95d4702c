//! The event envelope: the serializable unit of replication.

use serde::{Deserialize, Serialize};

/// What changed on the source cluster.
///
/// The set is closed on our side but the wire form is a bare `u32`, so
/// a peer speaking a newer protocol revision decodes to
/// [`EventKind::Unknown`] instead of failing. Unknown kinds are a no-op
/// at the dispatcher, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u32", from = "u32")]
pub enum EventKind {
    /// Full IAM state snapshot for the source cluster.
    IamExport,
    /// Full configuration metadata for one bucket.
    BucketMetaExport,
    /// An object was created or overwritten.
    ObjectPut,
    /// An object was removed.
    ObjectDelete,
    /// A kind this build does not recognize.
    Unknown(u32),
}

impl From<u32> for EventKind {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::IamExport,
            1 => Self::BucketMetaExport,
            2 => Self::ObjectPut,
            3 => Self::ObjectDelete,
            other => Self::Unknown(other),
        }
    }
}

impl From<EventKind> for u32 {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::IamExport => 0,
            EventKind::BucketMetaExport => 1,
            EventKind::ObjectPut => 2,
            EventKind::ObjectDelete => 3,
            EventKind::Unknown(other) => other,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IamExport => write!(f, "iam-export"),
            Self::BucketMetaExport => write!(f, "bucket-meta-export"),
            Self::ObjectPut => write!(f, "object-put"),
            Self::ObjectDelete => write!(f, "object-delete"),
            Self::Unknown(v) => write!(f, "unknown({v})"),
        }
    }
}

/// One replication event.
///
/// `kind` determines which of the scoping fields are meaningful; the
/// constructors zero everything the kind does not use. Envelopes are
/// immutable after construction except for the sequence number, which
/// the sender loop stamps just before the envelope goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Rolling correlation id in `1..=127`, `0` until stamped.
    pub seq: u8,
    /// Event taxonomy variant.
    pub kind: EventKind,
    /// Bucket name; empty for account-wide events.
    pub bucket: String,
    /// Object key; empty unless object-scoped.
    pub name: String,
    /// Content fingerprint; empty unless object-scoped.
    pub etag: String,
    /// Opaque payload: object bytes, IAM blob, or metadata blob.
    pub content: Vec<u8>,
}

impl Envelope {
    /// Full IAM state snapshot.
    #[must_use]
    pub fn iam_export(content: Vec<u8>) -> Self {
        Self {
            seq: 0,
            kind: EventKind::IamExport,
            bucket: String::new(),
            name: String::new(),
            etag: String::new(),
            content,
        }
    }

    /// Configuration metadata for one bucket.
    #[must_use]
    pub fn bucket_meta_export(bucket: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            seq: 0,
            kind: EventKind::BucketMetaExport,
            bucket: bucket.into(),
            name: String::new(),
            etag: String::new(),
            content,
        }
    }

    /// An object write, carrying the object bytes and fingerprint.
    #[must_use]
    pub fn object_put(
        bucket: impl Into<String>,
        name: impl Into<String>,
        etag: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            seq: 0,
            kind: EventKind::ObjectPut,
            bucket: bucket.into(),
            name: name.into(),
            etag: etag.into(),
            content,
        }
    }

    /// An object removal.
    #[must_use]
    pub fn object_delete(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            seq: 0,
            kind: EventKind::ObjectDelete,
            bucket: bucket.into(),
            name: name.into(),
            etag: String::new(),
            content: Vec::new(),
        }
    }

    /// Serialize to CBOR bytes.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_cbor(&self) -> Result<Vec<u8>, WireError> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)
            .map_err(|e| WireError::Encode(e.to_string()))?;
        Ok(bytes)
    }

    /// Deserialize from CBOR bytes.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, WireError> {
        ciborium::from_reader(bytes).map_err(|e| WireError::Decode(e.to_string()))
    }
}

/// Errors for envelope serialization.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WireError {
    /// Serialization failed
    #[error("envelope encode failed: {0}")]
    Encode(String),
    /// Deserialization failed
    #[error("envelope decode failed: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameCodec;
    use bytes::BytesMut;

    #[test]
    fn envelope_cbor_roundtrip() {
        let mut env = Envelope::object_put("photos", "cat.jpg", "abc123", vec![1, 2, 3]);
        env.seq = 42;

        let bytes = env.to_cbor().unwrap();
        let decoded = Envelope::from_cbor(&bytes).unwrap();

        assert_eq!(env, decoded);
    }

    #[test]
    fn framed_envelope_roundtrip() {
        let env = Envelope::iam_export(b"iam-blob".to_vec());
        let codec = FrameCodec;

        let frame = codec.encode(&env.to_cbor().unwrap()).unwrap();
        let mut buf = BytesMut::from(&frame[..]);
        let body = codec.decode(&mut buf).unwrap().unwrap();

        assert_eq!(Envelope::from_cbor(&body).unwrap(), env);
    }

    #[test]
    fn constructors_zero_unused_fields() {
        let env = Envelope::object_delete("b", "k");
        assert_eq!(env.kind, EventKind::ObjectDelete);
        assert!(env.etag.is_empty());
        assert!(env.content.is_empty());

        let env = Envelope::iam_export(vec![9]);
        assert!(env.bucket.is_empty());
        assert!(env.name.is_empty());
        assert!(env.etag.is_empty());
    }

    #[test]
    fn unknown_kind_survives_decode() {
        let mut env = Envelope::object_put("b", "k", "e", vec![7]);
        env.kind = EventKind::Unknown(99);

        let bytes = env.to_cbor().unwrap();
        let decoded = Envelope::from_cbor(&bytes).unwrap();

        assert_eq!(decoded.kind, EventKind::Unknown(99));
    }

    #[test]
    fn kind_u32_mapping_is_stable() {
        for kind in [
            EventKind::IamExport,
            EventKind::BucketMetaExport,
            EventKind::ObjectPut,
            EventKind::ObjectDelete,
        ] {
            assert_eq!(EventKind::from(u32::from(kind)), kind);
        }
        assert_eq!(EventKind::from(7), EventKind::Unknown(7));
    }
}
