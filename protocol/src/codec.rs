//! Binary codec for sync envelopes on the pub/sub bus.

use crate::channel::{InvalidChannel, SyncChannel};
use crate::message::{PROTOCOL_VERSION, ProtocolVersion, SyncEnvelope};

const FRAME_MAGIC: [u8; 2] = *b"ES";
const FRAME_MAGIC_LEN: usize = 2;
const FRAME_CHANNEL_LEN: usize = 1;

/// Number of bytes in front of the postcard payload.
pub const SYNC_FRAME_HEADER_LEN: usize = FRAME_MAGIC_LEN + FRAME_CHANNEL_LEN;

/// Limits used by the sync codec to protect against malformed payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodecLimits {
    pub max_frame_size: usize,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            // Envelopes are a few dozen bytes; anything larger is not ours.
            max_frame_size: 256,
        }
    }
}

/// Decoded sync frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedSyncFrame {
    pub channel: SyncChannel,
    pub envelope: SyncEnvelope,
}

/// Errors produced while encoding/decoding sync frames.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("envelope version mismatch: expected {expected:?}, got {actual:?}")]
    VersionMismatch {
        expected: ProtocolVersion,
        actual: ProtocolVersion,
    },

    #[error("sync frame is empty")]
    EmptyFrame,

    #[error("sync frame shorter than its header: {actual} bytes")]
    TruncatedFrame { actual: usize },

    #[error("sync frame exceeds limit: limit={limit} actual={actual}")]
    FrameTooLarge { limit: usize, actual: usize },

    #[error("invalid frame magic: expected [45,53], got {actual:02X?}")]
    InvalidMagic { actual: [u8; 2] },

    #[error("serialization error: {0}")]
    Serialization(#[from] postcard::Error),

    #[error(transparent)]
    InvalidChannel(#[from] InvalidChannel),
}

/// Sync codec that serializes envelopes with `postcard`.
///
/// Frame format:
/// - bytes 0..2: magic `ES`
/// - byte 2: channel id
/// - remaining bytes: postcard payload
#[derive(Clone, Debug)]
pub struct SyncCodec {
    expected_version: ProtocolVersion,
    limits: CodecLimits,
}

impl Default for SyncCodec {
    fn default() -> Self {
        Self {
            expected_version: PROTOCOL_VERSION,
            limits: CodecLimits::default(),
        }
    }
}

impl SyncCodec {
    #[must_use]
    pub const fn new(expected_version: ProtocolVersion, limits: CodecLimits) -> Self {
        Self {
            expected_version,
            limits,
        }
    }

    #[must_use]
    pub const fn expected_version(&self) -> ProtocolVersion {
        self.expected_version
    }

    #[must_use]
    pub const fn limits(&self) -> CodecLimits {
        self.limits
    }

    pub fn encode_frame(
        &self,
        channel: SyncChannel,
        envelope: &SyncEnvelope,
    ) -> Result<Vec<u8>, CodecError> {
        self.validate_version(envelope)?;

        let payload = postcard::to_stdvec(envelope)?;
        let frame_len = SYNC_FRAME_HEADER_LEN + payload.len();
        if frame_len > self.limits.max_frame_size {
            return Err(CodecError::FrameTooLarge {
                limit: self.limits.max_frame_size,
                actual: frame_len,
            });
        }

        let mut frame = Vec::with_capacity(frame_len);
        frame.extend_from_slice(&FRAME_MAGIC);
        frame.push(channel as u8);
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Decodes a frame previously produced by `encode_frame`.
    pub fn decode_frame(&self, frame: &[u8]) -> Result<DecodedSyncFrame, CodecError> {
        if frame.is_empty() {
            return Err(CodecError::EmptyFrame);
        }
        if frame.len() > self.limits.max_frame_size {
            return Err(CodecError::FrameTooLarge {
                limit: self.limits.max_frame_size,
                actual: frame.len(),
            });
        }
        if frame.len() < SYNC_FRAME_HEADER_LEN {
            return Err(CodecError::TruncatedFrame {
                actual: frame.len(),
            });
        }

        let actual_magic = [frame[0], frame[1]];
        if actual_magic != FRAME_MAGIC {
            return Err(CodecError::InvalidMagic {
                actual: actual_magic,
            });
        }

        let channel = SyncChannel::try_from(frame[2])?;
        let envelope: SyncEnvelope = postcard::from_bytes(&frame[SYNC_FRAME_HEADER_LEN..])?;
        self.validate_version(&envelope)?;

        Ok(DecodedSyncFrame { channel, envelope })
    }

    fn validate_version(&self, envelope: &SyncEnvelope) -> Result<(), CodecError> {
        if envelope.version != self.expected_version {
            return Err(CodecError::VersionMismatch {
                expected: self.expected_version,
                actual: envelope.version,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{SyncAction, SyncMessage};

    fn sample_envelope() -> SyncEnvelope {
        SyncEnvelope::new(
            11,
            4,
            SyncMessage::new(SyncAction::PlayEmote, 0x1040_0001, 0, 0x0040_0000_1234_5678, 214),
        )
    }

    #[test]
    fn frame_roundtrip_keeps_channel() {
        let codec = SyncCodec::default();
        let envelope = sample_envelope();

        let frame = codec
            .encode_frame(SyncChannel::OwnedDebounced, &envelope)
            .unwrap();
        let decoded = codec.decode_frame(&frame).unwrap();

        assert_eq!(decoded.channel, SyncChannel::OwnedDebounced);
        assert_eq!(decoded.envelope, envelope);
    }

    #[test]
    fn header_only_frame_is_not_a_valid_envelope() {
        let codec = SyncCodec::default();
        let err = codec.decode_frame(b"ES\x00").unwrap_err();
        assert!(matches!(err, CodecError::Serialization(_)));
    }

    #[test]
    fn one_byte_frame_is_truncated() {
        let err = SyncCodec::default().decode_frame(b"E").unwrap_err();
        assert!(matches!(err, CodecError::TruncatedFrame { actual: 1 }));
    }
}
