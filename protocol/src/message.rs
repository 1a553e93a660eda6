//! Versioned sync messages exchanged between cooperating plugin instances.

use serde::{Deserialize, Serialize};

/// Current sync protocol version expected by every instance.
pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::new(1, 0);

/// Semantic protocol version carried in every sync envelope.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl ProtocolVersion {
    #[must_use]
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

/// What happened to the override on the publishing side.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SyncAction {
    PlayEmote,
    StopEmote,
    ConfigUpdate,
}

/// One override event, addressed by the durable identities of the character.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncMessage {
    pub action: SyncAction,
    pub base_id: u32,
    pub object_index: u16,
    pub content_id: u64,
    pub emote_id: u32,
}

impl SyncMessage {
    #[must_use]
    pub const fn new(
        action: SyncAction,
        base_id: u32,
        object_index: u16,
        content_id: u64,
        emote_id: u32,
    ) -> Self {
        Self {
            action,
            base_id,
            object_index,
            content_id,
            emote_id,
        }
    }
}

/// Envelope with transport-agnostic metadata.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncEnvelope {
    pub version: ProtocolVersion,
    pub sender_id: u64,
    pub sequence: u32,
    pub message: SyncMessage,
}

impl SyncEnvelope {
    #[must_use]
    pub fn new(sender_id: u64, sequence: u32, message: SyncMessage) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            sender_id,
            sequence,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_constructor_sets_current_version() {
        let envelope = SyncEnvelope::new(
            7,
            1,
            SyncMessage::new(SyncAction::PlayEmote, 1, 0, 99, 50),
        );
        assert_eq!(envelope.version, PROTOCOL_VERSION);
    }
}
