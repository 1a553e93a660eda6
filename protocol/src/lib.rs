//! Wire-level types shared by the emote override plugin.
//!
//! Two unrelated formats live here: the narrow, revision-pinned subset of the
//! game's inbound control messages that the protocol verifier inspects, and
//! the versioned sync envelope exchanged between cooperating plugin instances.

pub mod channel;
pub mod codec;
pub mod de;
pub mod header;
pub mod message;
pub mod packets;
pub mod ser;

pub use channel::{Delivery, InvalidChannel, SyncAudience, SyncChannel};
pub use codec::{CodecError, CodecLimits, DecodedSyncFrame, SYNC_FRAME_HEADER_LEN, SyncCodec};
pub use header::MessageDirection;
pub use message::{PROTOCOL_VERSION, ProtocolVersion, SyncAction, SyncEnvelope, SyncMessage};
pub use packets::{ControlEvent, decode_inbound};

/// Returns the protocol crate version string.
pub fn protocol_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_pkg() {
        assert_eq!(protocol_version(), env!("CARGO_PKG_VERSION"));
    }
}
