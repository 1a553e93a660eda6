//! Pub/sub channel definitions for cross-instance sync.

use serde::{Deserialize, Serialize};

/// Which kind of character a sync event concerns.
///
/// Remote observers may subscribe to only one of the two families.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SyncAudience {
    /// The local participant's own character.
    LocalPlayer,
    /// A secondary object owned by the local participant.
    OwnedObject,
}

/// Delivery timing of a published event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Delivery {
    /// Best-effort publish right after the local change; may race the server.
    Immediate,
    /// Re-publish after the debounce window settled.
    Debounced,
}

/// Stable channel identifiers used on the sync bus.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncChannel {
    LocalImmediate = 0,
    LocalDebounced = 1,
    OwnedImmediate = 2,
    OwnedDebounced = 3,
}

impl SyncChannel {
    pub const ALL: [SyncChannel; 4] = [
        SyncChannel::LocalImmediate,
        SyncChannel::LocalDebounced,
        SyncChannel::OwnedImmediate,
        SyncChannel::OwnedDebounced,
    ];

    #[must_use]
    pub const fn new(audience: SyncAudience, delivery: Delivery) -> Self {
        match (audience, delivery) {
            (SyncAudience::LocalPlayer, Delivery::Immediate) => Self::LocalImmediate,
            (SyncAudience::LocalPlayer, Delivery::Debounced) => Self::LocalDebounced,
            (SyncAudience::OwnedObject, Delivery::Immediate) => Self::OwnedImmediate,
            (SyncAudience::OwnedObject, Delivery::Debounced) => Self::OwnedDebounced,
        }
    }

    #[must_use]
    pub const fn audience(self) -> SyncAudience {
        match self {
            Self::LocalImmediate | Self::LocalDebounced => SyncAudience::LocalPlayer,
            Self::OwnedImmediate | Self::OwnedDebounced => SyncAudience::OwnedObject,
        }
    }

    #[must_use]
    pub const fn delivery(self) -> Delivery {
        match self {
            Self::LocalImmediate | Self::OwnedImmediate => Delivery::Immediate,
            Self::LocalDebounced | Self::OwnedDebounced => Delivery::Debounced,
        }
    }

    /// Bus channel name, e.g. `emotesync.local.debounced`.
    #[must_use]
    pub fn name(self, prefix: &str) -> String {
        let audience = match self.audience() {
            SyncAudience::LocalPlayer => "local",
            SyncAudience::OwnedObject => "owned",
        };
        let delivery = match self.delivery() {
            Delivery::Immediate => "immediate",
            Delivery::Debounced => "debounced",
        };
        format!("{prefix}.{audience}.{delivery}")
    }
}

impl core::convert::TryFrom<u8> for SyncChannel {
    type Error = InvalidChannel;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::LocalImmediate),
            1 => Ok(Self::LocalDebounced),
            2 => Ok(Self::OwnedImmediate),
            3 => Ok(Self::OwnedDebounced),
            _ => Err(InvalidChannel(value)),
        }
    }
}

/// Error returned when an unknown channel id is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidChannel(pub u8);

impl core::fmt::Display for InvalidChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "invalid sync channel id {}", self.0)
    }
}

impl std::error::Error for InvalidChannel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_distinguish_audience_and_delivery() {
        assert_eq!(
            SyncChannel::LocalDebounced.name("emotesync"),
            "emotesync.local.debounced"
        );
        assert_eq!(
            SyncChannel::OwnedImmediate.name("emotesync"),
            "emotesync.owned.immediate"
        );
    }

    #[test]
    fn constructor_and_accessors_agree() {
        for channel in SyncChannel::ALL {
            assert_eq!(
                SyncChannel::new(channel.audience(), channel.delivery()),
                channel
            );
        }
    }

    #[test]
    fn rejects_unknown_channel_byte() {
        assert_eq!(SyncChannel::try_from(9), Err(InvalidChannel(9)));
    }
}
