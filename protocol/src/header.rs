//! Header layouts for the inbound control messages of the pinned client revision.

#![allow(non_camel_case_types)]

/// Direction flag delivered by the host's network feed alongside each message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

impl MessageDirection {
    #[must_use]
    pub const fn is_inbound(self) -> bool {
        matches!(self, Self::Inbound)
    }
}

/// Leading subtype word of every control payload.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CONTROL_HEAD {
    pub category: u16,
    pub padding: u16,
}

/// Control header followed by the four generic parameter slots.
///
/// Both pinned opcodes share this prefix, so the subtype and parameters are
/// read from the same byte offsets regardless of which one carried them.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CONTROL_PARAMS_HEAD {
    pub head: CONTROL_HEAD,
    pub param1: u32,
    pub param2: u32,
    pub param3: u32,
    pub param4: u32,
}
