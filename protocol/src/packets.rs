//! Control message layouts and subtype decoding for the pinned client revision.
//!
//! Opcodes and subtype numbers shift between game patches. Everything in this
//! module is bound to [`PINNED_REVISION`] and has to be re-validated whenever
//! the host's wire format changes.

#![allow(non_camel_case_types)]

use core::ops::RangeInclusive;

use crate::de::{DeserializeError, deserialize_prefix};
use crate::header::{CONTROL_HEAD, CONTROL_PARAMS_HEAD, MessageDirection};

pub type WORD = u16;
pub type DWORD = u32;
pub type QWORD = u64;

/// Game client revision the opcode/subtype table below was captured from.
pub const PINNED_REVISION: &str = "2025.06.04.0000.0000";

/// Pose and world-interaction control messages (server -> client).
pub const OPCODE_ACTOR_CONTROL: WORD = 0x02B3;
/// Generic client-trigger echo messages (server -> client).
pub const OPCODE_CLIENT_TRIGGER: WORD = 0x0315;

/// Numeric band reserved for pose/emote subtypes in the pinned revision.
pub const POSE_EMOTE_BAND: RangeInclusive<WORD> = 0x01F0..=0x020F;

pub const SUBTYPE_GENERIC_EMOTE_START: WORD = 0x01F4;
pub const SUBTYPE_CANCEL_EMOTE: WORD = 0x01F7;
pub const SUBTYPE_END_EMOTE_LOOP: WORD = 0x01F8;
pub const SUBTYPE_START_POSE: WORD = 0x01F9;
pub const SUBTYPE_SET_POSE: WORD = 0x01FA;
pub const SUBTYPE_END_POSE: WORD = 0x01FB;
pub const SUBTYPE_SIT_OBJECT_EMOTE: WORD = 0x01FC;
pub const SUBTYPE_STAND_OBJECT_EMOTE: WORD = 0x01FD;

/// Bit in `param3` of a generic emote start that marks it as cancelled.
pub const EMOTE_FLAG_CANCEL: DWORD = 0x0000_0001;

/// Pose/world-interaction control (`ACTOR_CONTROL`).
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PMSG_ACTOR_CONTROL_RECV {
    pub header: CONTROL_HEAD,
    pub param1: DWORD,
    pub param2: DWORD,
    pub param3: DWORD,
    pub param4: DWORD,
    pub padding: DWORD,
}

/// Generic client-trigger echo (`CLIENT_TRIGGER`).
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PMSG_CLIENT_TRIGGER_RECV {
    pub header: CONTROL_HEAD,
    pub param1: DWORD,
    pub param2: DWORD,
    pub param3: DWORD,
    pub param4: DWORD,
    pub target_id: QWORD,
}

impl PMSG_ACTOR_CONTROL_RECV {
    #[must_use]
    pub const fn new(category: WORD, param1: DWORD, param2: DWORD, param3: DWORD) -> Self {
        Self {
            header: CONTROL_HEAD {
                category,
                padding: 0,
            },
            param1,
            param2,
            param3,
            param4: 0,
            padding: 0,
        }
    }
}

impl PMSG_CLIENT_TRIGGER_RECV {
    #[must_use]
    pub const fn new(category: WORD, param1: DWORD, param2: DWORD, param3: DWORD) -> Self {
        Self {
            header: CONTROL_HEAD {
                category,
                padding: 0,
            },
            param1,
            param2,
            param3,
            param4: 0,
            target_id: 0,
        }
    }
}

/// A pose/emote control message recognised from the pinned subtype table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlEvent {
    SitObjectEmote { emote_id: u32 },
    StandObjectEmote,
    GenericEmoteStart { emote_id: u32, cancel: bool },
    CancelEmote,
    EndEmoteLoop,
    StartPose { pose_id: u32 },
    SetPose { pose_id: u32 },
    EndPose,
    /// A subtype inside [`POSE_EMOTE_BAND`] that the table does not name.
    Unknown { subtype: WORD },
}

impl ControlEvent {
    fn from_params(params: &CONTROL_PARAMS_HEAD) -> Option<Self> {
        let subtype = params.head.category;
        let param1 = params.param1;
        let param3 = params.param3;

        let event = match subtype {
            SUBTYPE_SIT_OBJECT_EMOTE => Self::SitObjectEmote { emote_id: param1 },
            SUBTYPE_STAND_OBJECT_EMOTE => Self::StandObjectEmote,
            SUBTYPE_GENERIC_EMOTE_START => Self::GenericEmoteStart {
                emote_id: param1,
                cancel: param3 & EMOTE_FLAG_CANCEL != 0,
            },
            SUBTYPE_CANCEL_EMOTE => Self::CancelEmote,
            SUBTYPE_END_EMOTE_LOOP => Self::EndEmoteLoop,
            SUBTYPE_START_POSE => Self::StartPose { pose_id: param1 },
            SUBTYPE_SET_POSE => Self::SetPose { pose_id: param1 },
            SUBTYPE_END_POSE => Self::EndPose,
            other if POSE_EMOTE_BAND.contains(&other) => Self::Unknown { subtype: other },
            _ => return None,
        };
        Some(event)
    }
}

/// Returns true when `opcode` is one of the two pinned control opcodes.
#[must_use]
pub const fn is_pinned_opcode(opcode: WORD) -> bool {
    matches!(opcode, OPCODE_ACTOR_CONTROL | OPCODE_CLIENT_TRIGGER)
}

/// Decodes a raw message body delivered by the host's network feed.
///
/// Returns `Ok(None)` for outbound traffic, for opcodes other than the pinned
/// pair and for subtypes outside [`POSE_EMOTE_BAND`].
pub fn decode_inbound(
    opcode: WORD,
    direction: MessageDirection,
    payload: &[u8],
) -> Result<Option<ControlEvent>, DeserializeError> {
    if !direction.is_inbound() || !is_pinned_opcode(opcode) {
        return Ok(None);
    }

    let params: CONTROL_PARAMS_HEAD = deserialize_prefix(payload)?;
    Ok(ControlEvent::from_params(&params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ser::serialize;

    #[test]
    fn actor_control_layout_matches_wire() {
        assert_eq!(core::mem::size_of::<PMSG_ACTOR_CONTROL_RECV>(), 24);
    }

    #[test]
    fn client_trigger_layout_matches_wire() {
        assert_eq!(core::mem::size_of::<PMSG_CLIENT_TRIGGER_RECV>(), 28);
    }

    #[test]
    fn decodes_start_pose_from_actor_control() {
        let bytes = serialize(&PMSG_ACTOR_CONTROL_RECV::new(SUBTYPE_START_POSE, 3, 0, 0));
        let event = decode_inbound(OPCODE_ACTOR_CONTROL, MessageDirection::Inbound, &bytes)
            .unwrap()
            .expect("pose subtype must decode");
        assert_eq!(event, ControlEvent::StartPose { pose_id: 3 });
    }

    #[test]
    fn decodes_cancel_bit_of_generic_emote() {
        let bytes = serialize(&PMSG_CLIENT_TRIGGER_RECV::new(
            SUBTYPE_GENERIC_EMOTE_START,
            101,
            0,
            EMOTE_FLAG_CANCEL,
        ));
        let event = decode_inbound(OPCODE_CLIENT_TRIGGER, MessageDirection::Inbound, &bytes)
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            ControlEvent::GenericEmoteStart {
                emote_id: 101,
                cancel: true
            }
        );
    }

    #[test]
    fn unnamed_subtype_inside_band_is_unknown() {
        let bytes = serialize(&PMSG_ACTOR_CONTROL_RECV::new(0x0201, 0, 0, 0));
        let event = decode_inbound(OPCODE_ACTOR_CONTROL, MessageDirection::Inbound, &bytes)
            .unwrap();
        assert_eq!(event, Some(ControlEvent::Unknown { subtype: 0x0201 }));
    }

    #[test]
    fn ignores_outbound_foreign_opcodes_and_out_of_band_subtypes() {
        let bytes = serialize(&PMSG_ACTOR_CONTROL_RECV::new(SUBTYPE_END_POSE, 0, 0, 0));
        assert_eq!(
            decode_inbound(OPCODE_ACTOR_CONTROL, MessageDirection::Outbound, &bytes).unwrap(),
            None
        );
        assert_eq!(
            decode_inbound(0x0001, MessageDirection::Inbound, &bytes).unwrap(),
            None
        );

        let out_of_band = serialize(&PMSG_ACTOR_CONTROL_RECV::new(0x0010, 0, 0, 0));
        assert_eq!(
            decode_inbound(OPCODE_ACTOR_CONTROL, MessageDirection::Inbound, &out_of_band)
                .unwrap(),
            None
        );
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let err = decode_inbound(OPCODE_CLIENT_TRIGGER, MessageDirection::Inbound, &[0xF4, 0x01])
            .unwrap_err();
        assert!(matches!(err, DeserializeError::TooShort { .. }));
    }
}
