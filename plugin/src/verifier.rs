//! Passive consistency checks over the inbound pose/emote control feed.
//!
//! The verifier mirrors the server's view of whether the local character is
//! emoting or posed, and warns when a message does not fit that view. It never
//! touches application state and never blocks a transition.

use log::{debug, warn};
use protocol::{decode_inbound, ControlEvent, MessageDirection};
use serde::Serialize;

/// Object emotes the server is expected to send with a sit-object control.
pub const EMOTE_SIT: u32 = 50;
pub const EMOTE_STAND: u32 = 51;
pub const EMOTE_SLEEP: u32 = 88;

const OBJECT_EMOTE_WHITELIST: [u32; 3] = [EMOTE_SIT, EMOTE_STAND, EMOTE_SLEEP];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProtocolState {
    pub emoting: bool,
    /// Current pose id; `0` when not posed.
    pub pose_sequence: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolMismatch {
    #[error("object emote {emote_id} is not sit, stand or sleep")]
    UnexpectedObjectEmote { emote_id: u32 },

    #[error("{event} received while not emoting")]
    NotEmoting { event: &'static str },

    #[error("generic emote start carries emote id 0")]
    ZeroEmoteId,

    #[error("already at poseId {pose_id}")]
    AlreadyAtPose { pose_id: u32 },

    #[error("skipped poseId: expected {expected}, got {actual}")]
    SkippedPose { expected: u32, actual: u32 },

    #[error("wrong poseId: expected {expected}, got {actual}")]
    WrongPose { expected: u32, actual: u32 },

    #[error("end pose received while not posed")]
    NotPosed,

    #[error("unknown pose/emote subtype {subtype:#06x}")]
    UnknownSubtype { subtype: u16 },
}

pub struct NetworkProtocolVerifier {
    state: ProtocolState,
    enabled: bool,
    warning_count: u64,
}

impl Default for NetworkProtocolVerifier {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkProtocolVerifier {
    pub fn new(enabled: bool) -> Self {
        Self {
            state: ProtocolState::default(),
            enabled,
            warning_count: 0,
        }
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    pub fn warning_count(&self) -> u64 {
        self.warning_count
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Feeds one raw message from the host's network hook.
    pub fn on_message(
        &mut self,
        opcode: u16,
        direction: MessageDirection,
        payload: &[u8],
    ) -> Option<ProtocolMismatch> {
        if !self.enabled {
            return None;
        }

        match decode_inbound(opcode, direction, payload) {
            Ok(Some(event)) => self.observe(event),
            Ok(None) => None,
            Err(err) => {
                debug!("ignoring control message {opcode:#06x}: {err}");
                None
            }
        }
    }

    /// Applies one decoded control event and reports the mismatch, if any.
    pub fn observe(&mut self, event: ControlEvent) -> Option<ProtocolMismatch> {
        let state = &mut self.state;
        let mismatch = match event {
            ControlEvent::SitObjectEmote { emote_id } => {
                note_precondition(!state.emoting, "sit object emote while emoting");
                state.emoting = true;
                (!OBJECT_EMOTE_WHITELIST.contains(&emote_id))
                    .then_some(ProtocolMismatch::UnexpectedObjectEmote { emote_id })
            }
            ControlEvent::StandObjectEmote => end_emote(state, "stand object emote"),
            ControlEvent::GenericEmoteStart { emote_id, cancel } => {
                note_precondition(!state.emoting, "generic emote start while emoting");
                state.emoting = !cancel;
                (emote_id == 0).then_some(ProtocolMismatch::ZeroEmoteId)
            }
            ControlEvent::CancelEmote => end_emote(state, "cancel emote"),
            ControlEvent::EndEmoteLoop => end_emote(state, "end emote loop"),
            ControlEvent::StartPose { pose_id } => {
                let current = state.pose_sequence;
                state.pose_sequence = pose_id;
                if current == 0 || pose_id == current.wrapping_add(1) {
                    None
                } else if pose_id == current {
                    Some(ProtocolMismatch::AlreadyAtPose { pose_id })
                } else {
                    Some(ProtocolMismatch::SkippedPose {
                        expected: current.wrapping_add(1),
                        actual: pose_id,
                    })
                }
            }
            ControlEvent::SetPose { pose_id } => {
                let expected = state.pose_sequence;
                (pose_id != expected).then_some(ProtocolMismatch::WrongPose {
                    expected,
                    actual: pose_id,
                })
            }
            ControlEvent::EndPose => {
                let was_posed = state.pose_sequence != 0;
                state.pose_sequence = 0;
                (!was_posed).then_some(ProtocolMismatch::NotPosed)
            }
            ControlEvent::Unknown { subtype } => {
                Some(ProtocolMismatch::UnknownSubtype { subtype })
            }
        };

        if let Some(mismatch) = mismatch {
            self.warning_count += 1;
            warn!("protocol mismatch: {mismatch}");
        }
        mismatch
    }

    pub fn reset(&mut self) {
        self.state = ProtocolState::default();
    }
}

fn end_emote(state: &mut ProtocolState, event: &'static str) -> Option<ProtocolMismatch> {
    let was_emoting = state.emoting;
    state.emoting = false;
    (!was_emoting).then_some(ProtocolMismatch::NotEmoting { event })
}

fn note_precondition(holds: bool, what: &str) {
    if !holds {
        debug!("unexpected {what}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::packets::{
        PMSG_ACTOR_CONTROL_RECV, OPCODE_ACTOR_CONTROL, SUBTYPE_START_POSE,
    };
    use protocol::ser::serialize;

    #[test]
    fn pose_sequence_round_trip_has_no_warnings() {
        let mut verifier = NetworkProtocolVerifier::default();

        assert_eq!(verifier.observe(ControlEvent::StartPose { pose_id: 1 }), None);
        assert_eq!(verifier.observe(ControlEvent::SetPose { pose_id: 1 }), None);
        assert_eq!(verifier.observe(ControlEvent::EndPose), None);

        assert_eq!(verifier.state().pose_sequence, 0);
        assert_eq!(verifier.warning_count(), 0);
    }

    #[test]
    fn set_pose_with_wrong_id_warns_once() {
        let mut verifier = NetworkProtocolVerifier::default();

        verifier.observe(ControlEvent::StartPose { pose_id: 1 });
        let mismatch = verifier.observe(ControlEvent::SetPose { pose_id: 2 });

        assert_eq!(
            mismatch,
            Some(ProtocolMismatch::WrongPose {
                expected: 1,
                actual: 2
            })
        );
        assert_eq!(verifier.warning_count(), 1);
        assert!(mismatch.unwrap().to_string().contains("wrong poseId"));
    }

    #[test]
    fn start_pose_detects_repeat_and_skip() {
        let mut verifier = NetworkProtocolVerifier::default();
        verifier.observe(ControlEvent::StartPose { pose_id: 2 });

        assert_eq!(
            verifier.observe(ControlEvent::StartPose { pose_id: 2 }),
            Some(ProtocolMismatch::AlreadyAtPose { pose_id: 2 })
        );
        assert_eq!(
            verifier.observe(ControlEvent::StartPose { pose_id: 5 }),
            Some(ProtocolMismatch::SkippedPose {
                expected: 3,
                actual: 5
            })
        );
        assert_eq!(verifier.state().pose_sequence, 5);
    }

    #[test]
    fn emote_transitions_follow_cancel_bit() {
        let mut verifier = NetworkProtocolVerifier::default();

        verifier.observe(ControlEvent::GenericEmoteStart {
            emote_id: 7,
            cancel: true,
        });
        assert!(!verifier.state().emoting);

        verifier.observe(ControlEvent::GenericEmoteStart {
            emote_id: 7,
            cancel: false,
        });
        assert!(verifier.state().emoting);
        assert_eq!(verifier.observe(ControlEvent::EndEmoteLoop), None);
        assert_eq!(
            verifier.observe(ControlEvent::CancelEmote),
            Some(ProtocolMismatch::NotEmoting {
                event: "cancel emote"
            })
        );
    }

    #[test]
    fn object_emote_outside_whitelist_still_transitions() {
        let mut verifier = NetworkProtocolVerifier::default();

        let mismatch = verifier.observe(ControlEvent::SitObjectEmote { emote_id: 12 });

        assert_eq!(
            mismatch,
            Some(ProtocolMismatch::UnexpectedObjectEmote { emote_id: 12 })
        );
        assert!(verifier.state().emoting);
        assert_eq!(verifier.observe(ControlEvent::StandObjectEmote), None);
    }

    #[test]
    fn disabled_verifier_ignores_raw_feed() {
        let mut verifier = NetworkProtocolVerifier::new(false);
        let bytes = serialize(&PMSG_ACTOR_CONTROL_RECV::new(SUBTYPE_START_POSE, 4, 0, 0));

        let mismatch =
            verifier.on_message(OPCODE_ACTOR_CONTROL, MessageDirection::Inbound, &bytes);

        assert_eq!(mismatch, None);
        assert_eq!(verifier.state().pose_sequence, 0);
    }

    #[test]
    fn truncated_payload_is_ignored() {
        let mut verifier = NetworkProtocolVerifier::default();
        let mismatch =
            verifier.on_message(OPCODE_ACTOR_CONTROL, MessageDirection::Inbound, &[0xF9]);
        assert_eq!(mismatch, None);
        assert_eq!(verifier.warning_count(), 0);
    }
}
