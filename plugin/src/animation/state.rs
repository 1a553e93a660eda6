use std::collections::BTreeMap;

use crate::host::BaseAnimationState;

/// Override bookkeeping for one character.
///
/// Created lazily on the first override. Speed overrides live independently
/// of the captured base, so a base reset leaves them in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationOverrideState {
    /// Base fields captured before the first override; `None` once restored.
    pub original_base: Option<BaseAnimationState>,
    pub overall_speed: Option<f32>,
    pub slot_speeds: BTreeMap<usize, f32>,
    /// `0` when no lips override is active.
    pub lips_override: u16,
    pub slots_dirty: bool,
    /// Bumped by every `play`; tells a settling reset that a newer override landed.
    pub play_epoch: u64,
}

impl AnimationOverrideState {
    /// True when nothing would be left to restore.
    ///
    /// The engine drops a character's state once this holds and no dirty flag
    /// is waiting to be read.
    pub fn is_pristine(&self) -> bool {
        self.original_base.is_none()
            && self.overall_speed.is_none()
            && self.slot_speeds.is_empty()
            && self.lips_override == 0
    }
}
