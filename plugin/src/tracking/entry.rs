use std::f32::consts::TAU;

use common::{EmoteId, TimelineId};
use serde::Serialize;
use uuid::Uuid;

use crate::host::{CharacterOwnership, CharacterSnapshot};

/// Durable keys used to name a character to other instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CharacterIdentity {
    pub content_id: u64,
    pub base_id: u32,
    pub object_index: u16,
    pub ownership: CharacterOwnership,
}

impl From<&CharacterSnapshot> for CharacterIdentity {
    fn from(snapshot: &CharacterSnapshot) -> Self {
        Self {
            content_id: snapshot.content_id,
            base_id: snapshot.base_id,
            object_index: snapshot.object_index,
            ownership: snapshot.ownership,
        }
    }
}

/// Why a sustained loop was dropped by the poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InterruptReason {
    Unresolvable,
    LeftObjectTable,
    Moved,
    Rotated,
    WeaponToggled,
}

/// A character currently sustaining a looped override.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedLoopEntry {
    pub id: Uuid,
    pub identity: CharacterIdentity,
    pub emote_id: EmoteId,
    pub timeline: TimelineId,
    pub position: [f32; 3],
    pub rotation: f32,
    pub weapon_drawn: bool,
}

impl TrackedLoopEntry {
    pub fn new(emote_id: EmoteId, timeline: TimelineId, snapshot: &CharacterSnapshot) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity: CharacterIdentity::from(snapshot),
            emote_id,
            timeline,
            position: snapshot.position,
            rotation: snapshot.rotation,
            weapon_drawn: snapshot.weapon_drawn,
        }
    }

    pub fn refresh(&mut self, snapshot: &CharacterSnapshot) {
        self.position = snapshot.position;
        self.rotation = snapshot.rotation;
        self.weapon_drawn = snapshot.weapon_drawn;
    }

    pub fn position_delta_sq(&self, snapshot: &CharacterSnapshot) -> f64 {
        self.position
            .iter()
            .zip(snapshot.position)
            .map(|(last, now)| {
                let delta = f64::from(now) - f64::from(*last);
                delta * delta
            })
            .sum()
    }

    /// Shortest angular distance to the sampled rotation, in radians.
    pub fn rotation_delta(&self, snapshot: &CharacterSnapshot) -> f32 {
        let delta = (snapshot.rotation - self.rotation).rem_euclid(TAU);
        delta.min(TAU - delta)
    }
}
