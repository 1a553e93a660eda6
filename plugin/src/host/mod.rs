//! Seams between the override core and the game process it runs inside.
//!
//! Everything that touches host memory goes through these traits so the
//! override engine stays independent of the host's structure layout. Every
//! method must tolerate stale addresses: a character can despawn between any
//! two calls, and the host is expected to no-op in that case.

pub mod memory;

use common::TimelineId;
use serde::Serialize;

pub use memory::InMemoryHost;

/// Opaque address of a live character in the host process.
///
/// This is a weak reference; it is not owned by the core and may stop
/// resolving at any moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CharacterAddress(pub u64);

/// Relationship between a character and the local participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CharacterOwnership {
    LocalPlayer,
    /// Minion, companion or other object owned by the local participant.
    OwnedObject,
    Foreign,
}

/// Point-in-time view of a character read from host memory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacterSnapshot {
    pub position: [f32; 3],
    /// Facing, in radians.
    pub rotation: f32,
    pub weapon_drawn: bool,
    /// Durable account-level identity; 0 when the object has none.
    pub content_id: u64,
    pub base_id: u32,
    pub object_index: u16,
    pub ownership: CharacterOwnership,
}

impl CharacterSnapshot {
    /// Snapshot at the origin, facing 0, weapon sheathed.
    pub fn new(
        content_id: u64,
        base_id: u32,
        object_index: u16,
        ownership: CharacterOwnership,
    ) -> Self {
        Self {
            position: [0.0; 3],
            rotation: 0.0,
            weapon_drawn: false,
            content_id,
            base_id,
            object_index,
            ownership,
        }
    }
}

/// Base animation fields captured before an override is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseAnimationState {
    pub mode: u8,
    pub mode_param: u8,
    pub timeline: TimelineId,
}

/// Read access to the host's live entity table.
pub trait CharacterSource {
    /// Reads the character behind `character`, or `None` when the address is stale.
    fn resolve(&self, character: CharacterAddress) -> Option<CharacterSnapshot>;

    /// Whether the character is still present in the live object table.
    fn is_live(&self, character: CharacterAddress) -> bool;

    fn local_player(&self) -> Option<CharacterAddress>;

    fn find_by_content_id(&self, content_id: u64) -> Option<CharacterAddress>;

    fn find_by_object_index(&self, object_index: u16) -> Option<CharacterAddress>;

    /// Turns the character towards its current target, if it has one.
    fn face_target(&self, character: CharacterAddress);
}

/// Write access to a character's animation structures.
pub trait AnimationMemory {
    fn read_base(&self, character: CharacterAddress) -> Option<BaseAnimationState>;

    fn write_base(&self, character: CharacterAddress, state: BaseAnimationState);

    /// Forces `timeline` as the sustained base animation.
    fn set_base_override(&self, character: CharacterAddress, timeline: TimelineId);

    /// Fires a one-shot transitional layer on top of the base.
    fn play_blend(&self, character: CharacterAddress, timeline: TimelineId);

    /// Plays a timeline once through the host's own emote path.
    fn play_timeline(&self, character: CharacterAddress, timeline: TimelineId);

    /// `None` restores the host's natural playback rate.
    fn set_overall_speed(&self, character: CharacterAddress, speed: Option<f32>);

    /// `None` restores the host's natural rate for that layer slot.
    fn set_slot_speed(&self, character: CharacterAddress, slot: usize, speed: Option<f32>);

    /// `0` clears the lips override.
    fn set_lips_override(&self, character: CharacterAddress, lips: u16);

    /// Resets the local time of every active animation control whose speed is
    /// zero. Returns how many controls were touched.
    fn reset_zero_speed_controls(&self, character: CharacterAddress) -> usize;
}

/// Everything the override core needs from the host process.
pub trait GameHost: CharacterSource + AnimationMemory {}

impl<T: CharacterSource + AnimationMemory> GameHost for T {}

/// Consumers that can ride on the host's per-frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TickSubscription {
    /// Tracked-loop interruption poll.
    LoopPoll,
    /// Tick-delayed continuations of the override engine.
    Scheduler,
}

/// Per-frame callback registration offered by the host.
///
/// While a subscription is active the host calls `EmoteCore::on_tick` with
/// it once per simulation frame.
pub trait TickSource {
    fn subscribe(&self, subscription: TickSubscription);

    fn unsubscribe(&self, subscription: TickSubscription);
}
