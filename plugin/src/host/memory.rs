use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex as StdMutex;

use common::TimelineId;

use super::{
    AnimationMemory, BaseAnimationState, CharacterAddress, CharacterSource, CharacterSnapshot,
    TickSource, TickSubscription,
};

/// Simulated animation memory of one character.
#[derive(Debug, Clone, PartialEq)]
pub struct SimCharacter {
    pub snapshot: CharacterSnapshot,
    pub live: bool,
    pub base: BaseAnimationState,
    /// Timeline forced through `set_base_override`, if any.
    pub base_override: Option<TimelineId>,
    pub blends: Vec<TimelineId>,
    pub played_timelines: Vec<TimelineId>,
    pub overall_speed: Option<f32>,
    pub slot_speeds: BTreeMap<usize, f32>,
    pub lips: u16,
    pub zero_speed_resets: usize,
    pub faced_target: usize,
}

impl SimCharacter {
    fn new(snapshot: CharacterSnapshot) -> Self {
        Self {
            snapshot,
            live: true,
            base: BaseAnimationState {
                mode: 0,
                mode_param: 0,
                timeline: 0,
            },
            base_override: None,
            blends: Vec::new(),
            played_timelines: Vec::new(),
            overall_speed: None,
            slot_speeds: BTreeMap::new(),
            lips: 0,
            zero_speed_resets: 0,
            faced_target: 0,
        }
    }
}

#[derive(Debug, Default)]
struct HostState {
    characters: HashMap<CharacterAddress, SimCharacter>,
    local_player: Option<CharacterAddress>,
    active: BTreeSet<TickSubscription>,
    subscribe_calls: HashMap<TickSubscription, usize>,
    unsubscribe_calls: HashMap<TickSubscription, usize>,
    memory_writes: u64,
}

/// Host double backed by plain maps.
///
/// Implements every host seam, so one `Arc<InMemoryHost>` can serve as the
/// game host and the tick source at the same time. Used by the tests and the
/// `sim-host` binary.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    state: StdMutex<HostState>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&self, character: CharacterAddress, snapshot: CharacterSnapshot) {
        self.with_state(|state| {
            state
                .characters
                .insert(character, SimCharacter::new(snapshot));
        });
    }

    pub fn set_local_player(&self, character: CharacterAddress) {
        self.with_state(|state| state.local_player = Some(character));
    }

    /// Frees the character; its address stops resolving.
    pub fn despawn(&self, character: CharacterAddress) {
        self.with_state(|state| {
            state.characters.remove(&character);
        });
    }

    /// Drops the character from the live object table while its memory still resolves.
    pub fn remove_from_object_table(&self, character: CharacterAddress) {
        self.with_character(character, |sim| sim.live = false);
    }

    pub fn move_by(&self, character: CharacterAddress, delta: [f32; 3]) {
        self.with_character(character, |sim| {
            for (axis, offset) in sim.snapshot.position.iter_mut().zip(delta) {
                *axis += offset;
            }
        });
    }

    pub fn set_rotation(&self, character: CharacterAddress, rotation: f32) {
        self.with_character(character, |sim| sim.snapshot.rotation = rotation);
    }

    pub fn set_weapon_drawn(&self, character: CharacterAddress, drawn: bool) {
        self.with_character(character, |sim| sim.snapshot.weapon_drawn = drawn);
    }

    pub fn set_base(&self, character: CharacterAddress, base: BaseAnimationState) {
        self.with_character(character, |sim| sim.base = base);
    }

    pub fn character(&self, character: CharacterAddress) -> Option<SimCharacter> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.characters.get(&character).cloned())
    }

    pub fn is_subscribed(&self, subscription: TickSubscription) -> bool {
        self.state
            .lock()
            .map(|state| state.active.contains(&subscription))
            .unwrap_or_default()
    }

    /// Subscriptions the frame loop has to drive, in a stable order.
    pub fn active_subscriptions(&self) -> Vec<TickSubscription> {
        self.state
            .lock()
            .map(|state| state.active.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn subscribe_calls(&self, subscription: TickSubscription) -> usize {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.subscribe_calls.get(&subscription).copied())
            .unwrap_or_default()
    }

    pub fn unsubscribe_calls(&self, subscription: TickSubscription) -> usize {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.unsubscribe_calls.get(&subscription).copied())
            .unwrap_or_default()
    }

    /// Number of animation-memory writes performed so far.
    pub fn memory_writes(&self) -> u64 {
        self.state
            .lock()
            .map(|state| state.memory_writes)
            .unwrap_or_default()
    }

    fn with_state<R: Default>(&self, f: impl FnOnce(&mut HostState) -> R) -> R {
        self.state
            .lock()
            .map(|mut state| f(&mut state))
            .unwrap_or_default()
    }

    fn with_character(&self, character: CharacterAddress, f: impl FnOnce(&mut SimCharacter)) {
        self.with_state(|state| {
            if let Some(sim) = state.characters.get_mut(&character) {
                f(sim);
            }
        });
    }

    fn write_character(&self, character: CharacterAddress, f: impl FnOnce(&mut SimCharacter)) {
        self.with_state(|state| {
            if let Some(sim) = state.characters.get_mut(&character) {
                f(sim);
                state.memory_writes += 1;
            }
        });
    }
}

impl CharacterSource for InMemoryHost {
    fn resolve(&self, character: CharacterAddress) -> Option<CharacterSnapshot> {
        self.character(character).map(|sim| sim.snapshot)
    }

    fn is_live(&self, character: CharacterAddress) -> bool {
        self.character(character)
            .map(|sim| sim.live)
            .unwrap_or_default()
    }

    fn local_player(&self) -> Option<CharacterAddress> {
        self.state.lock().ok().and_then(|state| state.local_player)
    }

    fn find_by_content_id(&self, content_id: u64) -> Option<CharacterAddress> {
        if content_id == 0 {
            return None;
        }
        self.state.lock().ok().and_then(|state| {
            state
                .characters
                .iter()
                .filter(|(_, sim)| sim.live && sim.snapshot.content_id == content_id)
                .map(|(address, _)| *address)
                .min()
        })
    }

    fn find_by_object_index(&self, object_index: u16) -> Option<CharacterAddress> {
        self.state.lock().ok().and_then(|state| {
            state
                .characters
                .iter()
                .filter(|(_, sim)| sim.live && sim.snapshot.object_index == object_index)
                .map(|(address, _)| *address)
                .min()
        })
    }

    fn face_target(&self, character: CharacterAddress) {
        self.with_character(character, |sim| sim.faced_target += 1);
    }
}

impl AnimationMemory for InMemoryHost {
    fn read_base(&self, character: CharacterAddress) -> Option<BaseAnimationState> {
        self.character(character).map(|sim| sim.base)
    }

    fn write_base(&self, character: CharacterAddress, state: BaseAnimationState) {
        self.write_character(character, |sim| {
            sim.base = state;
            sim.base_override = None;
        });
    }

    fn set_base_override(&self, character: CharacterAddress, timeline: TimelineId) {
        self.write_character(character, |sim| {
            sim.base.timeline = timeline;
            sim.base_override = Some(timeline);
        });
    }

    fn play_blend(&self, character: CharacterAddress, timeline: TimelineId) {
        self.write_character(character, |sim| sim.blends.push(timeline));
    }

    fn play_timeline(&self, character: CharacterAddress, timeline: TimelineId) {
        self.write_character(character, |sim| sim.played_timelines.push(timeline));
    }

    fn set_overall_speed(&self, character: CharacterAddress, speed: Option<f32>) {
        self.write_character(character, |sim| sim.overall_speed = speed);
    }

    fn set_slot_speed(&self, character: CharacterAddress, slot: usize, speed: Option<f32>) {
        self.write_character(character, |sim| match speed {
            Some(speed) => {
                sim.slot_speeds.insert(slot, speed);
            }
            None => {
                sim.slot_speeds.remove(&slot);
            }
        });
    }

    fn set_lips_override(&self, character: CharacterAddress, lips: u16) {
        self.write_character(character, |sim| sim.lips = lips);
    }

    fn reset_zero_speed_controls(&self, character: CharacterAddress) -> usize {
        self.with_state(|state| {
            let Some(sim) = state.characters.get_mut(&character) else {
                return 0;
            };
            let base_frozen = usize::from(sim.overall_speed == Some(0.0));
            let frozen_slots = sim
                .slot_speeds
                .values()
                .filter(|speed| **speed == 0.0)
                .count();
            let touched = base_frozen + frozen_slots;
            if touched > 0 {
                sim.zero_speed_resets += touched;
                state.memory_writes += 1;
            }
            touched
        })
    }
}

impl TickSource for InMemoryHost {
    fn subscribe(&self, subscription: TickSubscription) {
        self.with_state(|state| {
            state.active.insert(subscription);
            *state.subscribe_calls.entry(subscription).or_default() += 1;
        });
    }

    fn unsubscribe(&self, subscription: TickSubscription) {
        self.with_state(|state| {
            state.active.remove(&subscription);
            *state.unsubscribe_calls.entry(subscription).or_default() += 1;
        });
    }
}
