//! Per-character animation override engine.
//!
//! Captures a character's original base animation before forcing an override,
//! and knows how to put everything back. All writes go through
//! [`AnimationMemory`](crate::host::AnimationMemory); a stale address turns
//! every operation into a no-op.

use std::collections::HashMap;
use std::sync::Arc;

use common::TimelineId;
use log::{debug, trace};

use super::scheduler::{Continuation, TickScheduler};
use super::state::AnimationOverrideState;
use crate::host::{CharacterAddress, GameHost, TickSource, TickSubscription};

/// Timeline forced by [`CharacterAnimationOverride::reset_to_idle`].
pub const IDLE_TIMELINE: TimelineId = 0;
/// Reserved blend that drops whatever transitional layer is playing.
pub const CLEAR_BLEND_TIMELINE: TimelineId = 3;

pub const DEFAULT_SETTLE_TICKS: u32 = 4;
pub const DEFAULT_RESTORE_TICKS: u32 = 2;

/// Action run by `stop_and_reset` once the character has been frozen and its
/// zero-speed controls rewound.
pub type PostResetAction<H> = Box<dyn FnOnce(&mut CharacterAnimationOverride<H>, CharacterAddress)>;

pub struct CharacterAnimationOverride<H: GameHost> {
    host: Arc<H>,
    ticks: Arc<dyn TickSource>,
    states: HashMap<CharacterAddress, AnimationOverrideState>,
    scheduler: TickScheduler<CharacterAnimationOverride<H>>,
    scheduler_subscribed: bool,
    play_counter: u64,
    settle_ticks: u32,
    restore_ticks: u32,
}

impl<H: GameHost + 'static> CharacterAnimationOverride<H> {
    pub fn new(host: Arc<H>, ticks: Arc<dyn TickSource>) -> Self {
        Self {
            host,
            ticks,
            states: HashMap::new(),
            scheduler: TickScheduler::new(),
            scheduler_subscribed: false,
            play_counter: 0,
            settle_ticks: DEFAULT_SETTLE_TICKS,
            restore_ticks: DEFAULT_RESTORE_TICKS,
        }
    }

    #[must_use]
    pub fn with_reset_ticks(mut self, settle_ticks: u32, restore_ticks: u32) -> Self {
        self.settle_ticks = settle_ticks;
        self.restore_ticks = restore_ticks;
        self
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn state(&self, character: CharacterAddress) -> Option<&AnimationOverrideState> {
        self.states.get(&character)
    }

    pub fn has_base_override(&self, character: CharacterAddress) -> bool {
        self.states
            .get(&character)
            .is_some_and(|state| state.original_base.is_some())
    }

    pub fn overall_speed(&self, character: CharacterAddress) -> Option<f32> {
        self.states
            .get(&character)
            .and_then(|state| state.overall_speed)
    }

    pub fn slot_speed(&self, character: CharacterAddress, slot: usize) -> Option<f32> {
        self.states
            .get(&character)
            .and_then(|state| state.slot_speeds.get(&slot).copied())
    }

    pub fn pending_continuations(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn overridden_count(&self) -> usize {
        self.states
            .values()
            .filter(|state| state.original_base.is_some())
            .count()
    }

    /// Installs `timeline` as the sustained base animation.
    ///
    /// The original base is captured only on the first override so that chained
    /// overrides still restore to what the character was doing before any of them.
    pub fn play(&mut self, character: CharacterAddress, timeline: TimelineId, interrupt: bool) {
        if !self.is_valid(character) {
            return;
        }

        let state = self.states.entry(character).or_default();
        if state.original_base.is_none() {
            let Some(base) = self.host.read_base(character) else {
                return;
            };
            state.original_base = Some(base);
        }
        self.play_counter += 1;
        state.play_epoch = self.play_counter;

        self.host.set_base_override(character, timeline);
        if interrupt {
            self.blend(character, timeline);
        }
        trace!("base override {timeline} installed on {character:?}");
    }

    pub fn blend(&mut self, character: CharacterAddress, timeline: TimelineId) {
        if self.is_valid(character) {
            self.host.play_blend(character, timeline);
        }
    }

    pub fn set_overall_speed(&mut self, character: CharacterAddress, speed: f32) {
        if !self.is_valid(character) {
            return;
        }
        self.states.entry(character).or_default().overall_speed = Some(speed);
        self.host.set_overall_speed(character, Some(speed));
    }

    pub fn reset_overall_speed(&mut self, character: CharacterAddress) {
        let had_override = self
            .states
            .get_mut(&character)
            .and_then(|state| state.overall_speed.take())
            .is_some();
        if had_override && self.is_valid(character) {
            self.host.set_overall_speed(character, None);
        }
        self.prune(character);
    }

    pub fn set_slot_speed(&mut self, character: CharacterAddress, slot: usize, speed: f32) {
        if !self.is_valid(character) {
            return;
        }
        let state = self.states.entry(character).or_default();
        state.slot_speeds.insert(slot, speed);
        state.slots_dirty = true;
        self.host.set_slot_speed(character, slot, Some(speed));
    }

    pub fn reset_slot_speed(&mut self, character: CharacterAddress, slot: usize) {
        let Some(state) = self.states.get_mut(&character) else {
            return;
        };
        if state.slot_speeds.remove(&slot).is_none() {
            return;
        }
        state.slots_dirty = true;
        if self.is_valid(character) {
            self.host.set_slot_speed(character, slot, None);
        }
        self.prune(character);
    }

    pub fn reset_per_slot_speeds(&mut self, character: CharacterAddress) {
        let Some(state) = self.states.get_mut(&character) else {
            return;
        };
        if state.slot_speeds.is_empty() {
            return;
        }
        let slots = std::mem::take(&mut state.slot_speeds);
        state.slots_dirty = true;

        if self.is_valid(character) {
            for slot in slots.into_keys() {
                self.host.set_slot_speed(character, slot, None);
            }
        }
    }

    /// Returns whether per-slot speeds changed since the last call, and clears the flag.
    pub fn check_and_reset_dirty_slots(&mut self, character: CharacterAddress) -> bool {
        let dirty = self
            .states
            .get_mut(&character)
            .is_some_and(|state| std::mem::take(&mut state.slots_dirty));
        self.prune(character);
        dirty
    }

    pub fn set_lips_override(&mut self, character: CharacterAddress, lips: u16) {
        if !self.is_valid(character) {
            return;
        }
        self.states.entry(character).or_default().lips_override = lips;
        self.host.set_lips_override(character, lips);
    }

    pub fn clear_lips_override(&mut self, character: CharacterAddress) {
        let Some(state) = self.states.get_mut(&character) else {
            return;
        };
        if state.lips_override == 0 {
            return;
        }
        state.lips_override = 0;
        if self.is_valid(character) {
            self.host.set_lips_override(character, 0);
        }
        self.prune(character);
    }

    /// Restores the captured base animation and plays the clear blend.
    pub fn reset_base(&mut self, character: CharacterAddress) {
        let Some(original) = self
            .states
            .get_mut(&character)
            .and_then(|state| state.original_base.take())
        else {
            return;
        };
        if self.is_valid(character) {
            self.host.write_base(character, original);
            self.host.play_blend(character, CLEAR_BLEND_TIMELINE);
        }
        self.prune(character);
    }

    /// Forces the idle timeline, dropping the captured base without restoring it.
    pub fn reset_to_idle(&mut self, character: CharacterAddress) {
        if let Some(state) = self.states.get_mut(&character) {
            state.original_base = None;
        }
        if self.is_valid(character) {
            self.host.set_base_override(character, IDLE_TIMELINE);
            self.host.play_blend(character, CLEAR_BLEND_TIMELINE);
        }
        self.prune(character);
    }

    /// Undoes every override on the character. Calling it again is a no-op.
    pub fn reset(&mut self, character: CharacterAddress) {
        // Order matters: the base restore must see per-slot rates already cleared.
        self.clear_lips_override(character);
        self.reset_per_slot_speeds(character);
        self.reset_base(character);
        self.reset_overall_speed(character);
    }

    /// Teardown used when a sustained loop ends.
    pub fn stop(&mut self, character: CharacterAddress) {
        self.reset(character);
    }

    /// Freezes the character, waits for the pose to settle, rewinds every frozen
    /// control and runs `post_action`.
    ///
    /// `post_action` is skipped when another base override was played on the
    /// character while it was settling.
    ///
    /// With `restore_speed_after` the speed override that was active before the
    /// freeze comes back a few ticks later (or is cleared if there was none).
    pub fn stop_and_reset(
        &mut self,
        character: CharacterAddress,
        post_action: Option<PostResetAction<H>>,
        restore_speed_after: bool,
    ) {
        if !self.is_valid(character) {
            return;
        }

        let previous_speed = self.overall_speed(character);
        let epoch = self.base_epoch(character);
        self.set_overall_speed(character, 0.0);

        let restore_ticks = self.restore_ticks;
        let settle: Continuation<Self> = Box::new(move |engine: &mut Self, character| {
            let rewound = engine.host.reset_zero_speed_controls(character);
            debug!("rewound {rewound} frozen controls on {character:?}");

            let replayed = engine
                .base_epoch(character)
                .is_some_and(|current| Some(current) != epoch);
            match post_action {
                Some(_) if replayed => {
                    debug!("{character:?} was replayed while settling; post action skipped");
                }
                Some(action) => action(engine, character),
                None => {}
            }

            if restore_speed_after {
                let restore: Continuation<Self> =
                    Box::new(move |engine: &mut Self, character| match previous_speed {
                        Some(speed) => engine.set_overall_speed(character, speed),
                        None => engine.reset_overall_speed(character),
                    });
                engine.schedule(character, restore_ticks, restore);
            }
        });
        self.schedule(character, self.settle_ticks, settle);
    }

    /// Advances the scheduler by one frame tick and resumes due continuations.
    pub fn on_tick(&mut self) {
        for task in self.scheduler.advance() {
            if self.is_valid(task.character) {
                task.run(self);
            } else {
                debug!(
                    "dropping continuation for stale character {:?}",
                    task.character
                );
            }
        }
        self.sync_subscription();
    }

    /// Drops the bookkeeping of a character whose address went away.
    pub fn forget(&mut self, character: CharacterAddress) {
        self.states.remove(&character);
    }

    /// Resets every known character and drops pending continuations.
    pub fn clear(&mut self) {
        let characters: Vec<_> = self.states.keys().copied().collect();
        for character in characters {
            self.reset(character);
        }
        self.states.clear();
        self.scheduler.clear();
        self.sync_subscription();
    }

    fn schedule(&mut self, character: CharacterAddress, ticks: u32, run: Continuation<Self>) {
        self.scheduler.schedule(character, ticks, run);
        self.sync_subscription();
    }

    fn sync_subscription(&mut self) {
        let wanted = !self.scheduler.is_empty();
        if wanted == self.scheduler_subscribed {
            return;
        }
        if wanted {
            self.ticks.subscribe(TickSubscription::Scheduler);
        } else {
            self.ticks.unsubscribe(TickSubscription::Scheduler);
        }
        self.scheduler_subscribed = wanted;
    }

    fn is_valid(&self, character: CharacterAddress) -> bool {
        self.host.resolve(character).is_some()
    }

    /// Epoch of the base override currently installed, if any.
    fn base_epoch(&self, character: CharacterAddress) -> Option<u64> {
        self.states
            .get(&character)
            .filter(|state| state.original_base.is_some())
            .map(|state| state.play_epoch)
    }

    /// Drops bookkeeping that has nothing left to restore or report.
    fn prune(&mut self, character: CharacterAddress) {
        if self
            .states
            .get(&character)
            .is_some_and(|state| state.is_pristine() && !state.slots_dirty)
        {
            self.states.remove(&character);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{
        BaseAnimationState, CharacterOwnership, CharacterSnapshot, InMemoryHost,
    };

    const PLAYER: CharacterAddress = CharacterAddress(0x10);

    fn setup() -> (Arc<InMemoryHost>, CharacterAnimationOverride<InMemoryHost>) {
        let host = Arc::new(InMemoryHost::new());
        host.spawn(
            PLAYER,
            CharacterSnapshot::new(42, 0x1000_0001, 0, CharacterOwnership::LocalPlayer),
        );
        host.set_base(
            PLAYER,
            BaseAnimationState {
                mode: 1,
                mode_param: 2,
                timeline: 7,
            },
        );
        let engine = CharacterAnimationOverride::new(host.clone(), host.clone());
        (host, engine)
    }

    #[test]
    fn play_captures_original_once_and_reset_restores_it() {
        let (host, mut engine) = setup();

        engine.play(PLAYER, 100, true);
        engine.play(PLAYER, 200, false);
        assert!(engine.has_base_override(PLAYER));

        let sim = host.character(PLAYER).unwrap();
        assert_eq!(sim.base_override, Some(200));
        assert_eq!(sim.blends, vec![100]);

        engine.reset(PLAYER);
        let sim = host.character(PLAYER).unwrap();
        assert_eq!(
            sim.base,
            BaseAnimationState {
                mode: 1,
                mode_param: 2,
                timeline: 7
            }
        );
        assert_eq!(sim.blends.last(), Some(&CLEAR_BLEND_TIMELINE));
        assert!(!engine.has_base_override(PLAYER));
    }

    #[test]
    fn second_reset_is_a_no_op() {
        let (host, mut engine) = setup();
        engine.play(PLAYER, 100, true);
        engine.set_overall_speed(PLAYER, 0.5);
        engine.set_slot_speed(PLAYER, 2, 2.0);
        engine.set_lips_override(PLAYER, 9);

        engine.reset(PLAYER);
        let after_first = host.character(PLAYER).unwrap();
        let writes = host.memory_writes();

        engine.reset(PLAYER);

        assert_eq!(host.memory_writes(), writes);
        assert_eq!(host.character(PLAYER).unwrap(), after_first);
        assert_eq!(after_first.overall_speed, None);
        assert!(after_first.slot_speeds.is_empty());
        assert_eq!(after_first.lips, 0);
    }

    #[test]
    fn base_reset_keeps_speed_overrides() {
        let (host, mut engine) = setup();
        engine.set_overall_speed(PLAYER, 1.25);
        engine.play(PLAYER, 100, false);

        engine.reset_base(PLAYER);

        assert_eq!(engine.overall_speed(PLAYER), Some(1.25));
        assert_eq!(host.character(PLAYER).unwrap().overall_speed, Some(1.25));
    }

    #[test]
    fn reset_to_idle_discards_original_without_restoring() {
        let (host, mut engine) = setup();
        engine.play(PLAYER, 100, false);

        engine.reset_to_idle(PLAYER);

        let sim = host.character(PLAYER).unwrap();
        assert_eq!(sim.base_override, Some(IDLE_TIMELINE));
        assert_eq!(sim.base.mode, 1);
        assert!(!engine.has_base_override(PLAYER));
    }

    #[test]
    fn dirty_flag_is_read_and_cleared() {
        let (_host, mut engine) = setup();
        assert!(!engine.check_and_reset_dirty_slots(PLAYER));

        engine.set_slot_speed(PLAYER, 1, 0.5);
        assert!(engine.check_and_reset_dirty_slots(PLAYER));
        assert!(!engine.check_and_reset_dirty_slots(PLAYER));

        engine.reset_slot_speed(PLAYER, 1);
        assert!(engine.check_and_reset_dirty_slots(PLAYER));
        assert_eq!(engine.slot_speed(PLAYER, 1), None);
    }

    #[test]
    fn stop_and_reset_runs_on_tick_schedule() {
        let (host, mut engine) = setup();
        engine.set_overall_speed(PLAYER, 1.5);
        engine.play(PLAYER, 100, true);

        engine.stop_and_reset(
            PLAYER,
            Some(Box::new(
                |engine: &mut CharacterAnimationOverride<InMemoryHost>, character| {
                    engine.reset_to_idle(character)
                },
            )),
            true,
        );
        assert_eq!(host.character(PLAYER).unwrap().overall_speed, Some(0.0));
        assert!(host.is_subscribed(TickSubscription::Scheduler));

        for _ in 0..DEFAULT_SETTLE_TICKS - 1 {
            engine.on_tick();
        }
        assert_eq!(host.character(PLAYER).unwrap().zero_speed_resets, 0);

        engine.on_tick();
        let sim = host.character(PLAYER).unwrap();
        assert_eq!(sim.zero_speed_resets, 1);
        assert_eq!(sim.base_override, Some(IDLE_TIMELINE));
        assert_eq!(sim.overall_speed, Some(0.0));

        for _ in 0..DEFAULT_RESTORE_TICKS {
            engine.on_tick();
        }
        assert_eq!(host.character(PLAYER).unwrap().overall_speed, Some(1.5));
        assert_eq!(engine.pending_continuations(), 0);
        assert!(!host.is_subscribed(TickSubscription::Scheduler));
    }

    #[test]
    fn restore_without_previous_speed_clears_override() {
        let (host, mut engine) = setup();

        engine.stop_and_reset(PLAYER, None, true);
        for _ in 0..DEFAULT_SETTLE_TICKS + DEFAULT_RESTORE_TICKS {
            engine.on_tick();
        }

        assert_eq!(host.character(PLAYER).unwrap().overall_speed, None);
        assert_eq!(engine.overall_speed(PLAYER), None);
    }

    #[test]
    fn full_reset_drops_character_state() {
        let (_host, mut engine) = setup();
        engine.play(PLAYER, 100, true);
        engine.set_overall_speed(PLAYER, 0.5);
        engine.set_lips_override(PLAYER, 9);
        assert!(engine.state(PLAYER).is_some());

        engine.reset(PLAYER);
        assert!(engine.state(PLAYER).is_none());
        assert_eq!(engine.overridden_count(), 0);
    }

    #[test]
    fn reset_slot_state_lingers_until_dirty_flag_is_read() {
        let (_host, mut engine) = setup();
        engine.set_slot_speed(PLAYER, 1, 0.5);

        engine.reset(PLAYER);
        assert!(engine.state(PLAYER).is_some());

        assert!(engine.check_and_reset_dirty_slots(PLAYER));
        assert!(engine.state(PLAYER).is_none());
    }

    #[test]
    fn replay_while_settling_keeps_new_override() {
        let (host, mut engine) = setup();
        engine.play(PLAYER, 100, true);
        engine.stop_and_reset(
            PLAYER,
            Some(Box::new(
                |engine: &mut CharacterAnimationOverride<InMemoryHost>, character| {
                    engine.reset_to_idle(character)
                },
            )),
            false,
        );

        engine.on_tick();
        engine.play(PLAYER, 200, true);
        for _ in 0..DEFAULT_SETTLE_TICKS {
            engine.on_tick();
        }

        let sim = host.character(PLAYER).unwrap();
        assert_eq!(sim.zero_speed_resets, 1);
        assert_eq!(sim.base_override, Some(200));
        assert!(engine.has_base_override(PLAYER));
    }

    #[test]
    fn continuation_for_stale_character_is_dropped() {
        let (host, mut engine) = setup();
        engine.stop_and_reset(
            PLAYER,
            Some(Box::new(
                |_: &mut CharacterAnimationOverride<InMemoryHost>, _| {
                    panic!("post action must not run")
                },
            )),
            true,
        );

        host.despawn(PLAYER);
        for _ in 0..DEFAULT_SETTLE_TICKS + DEFAULT_RESTORE_TICKS {
            engine.on_tick();
        }

        assert_eq!(engine.pending_continuations(), 0);
        assert!(!host.is_subscribed(TickSubscription::Scheduler));
    }
}
