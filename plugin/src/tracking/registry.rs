//! Characters currently sustaining a looped override.
//!
//! The registry owns the per-frame interruption poll. It subscribes to the
//! host tick only while at least one loop is tracked.

use std::collections::HashMap;
use std::sync::Arc;

use common::{EmoteDefinition, EmoteId, TimelineCatalog, TimelineId};
use log::debug;
use serde::Serialize;

use super::classifier::{EmoteClassifier, EmotePlan};
use super::entry::{CharacterIdentity, InterruptReason, TrackedLoopEntry};
use crate::animation::{CharacterAnimationOverride, PostResetAction};
use crate::host::{
    AnimationMemory, CharacterAddress, CharacterOwnership, CharacterSnapshot, CharacterSource, GameHost,
    TickSource, TickSubscription,
};

/// Squared displacement above which a character counts as moved.
pub const POSITION_EPSILON_SQ: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlayOutcome {
    Looped { timeline: TimelineId },
    OneShot { timeline: TimelineId },
    /// Stale address, `DoNotPlay` emote, or nothing resolvable to play.
    Skipped,
}

impl PlayOutcome {
    pub fn is_played(&self) -> bool {
        !matches!(self, Self::Skipped)
    }
}

/// A loop the poll dropped during the last tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Eviction {
    pub character: CharacterAddress,
    pub identity: CharacterIdentity,
    pub emote_id: EmoteId,
    pub reason: InterruptReason,
}

pub struct TrackedCharacterRegistry<H: GameHost> {
    overrides: CharacterAnimationOverride<H>,
    ticks: Arc<dyn TickSource>,
    catalog: Arc<dyn TimelineCatalog>,
    classifier: EmoteClassifier,
    entries: HashMap<CharacterAddress, TrackedLoopEntry>,
    rotation_epsilon: Option<f32>,
}

impl<H: GameHost + 'static> TrackedCharacterRegistry<H> {
    pub fn new(
        overrides: CharacterAnimationOverride<H>,
        ticks: Arc<dyn TickSource>,
        catalog: Arc<dyn TimelineCatalog>,
        classifier: EmoteClassifier,
    ) -> Self {
        Self {
            overrides,
            ticks,
            catalog,
            classifier,
            entries: HashMap::new(),
            rotation_epsilon: None,
        }
    }

    /// Enables the rotation check of the poll.
    #[must_use]
    pub fn with_rotation_epsilon(mut self, epsilon: Option<f32>) -> Self {
        self.rotation_epsilon = epsilon;
        self
    }

    pub fn overrides(&self) -> &CharacterAnimationOverride<H> {
        &self.overrides
    }

    pub fn overrides_mut(&mut self) -> &mut CharacterAnimationOverride<H> {
        &mut self.overrides
    }

    pub fn catalog(&self) -> &Arc<dyn TimelineCatalog> {
        &self.catalog
    }

    pub fn is_tracked(&self, character: CharacterAddress) -> bool {
        self.entries.contains_key(&character)
    }

    pub fn tracked_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entry(&self, character: CharacterAddress) -> Option<&TrackedLoopEntry> {
        self.entries.get(&character)
    }

    /// Starts `emote` on `character`, replacing any loop it was sustaining.
    pub fn play_emote(
        &mut self,
        character: CharacterAddress,
        emote: &EmoteDefinition,
    ) -> PlayOutcome {
        let Some(snapshot) = self.overrides.host().resolve(character) else {
            debug!("play_emote on stale character {character:?}");
            return PlayOutcome::Skipped;
        };

        if self.entries.contains_key(&character) {
            self.stop_loop(character, true);
        }

        let plan = self.classifier.classify(emote, self.catalog.as_ref());
        if plan == EmotePlan::Skip {
            debug!("emote {} has nothing to play", emote.id);
            return PlayOutcome::Skipped;
        }

        if snapshot.ownership == CharacterOwnership::LocalPlayer {
            self.overrides.host().face_target(character);
        }

        match plan {
            EmotePlan::Looped { timeline } => {
                self.overrides.play(character, timeline, true);
                self.track(character, TrackedLoopEntry::new(emote.id, timeline, &snapshot));
                PlayOutcome::Looped { timeline }
            }
            EmotePlan::OneShot { timeline } => {
                self.untrack(character);
                self.overrides.host().play_timeline(character, timeline);
                PlayOutcome::OneShot { timeline }
            }
            EmotePlan::Skip => PlayOutcome::Skipped,
        }
    }

    /// Tears the override down. With `evict` the tracked entry goes too.
    pub fn stop_loop(
        &mut self,
        character: CharacterAddress,
        evict: bool,
    ) -> Option<TrackedLoopEntry> {
        self.overrides.stop(character);
        if evict {
            self.untrack(character)
        } else {
            None
        }
    }

    /// Evicts the loop and eases the character back to idle over a few ticks.
    pub fn stop_and_reset(
        &mut self,
        character: CharacterAddress,
        restore_speed: bool,
    ) -> Option<TrackedLoopEntry> {
        let entry = self.untrack(character);
        let to_idle: PostResetAction<H> =
            Box::new(|engine: &mut CharacterAnimationOverride<H>, character| {
                engine.reset_to_idle(character)
            });
        self.overrides
            .stop_and_reset(character, Some(to_idle), restore_speed);
        entry
    }

    /// Checks every tracked loop against the character's current state.
    ///
    /// The first failed check stops and evicts the loop on this tick.
    pub fn poll(&mut self) -> Vec<Eviction> {
        let characters: Vec<_> = self.entries.keys().copied().collect();
        let mut evicted = Vec::new();

        for character in characters {
            let Some(entry) = self.entries.get(&character) else {
                continue;
            };

            match self.check_entry(character, entry) {
                Ok(snapshot) => {
                    if let Some(entry) = self.entries.get_mut(&character) {
                        entry.refresh(&snapshot);
                    }
                }
                Err(reason) => {
                    debug!("loop on {character:?} interrupted: {reason:?}");
                    self.overrides.stop(character);
                    if reason == InterruptReason::Unresolvable {
                        self.overrides.forget(character);
                    }
                    if let Some(entry) = self.untrack(character) {
                        evicted.push(Eviction {
                            character,
                            identity: entry.identity,
                            emote_id: entry.emote_id,
                            reason,
                        });
                    }
                }
            }
        }

        evicted
    }

    /// Stops every loop and drops the tick subscription.
    pub fn clear(&mut self) {
        let characters: Vec<_> = self.entries.keys().copied().collect();
        for character in characters {
            self.stop_loop(character, true);
        }
        self.overrides.clear();
    }

    fn check_entry(
        &self,
        character: CharacterAddress,
        entry: &TrackedLoopEntry,
    ) -> Result<CharacterSnapshot, InterruptReason> {
        let host = self.overrides.host();
        let snapshot = host
            .resolve(character)
            .ok_or(InterruptReason::Unresolvable)?;

        if !host.is_live(character) {
            return Err(InterruptReason::LeftObjectTable);
        }
        if entry.position_delta_sq(&snapshot) > POSITION_EPSILON_SQ {
            return Err(InterruptReason::Moved);
        }
        if let Some(epsilon) = self.rotation_epsilon {
            if entry.rotation_delta(&snapshot) > epsilon {
                return Err(InterruptReason::Rotated);
            }
        }
        if snapshot.weapon_drawn != entry.weapon_drawn {
            return Err(InterruptReason::WeaponToggled);
        }

        Ok(snapshot)
    }

    fn track(&mut self, character: CharacterAddress, entry: TrackedLoopEntry) {
        let was_empty = self.entries.is_empty();
        self.entries.insert(character, entry);
        if was_empty {
            self.ticks.subscribe(TickSubscription::LoopPoll);
        }
    }

    fn untrack(&mut self, character: CharacterAddress) -> Option<TrackedLoopEntry> {
        let entry = self.entries.remove(&character)?;
        if self.entries.is_empty() {
            self.ticks.unsubscribe(TickSubscription::LoopPoll);
        }
        Some(entry)
    }
}
