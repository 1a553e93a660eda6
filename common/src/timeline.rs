//! Picks which declared timeline slot of an emote to play.

use crate::{CatalogError, EmoteDefinition, NO_TIMELINE, TimelineCatalog, TimelineId};

/// Slot that conventionally holds the intro animation.
const INTRO_SLOT: usize = 1;
/// First slot past the base/intro pair.
const EXTRA_SLOTS_START: usize = 2;

/// Pure lookups over an emote's timeline slots.
///
/// Every resolver returns [`NO_TIMELINE`] when nothing suitable is declared.
pub struct TimelineResolver<'a, C: TimelineCatalog + ?Sized> {
    catalog: &'a C,
}

impl<'a, C: TimelineCatalog + ?Sized> TimelineResolver<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }

    /// Slot 0 if it loops, else the first looping slot, else [`NO_TIMELINE`].
    ///
    /// A catalog fault anywhere in the scan yields [`NO_TIMELINE`].
    pub fn resolve_looping_timeline(&self, emote: &EmoteDefinition) -> TimelineId {
        self.find_looping(emote).unwrap_or(NO_TIMELINE)
    }

    /// Slot 1 if declared, else [`NO_TIMELINE`].
    pub fn resolve_intro_timeline(&self, emote: &EmoteDefinition) -> TimelineId {
        emote.slot(INTRO_SLOT).unwrap_or(NO_TIMELINE)
    }

    /// First slot not flagged as a loop.
    ///
    /// When no slot is known to be non-looping the fallback order is slot 1,
    /// slot 0, then the first declared slot at index 2 or above. Slots whose
    /// loop flag cannot be read are skipped by the scan and only considered by
    /// the fallback.
    pub fn resolve_non_looping_timeline(&self, emote: &EmoteDefinition) -> TimelineId {
        let scanned = emote
            .declared_slots()
            .find(|(_, timeline)| matches!(self.catalog.is_loop(*timeline), Ok(false)));
        if let Some((_, timeline)) = scanned {
            return timeline;
        }

        emote
            .slot(INTRO_SLOT)
            .or_else(|| emote.slot(0))
            .or_else(|| {
                emote
                    .declared_slots()
                    .find(|(index, _)| *index >= EXTRA_SLOTS_START)
                    .map(|(_, timeline)| timeline)
            })
            .unwrap_or(NO_TIMELINE)
    }

    fn find_looping(&self, emote: &EmoteDefinition) -> Result<TimelineId, CatalogError> {
        if let Some(base) = emote.slot(0) {
            if self.catalog.is_loop(base)? {
                return Ok(base);
            }
        }

        for (_, timeline) in emote.declared_slots() {
            if self.catalog.is_loop(timeline)? {
                return Ok(timeline);
            }
        }

        Ok(NO_TIMELINE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EmotePlayType, InMemoryCatalog};

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new()
            .with_timeline(10, false)
            .with_timeline(11, true)
            .with_timeline(12, false)
            .with_timeline(20, true)
            .with_timeline(21, true)
    }

    fn emote(timelines: [TimelineId; 5]) -> EmoteDefinition {
        EmoteDefinition::new(1, EmotePlayType::Looped, timelines)
    }

    #[test]
    fn looping_prefers_first_loop_flagged_slot() {
        let catalog = catalog();
        let resolver = TimelineResolver::new(&catalog);
        assert_eq!(resolver.resolve_looping_timeline(&emote([10, 11, 12, 0, 0])), 11);
    }

    #[test]
    fn looping_prefers_slot_zero_when_it_loops() {
        let catalog = catalog();
        let resolver = TimelineResolver::new(&catalog);
        assert_eq!(resolver.resolve_looping_timeline(&emote([21, 20, 0, 0, 0])), 21);
    }

    #[test]
    fn looping_without_loop_flag_is_none() {
        let catalog = catalog();
        let resolver = TimelineResolver::new(&catalog);
        assert_eq!(
            resolver.resolve_looping_timeline(&emote([10, 12, 0, 0, 0])),
            NO_TIMELINE
        );
    }

    #[test]
    fn looping_catalog_fault_degrades_to_none() {
        let catalog = catalog();
        let resolver = TimelineResolver::new(&catalog);
        // 99 is unknown and is scanned before the looping slot.
        assert_eq!(
            resolver.resolve_looping_timeline(&emote([99, 11, 0, 0, 0])),
            NO_TIMELINE
        );
    }

    #[test]
    fn intro_is_slot_one() {
        let catalog = catalog();
        let resolver = TimelineResolver::new(&catalog);
        assert_eq!(resolver.resolve_intro_timeline(&emote([10, 12, 0, 0, 0])), 12);
        assert_eq!(
            resolver.resolve_intro_timeline(&emote([10, 0, 0, 0, 0])),
            NO_TIMELINE
        );
    }

    #[test]
    fn non_looping_scans_for_first_non_loop() {
        let catalog = catalog();
        let resolver = TimelineResolver::new(&catalog);
        assert_eq!(
            resolver.resolve_non_looping_timeline(&emote([11, 20, 12, 0, 0])),
            12
        );
    }

    #[test]
    fn non_looping_fallback_order_is_slot_one_then_zero_then_extras() {
        let catalog = catalog();
        let resolver = TimelineResolver::new(&catalog);

        assert_eq!(
            resolver.resolve_non_looping_timeline(&emote([11, 20, 21, 0, 0])),
            20
        );
        assert_eq!(
            resolver.resolve_non_looping_timeline(&emote([11, 0, 21, 0, 0])),
            11
        );
        assert_eq!(
            resolver.resolve_non_looping_timeline(&emote([0, 0, 0, 21, 20])),
            21
        );
        assert_eq!(
            resolver.resolve_non_looping_timeline(&emote([0; 5])),
            NO_TIMELINE
        );
    }

    #[test]
    fn non_looping_skips_unknown_slots_in_scan() {
        let catalog = catalog();
        let resolver = TimelineResolver::new(&catalog);
        assert_eq!(
            resolver.resolve_non_looping_timeline(&emote([99, 11, 10, 0, 0])),
            10
        );
    }
}
