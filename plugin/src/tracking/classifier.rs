//! Decides whether an emote is sustained as a loop, played once, or skipped.

use std::collections::HashMap;

use common::{
    EmoteDefinition, EmoteId, EmotePlayType, TimelineCatalog, TimelineId, TimelineResolver,
    NO_TIMELINE,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideMode {
    Looped,
    OneShot,
    Skip,
}

/// Hand-maintained classification for emotes whose catalog row is misleading.
///
/// Without an explicit `timeline` the one matching `mode` is resolved from
/// the emote's slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct OverrideRule {
    pub emote_id: EmoteId,
    pub mode: OverrideMode,
    #[serde(default)]
    pub timeline: Option<TimelineId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmotePlan {
    Looped { timeline: TimelineId },
    OneShot { timeline: TimelineId },
    Skip,
}

#[derive(Debug, Clone, Default)]
pub struct EmoteClassifier {
    overrides: HashMap<EmoteId, OverrideRule>,
}

impl EmoteClassifier {
    pub fn new(rules: impl IntoIterator<Item = OverrideRule>) -> Self {
        Self {
            overrides: rules.into_iter().map(|rule| (rule.emote_id, rule)).collect(),
        }
    }

    pub fn rule_count(&self) -> usize {
        self.overrides.len()
    }

    pub fn classify<C: TimelineCatalog + ?Sized>(
        &self,
        emote: &EmoteDefinition,
        catalog: &C,
    ) -> EmotePlan {
        let resolver = TimelineResolver::new(catalog);

        if let Some(rule) = self.overrides.get(&emote.id) {
            return match rule.mode {
                OverrideMode::Looped => {
                    let timeline = rule
                        .timeline
                        .unwrap_or_else(|| resolver.resolve_looping_timeline(emote));
                    looped(timeline)
                }
                OverrideMode::OneShot => {
                    let timeline = rule
                        .timeline
                        .unwrap_or_else(|| resolver.resolve_non_looping_timeline(emote));
                    one_shot(timeline)
                }
                OverrideMode::Skip => EmotePlan::Skip,
            };
        }

        match emote.play_type {
            EmotePlayType::DoNotPlay => EmotePlan::Skip,
            EmotePlayType::OneShot => one_shot(resolver.resolve_non_looping_timeline(emote)),
            EmotePlayType::Looped => match resolver.resolve_looping_timeline(emote) {
                NO_TIMELINE => one_shot(resolver.resolve_non_looping_timeline(emote)),
                timeline => looped(timeline),
            },
        }
    }
}

fn looped(timeline: TimelineId) -> EmotePlan {
    if timeline == NO_TIMELINE {
        EmotePlan::Skip
    } else {
        EmotePlan::Looped { timeline }
    }
}

fn one_shot(timeline: TimelineId) -> EmotePlan {
    if timeline == NO_TIMELINE {
        EmotePlan::Skip
    } else {
        EmotePlan::OneShot { timeline }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::InMemoryCatalog;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new()
            .with_timeline(100, false)
            .with_timeline(101, true)
            .with_timeline(200, false)
    }

    #[test]
    fn looped_emote_uses_looping_slot() {
        let emote = EmoteDefinition::new(1, EmotePlayType::Looped, [100, 101, 0, 0, 0]);
        let plan = EmoteClassifier::default().classify(&emote, &catalog());
        assert_eq!(plan, EmotePlan::Looped { timeline: 101 });
    }

    #[test]
    fn looped_emote_without_loop_slot_plays_once() {
        let emote = EmoteDefinition::new(1, EmotePlayType::Looped, [100, 200, 0, 0, 0]);
        let plan = EmoteClassifier::default().classify(&emote, &catalog());
        assert_eq!(plan, EmotePlan::OneShot { timeline: 100 });
    }

    #[test]
    fn do_not_play_and_empty_emotes_are_skipped() {
        let classifier = EmoteClassifier::default();
        let hidden = EmoteDefinition::new(1, EmotePlayType::DoNotPlay, [101, 0, 0, 0, 0]);
        let empty = EmoteDefinition::new(2, EmotePlayType::OneShot, [0; 5]);

        assert_eq!(classifier.classify(&hidden, &catalog()), EmotePlan::Skip);
        assert_eq!(classifier.classify(&empty, &catalog()), EmotePlan::Skip);
    }

    #[test]
    fn override_table_wins_over_catalog() {
        let classifier = EmoteClassifier::new([
            OverrideRule {
                emote_id: 1,
                mode: OverrideMode::OneShot,
                timeline: None,
            },
            OverrideRule {
                emote_id: 2,
                mode: OverrideMode::Looped,
                timeline: Some(640),
            },
        ]);
        let looped = EmoteDefinition::new(1, EmotePlayType::Looped, [100, 101, 0, 0, 0]);
        let one_shot = EmoteDefinition::new(2, EmotePlayType::OneShot, [200, 0, 0, 0, 0]);

        assert_eq!(
            classifier.classify(&looped, &catalog()),
            EmotePlan::OneShot { timeline: 100 }
        );
        assert_eq!(
            classifier.classify(&one_shot, &catalog()),
            EmotePlan::Looped { timeline: 640 }
        );
    }
}
