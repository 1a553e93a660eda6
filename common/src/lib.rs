//! Emote definitions and the read-only timeline catalog.
//!
//! Rows here come from the game's static data. Nothing in this crate mutates
//! them; they are looked up by numeric id and handed to the resolver and the
//! override engine as plain values.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub mod timeline;

pub use timeline::TimelineResolver;

/// Row id of an animation timeline.
pub type TimelineId = u16;

/// Row id of an emote.
pub type EmoteId = u32;

/// Sentinel meaning "no timeline". Callers skip the action when they get it.
pub const NO_TIMELINE: TimelineId = 0;

/// Number of timeline slots an emote row can declare.
pub const TIMELINE_SLOT_COUNT: usize = 5;

/// How the game plays an emote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotePlayType {
    /// Needs continuous external sustaining.
    Looped,
    /// Plays once and returns to idle on its own.
    OneShot,
    /// Never played by the override engine.
    DoNotPlay,
}

/// Immutable emote row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmoteDefinition {
    pub id: EmoteId,
    pub play_type: EmotePlayType,
    /// Declared timeline references, by role. Unused slots hold [`NO_TIMELINE`].
    #[serde(default)]
    pub timelines: [TimelineId; TIMELINE_SLOT_COUNT],
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub icon: Option<u32>,
}

impl EmoteDefinition {
    #[must_use]
    pub fn new(
        id: EmoteId,
        play_type: EmotePlayType,
        timelines: [TimelineId; TIMELINE_SLOT_COUNT],
    ) -> Self {
        Self {
            id,
            play_type,
            timelines,
            name: None,
            icon: None,
        }
    }

    /// Timeline declared in `index`, or `None` when the slot is empty or out of range.
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<TimelineId> {
        self.timelines
            .get(index)
            .copied()
            .filter(|timeline| *timeline != NO_TIMELINE)
    }

    /// Non-empty slots in declared order, with their index.
    pub fn declared_slots(&self) -> impl Iterator<Item = (usize, TimelineId)> + '_ {
        self.timelines
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, timeline)| *timeline != NO_TIMELINE)
    }

    /// Display name, falling back to `#<id>`.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("#{}", self.id))
    }
}

/// Errors raised by catalog lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("timeline {0} is not present in the catalog")]
    UnknownTimeline(TimelineId),

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of the emote and timeline sheets.
pub trait TimelineCatalog {
    fn emote(&self, id: EmoteId) -> Option<&EmoteDefinition>;

    /// Whether the referenced timeline is flagged as a loop.
    fn is_loop(&self, timeline: TimelineId) -> Result<bool, CatalogError>;
}

/// Timeline row as stored in a catalog file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineRow {
    pub id: TimelineId,
    #[serde(default)]
    pub looping: bool,
}

/// Catalog held fully in memory, loadable from a TOML/JSON document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "CatalogDocument", into = "CatalogDocument")]
pub struct InMemoryCatalog {
    emotes: HashMap<EmoteId, EmoteDefinition>,
    timelines: HashMap<TimelineId, bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    emotes: Vec<EmoteDefinition>,
    #[serde(default)]
    timelines: Vec<TimelineRow>,
}

impl From<CatalogDocument> for InMemoryCatalog {
    fn from(doc: CatalogDocument) -> Self {
        let mut catalog = InMemoryCatalog::new();
        for row in doc.timelines {
            catalog.insert_timeline(row.id, row.looping);
        }
        for emote in doc.emotes {
            catalog.insert_emote(emote);
        }
        catalog
    }
}

impl From<InMemoryCatalog> for CatalogDocument {
    fn from(catalog: InMemoryCatalog) -> Self {
        let mut emotes: Vec<_> = catalog.emotes.into_values().collect();
        emotes.sort_by_key(|emote| emote.id);
        let mut timelines: Vec<_> = catalog
            .timelines
            .into_iter()
            .map(|(id, looping)| TimelineRow { id, looping })
            .collect();
        timelines.sort_by_key(|row| row.id);
        Self { emotes, timelines }
    }
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_emote(&mut self, emote: EmoteDefinition) {
        self.emotes.insert(emote.id, emote);
    }

    pub fn insert_timeline(&mut self, id: TimelineId, looping: bool) {
        self.timelines.insert(id, looping);
    }

    #[must_use]
    pub fn with_emote(mut self, emote: EmoteDefinition) -> Self {
        self.insert_emote(emote);
        self
    }

    #[must_use]
    pub fn with_timeline(mut self, id: TimelineId, looping: bool) -> Self {
        self.insert_timeline(id, looping);
        self
    }

    pub fn emote_count(&self) -> usize {
        self.emotes.len()
    }
}

impl TimelineCatalog for InMemoryCatalog {
    fn emote(&self, id: EmoteId) -> Option<&EmoteDefinition> {
        self.emotes.get(&id)
    }

    fn is_loop(&self, timeline: TimelineId) -> Result<bool, CatalogError> {
        self.timelines
            .get(&timeline)
            .copied()
            .ok_or(CatalogError::UnknownTimeline(timeline))
    }
}
