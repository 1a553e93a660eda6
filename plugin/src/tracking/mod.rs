pub mod classifier;
pub mod entry;
pub mod registry;

pub use classifier::{EmoteClassifier, EmotePlan, OverrideMode, OverrideRule};
pub use entry::{CharacterIdentity, InterruptReason, TrackedLoopEntry};
pub use registry::{Eviction, PlayOutcome, TrackedCharacterRegistry};
