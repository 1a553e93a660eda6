pub mod override_engine;
pub mod scheduler;
pub mod state;

pub use override_engine::{
    CharacterAnimationOverride, PostResetAction, CLEAR_BLEND_TIMELINE, IDLE_TIMELINE,
};
pub use scheduler::{Continuation, ScheduledTask, TickScheduler};
pub use state::AnimationOverrideState;
