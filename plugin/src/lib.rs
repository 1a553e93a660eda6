//! Animation override core for a live game client.
//!
//! Forces emote and pose animations on characters, keeps looped overrides
//! alive until the character moves, turns, draws a weapon or despawns, tells
//! cooperating instances about every start and stop, and cross-checks the
//! server's pose/emote control feed.

pub mod animation;
pub mod error;
pub mod host;
pub mod runtime;
pub mod tracking;
pub mod verifier;

pub use error::{PluginError, Result};
pub use runtime::{EmoteCore, PluginConfig};
