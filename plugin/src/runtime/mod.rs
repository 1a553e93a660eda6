pub mod config;
pub mod core;
pub mod message_hub;
pub mod notifier;

pub use config::PluginConfig;
pub use core::{CoreStats, EmoteCore, RemoteOutcome};
pub use message_hub::IpcHub;
pub use notifier::{DebounceScope, NotifierMetrics, SyncNotifier, SyncTransport, TransportError};
