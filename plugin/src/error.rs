use common::EmoteId;
use protocol::CodecError;

use crate::runtime::notifier::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown emote {0}")]
    UnknownEmote(EmoteId),

    #[error("Sync codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Sync transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("No character matches content_id={content_id:#x} object_index={object_index}")]
    RemoteTargetMissing { content_id: u64, object_index: u16 },
}

pub type Result<T> = std::result::Result<T, PluginError>;
