use std::collections::HashMap;
use std::sync::Arc;

use common::{EmoteDefinition, EmoteId, TimelineCatalog};
use log::{debug, info};
use protocol::{Delivery, MessageDirection, SyncAction, SyncAudience, SyncCodec, SyncMessage};
use serde::Serialize;
use uuid::Uuid;

use super::config::PluginConfig;
use super::notifier::{NotifierMetrics, SyncNotifier, SyncTransport};
use crate::animation::CharacterAnimationOverride;
use crate::error::{PluginError, Result};
use crate::host::{
    CharacterAddress, CharacterOwnership, CharacterSource, GameHost, TickSource, TickSubscription,
};
use crate::tracking::{
    CharacterIdentity, EmoteClassifier, Eviction, PlayOutcome, TrackedCharacterRegistry,
};
use crate::verifier::{NetworkProtocolVerifier, ProtocolMismatch, ProtocolState};

#[derive(Debug, Clone, Serialize)]
pub struct CoreStats {
    pub sender_id: u64,
    pub tracked_loops: usize,
    pub overridden_characters: usize,
    pub pending_continuations: usize,
    pub protocol_state: ProtocolState,
    pub protocol_warnings: u64,
    pub remote_applied: u64,
    pub sync: Option<NotifierMetrics>,
}

/// What a frame received from another instance did locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RemoteOutcome {
    Played(PlayOutcome),
    Stopped,
    ConfigUpdated,
    /// Published by this instance.
    OwnMessage,
    /// Already applied for that character: an older sequence, or the same
    /// sequence on a channel that does not outrank the one applied.
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RemoteKey {
    sender_id: u64,
    content_id: u64,
    object_index: u16,
}

/// Composition root of the override core.
///
/// All entry points take `&mut self` and are meant to be driven from the
/// host's frame thread.
pub struct EmoteCore<H: GameHost> {
    config: PluginConfig,
    registry: TrackedCharacterRegistry<H>,
    verifier: NetworkProtocolVerifier,
    notifier: Option<SyncNotifier>,
    codec: SyncCodec,
    sender_id: u64,
    remote_sequences: HashMap<RemoteKey, (u32, u8)>,
    remote_applied: u64,
}

impl<H: GameHost + 'static> EmoteCore<H> {
    pub fn bootstrap(
        config: PluginConfig,
        host: Arc<H>,
        ticks: Arc<dyn TickSource>,
        catalog: Arc<dyn TimelineCatalog>,
        transport: Arc<dyn SyncTransport>,
    ) -> Result<Self> {
        config.validate()?;

        let overrides = CharacterAnimationOverride::new(host, ticks.clone())
            .with_reset_ticks(config.reset.settle_ticks, config.reset.restore_ticks);
        let classifier = EmoteClassifier::new(config.overrides.iter().copied());
        let registry = TrackedCharacterRegistry::new(overrides, ticks, catalog, classifier)
            .with_rotation_epsilon(config.tracking.rotation_epsilon);

        let sender_id = Uuid::new_v4().as_u128() as u64;
        let notifier = config.sync.enabled.then(|| {
            SyncNotifier::new(
                transport,
                sender_id,
                config.sync.channel_prefix.clone(),
                config.debounce(),
                config.sync.scope,
            )
        });
        let verifier = NetworkProtocolVerifier::new(config.verifier.enabled);

        info!(
            "emote core ready (instance {sender_id:#018x}, sync {}, verifier {})",
            if notifier.is_some() { "on" } else { "off" },
            if verifier.is_enabled() { "on" } else { "off" },
        );

        Ok(Self {
            config,
            registry,
            verifier,
            notifier,
            codec: SyncCodec::default(),
            sender_id,
            remote_sequences: HashMap::new(),
            remote_applied: 0,
        })
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn sender_id(&self) -> u64 {
        self.sender_id
    }

    pub fn host(&self) -> &Arc<H> {
        self.registry.overrides().host()
    }

    pub fn registry(&self) -> &TrackedCharacterRegistry<H> {
        &self.registry
    }

    /// Direct access to speed and lips overrides.
    pub fn overrides_mut(&mut self) -> &mut CharacterAnimationOverride<H> {
        self.registry.overrides_mut()
    }

    pub fn verifier(&self) -> &NetworkProtocolVerifier {
        &self.verifier
    }

    pub fn notifier(&self) -> Option<&SyncNotifier> {
        self.notifier.as_ref()
    }

    pub fn play_emote(
        &mut self,
        character: CharacterAddress,
        emote_id: EmoteId,
    ) -> Result<PlayOutcome> {
        let emote = self.lookup_emote(emote_id)?;
        let replaced = self.registry.entry(character).cloned();
        let outcome = self.registry.play_emote(character, &emote);
        if outcome.is_played() {
            self.publish_for(character, SyncAction::PlayEmote, emote_id);
        } else if let Some(entry) = replaced.filter(|_| !self.registry.is_tracked(character)) {
            // The old loop went down with nothing to replace it.
            self.publish_identity(entry.identity, SyncAction::StopEmote, entry.emote_id);
        }
        Ok(outcome)
    }

    /// Stops whatever override the character is running. Returns whether a
    /// tracked loop was ended.
    pub fn stop_emote(&mut self, character: CharacterAddress) -> bool {
        match self.registry.stop_loop(character, true) {
            Some(entry) => {
                self.publish_identity(entry.identity, SyncAction::StopEmote, entry.emote_id);
                true
            }
            None => false,
        }
    }

    /// Like [`stop_emote`](Self::stop_emote), but eases the character back
    /// to idle over a few frame ticks.
    pub fn stop_and_reset(&mut self, character: CharacterAddress, restore_speed: bool) -> bool {
        match self.registry.stop_and_reset(character, restore_speed) {
            Some(entry) => {
                self.publish_identity(entry.identity, SyncAction::StopEmote, entry.emote_id);
                true
            }
            None => false,
        }
    }

    pub fn notify_config_changed(&mut self, character: CharacterAddress) {
        self.publish_for(character, SyncAction::ConfigUpdate, 0);
    }

    /// Host frame callback for an active subscription.
    pub fn on_tick(&mut self, subscription: TickSubscription) -> Vec<Eviction> {
        match subscription {
            TickSubscription::LoopPoll => {
                let evictions = self.registry.poll();
                for eviction in &evictions {
                    self.publish_identity(
                        eviction.identity,
                        SyncAction::StopEmote,
                        eviction.emote_id,
                    );
                }
                evictions
            }
            TickSubscription::Scheduler => {
                self.registry.overrides_mut().on_tick();
                Vec::new()
            }
        }
    }

    /// Host network hook. Only feeds the verifier.
    pub fn on_network_message(
        &mut self,
        opcode: u16,
        direction: MessageDirection,
        payload: &[u8],
    ) -> Option<ProtocolMismatch> {
        self.verifier.on_message(opcode, direction, payload)
    }

    /// Replays a sync frame published by another instance. Nothing is re-published.
    pub fn apply_remote(&mut self, frame: &[u8]) -> Result<RemoteOutcome> {
        let decoded = self.codec.decode_frame(frame)?;
        let envelope = decoded.envelope;
        if envelope.sender_id == self.sender_id {
            return Ok(RemoteOutcome::OwnMessage);
        }

        let message = envelope.message;
        let key = RemoteKey {
            sender_id: envelope.sender_id,
            content_id: message.content_id,
            object_index: message.object_index,
        };
        // The debounced copy of an event re-applies it once, to undo remote drift.
        let order = (envelope.sequence, delivery_rank(decoded.channel.delivery()));
        if self
            .remote_sequences
            .get(&key)
            .is_some_and(|last| order <= *last)
        {
            return Ok(RemoteOutcome::Duplicate);
        }

        let outcome = match message.action {
            SyncAction::ConfigUpdate => {
                debug!(
                    "remote config update for content_id={:#x}",
                    message.content_id
                );
                RemoteOutcome::ConfigUpdated
            }
            SyncAction::PlayEmote => {
                let character = self.resolve_remote(&message)?;
                let emote = self.lookup_emote(message.emote_id)?;
                RemoteOutcome::Played(self.registry.play_emote(character, &emote))
            }
            SyncAction::StopEmote => {
                let character = self.resolve_remote(&message)?;
                self.registry.stop_loop(character, true);
                RemoteOutcome::Stopped
            }
        };

        match message.action {
            SyncAction::StopEmote if order.1 == delivery_rank(Delivery::Debounced) => {
                self.remote_sequences.remove(&key);
            }
            _ => {
                self.remote_sequences.insert(key, order);
            }
        }
        self.remote_applied += 1;
        Ok(outcome)
    }

    /// Number of (sender, character) pairs with a remembered sequence.
    pub fn remote_sequence_count(&self) -> usize {
        self.remote_sequences.len()
    }

    pub fn stats(&self) -> CoreStats {
        let overrides = self.registry.overrides();
        CoreStats {
            sender_id: self.sender_id,
            tracked_loops: self.registry.tracked_count(),
            overridden_characters: overrides.overridden_count(),
            pending_continuations: overrides.pending_continuations(),
            protocol_state: self.verifier.state(),
            protocol_warnings: self.verifier.warning_count(),
            remote_applied: self.remote_applied,
            sync: self.notifier.as_ref().map(SyncNotifier::metrics),
        }
    }

    /// Restores every character and cancels pending sync publishes.
    pub fn shutdown(&mut self) {
        self.registry.clear();
        if let Some(notifier) = &self.notifier {
            notifier.shutdown();
        }
        info!("emote core shut down");
    }

    fn lookup_emote(&self, emote_id: EmoteId) -> Result<EmoteDefinition> {
        self.registry
            .catalog()
            .emote(emote_id)
            .cloned()
            .ok_or(PluginError::UnknownEmote(emote_id))
    }

    fn resolve_remote(&self, message: &SyncMessage) -> Result<CharacterAddress> {
        let host = self.host();
        let found = if message.content_id != 0 {
            host.find_by_content_id(message.content_id)
        } else {
            host.find_by_object_index(message.object_index)
        };
        found.ok_or(PluginError::RemoteTargetMissing {
            content_id: message.content_id,
            object_index: message.object_index,
        })
    }

    fn publish_for(&self, character: CharacterAddress, action: SyncAction, emote_id: EmoteId) {
        if let Some(snapshot) = self.host().resolve(character) {
            self.publish_identity(CharacterIdentity::from(&snapshot), action, emote_id);
        }
    }

    fn publish_identity(&self, identity: CharacterIdentity, action: SyncAction, emote_id: EmoteId) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let Some(audience) = audience_of(identity.ownership) else {
            return;
        };
        notifier.notify(
            audience,
            SyncMessage::new(
                action,
                identity.base_id,
                identity.object_index,
                identity.content_id,
                emote_id,
            ),
        );
    }
}

fn delivery_rank(delivery: Delivery) -> u8 {
    match delivery {
        Delivery::Immediate => 0,
        Delivery::Debounced => 1,
    }
}

/// Only the local participant's own characters are announced.
fn audience_of(ownership: CharacterOwnership) -> Option<SyncAudience> {
    match ownership {
        CharacterOwnership::LocalPlayer => Some(SyncAudience::LocalPlayer),
        CharacterOwnership::OwnedObject => Some(SyncAudience::OwnedObject),
        CharacterOwnership::Foreign => None,
    }
}
