use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, warn};
use protocol::{Delivery, SyncAudience, SyncChannel, SyncCodec, SyncEnvelope, SyncMessage};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("sync transport closed")]
    Closed,

    #[error("sync transport rejected frame: {0}")]
    Rejected(String),
}

/// Outbound side of the cross-instance bus.
pub trait SyncTransport: Send + Sync + 'static {
    /// Returns how many subscribers the frame reached.
    fn publish(&self, channel: &str, frame: Vec<u8>) -> Result<usize, TransportError>;
}

/// How pending debounced publishes replace each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DebounceScope {
    /// One timer for everything; any event cancels whatever is pending.
    Global,
    /// One timer per audience and character identity.
    #[default]
    PerCharacter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DebounceKey {
    Global,
    Character {
        audience: SyncAudience,
        content_id: u64,
        object_index: u16,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NotifierMetrics {
    pub immediate_published: u64,
    pub debounced_published: u64,
    pub superseded: u64,
    pub failures: u64,
    pub pending_debounce: usize,
}

#[derive(Debug, Default)]
struct NotifierCounters {
    immediate_published: AtomicU64,
    debounced_published: AtomicU64,
    superseded: AtomicU64,
    failures: AtomicU64,
}

struct PendingPublish {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Publishes override events to cooperating instances.
///
/// Every event goes out once right away and once more after the debounce
/// window; a newer event in the same scope cancels the older delayed publish.
#[derive(Clone)]
pub struct SyncNotifier {
    transport: Arc<dyn SyncTransport>,
    codec: SyncCodec,
    channel_prefix: Arc<str>,
    sender_id: u64,
    debounce: Duration,
    scope: DebounceScope,
    sequence: Arc<AtomicU32>,
    generation: Arc<AtomicU64>,
    pending: Arc<DashMap<DebounceKey, PendingPublish>>,
    counters: Arc<NotifierCounters>,
}

impl SyncNotifier {
    pub fn new(
        transport: Arc<dyn SyncTransport>,
        sender_id: u64,
        channel_prefix: impl Into<String>,
        debounce: Duration,
        scope: DebounceScope,
    ) -> Self {
        let channel_prefix: String = channel_prefix.into();
        Self {
            transport,
            codec: SyncCodec::default(),
            channel_prefix: Arc::from(channel_prefix),
            sender_id,
            debounce,
            scope,
            sequence: Arc::new(AtomicU32::new(0)),
            generation: Arc::new(AtomicU64::new(0)),
            pending: Arc::new(DashMap::new()),
            counters: Arc::new(NotifierCounters::default()),
        }
    }

    pub fn sender_id(&self) -> u64 {
        self.sender_id
    }

    pub fn channel_name(&self, audience: SyncAudience, delivery: Delivery) -> String {
        SyncChannel::new(audience, delivery).name(&self.channel_prefix)
    }

    pub fn notify(&self, audience: SyncAudience, message: SyncMessage) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let envelope = SyncEnvelope::new(self.sender_id, sequence, message);

        if self.publish(SyncChannel::new(audience, Delivery::Immediate), &envelope) {
            self.counters
                .immediate_published
                .fetch_add(1, Ordering::Relaxed);
        }
        self.schedule_debounced(audience, envelope);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn metrics(&self) -> NotifierMetrics {
        NotifierMetrics {
            immediate_published: self.counters.immediate_published.load(Ordering::Relaxed),
            debounced_published: self.counters.debounced_published.load(Ordering::Relaxed),
            superseded: self.counters.superseded.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            pending_debounce: self.pending.len(),
        }
    }

    /// Cancels every pending debounced publish.
    pub fn shutdown(&self) {
        self.pending.retain(|_, pending| {
            pending.handle.abort();
            false
        });
    }

    fn schedule_debounced(&self, audience: SyncAudience, envelope: SyncEnvelope) {
        let key = match self.scope {
            DebounceScope::Global => DebounceKey::Global,
            DebounceScope::PerCharacter => DebounceKey::Character {
                audience,
                content_id: envelope.message.content_id,
                object_index: envelope.message.object_index,
            },
        };

        let Ok(runtime) = Handle::try_current() else {
            warn!("no async runtime available; debounced sync publish skipped");
            return;
        };

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let notifier = self.clone();
        // Hold the slot across the spawn so the task cannot finish before it is recorded.
        let slot = self.pending.entry(key);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(notifier.debounce).await;
            notifier
                .pending
                .remove_if(&key, |_, pending| pending.generation == generation);
            if notifier.publish(SyncChannel::new(audience, Delivery::Debounced), &envelope) {
                notifier
                    .counters
                    .debounced_published
                    .fetch_add(1, Ordering::Relaxed);
            }
        });

        let pending = PendingPublish { generation, handle };
        match slot {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.insert(pending);
                previous.handle.abort();
                self.counters.superseded.fetch_add(1, Ordering::Relaxed);
                debug!("debounced sync publish superseded ({key:?})");
            }
            Entry::Vacant(vacant) => {
                vacant.insert(pending);
            }
        }
    }

    fn publish(&self, channel: SyncChannel, envelope: &SyncEnvelope) -> bool {
        let name = channel.name(&self.channel_prefix);
        let frame = match self.codec.encode_frame(channel, envelope) {
            Ok(frame) => frame,
            Err(err) => {
                warn!("failed to encode sync frame for {name}: {err}");
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };

        match self.transport.publish(&name, frame) {
            Ok(delivered) => {
                debug!(
                    "published {:?} seq={} on {name} to {delivered} subscribers",
                    envelope.message.action, envelope.sequence
                );
                true
            }
            Err(err) => {
                warn!("sync publish on {name} failed: {err}");
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}
