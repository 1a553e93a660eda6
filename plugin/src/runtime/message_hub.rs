use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

use super::notifier::{SyncTransport, TransportError};

/// In-process pub/sub bus keyed by channel name.
///
/// Stands in for the host's inter-plugin messaging: every instance that holds
/// a clone of the hub sees the frames published on the channels it subscribed to.
#[derive(Clone)]
pub struct IpcHub {
    channels: Arc<DashMap<String, broadcast::Sender<Vec<u8>>>>,
    channel_capacity: usize,
}

impl IpcHub {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            channel_capacity: channel_capacity.max(1),
        }
    }

    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<Vec<u8>> {
        self.sender(channel).subscribe()
    }

    /// Returns how many subscribers received the frame.
    pub fn publish(&self, channel: &str, frame: Vec<u8>) -> usize {
        self.sender(channel).send(frame).unwrap_or(0)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<Vec<u8>> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.channel_capacity);
                tx
            })
            .clone()
    }
}

impl Default for IpcHub {
    fn default() -> Self {
        Self::new(64)
    }
}

impl SyncTransport for IpcHub {
    fn publish(&self, channel: &str, frame: Vec<u8>) -> Result<usize, TransportError> {
        Ok(IpcHub::publish(self, channel, frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_only_named_channel() {
        let hub = IpcHub::new(8);
        let mut local = hub.subscribe("emotesync.local.immediate");
        let mut owned = hub.subscribe("emotesync.owned.immediate");

        let delivered = hub.publish("emotesync.local.immediate", vec![1, 2, 3]);

        assert_eq!(delivered, 1);
        assert_eq!(local.recv().await.expect("must receive frame"), vec![1, 2, 3]);
        assert!(owned.try_recv().is_err());
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let hub = IpcHub::default();
        assert_eq!(hub.publish("emotesync.local.debounced", vec![0]), 0);
        assert_eq!(
            SyncTransport::publish(&hub, "emotesync.local.debounced", vec![0]).ok(),
            Some(0)
        );
    }
}
