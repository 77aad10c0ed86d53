//! Fan-out channel model (C8): a `tokio::sync::broadcast` channel shared by
//! every WebSocket connection and every tick-pipeline event emitter.

use tokio::sync::broadcast;

use super::event::BusMessage;

const CHANNEL_CAPACITY: usize = 4096;

/// One process-wide broadcast channel. Every connection subscribes and
/// filters locally by channel name / private target agent; this keeps the
/// bus itself free of per-connection bookkeeping (spec.md §4.8: "no
/// ordering guarantee" across connections).
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusMessage>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.sender.subscribe()
    }

    /// Best-effort publish: with no subscribers this is a no-op, matching
    /// `broadcast::Sender::send`'s semantics.
    pub fn publish(&self, message: BusMessage) {
        let _ = self.sender.send(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::event::EventType;
    use serde_json::json;

    #[tokio::test]
    async fn subscribers_receive_published_messages() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(BusMessage::public("trades", EventType::Trade, json!({"price": "10.00"})));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.channel, "trades");
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(BusMessage::public("news", EventType::News, json!({})));
    }
}
