use ledgerlink_wire::Message;
use tokio::sync::broadcast;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Local event bus the transport republishes remote messages on.
///
/// UI and business-logic consumers subscribe; a publish with no active
/// subscribers is not an error, the message is simply unobserved.
#[derive(Clone)]
pub struct MessageBus {
    sender: broadcast::Sender<Message>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a message to all current subscribers. Returns the number of
    /// receivers it reached.
    pub fn publish(&self, message: Message) -> usize {
        self.sender.send(message).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use ledgerlink_wire::{ChannelEvent, MessageChannel};

    use super::*;

    fn message() -> Message {
        Message::new(MessageChannel::System, ChannelEvent::FileLoadSuccess, "uuid-a")
    }

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let bus = MessageBus::new();
        let mut rx = bus.subscribe();

        assert_eq!(bus.publish(message()), 1);
        assert_eq!(rx.recv().await.expect("recv"), message());
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = MessageBus::new();
        assert_eq!(bus.publish(message()), 0);
    }
}
