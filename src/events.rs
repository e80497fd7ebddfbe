use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the services after a state change commits.
/// Consumers are fire-and-forget; a full channel never blocks a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(Uuid),
    OrderCancelled(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // User events
    UserRegistered(String),
    UserBecameSeller(String),
    PointsAdjusted {
        user_id: String,
        delta: i32,
        balance: i32,
    },

    // Product events
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),

    // Subscription events
    SubscriptionActivated {
        subscription_id: String,
        user_id: String,
    },
    SubscriptionCanceled {
        subscription_id: String,
    },

    // Webhook events
    WebhookReceived {
        source: String,
        event_type: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event; delivery failure is logged, never surfaced to the caller
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!("event channel closed, dropping event: {}", e);
        }
    }
}

/// Creates an event channel with the given buffer size
pub fn event_channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, logging each event. Runs until every sender
/// is dropped, which happens during shutdown.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(order_id = %order_id, "order created");
            }
            Event::OrderCancelled(order_id) => {
                info!(order_id = %order_id, "order cancelled");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(
                    order_id = %order_id,
                    old_status = %old_status,
                    new_status = %new_status,
                    "order status changed"
                );
            }
            Event::PointsAdjusted {
                user_id,
                delta,
                balance,
            } => {
                info!(user_id = %user_id, delta, balance, "reward points adjusted");
            }
            Event::WebhookReceived { source, event_type } => {
                info!(source = %source, event_type = %event_type, "webhook received");
            }
            other => {
                info!(event = ?other, "event");
            }
        }
    }

    info!("event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_events_in_order() {
        let (sender, mut rx) = event_channel(8);
        let order_id = Uuid::new_v4();

        sender.send(Event::OrderCreated(order_id)).await;
        sender.send(Event::OrderCancelled(order_id)).await;

        match rx.recv().await.unwrap() {
            Event::OrderCreated(id) => assert_eq!(id, order_id),
            other => panic!("unexpected event: {other:?}"),
        }
        match rx.recv().await.unwrap() {
            Event::OrderCancelled(id) => assert_eq!(id, order_id),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_after_receiver_drop_does_not_panic() {
        let (sender, rx) = event_channel(1);
        drop(rx);
        sender.send(Event::ProductDeleted(Uuid::new_v4())).await;
    }
}
