use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by services after successful mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Account events
    UserRegistered(Uuid),
    AdminRegistered(Uuid),

    // Catalog events
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),

    // Cart events
    CartItemAdded { cart_id: Uuid, product_id: Uuid },
    CartItemRemoved { cart_id: Uuid, product_id: Uuid },

    // Order events
    OrderCreated(Uuid),
    OrderCompleted(Uuid),
    OrderShipped(Uuid),
    OrderCanceled(Uuid),

    // Payment events
    PaymentSucceeded(Uuid),
    PaymentFailed(Uuid),
    PaymentRefunded(Uuid),

    // Review events
    ReviewCreated(Uuid),
    ReviewDeleted(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is down.
    /// Event delivery is best-effort and never blocks the request path outcome.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event.clone()).await {
            warn!("Event dropped: {:?} ({})", event, e);
        }
    }
}

/// Consumes events off the channel and logs them.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(order_id = %order_id, "order created");
            }
            Event::OrderCompleted(order_id) => {
                info!(order_id = %order_id, "order completed");
            }
            Event::OrderCanceled(order_id) => {
                info!(order_id = %order_id, "order canceled");
            }
            Event::PaymentFailed(order_id) => {
                warn!(order_id = %order_id, "payment failed");
            }
            other => {
                info!("Received event: {:?}", other);
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        let id = Uuid::new_v4();

        sender.send(Event::OrderCreated(id)).await.unwrap();
        match rx.recv().await {
            Some(Event::OrderCreated(got)) => assert_eq!(got, id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        // Must not panic or error out
        sender.send_or_log(Event::ProductDeleted(Uuid::new_v4())).await;
    }
}
