//! Impact notification delivery.
//!
//! The change propagator hands every [`ImpactResult`] to a
//! [`NotificationTransport`]. Delivery is best-effort and at-most-once: a
//! transport error is logged by the caller and never fails the change event.
//!
//! [`Broadcaster`] is the in-process transport. Subscribers receive the JSON
//! payload over a bounded tokio mpsc channel; each broadcast fans out one
//! spawned send per subscriber, each with its own timeout, so a slow or
//! vanished subscriber never holds up the others.

use crate::domain::ImpactResult;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};

/// Pushes impact notifications to interested parties.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Hand off one impact notification.
    ///
    /// Returning means the payload was handed off, not that anyone received
    /// it.
    async fn broadcast(&self, impact: &ImpactResult) -> Result<()>;
}

/// Transport that drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTransport;

#[async_trait]
impl NotificationTransport for NoopTransport {
    async fn broadcast(&self, impact: &ImpactResult) -> Result<()> {
        tracing::debug!(changed_cell = %impact.changed_cell, "Discarding impact notification");
        Ok(())
    }
}

/// Handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

/// In-process fan-out of impact notifications to mpsc subscribers.
///
/// # Example
///
/// ```
/// use sheetgraph::domain::{CellAddress, ImpactResult};
/// use sheetgraph::notify::{Broadcaster, NotificationTransport};
/// use std::time::Duration;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> sheetgraph::error::Result<()> {
///     let broadcaster = Broadcaster::new(Duration::from_secs(1));
///     let (_id, mut rx) = broadcaster.subscribe(8).await;
///
///     broadcaster
///         .broadcast(&ImpactResult {
///             changed_cell: CellAddress::parse("A1"),
///             old_value: None,
///             new_value: Some("1".to_string()),
///             affected_cells: vec![],
///         })
///         .await?;
///
///     let message = rx.recv().await.unwrap();
///     assert!(message.contains("\"changedCell\":\"A1\""));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Broadcaster {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<String>>>,
    next_id: AtomicU64,
    send_timeout: Duration,
}

impl Broadcaster {
    /// Create a broadcaster whose per-subscriber sends give up after `send_timeout`.
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            send_timeout,
        }
    }

    /// Register a subscriber with a channel of `buffer` pending messages.
    pub async fn subscribe(&self, buffer: usize) -> (SubscriberId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().await.insert(id, tx);
        tracing::debug!(subscriber = id.0, "Subscriber registered");
        (id, rx)
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.subscribers.write().await.remove(&id).is_some()
    }

    /// Number of registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Drop subscribers whose receiver is gone and return the live ones.
    async fn live_subscribers(&self) -> Vec<(SubscriberId, mpsc::Sender<String>)> {
        let mut subscribers = self.subscribers.write().await;
        subscribers.retain(|id, tx| {
            let open = !tx.is_closed();
            if !open {
                tracing::debug!(subscriber = id.0, "Pruning closed subscriber");
            }
            open
        });
        subscribers
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl NotificationTransport for Broadcaster {
    async fn broadcast(&self, impact: &ImpactResult) -> Result<()> {
        let message = serde_json::to_string(impact)?;
        let subscribers = self.live_subscribers().await;
        tracing::debug!(
            changed_cell = %impact.changed_cell,
            subscribers = subscribers.len(),
            "Broadcasting impact"
        );

        for (id, tx) in subscribers {
            let message = message.clone();
            let send_timeout = self.send_timeout;
            tokio::spawn(async move {
                match tokio::time::timeout(send_timeout, tx.send(message)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => {
                        tracing::warn!(subscriber = id.0, "Subscriber went away before delivery");
                    }
                    Err(_) => {
                        tracing::warn!(
                            subscriber = id.0,
                            timeout_ms = send_timeout.as_millis(),
                            "Timed out delivering impact notification"
                        );
                    }
                }
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CellAddress;

    fn impact(cell: &str) -> ImpactResult {
        ImpactResult {
            changed_cell: CellAddress::parse(cell),
            old_value: Some("100".to_string()),
            new_value: Some("150".to_string()),
            affected_cells: vec![CellAddress::parse("A3")],
        }
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_payload() {
        let broadcaster = Broadcaster::new(Duration::from_secs(1));
        let (_, mut first) = broadcaster.subscribe(4).await;
        let (_, mut second) = broadcaster.subscribe(4).await;

        broadcaster.broadcast(&impact("A1")).await.unwrap();

        for rx in [&mut first, &mut second] {
            let payload: serde_json::Value =
                serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
            assert_eq!(payload["changedCell"], "A1");
            assert_eq!(payload["affectedCells"], serde_json::json!(["A3"]));
        }
    }

    #[tokio::test]
    async fn test_stalled_subscriber_does_not_block_others() {
        let broadcaster = Broadcaster::new(Duration::from_millis(50));
        let (_, _stalled) = broadcaster.subscribe(1).await;
        let (_, mut healthy) = broadcaster.subscribe(4).await;

        broadcaster.broadcast(&impact("A1")).await.unwrap();
        broadcaster.broadcast(&impact("A2")).await.unwrap();

        let first = healthy.recv().await.unwrap();
        let second = healthy.recv().await.unwrap();
        let mut cells = vec![first, second];
        cells.sort();
        assert!(cells[0].contains("\"changedCell\":\"A1\""));
        assert!(cells[1].contains("\"changedCell\":\"A2\""));
    }

    #[tokio::test]
    async fn test_closed_subscribers_are_pruned() {
        let broadcaster = Broadcaster::default();
        let (_, rx) = broadcaster.subscribe(1).await;
        let (_, _kept) = broadcaster.subscribe(1).await;
        drop(rx);

        broadcaster.broadcast(&impact("A1")).await.unwrap();
        assert_eq!(broadcaster.subscriber_count().await, 1);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let broadcaster = Broadcaster::default();
        let (id, _rx) = broadcaster.subscribe(1).await;
        assert!(broadcaster.unsubscribe(id).await);
        assert!(!broadcaster.unsubscribe(id).await);
        assert_eq!(broadcaster.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_noop_transport_accepts_everything() {
        assert!(NoopTransport.broadcast(&impact("A1")).await.is_ok());
    }
}
