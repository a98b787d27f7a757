use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, warn};
use uuid::Uuid;

use livecast_types::events::ViewerEvent;
use livecast_types::models::NormalizedComment;

/// Pushes not yet read by a viewer. A viewer that falls further behind
/// skips the oldest ones; only the latest display matters.
const CHANNEL_CAPACITY: usize = 16;

/// A connected viewer, kept for bookkeeping and logs.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub id: Uuid,
    pub peer: Option<SocketAddr>,
    pub connected_at: DateTime<Utc>,
}

impl Viewer {
    /// Time since the viewer subscribed.
    pub fn connected_for(&self) -> TimeDelta {
        Utc::now() - self.connected_at
    }
}

/// Handle returned by [`Dispatcher::subscribe`].
pub struct Subscription {
    pub viewer_id: Uuid,
    /// Serialized events, in push order.
    pub rx: broadcast::Receiver<Arc<str>>,
}

/// Fans comment pushes out to every connected viewer.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Each push is serialized once and shared by all receivers
    broadcast_tx: broadcast::Sender<Arc<str>>,

    /// viewer_id -> viewer
    viewers: RwLock<HashMap<Uuid, Viewer>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                viewers: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a viewer. It receives only pushes made after this call.
    pub async fn subscribe(&self, peer: Option<SocketAddr>) -> Subscription {
        let viewer = Viewer {
            id: Uuid::new_v4(),
            peer,
            connected_at: Utc::now(),
        };
        let viewer_id = viewer.id;
        let rx = self.inner.broadcast_tx.subscribe();
        self.inner.viewers.write().await.insert(viewer_id, viewer);
        Subscription { viewer_id, rx }
    }

    /// Forget a viewer. Its receiver detaches from the channel when dropped.
    pub async fn unsubscribe(&self, viewer_id: Uuid) -> Option<Viewer> {
        self.inner.viewers.write().await.remove(&viewer_id)
    }

    /// Send `comments` to every live receiver. An empty slice is the
    /// "clear display" signal.
    ///
    /// Returns how many receivers the push reached. Never fails: with no
    /// viewers the push is dropped, and a viewer that has gone away only
    /// loses its own copy.
    pub fn push(&self, comments: &[NormalizedComment]) -> usize {
        let event = ViewerEvent::Comments {
            comments: comments.to_vec(),
        };
        let json: Arc<str> = match serde_json::to_string(&event) {
            Ok(json) => json.into(),
            Err(e) => {
                warn!("Failed to serialize push: {}", e);
                return 0;
            }
        };

        match self.inner.broadcast_tx.send(json) {
            Ok(reached) => {
                debug!("Pushed {} comments to {} viewers", comments.len(), reached);
                reached
            }
            Err(_) => {
                debug!("No viewers connected, dropping push");
                0
            }
        }
    }

    pub async fn viewer_count(&self) -> usize {
        self.inner.viewers.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    fn comment(id: &str) -> NormalizedComment {
        NormalizedComment {
            author_name: "Ana".into(),
            message: "hello".into(),
            created_at: Utc::now(),
            id: id.into(),
        }
    }

    fn decode(json: &str) -> ViewerEvent {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_push_without_viewers() {
        let dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.push(&[comment("1")]), 0);
        assert_eq!(dispatcher.viewer_count().await, 0);
    }

    #[tokio::test]
    async fn test_clear_reaches_every_viewer() {
        let dispatcher = Dispatcher::new();
        let mut subs = Vec::new();
        for _ in 0..3 {
            subs.push(dispatcher.subscribe(None).await);
        }
        assert_eq!(dispatcher.viewer_count().await, 3);

        assert_eq!(dispatcher.push(&[]), 3);

        for sub in &mut subs {
            let event = decode(&sub.rx.recv().await.unwrap());
            assert!(event.is_clear());
        }
    }

    #[tokio::test]
    async fn test_gone_viewer_does_not_affect_others() {
        let dispatcher = Dispatcher::new();
        let mut a = dispatcher.subscribe(None).await;
        let mut b = dispatcher.subscribe(None).await;
        let gone = dispatcher.subscribe(None).await;

        let gone_id = gone.viewer_id;
        drop(gone);
        assert!(dispatcher.unsubscribe(gone_id).await.is_some());

        assert_eq!(dispatcher.push(&[comment("1"), comment("2")]), 2);

        for sub in [&mut a, &mut b] {
            match decode(&sub.rx.recv().await.unwrap()) {
                ViewerEvent::Comments { comments } => {
                    let ids: Vec<_> = comments.iter().map(|c| c.id.as_str()).collect();
                    assert_eq!(ids, vec!["1", "2"]);
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(dispatcher.viewer_count().await, 2);
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscriber() {
        let dispatcher = Dispatcher::new();
        let _early = dispatcher.subscribe(None).await;
        dispatcher.push(&[comment("before")]);

        let mut late = dispatcher.subscribe(None).await;
        assert!(matches!(late.rx.try_recv(), Err(TryRecvError::Empty)));

        dispatcher.push(&[comment("after")]);
        match decode(&late.rx.recv().await.unwrap()) {
            ViewerEvent::Comments { comments } => assert_eq!(comments[0].id, "after"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_viewer_lags_instead_of_blocking() {
        let dispatcher = Dispatcher::new();
        let mut slow = dispatcher.subscribe(None).await;

        for i in 0..CHANNEL_CAPACITY + 4 {
            assert_eq!(dispatcher.push(&[comment(&i.to_string())]), 1);
        }

        assert!(matches!(slow.rx.try_recv(), Err(TryRecvError::Lagged(4))));
        match decode(&slow.rx.recv().await.unwrap()) {
            ViewerEvent::Comments { comments } => assert_eq!(comments[0].id, "4"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_viewer_bookkeeping() {
        let dispatcher = Dispatcher::new();
        let peer: SocketAddr = "10.0.0.7:5000".parse().unwrap();
        let sub = dispatcher.subscribe(Some(peer)).await;

        assert_eq!(dispatcher.viewer_count().await, 1);

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let viewer = dispatcher.unsubscribe(sub.viewer_id).await.unwrap();
        assert_eq!(viewer.id, sub.viewer_id);
        assert_eq!(viewer.peer, Some(peer));
        assert!(viewer.connected_at <= Utc::now());
        assert!(viewer.connected_for() >= TimeDelta::milliseconds(20));

        assert!(dispatcher.unsubscribe(sub.viewer_id).await.is_none());
        assert_eq!(dispatcher.viewer_count().await, 0);
    }
}
