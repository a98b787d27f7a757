use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, trace, warn};

use livecast_types::events::ViewerEvent;

use crate::dispatcher::{Dispatcher, Subscription};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the viewer is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Serve one viewer socket until it closes.
///
/// The viewer is registered before `Ready` is sent, so every push made
/// after the viewer sees `Ready` reaches it.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, peer: Option<SocketAddr>) {
    let Subscription { viewer_id, mut rx } = dispatcher.subscribe(peer).await;
    let (mut sender, mut receiver) = socket.split();
    let who = peer.map_or_else(|| "unknown".to_string(), |p| p.to_string());

    info!("Viewer {} connected from {}", viewer_id, who);

    let ready = ViewerEvent::Ready { viewer_id };
    let sent = match serde_json::to_string(&ready) {
        Ok(text) => sender.send(Message::Text(text.into())).await.is_ok(),
        Err(e) => {
            warn!("Failed to serialize Ready: {}", e);
            false
        }
    };
    if !sent {
        dispatcher.unsubscribe(viewer_id).await;
        return;
    }

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    // Forward pushes -> viewer, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = rx.recv() => {
                    let json = match result {
                        Ok(json) => json,
                        Err(RecvError::Lagged(n)) => {
                            warn!("Viewer {} lagged by {} pushes", viewer_id, n);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    if sender.send(Message::Text(json.to_string().into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Viewer {} missed {} pongs, dropping", viewer_id, missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Viewers only listen; anything they send besides pong/close is ignored
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                Message::Text(text) => {
                    trace!("Ignoring {} bytes of text from viewer {}", text.len(), viewer_id);
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    match dispatcher.unsubscribe(viewer_id).await {
        Some(viewer) => info!(
            "Viewer {} ({}) disconnected after {}s",
            viewer_id,
            who,
            viewer.connected_for().num_seconds()
        ),
        None => info!("Viewer {} ({}) disconnected", viewer_id, who),
    }
}
