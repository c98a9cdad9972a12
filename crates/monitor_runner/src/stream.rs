use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use core_types::new_id;
use replay_engine::{ReplayEngine, ReplayEvent};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;

/// Pushes a frame every stream interval and right after a mode switch until
/// the client goes away. Ticks where either series is unavailable send
/// nothing.
pub(crate) async fn stream_training(mut socket: WebSocket, engine: Arc<ReplayEngine>, job_id: String) {
    let mut events = engine.subscribe();
    let mut ticker = tokio::time::interval(engine.config().stream_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let session = new_id();
    tracing::debug!(%job_id, %session, "training stream opened");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            event = events.recv() => match event {
                Ok(ReplayEvent::ModeChanged { .. }) => ticker.reset(),
                Ok(ReplayEvent::Completed { .. }) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(%job_id, skipped, "training stream lagged behind replay events");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    tracing::debug!(%job_id, %err, "training stream receive failed");
                    break;
                }
            },
        }

        let frame = match engine.stream_frame(&job_id) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(%job_id, %err, "training frame skipped");
                continue;
            }
        };
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(%job_id, %err, "training frame encode failed");
                continue;
            }
        };
        if socket.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
    tracing::debug!(%job_id, %session, "training stream closed");
}
