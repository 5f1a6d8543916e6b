use std::sync::Arc;

use aiyou_events::{EventBus, GenerationEvent};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

/// Query parameters of `GET /api/v1/ws`.
#[derive(Debug, Default, Deserialize)]
pub struct StreamFilter {
    /// Only forward events of this project.
    #[serde(default)]
    pub project_id: Option<String>,
}

impl StreamFilter {
    fn matches(&self, event: &GenerationEvent) -> bool {
        self.project_id
            .as_deref()
            .map_or(true, |p| p == event.project_id)
    }
}

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade every [`GenerationEvent`] published on the bus is sent
/// to the client as a JSON text frame.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(filter): Query<StreamFilter>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let bus = state.event_bus.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, bus, filter))
}

/// Manage a single WebSocket connection after upgrade.
///
/// A spawned sender task forwards bus events; the current task drains
/// inbound frames until the client closes.
async fn handle_socket(socket: WebSocket, bus: Arc<EventBus>, filter: StreamFilter) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, project_id = ?filter.project_id, "WebSocket connected");

    let mut rx = bus.subscribe();
    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(conn_id = %sender_conn_id, skipped, "WebSocket client lagging, events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if !filter.matches(&event) {
                continue;
            }
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize generation event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use aiyou_events::GenerationEventKind;

    #[test]
    fn filter_by_project() {
        let event = GenerationEvent::new(1, "p1", GenerationEventKind::Cancelled);
        assert!(StreamFilter::default().matches(&event));
        let other = StreamFilter {
            project_id: Some("p2".into()),
        };
        assert!(!other.matches(&event));
        let same = StreamFilter {
            project_id: Some("p1".into()),
        };
        assert!(same.matches(&event));
    }
}
