//! Live-reload notifications.
//!
//! Each browser tab opens a WebSocket here; every published generation is sent
//! as `reload:<id>` and the injected client reloads the page.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::http::server::AppState;

pub async fn handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let reloads = state.site.subscribe_reloads();
    ws.on_upgrade(move |socket| client(socket, reloads))
}

async fn client(mut socket: WebSocket, mut reloads: broadcast::Receiver<u64>) {
    tracing::debug!("Live-reload client connected");
    loop {
        tokio::select! {
            update = reloads.recv() => match update {
                Ok(generation) => {
                    let message = Message::Text(format!("reload:{generation}").into());
                    if socket.send(message).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::debug!("Live-reload client disconnected");
}
