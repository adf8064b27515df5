//! WebSocket query endpoint: the client sends one query frame, then receives
//! every progress event in order, ending with the terminal workflow event.
//! Disconnecting mid-run cancels the pipeline at the next stage boundary.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use counterpoint_common::Query;
use counterpoint_core::ProgressChannel;

use crate::AppState;

pub(crate) async fn query_stream(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let Some(query) = read_query(&mut sender, &mut receiver).await else {
        return;
    };

    if !state.config.api_key_configured() {
        let _ = send_error(&mut sender, "OPENROUTER_API_KEY is not configured").await;
        return;
    }
    if query.belief.trim().is_empty() {
        let _ = send_error(&mut sender, "belief must not be empty").await;
        return;
    }

    let request_id = Uuid::new_v4();
    info!(%request_id, belief = %query.belief, "streaming query received");

    let (progress, mut rx) = ProgressChannel::pair();
    let run = tokio::spawn({
        let state = Arc::clone(&state);
        async move { state.pipeline.run(query, progress).await }
    });

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => {
                    let frame = match serde_json::to_string(&event) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(error = %e, "unserializable progress event");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(frame.into())).await.is_err() {
                        debug!("client went away mid-run");
                        break;
                    }
                }
                // Pipeline finished and dropped its sender.
                None => break,
            },
            frame = receiver.next() => match frame {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    debug!("client closed the stream, cancelling");
                    break;
                }
                // Ignore pings and stray client frames mid-run.
                _ => {}
            },
        }
    }

    // Dropping the receiver is the cancellation signal the pipeline probes
    // for between stages.
    drop(rx);
    let _ = run.await;
    let _ = sender.close().await;
}

/// Wait for the first text frame and parse it as the query.
async fn read_query(
    sender: &mut SplitSink<WebSocket, Message>,
    receiver: &mut SplitStream<WebSocket>,
) -> Option<Query> {
    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<Query>(&text) {
                Ok(query) => return Some(query),
                Err(e) => {
                    let _ = send_error(sender, &format!("invalid query: {e}")).await;
                    return None;
                }
            },
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(_)) | Some(Err(_)) | None => return None,
        }
    }
}

async fn send_error(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &str,
) -> Result<(), axum::Error> {
    let frame = json!({
        "stage": "workflow",
        "status": "error",
        "message": message,
    });
    sender.send(Message::Text(frame.to_string().into())).await
}
