use auxcord_core::{RoomId, UserId, OUTBOUND_BUFFER};
use auxcord_queue::NewTrack;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use log::{debug, warn};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    auth::Identity,
    context::{AppService, ServerContext},
    errors::ServerResult,
    Router,
};

/// A frame sent by a connected client over the duplex channel
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
enum ClientFrame {
    Vote {
        item_id: Uuid,
        value: i32,
    },
    AddSong {
        track_id: String,
        track_name: String,
        artist: String,
    },
    SongStart {
        item_id: Uuid,
    },
}

#[utoipa::path(
    get,
    path = "/api/v1/ws/{room_id}",
    tag = "ws",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 101, description = "Switched to the duplex room channel")
    )
)]
async fn room_socket(
    Identity(user_id): Identity,
    State(context): State<ServerContext>,
    Path(room_id): Path<Uuid>,
    ws: WebSocketUpgrade,
) -> ServerResult<Response> {
    // The room is checked before the upgrade so rejected clients get a
    // plain HTTP error instead of a handshake that immediately closes
    context.service.join_room(room_id).await?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, context, room_id, user_id)))
}

async fn handle_socket(
    socket: WebSocket,
    context: ServerContext,
    room_id: RoomId,
    user_id: UserId,
) {
    let (mut sink, mut stream) = socket.split();
    let (sender, mut receiver) = mpsc::channel(OUTBOUND_BUFFER);

    context.registry.join(room_id, user_id, sender.clone());

    // Everything broadcast to the room funnels through this connection's
    // queue and out the sink
    let mut outbound = tokio::spawn(async move {
        while let Some(frame) = receiver.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    let service = context.service.clone();
    let mut inbound = tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    debug!("Receive failed for user {}: {}", user_id, e);
                    break;
                }
            };

            match message {
                Message::Text(text) => handle_frame(&service, room_id, user_id, &text).await,
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Either side finishing tears the whole connection down
    tokio::select! {
        _ = &mut inbound => outbound.abort(),
        _ = &mut outbound => inbound.abort(),
    };

    context.registry.leave(room_id, user_id, &sender);
}

/// Decode and apply a single inbound frame.
///
/// Malformed frames and failed operations are logged and dropped. The
/// connection itself stays up, so one bad frame never costs a client
/// its live updates.
async fn handle_frame(service: &AppService, room_id: RoomId, user_id: UserId, text: &str) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!("Discarding malformed frame from user {}: {}", user_id, e);
            return;
        }
    };

    let result = match frame {
        ClientFrame::Vote { item_id, value } => service
            .cast_vote(room_id, item_id, user_id, value)
            .await
            .map(|_| ()),
        ClientFrame::AddSong {
            track_id,
            track_name,
            artist,
        } => service
            .add_to_queue(
                room_id,
                user_id,
                NewTrack {
                    track_id,
                    track_name,
                    artist,
                },
            )
            .await
            .map(|_| ()),
        ClientFrame::SongStart { item_id } => {
            service.announce_start(room_id, user_id, item_id).await
        }
    };

    if let Err(e) = result {
        warn!("Frame from user {} in room {} failed: {}", user_id, room_id, e);
    }
}

pub fn router() -> Router {
    Router::new().route("/:room_id", get(room_socket))
}
