use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json,
};
use auxcord_queue::NewTrack;
use uuid::Uuid;

use crate::{
    auth::Identity,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{NewQueueItemSchema, NewRoomSchema, ValidatedJson, VoteSchema},
    serialized::{QueueItem, Room, ToSerialized},
    Router,
};

#[utoipa::path(
    post,
    path = "/api/v1/rooms",
    tag = "rooms",
    request_body = NewRoomSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room)
    )
)]
async fn create_room(
    Identity(user_id): Identity,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewRoomSchema>,
) -> ServerResult<Json<Room>> {
    let room = context.service.create_room(user_id, body.name).await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/v1/rooms/code/{code}",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room)
    )
)]
async fn room_by_code(
    _identity: Identity,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Json<Room>> {
    let room = context.service.room_by_code(&code).await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{id}",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room)
    )
)]
async fn room(
    _identity: Identity,
    State(context): State<ServerContext>,
    Path(room_id): Path<Uuid>,
) -> ServerResult<Json<Room>> {
    let room = context.service.room(room_id).await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/rooms/{id}",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room)
    )
)]
async fn deactivate_room(
    Identity(user_id): Identity,
    State(context): State<ServerContext>,
    Path(room_id): Path<Uuid>,
) -> ServerResult<Json<Room>> {
    let room = context.service.deactivate_room(room_id, user_id).await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/api/v1/rooms/{id}/queue",
    tag = "rooms",
    request_body = NewQueueItemSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = QueueItem)
    )
)]
async fn add_to_queue(
    Identity(user_id): Identity,
    State(context): State<ServerContext>,
    Path(room_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<NewQueueItemSchema>,
) -> ServerResult<Json<QueueItem>> {
    let item = context
        .service
        .add_to_queue(
            room_id,
            user_id,
            NewTrack {
                track_id: body.track_id,
                track_name: body.track_name,
                artist: body.artist,
            },
        )
        .await?;

    Ok(Json(item.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{id}/queue",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<QueueItem>)
    )
)]
async fn queue(
    _identity: Identity,
    State(context): State<ServerContext>,
    Path(room_id): Path<Uuid>,
) -> ServerResult<Json<Vec<QueueItem>>> {
    let items = context.service.queue(room_id).await?;

    Ok(Json(items.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/api/v1/rooms/{id}/vote",
    tag = "rooms",
    request_body = VoteSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = QueueItem)
    )
)]
async fn vote(
    Identity(user_id): Identity,
    State(context): State<ServerContext>,
    Path(room_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<VoteSchema>,
) -> ServerResult<Json<QueueItem>> {
    let item = context
        .service
        .cast_vote(room_id, body.item_id, user_id, body.value)
        .await?;

    Ok(Json(item.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/v1/rooms/{id}/next",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = QueueItem),
        (status = 404, description = "No songs in queue")
    )
)]
async fn next_song(
    _identity: Identity,
    State(context): State<ServerContext>,
    Path(room_id): Path<Uuid>,
) -> ServerResult<Json<QueueItem>> {
    let item = context
        .service
        .next_song(room_id)
        .await?
        .ok_or(ServerError::EmptyQueue)?;

    Ok(Json(item.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_room))
        .route("/code/:code", get(room_by_code))
        .route("/:id", get(room))
        .route("/:id", delete(deactivate_room))
        .route("/:id/queue", get(queue))
        .route("/:id/queue", post(add_to_queue))
        .route("/:id/vote", post(vote))
        .route("/:id/next", get(next_song))
}
