use axum::{
    extract::{Path, Query},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json,
};
use chirp_social::PrimaryKey;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{LiveKitQuery, VideoCallActionSchema},
    serialized::{Call, CallSession, IncomingCall, RoomAccess, ToSerialized},
    Router,
};

#[utoipa::path(
    post,
    path = "/api/video-call",
    tag = "calls",
    request_body = VideoCallActionSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = CallSession, description = "Returned by initiate and accept"),
        (status = 200, body = Call, description = "Returned by decline and end"),
        (status = 403, description = "The user isn't part of the call"),
        (status = 409, description = "The call can't make this transition")
    )
)]
async fn video_call(
    session: Session,
    context: ServerContext,
    Json(action): Json<VideoCallActionSchema>,
) -> ServerResult<Response> {
    let calls = &context.social.calls;
    let username = session.username();

    let response = match action {
        VideoCallActionSchema::Initiate { callees } => {
            let session: CallSession = calls.initiate(username, &callees).await?.to_serialized();
            Json(session).into_response()
        }
        VideoCallActionSchema::Accept { call_id } => {
            let session: CallSession = calls.accept(username, call_id).await?.to_serialized();
            Json(session).into_response()
        }
        VideoCallActionSchema::Decline { call_id } => {
            let call: Call = calls.decline(username, call_id).await?.to_serialized();
            Json(call).into_response()
        }
        VideoCallActionSchema::End { call_id } => {
            let call: Call = calls.end(username, call_id).await?.to_serialized();
            Json(call).into_response()
        }
    };

    Ok(response)
}

#[utoipa::path(
    get,
    path = "/api/livekit",
    tag = "calls",
    params(LiveKitQuery),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = RoomAccess),
        (status = 403, description = "The username isn't the user of the session"),
        (status = 503, description = "LiveKit is not configured")
    )
)]
async fn livekit(
    session: Session,
    context: ServerContext,
    Query(query): Query<LiveKitQuery>,
) -> ServerResult<Json<RoomAccess>> {
    if query.username.as_deref().is_some_and(|u| u != session.username()) {
        return Err(ServerError::Forbidden(
            "Tokens can only be issued for yourself".to_string(),
        ));
    }

    if query.room.trim().is_empty() {
        return Err(ServerError::bad_request("A room is required"));
    }

    let user = session.user();
    let access = context
        .social
        .calls
        .room_access(&query.room, &user.username, Some(user.name))?;

    Ok(Json(access.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/calls/incoming",
    tag = "calls",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<IncomingCall>, description = "Calls ringing for the user")
    )
)]
async fn incoming(session: Session, context: ServerContext) -> ServerResult<Json<Vec<IncomingCall>>> {
    let calls = context.social.calls.incoming(session.username()).await?;

    Ok(Json(calls.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/calls/{id}",
    tag = "calls",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Call),
        (status = 403, description = "The user isn't part of the call")
    )
)]
async fn call(
    session: Session,
    context: ServerContext,
    Path(id): Path<PrimaryKey>,
) -> ServerResult<Json<Call>> {
    let call = context.social.calls.get(session.username(), id).await?;

    Ok(Json(call.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/video-call", post(video_call))
        .route("/livekit", get(livekit))
        .route("/calls/incoming", get(incoming))
        .route("/calls/:id", get(call))
}
