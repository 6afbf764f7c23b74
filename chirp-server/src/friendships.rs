use axum::{
    extract::Path,
    routing::{delete, get, post},
    Json,
};
use chirp_social::PrimaryKey;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{NewFriendshipSchema, ValidatedJson},
    serialized::{Friendship, ToSerialized},
    Router,
};

#[utoipa::path(
    post,
    path = "/api/friendships",
    tag = "friendships",
    request_body = NewFriendshipSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Friendship),
        (status = 409, description = "A friendship between the users already exists")
    )
)]
async fn request_friendship(
    session: Session,
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<NewFriendshipSchema>,
) -> ServerResult<Json<Friendship>> {
    let friendship = context
        .social
        .graph
        .request_friendship(session.username(), &body.username)
        .await?;

    Ok(Json(friendship.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/friendships/pending",
    tag = "friendships",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Friendship>, description = "Requests sent to the user")
    )
)]
async fn pending(session: Session, context: ServerContext) -> ServerResult<Json<Vec<Friendship>>> {
    let requests = context
        .social
        .graph
        .pending_requests(session.username())
        .await?;

    Ok(Json(requests.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/api/friendships/{id}/accept",
    tag = "friendships",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Friendship),
        (status = 403, description = "Only the receiving side can accept")
    )
)]
async fn accept(
    session: Session,
    context: ServerContext,
    Path(id): Path<PrimaryKey>,
) -> ServerResult<Json<Friendship>> {
    let friendship = context
        .social
        .graph
        .accept_friendship(session.username(), id)
        .await?;

    Ok(Json(friendship.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/api/friendships/{id}",
    tag = "friendships",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The request was declined or the friendship ended")
    )
)]
async fn remove(
    session: Session,
    context: ServerContext,
    Path(id): Path<PrimaryKey>,
) -> ServerResult<()> {
    context
        .social
        .graph
        .remove_friendship(session.username(), id)
        .await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(request_friendship))
        .route("/pending", get(pending))
        .route("/:id/accept", post(accept))
        .route("/:id", delete(remove))
}
