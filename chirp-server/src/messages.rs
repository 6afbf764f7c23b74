use axum::{
    extract::Path,
    routing::get,
    Json,
};
use chirp_social::MessageDraft;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{NewMessageSchema, ValidatedJson},
    serialized::{Conversation, Message, ToSerialized},
    Router,
};

#[utoipa::path(
    post,
    path = "/api/messages",
    tag = "messages",
    request_body = NewMessageSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Message),
        (status = 400, description = "The message has neither text nor a photo")
    )
)]
async fn send(
    session: Session,
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<NewMessageSchema>,
) -> ServerResult<Json<Message>> {
    let message = context
        .social
        .messages
        .send(
            session.username(),
            MessageDraft {
                recipient: body.recipient,
                text: body.text,
                photo_url: body.photo_url,
            },
        )
        .await?;

    Ok(Json(message.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/messages",
    tag = "messages",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Conversation>, description = "The latest message of every conversation")
    )
)]
async fn inbox(session: Session, context: ServerContext) -> ServerResult<Json<Vec<Conversation>>> {
    let conversations = context.social.messages.inbox(session.username()).await?;

    Ok(Json(conversations.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/messages/{username}",
    tag = "messages",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Message>, description = "Messages exchanged with the user, oldest first")
    )
)]
async fn conversation(
    session: Session,
    context: ServerContext,
    Path(username): Path<String>,
) -> ServerResult<Json<Vec<Message>>> {
    let messages = context
        .social
        .messages
        .conversation(session.username(), &username)
        .await?;

    Ok(Json(messages.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(inbox).post(send))
        .route("/:username", get(conversation))
}
