use axum::{routing::post, Json};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{KornMentionSchema, KornSimpleSchema, ModerationSchema, ValidatedJson},
    serialized::{KornAnswer, KornStatus, Moderation, ToSerialized, TweetBody},
    Router,
};

#[utoipa::path(
    post,
    path = "/api/ai/korn-mention",
    tag = "ai",
    request_body = KornMentionSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = TweetBody, description = "The bot's reply"),
        (status = 400, description = "The tweet doesn't mention the bot"),
        (status = 409, description = "The tweet is being or has been answered"),
        (status = 429, description = "The bot is out of replies for this minute"),
        (status = 503, description = "The bot is disabled")
    )
)]
async fn korn_mention(
    _session: Session,
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<KornMentionSchema>,
) -> ServerResult<Json<TweetBody>> {
    let reply = context.social.korn.process(body.tweet_id).await?;

    Ok(Json(reply.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/ai/korn-mention",
    tag = "ai",
    responses(
        (status = 200, body = KornStatus)
    )
)]
async fn korn_status(context: ServerContext) -> Json<KornStatus> {
    Json(context.social.korn.status().to_serialized())
}

#[utoipa::path(
    post,
    path = "/api/korn-simple",
    tag = "ai",
    request_body = KornSimpleSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = KornAnswer, description = "An answer that isn't posted anywhere"),
        (status = 429, description = "The bot is out of replies for this minute")
    )
)]
async fn korn_simple(
    _session: Session,
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<KornSimpleSchema>,
) -> ServerResult<Json<KornAnswer>> {
    let answer = context.social.korn.ask(&body.message).await?;

    Ok(Json(KornAnswer { answer }))
}

#[utoipa::path(
    get,
    path = "/api/korn-simple",
    tag = "ai",
    responses(
        (status = 200, body = KornStatus)
    )
)]
async fn korn_simple_health(context: ServerContext) -> Json<KornStatus> {
    Json(context.social.korn.status().to_serialized())
}

#[utoipa::path(
    post,
    path = "/api/moderate",
    tag = "ai",
    request_body = ModerationSchema,
    responses(
        (status = 200, body = Moderation),
        (status = 400, description = "The text is empty")
    )
)]
async fn moderate(
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<ModerationSchema>,
) -> ServerResult<Json<Moderation>> {
    let result = context.social.moderation.check(&body.text).await?;

    Ok(Json(result.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/ai/korn-mention", post(korn_mention).get(korn_status))
        .route("/korn-simple", post(korn_simple).get(korn_simple_health))
        .route("/moderate", post(moderate))
}
