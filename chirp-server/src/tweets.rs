use axum::{
    extract::{Path, Query},
    routing::{get, post},
    Json,
};
use chirp_social::{PrimaryKey, TweetDraft};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{NewTweetSchema, PageQuery, ValidatedJson},
    serialized::{ToSerialized, Tweet},
    Router,
};

#[utoipa::path(
    post,
    path = "/api/tweets",
    tag = "tweets",
    request_body = NewTweetSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Tweet),
        (status = 400, description = "The tweet is empty or too long"),
        (status = 404, description = "The replied to tweet doesn't exist")
    )
)]
async fn create(
    session: Session,
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<NewTweetSchema>,
) -> ServerResult<Json<Tweet>> {
    let tweet = context
        .social
        .tweets
        .create(
            session.username(),
            TweetDraft {
                text: body.text,
                photo_url: body.photo_url,
                replied_to_id: body.replied_to_id,
            },
        )
        .await?;

    Ok(Json(tweet.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/timeline",
    tag = "tweets",
    params(PageQuery),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Tweet>)
    )
)]
async fn timeline(
    session: Session,
    context: ServerContext,
    Query(page): Query<PageQuery>,
) -> ServerResult<Json<Vec<Tweet>>> {
    let tweets = context
        .social
        .tweets
        .timeline(session.username(), page.before, page.limit)
        .await?;

    Ok(Json(tweets.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/tweets/{id}",
    tag = "tweets",
    responses(
        (status = 200, body = Tweet),
        (status = 404, description = "Tweet doesn't exist")
    )
)]
async fn tweet(
    session: Option<Session>,
    context: ServerContext,
    Path(id): Path<PrimaryKey>,
) -> ServerResult<Json<Tweet>> {
    let viewer = session.as_ref().map(|s| s.username());
    let tweet = context.social.tweets.get(id, viewer).await?;

    Ok(Json(tweet.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/api/tweets/{id}",
    tag = "tweets",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The tweet, its likes, and its retweets were deleted"),
        (status = 403, description = "Only the author can delete a tweet")
    )
)]
async fn delete_tweet(
    session: Session,
    context: ServerContext,
    Path(id): Path<PrimaryKey>,
) -> ServerResult<()> {
    context.social.tweets.delete(session.username(), id).await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/tweets/{id}/replies",
    tag = "tweets",
    responses(
        (status = 200, body = Vec<Tweet>)
    )
)]
async fn replies(
    session: Option<Session>,
    context: ServerContext,
    Path(id): Path<PrimaryKey>,
) -> ServerResult<Json<Vec<Tweet>>> {
    let viewer = session.as_ref().map(|s| s.username());
    let replies = context.social.tweets.replies(id, viewer).await?;

    Ok(Json(replies.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/api/tweets/{id}/like",
    tag = "tweets",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Tweet),
        (status = 409, description = "The tweet is already liked")
    )
)]
async fn like(
    session: Session,
    context: ServerContext,
    Path(id): Path<PrimaryKey>,
) -> ServerResult<Json<Tweet>> {
    let tweet = context.social.tweets.like(session.username(), id).await?;

    Ok(Json(tweet.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/api/tweets/{id}/like",
    tag = "tweets",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Tweet)
    )
)]
async fn unlike(
    session: Session,
    context: ServerContext,
    Path(id): Path<PrimaryKey>,
) -> ServerResult<Json<Tweet>> {
    let tweet = context.social.tweets.unlike(session.username(), id).await?;

    Ok(Json(tweet.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/api/tweets/{id}/retweet",
    tag = "tweets",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Tweet, description = "The new retweet"),
        (status = 400, description = "Retweets can't be retweeted"),
        (status = 409, description = "The tweet is already retweeted")
    )
)]
async fn retweet(
    session: Session,
    context: ServerContext,
    Path(id): Path<PrimaryKey>,
) -> ServerResult<Json<Tweet>> {
    let retweet = context.social.tweets.retweet(session.username(), id).await?;

    Ok(Json(retweet.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/api/tweets/{id}/retweet",
    tag = "tweets",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The retweet was removed"),
        (status = 404, description = "The user hasn't retweeted the tweet")
    )
)]
async fn unretweet(
    session: Session,
    context: ServerContext,
    Path(id): Path<PrimaryKey>,
) -> ServerResult<()> {
    context
        .social
        .tweets
        .unretweet(session.username(), id)
        .await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(create))
        .route("/:id", get(tweet).delete(delete_tweet))
        .route("/:id/replies", get(replies))
        .route("/:id/like", post(like).delete(unlike))
        .route("/:id/retweet", post(retweet).delete(unretweet))
}

pub fn timeline_router() -> Router {
    Router::new().route("/", get(timeline))
}
