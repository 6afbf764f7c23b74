use axum::{
    extract::{Path, Query},
    routing::{get, post},
    Json,
};
use chirp_social::UpdatedUser;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{PageQuery, SearchQuery, UpdateProfileSchema, ValidatedJson},
    serialized::{Profile, ToSerialized, Tweet, User},
    Router,
};

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    params(SearchQuery),
    responses(
        (status = 200, body = Vec<User>)
    )
)]
async fn search_users(
    context: ServerContext,
    Query(query): Query<SearchQuery>,
) -> ServerResult<Json<Vec<User>>> {
    let users = context.social.profiles.search(&query.q).await?;

    Ok(Json(users.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "users",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Profile)
    )
)]
async fn me(session: Session, context: ServerContext) -> ServerResult<Json<Profile>> {
    let username = session.username();
    let profile = context
        .social
        .profiles
        .get(username, Some(username))
        .await?;

    Ok(Json(profile.to_serialized()))
}

#[utoipa::path(
    patch,
    path = "/api/users/me",
    tag = "users",
    request_body = UpdateProfileSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
async fn update_me(
    session: Session,
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<UpdateProfileSchema>,
) -> ServerResult<Json<User>> {
    let user = context
        .social
        .profiles
        .update(UpdatedUser {
            username: session.username().to_string(),
            name: body.name,
            description: body.description,
            location: body.location,
            website: body.website,
            photo_url: body.photo_url,
            header_url: body.header_url,
        })
        .await?;

    Ok(Json(user.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/users/{username}",
    tag = "users",
    responses(
        (status = 200, body = Profile),
        (status = 404, description = "User doesn't exist")
    )
)]
async fn profile(
    session: Option<Session>,
    context: ServerContext,
    Path(username): Path<String>,
) -> ServerResult<Json<Profile>> {
    let viewer = session.as_ref().map(|s| s.username());
    let profile = context.social.profiles.get(&username, viewer).await?;

    Ok(Json(profile.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/users/{username}/tweets",
    tag = "users",
    params(PageQuery),
    responses(
        (status = 200, body = Vec<Tweet>)
    )
)]
async fn tweets(
    session: Option<Session>,
    context: ServerContext,
    Path(username): Path<String>,
    Query(page): Query<PageQuery>,
) -> ServerResult<Json<Vec<Tweet>>> {
    let viewer = session.as_ref().map(|s| s.username());
    let tweets = context
        .social
        .tweets
        .by_user(&username, viewer, page.before, page.limit)
        .await?;

    Ok(Json(tweets.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/users/{username}/followers",
    tag = "users",
    responses(
        (status = 200, body = Vec<User>)
    )
)]
async fn followers(
    context: ServerContext,
    Path(username): Path<String>,
) -> ServerResult<Json<Vec<User>>> {
    let users = context.social.graph.followers(&username).await?;

    Ok(Json(users.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/users/{username}/following",
    tag = "users",
    responses(
        (status = 200, body = Vec<User>)
    )
)]
async fn following(
    context: ServerContext,
    Path(username): Path<String>,
) -> ServerResult<Json<Vec<User>>> {
    let users = context.social.graph.following(&username).await?;

    Ok(Json(users.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/users/{username}/friends",
    tag = "users",
    responses(
        (status = 200, body = Vec<User>)
    )
)]
async fn friends(
    context: ServerContext,
    Path(username): Path<String>,
) -> ServerResult<Json<Vec<User>>> {
    let users = context.social.graph.friends(&username).await?;

    Ok(Json(users.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/api/users/{username}/follow",
    tag = "users",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The user is now followed"),
        (status = 409, description = "The user is already followed")
    )
)]
async fn follow(
    session: Session,
    context: ServerContext,
    Path(username): Path<String>,
) -> ServerResult<()> {
    context
        .social
        .graph
        .follow(session.username(), &username)
        .await?;

    Ok(())
}

#[utoipa::path(
    delete,
    path = "/api/users/{username}/follow",
    tag = "users",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The user is no longer followed")
    )
)]
async fn unfollow(
    session: Session,
    context: ServerContext,
    Path(username): Path<String>,
) -> ServerResult<()> {
    context
        .social
        .graph
        .unfollow(session.username(), &username)
        .await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(search_users))
        .route("/me", get(me).patch(update_me))
        .route("/:username", get(profile))
        .route("/:username/tweets", get(tweets))
        .route("/:username/followers", get(followers))
        .route("/:username/following", get(following))
        .route("/:username/friends", get(friends))
        .route("/:username/follow", post(follow).delete(unfollow))
}
