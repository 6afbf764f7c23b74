use axum::{
    extract::{Path, Query},
    routing::{get, post},
    Json,
};
use chirp_social::PrimaryKey;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::NotificationsQuery,
    serialized::{Notification, ToSerialized, UnreadCount},
    Router,
};

#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "notifications",
    params(NotificationsQuery),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Notification>)
    )
)]
async fn list(
    session: Session,
    context: ServerContext,
    Query(query): Query<NotificationsQuery>,
) -> ServerResult<Json<Vec<Notification>>> {
    let notifications = context
        .social
        .notifications
        .list(session.username(), query.unread_only, query.limit)
        .await?;

    Ok(Json(notifications.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/api/notifications/unread-count",
    tag = "notifications",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = UnreadCount)
    )
)]
async fn unread_count(session: Session, context: ServerContext) -> ServerResult<Json<UnreadCount>> {
    let count = context
        .social
        .notifications
        .unread_count(session.username())
        .await?;

    Ok(Json(UnreadCount { count }))
}

#[utoipa::path(
    post,
    path = "/api/notifications/{id}/read",
    tag = "notifications",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The notification was marked as read"),
        (status = 403, description = "The notification belongs to someone else")
    )
)]
async fn mark_read(
    session: Session,
    context: ServerContext,
    Path(id): Path<PrimaryKey>,
) -> ServerResult<()> {
    context
        .social
        .notifications
        .mark_read(session.username(), id)
        .await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/notifications/read-all",
    tag = "notifications",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = UnreadCount, description = "How many notifications were marked")
    )
)]
async fn mark_all_read(session: Session, context: ServerContext) -> ServerResult<Json<UnreadCount>> {
    let marked = context
        .social
        .notifications
        .mark_all_read(session.username())
        .await?;

    Ok(Json(UnreadCount {
        count: marked as usize,
    }))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list))
        .route("/unread-count", get(unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/:id/read", post(mark_read))
}
