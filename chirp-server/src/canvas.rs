use axum::{
    extract::Path,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json,
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    serialized::{CourseFile, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/api/canvas/{path}",
    tag = "canvas",
    params(
        ("path" = String, Path, description = "Canvas API path, like courses/1/modules")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The Canvas response, with its status and content type mirrored"),
        (status = 503, description = "Canvas is not configured")
    )
)]
async fn proxy(
    _session: Session,
    context: ServerContext,
    Path(path): Path<String>,
    uri: Uri,
) -> ServerResult<Response> {
    let proxied = context.social.courses.proxy(&path, uri.query()).await?;

    let status = StatusCode::from_u16(proxied.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = proxied
        .content_type
        .unwrap_or_else(|| "application/json".to_string());

    Ok((status, [(header::CONTENT_TYPE, content_type)], proxied.body).into_response())
}

#[utoipa::path(
    get,
    path = "/api/courses/{course_id}/materials",
    tag = "canvas",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<CourseFile>, description = "Every file the course modules link to"),
        (status = 503, description = "Canvas is not configured")
    )
)]
async fn materials(
    _session: Session,
    context: ServerContext,
    Path(course_id): Path<u64>,
) -> ServerResult<Json<Vec<CourseFile>>> {
    let files = context.social.courses.materials(course_id).await?;

    Ok(Json(files.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/canvas/*path", get(proxy))
        .route("/courses/:course_id/materials", get(materials))
}
