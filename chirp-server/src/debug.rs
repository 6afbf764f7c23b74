use axum::{routing::get, Json};

use crate::{
    context::ServerContext,
    serialized::{Diagnostics, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/api/debug",
    tag = "debug",
    responses(
        (status = 200, body = Diagnostics, description = "Which integrations are configured, never their secrets")
    )
)]
async fn debug(context: ServerContext) -> Json<Diagnostics> {
    let social = &context.social;

    Json(Diagnostics {
        version: env!("CARGO_PKG_VERSION"),
        storage: social.context().database.backend(),
        integrations: social.context().integrations.summary().to_serialized(),
        korn: social.korn.status().to_serialized(),
    })
}

pub fn router() -> Router {
    Router::new().route("/", get(debug))
}
