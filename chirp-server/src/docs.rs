use std::borrow::BorrowMut;

use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{
    ai, auth, calls, canvas, debug, friendships, messages, notifications, schemas, serialized, sse,
    transcribe, tweets, users,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register,
        auth::login,
        auth::logout,
        auth::user,
        users::search_users,
        users::me,
        users::update_me,
        users::profile,
        users::tweets,
        users::followers,
        users::following,
        users::friends,
        users::follow,
        users::unfollow,
        friendships::request_friendship,
        friendships::pending,
        friendships::accept,
        friendships::remove,
        tweets::create,
        tweets::timeline,
        tweets::tweet,
        tweets::delete_tweet,
        tweets::replies,
        tweets::like,
        tweets::unlike,
        tweets::retweet,
        tweets::unretweet,
        messages::send,
        messages::inbox,
        messages::conversation,
        notifications::list,
        notifications::unread_count,
        notifications::mark_read,
        notifications::mark_all_read,
        ai::korn_mention,
        ai::korn_status,
        ai::korn_simple,
        ai::korn_simple_health,
        ai::moderate,
        transcribe::transcribe,
        calls::video_call,
        calls::livekit,
        calls::incoming,
        calls::call,
        canvas::proxy,
        canvas::materials,
        debug::debug,
        sse::event_stream,
    ),
    components(schemas(
        schemas::LoginSchema,
        schemas::RegisterSchema,
        schemas::UpdateProfileSchema,
        schemas::NewTweetSchema,
        schemas::NewFriendshipSchema,
        schemas::NewMessageSchema,
        schemas::KornMentionSchema,
        schemas::KornSimpleSchema,
        schemas::ModerationSchema,
        schemas::VideoCallActionSchema,
        serialized::User,
        serialized::Profile,
        serialized::LoginResult,
        serialized::TweetBody,
        serialized::Tweet,
        serialized::Friendship,
        serialized::Message,
        serialized::Conversation,
        serialized::NotificationContent,
        serialized::Notification,
        serialized::UnreadCount,
        serialized::Participant,
        serialized::Call,
        serialized::RoomAccess,
        serialized::CallSession,
        serialized::IncomingCall,
        serialized::KornStatus,
        serialized::KornAnswer,
        serialized::Moderation,
        serialized::Transcription,
        serialized::CourseFile,
        serialized::Integrations,
        serialized::Diagnostics,
        sse::ServerEvent,
    )),
    modifiers(&Security),
    info(
        description = "chirp-server exposes the endpoints of a chirp instance"
    )
)]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.borrow_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Bearer <token>")
                .build();

            components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme))
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_route_is_documented() {
        let api = ApiDoc::openapi();

        for path in [
            "/api/auth/login",
            "/api/ai/korn-mention",
            "/api/korn-simple",
            "/api/moderate",
            "/api/transcribe",
            "/api/video-call",
            "/api/canvas/{path}",
            "/api/livekit",
            "/api/debug",
        ] {
            assert!(api.paths.paths.contains_key(path), "{} is missing", path);
        }
    }
}
