//! All schemas that are exposed from endpoints are defined here
//! along with the ToSerialized impls. Timestamps are RFC 3339 strings.

use std::collections::BTreeMap;

use chirp_social::{
    CallSession as SocialCallSession, CallView, ConversationSummary,
    CourseFile as SocialCourseFile, FriendshipData, IncomingCall as SocialIncomingCall,
    IntegrationSummary, KornStatus as SocialKornStatus, MessageData, ModerationResult,
    NotificationView, ParticipantData, PrimaryKey, ProfileView, RoomAccess as SocialRoomAccess,
    SessionData, TranscriptionResult, TweetData, TweetView, UserData,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    username: String,
    name: String,
    description: Option<String>,
    location: Option<String>,
    website: Option<String>,
    photo_url: Option<String>,
    header_url: Option<String>,
    is_premium: bool,
    created_at: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    user: User,
    followers_count: usize,
    following_count: usize,
    tweets_count: i64,
    followed_by_viewer: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    token: String,
    expires_at: String,
    user: User,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TweetBody {
    id: PrimaryKey,
    text: String,
    photo_url: Option<String>,
    is_retweet: bool,
    is_reply: bool,
    author: String,
    replied_to_id: Option<PrimaryKey>,
    retweet_of_id: Option<PrimaryKey>,
    created_at: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    tweet: TweetBody,
    like_count: usize,
    retweet_count: usize,
    reply_count: usize,
    liked: bool,
    retweeted: bool,
    /// The retweeted tweet, when this is a retweet
    original: Option<TweetBody>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Friendship {
    id: PrimaryKey,
    user_a: String,
    user_b: String,
    requester: String,
    status: String,
    created_at: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    id: PrimaryKey,
    text: String,
    photo_url: Option<String>,
    sender: String,
    recipient: String,
    created_at: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    counterpart: String,
    last_message: Message,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationContent {
    message: String,
    actor: Option<String>,
    tweet_id: Option<PrimaryKey>,
    call_id: Option<PrimaryKey>,
    friendship_id: Option<PrimaryKey>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    id: PrimaryKey,
    kind: String,
    content: NotificationContent,
    is_read: bool,
    created_at: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    username: String,
    status: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    id: PrimaryKey,
    room_name: String,
    caller: String,
    status: String,
    created_at: String,
    ended_at: Option<String>,
    participants: Vec<Participant>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomAccess {
    room: String,
    identity: String,
    token: String,
    server_url: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallSession {
    call: Call,
    access: Option<RoomAccess>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCall {
    notification_id: PrimaryKey,
    call_id: PrimaryKey,
    room_name: String,
    caller: String,
    status: String,
    created_at: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KornStatus {
    enabled: bool,
    configured: bool,
    bot_username: String,
    in_flight: usize,
    remaining_this_minute: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KornAnswer {
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Moderation {
    allowed: bool,
    flagged: bool,
    blocked: bool,
    moderated: bool,
    /// Severity per category, one of none, low, medium or high
    categories: BTreeMap<String, String>,
    reason: Option<String>,
    model_disagreed: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Transcription {
    sid: String,
    seq: u64,
    text: String,
    model: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseFile {
    id: u64,
    name: String,
    url: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Integrations {
    chat: bool,
    speech: bool,
    moderation: bool,
    canvas: bool,
    livekit: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub version: &'static str,
    pub storage: &'static str,
    pub integrations: Integrations,
    pub korn: KornStatus,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl<I, O> ToSerialized<Option<O>> for Option<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Option<O> {
        self.as_ref().map(|x| x.to_serialized())
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            username: self.username.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            website: self.website.clone(),
            photo_url: self.photo_url.clone(),
            header_url: self.header_url.clone(),
            is_premium: self.is_premium,
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

impl ToSerialized<Profile> for ProfileView {
    fn to_serialized(&self) -> Profile {
        Profile {
            user: self.user.to_serialized(),
            followers_count: self.followers_count,
            following_count: self.following_count,
            tweets_count: self.tweets_count,
            followed_by_viewer: self.followed_by_viewer,
        }
    }
}

impl ToSerialized<LoginResult> for SessionData {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            expires_at: self.expires_at.to_rfc3339(),
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<TweetBody> for TweetData {
    fn to_serialized(&self) -> TweetBody {
        TweetBody {
            id: self.id,
            text: self.text.clone(),
            photo_url: self.photo_url.clone(),
            is_retweet: self.is_retweet,
            is_reply: self.is_reply,
            author: self.author.clone(),
            replied_to_id: self.replied_to_id,
            retweet_of_id: self.retweet_of_id,
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

impl ToSerialized<Tweet> for TweetView {
    fn to_serialized(&self) -> Tweet {
        Tweet {
            tweet: self.tweet.to_serialized(),
            like_count: self.like_count,
            retweet_count: self.retweet_count,
            reply_count: self.reply_count,
            liked: self.liked,
            retweeted: self.retweeted,
            original: self.original.to_serialized(),
        }
    }
}

impl ToSerialized<Friendship> for FriendshipData {
    fn to_serialized(&self) -> Friendship {
        Friendship {
            id: self.id,
            user_a: self.user_a.clone(),
            user_b: self.user_b.clone(),
            requester: self.requester.clone(),
            status: self.status.to_string(),
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

impl ToSerialized<Message> for MessageData {
    fn to_serialized(&self) -> Message {
        Message {
            id: self.id,
            text: self.text.clone(),
            photo_url: self.photo_url.clone(),
            sender: self.sender.clone(),
            recipient: self.recipient.clone(),
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

impl ToSerialized<Conversation> for ConversationSummary {
    fn to_serialized(&self) -> Conversation {
        Conversation {
            counterpart: self.counterpart.clone(),
            last_message: self.last_message.to_serialized(),
        }
    }
}

impl ToSerialized<Notification> for NotificationView {
    fn to_serialized(&self) -> Notification {
        let content = &self.content;

        Notification {
            id: self.data.id,
            kind: self.data.kind.to_string(),
            content: NotificationContent {
                message: content.message.clone(),
                actor: content.actor.clone(),
                tweet_id: content.tweet_id,
                call_id: content.call_id,
                friendship_id: content.friendship_id,
            },
            is_read: self.data.is_read,
            created_at: self.data.created_at.to_rfc3339(),
        }
    }
}

impl ToSerialized<Participant> for ParticipantData {
    fn to_serialized(&self) -> Participant {
        Participant {
            username: self.username.clone(),
            status: self.status.to_string(),
        }
    }
}

impl ToSerialized<Call> for CallView {
    fn to_serialized(&self) -> Call {
        Call {
            id: self.call.id,
            room_name: self.call.room_name.clone(),
            caller: self.call.caller.clone(),
            status: self.call.status.to_string(),
            created_at: self.call.created_at.to_rfc3339(),
            ended_at: self.call.ended_at.map(|t| t.to_rfc3339()),
            participants: self.participants.to_serialized(),
        }
    }
}

impl ToSerialized<RoomAccess> for SocialRoomAccess {
    fn to_serialized(&self) -> RoomAccess {
        RoomAccess {
            room: self.room.clone(),
            identity: self.identity.clone(),
            token: self.token.clone(),
            server_url: self.server_url.clone(),
        }
    }
}

impl ToSerialized<CallSession> for SocialCallSession {
    fn to_serialized(&self) -> CallSession {
        CallSession {
            call: self.call.to_serialized(),
            access: self.access.to_serialized(),
        }
    }
}

impl ToSerialized<IncomingCall> for SocialIncomingCall {
    fn to_serialized(&self) -> IncomingCall {
        IncomingCall {
            notification_id: self.notification.id,
            call_id: self.call.id,
            room_name: self.call.room_name.clone(),
            caller: self.notification.caller.clone(),
            status: self.call.status.to_string(),
            created_at: self.notification.created_at.to_rfc3339(),
        }
    }
}

impl ToSerialized<KornStatus> for SocialKornStatus {
    fn to_serialized(&self) -> KornStatus {
        KornStatus {
            enabled: self.enabled,
            configured: self.configured,
            bot_username: self.bot_username.clone(),
            in_flight: self.in_flight,
            remaining_this_minute: self.remaining_this_minute,
        }
    }
}

impl ToSerialized<Moderation> for ModerationResult {
    fn to_serialized(&self) -> Moderation {
        Moderation {
            allowed: self.allowed,
            flagged: self.flagged,
            blocked: self.blocked,
            moderated: self.moderated,
            categories: self
                .categories
                .iter()
                .map(|(category, severity)| (category.to_string(), severity.as_str().to_string()))
                .collect(),
            reason: self.reason.clone(),
            model_disagreed: self.model_disagreed,
        }
    }
}

impl ToSerialized<Transcription> for TranscriptionResult {
    fn to_serialized(&self) -> Transcription {
        Transcription {
            sid: self.sid.clone(),
            seq: self.seq,
            text: self.text.clone(),
            model: self.model.clone(),
        }
    }
}

impl ToSerialized<CourseFile> for SocialCourseFile {
    fn to_serialized(&self) -> CourseFile {
        CourseFile {
            id: self.id,
            name: self.name.clone(),
            url: self.url.clone(),
        }
    }
}

impl ToSerialized<Integrations> for IntegrationSummary {
    fn to_serialized(&self) -> Integrations {
        Integrations {
            chat: self.chat,
            speech: self.speech,
            moderation: self.moderation,
            canvas: self.canvas,
            livekit: self.livekit,
        }
    }
}
