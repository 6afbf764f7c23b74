use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

impl DatabaseError {
    pub fn not_found(resource: &'static str, identifier: &'static str) -> Self {
        Self::NotFound {
            resource,
            identifier,
        }
    }

    pub fn conflict(resource: &'static str, field: &'static str, value: impl ToString) -> Self {
        Self::Conflict {
            resource,
            field,
            value: value.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::conflict(resource, field, value)),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Represents a type that can fetch chirp data from a database.
/// Every method is a single query or a short sequence of them, nothing is transactional.
#[async_trait]
pub trait Database: Send + Sync {
    /// A short name for logs and diagnostics
    fn backend(&self) -> &'static str;

    async fn user_by_username(&self, username: &str) -> Result<UserData>;
    /// Like [Database::user_by_username], preferring an exact match over a case-insensitive one
    async fn user_by_mention(&self, username: &str) -> Result<UserData>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;
    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData>;
    /// Case-insensitive substring search over username and name
    async fn search_users(&self, query: &str, limit: i64) -> Result<Vec<UserData>>;

    async fn session_by_token(&self, token: &str) -> Result<SessionData>;
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;
    async fn delete_session_by_token(&self, token: &str) -> Result<()>;
    async fn clear_expired_sessions(&self) -> Result<()>;

    async fn tweet_by_id(&self, tweet_id: PrimaryKey) -> Result<TweetData>;
    async fn create_tweet(&self, new_tweet: NewTweet) -> Result<TweetData>;
    async fn delete_tweet(&self, tweet_id: PrimaryKey) -> Result<()>;
    /// Newest first, optionally only tweets older than `before`
    async fn list_tweets_by_authors(
        &self,
        authors: &[String],
        before: Option<PrimaryKey>,
        limit: i64,
    ) -> Result<Vec<TweetData>>;
    /// Oldest first
    async fn list_replies(&self, tweet_id: PrimaryKey) -> Result<Vec<TweetData>>;
    async fn list_retweets(&self, tweet_id: PrimaryKey) -> Result<Vec<TweetData>>;
    async fn count_tweets_by_author(&self, author: &str) -> Result<i64>;

    async fn create_like(&self, username: &str, tweet_id: PrimaryKey) -> Result<()>;
    async fn delete_like(&self, username: &str, tweet_id: PrimaryKey) -> Result<()>;
    async fn list_likers(&self, tweet_id: PrimaryKey) -> Result<Vec<String>>;
    async fn delete_likes_for_tweet(&self, tweet_id: PrimaryKey) -> Result<()>;

    async fn create_follow(&self, follower: &str, followee: &str) -> Result<()>;
    async fn delete_follow(&self, follower: &str, followee: &str) -> Result<()>;
    /// Usernames following the user
    async fn list_followers(&self, username: &str) -> Result<Vec<String>>;
    /// Usernames the user follows
    async fn list_following(&self, username: &str) -> Result<Vec<String>>;

    async fn friendship_by_id(&self, friendship_id: PrimaryKey) -> Result<FriendshipData>;
    /// Expects the pair in canonical order
    async fn friendship_by_pair(&self, user_a: &str, user_b: &str) -> Result<FriendshipData>;
    async fn create_friendship(&self, new_friendship: NewFriendship) -> Result<FriendshipData>;
    async fn update_friendship_status(
        &self,
        friendship_id: PrimaryKey,
        status: FriendshipStatus,
    ) -> Result<FriendshipData>;
    async fn delete_friendship(&self, friendship_id: PrimaryKey) -> Result<()>;
    async fn list_friendships_as_a(&self, username: &str) -> Result<Vec<FriendshipData>>;
    async fn list_friendships_as_b(&self, username: &str) -> Result<Vec<FriendshipData>>;

    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData>;
    /// Oldest first
    async fn list_messages_between(&self, a: &str, b: &str) -> Result<Vec<MessageData>>;
    /// Newest first
    async fn list_messages_involving(&self, username: &str) -> Result<Vec<MessageData>>;

    async fn create_notification(
        &self,
        new_notification: NewNotification,
    ) -> Result<NotificationData>;
    async fn notification_by_id(&self, notification_id: PrimaryKey) -> Result<NotificationData>;
    /// Newest first
    async fn list_notifications(
        &self,
        username: &str,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<NotificationData>>;
    async fn mark_notification_read(&self, notification_id: PrimaryKey) -> Result<()>;
    /// Returns how many notifications were marked
    async fn mark_all_notifications_read(&self, username: &str) -> Result<u64>;

    async fn create_call(&self, new_call: NewCall) -> Result<CallData>;
    async fn call_by_id(&self, call_id: PrimaryKey) -> Result<CallData>;
    async fn update_call_status(
        &self,
        call_id: PrimaryKey,
        status: CallStatus,
        ended_at: Option<DateTime<Utc>>,
    ) -> Result<CallData>;
    async fn create_call_participant(
        &self,
        new_participant: NewCallParticipant,
    ) -> Result<ParticipantData>;
    async fn update_participant_status(
        &self,
        call_id: PrimaryKey,
        username: &str,
        status: ParticipantStatus,
    ) -> Result<ParticipantData>;
    async fn list_call_participants(&self, call_id: PrimaryKey) -> Result<Vec<ParticipantData>>;
    async fn create_call_notification(
        &self,
        new_notification: NewCallNotification,
    ) -> Result<CallNotificationData>;
    /// Newest first
    async fn list_call_notifications(&self, username: &str) -> Result<Vec<CallNotificationData>>;
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    /// Already hashed
    pub password: String,
    pub name: String,
    pub photo_url: Option<String>,
}

/// Fields that are `None` are left untouched
#[derive(Debug, Clone, Default)]
pub struct UpdatedUser {
    pub username: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub photo_url: Option<String>,
    pub header_url: Option<String>,
}

#[derive(Debug)]
pub struct NewSession {
    pub token: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// A tweet about to be created.
/// Only constructible through [NewTweet::original], [NewTweet::reply], and [NewTweet::retweet],
/// so `is_reply` and `is_retweet` always agree with their reference ids.
#[derive(Debug, Clone)]
pub struct NewTweet {
    pub(crate) author: String,
    pub(crate) text: String,
    pub(crate) photo_url: Option<String>,
    pub(crate) replied_to_id: Option<PrimaryKey>,
    pub(crate) retweet_of_id: Option<PrimaryKey>,
}

impl NewTweet {
    pub fn original(author: &str, text: &str, photo_url: Option<String>) -> Self {
        Self {
            author: author.to_string(),
            text: text.to_string(),
            photo_url,
            replied_to_id: None,
            retweet_of_id: None,
        }
    }

    pub fn reply(
        author: &str,
        text: &str,
        photo_url: Option<String>,
        replied_to_id: PrimaryKey,
    ) -> Self {
        Self {
            replied_to_id: Some(replied_to_id),
            ..Self::original(author, text, photo_url)
        }
    }

    pub fn retweet(author: &str, retweet_of_id: PrimaryKey) -> Self {
        Self {
            retweet_of_id: Some(retweet_of_id),
            ..Self::original(author, "", None)
        }
    }

    pub fn is_reply(&self) -> bool {
        self.replied_to_id.is_some()
    }

    pub fn is_retweet(&self) -> bool {
        self.retweet_of_id.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewFriendship {
    pub user_a: String,
    pub user_b: String,
    pub requester: String,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender: String,
    pub recipient: String,
    pub text: String,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub username: String,
    pub kind: NotificationKind,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct NewCall {
    pub room_name: String,
    pub caller: String,
}

#[derive(Debug, Clone)]
pub struct NewCallParticipant {
    pub call_id: PrimaryKey,
    pub username: String,
    pub status: ParticipantStatus,
}

#[derive(Debug, Clone)]
pub struct NewCallNotification {
    pub call_id: PrimaryKey,
    pub username: String,
    pub caller: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tweet_invariants() {
        let reply = NewTweet::reply("alice", "hi", None, 4);
        assert!(reply.is_reply());
        assert!(!reply.is_retweet());

        let retweet = NewTweet::retweet("bob", 4);
        assert!(retweet.is_retweet());
        assert!(retweet.text.is_empty());
    }

    #[test]
    fn test_conflict_or_ok() {
        let missing: Result<()> = Err(DatabaseError::not_found("user", "username"));
        assert!(missing.conflict_or_ok("user", "username", "alice").is_ok());

        let existing: Result<()> = Ok(());
        assert!(matches!(
            existing.conflict_or_ok("user", "username", "alice"),
            Err(DatabaseError::Conflict { .. })
        ));
    }
}
