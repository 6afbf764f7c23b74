use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// The type used for generated primary keys in the database.
pub type PrimaryKey = i32;

/// A chirp account. The username is the primary key.
#[derive(Debug, Clone, FromRow)]
pub struct UserData {
    pub username: String,
    /// The argon2 hash of the password
    pub password: String,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub photo_url: Option<String>,
    pub header_url: Option<String>,
    pub is_premium: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Login session data for authentication
#[derive(Debug, Clone)]
pub struct SessionData {
    pub id: PrimaryKey,
    /// The session token, or key if you will
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The user that is logged in
    pub user: UserData,
}

#[derive(Debug, Clone, FromRow)]
pub struct TweetData {
    pub id: PrimaryKey,
    pub text: String,
    pub photo_url: Option<String>,
    pub is_retweet: bool,
    pub is_reply: bool,
    /// Username of the author
    pub author: String,
    /// Set if, and only if, this is a reply
    pub replied_to_id: Option<PrimaryKey>,
    /// Set if, and only if, this is a retweet
    pub retweet_of_id: Option<PrimaryKey>,
    pub created_at: DateTime<Utc>,
}

/// A pair of users that are friends, or about to be.
/// `user_a` is always lexicographically smaller than `user_b`.
#[derive(Debug, Clone)]
pub struct FriendshipData {
    pub id: PrimaryKey,
    pub user_a: String,
    pub user_b: String,
    /// The user that sent the request
    pub requester: String,
    pub status: FriendshipStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct MessageData {
    pub id: PrimaryKey,
    pub text: String,
    pub photo_url: Option<String>,
    pub sender: String,
    pub recipient: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NotificationData {
    pub id: PrimaryKey,
    /// The user the notification is for
    pub username: String,
    pub kind: NotificationKind,
    /// A JSON object or plain text
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A video call, mirroring the lifecycle of a LiveKit room
#[derive(Debug, Clone)]
pub struct CallData {
    pub id: PrimaryKey,
    pub room_name: String,
    pub caller: String,
    pub status: CallStatus,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ParticipantData {
    pub call_id: PrimaryKey,
    pub username: String,
    pub status: ParticipantStatus,
    pub updated_at: DateTime<Utc>,
}

/// Tells a user they are being called
#[derive(Debug, Clone, FromRow)]
pub struct CallNotificationData {
    pub id: PrimaryKey,
    pub call_id: PrimaryKey,
    pub username: String,
    pub caller: String,
    pub created_at: DateTime<Utc>,
}

/// Generates `as_str`, [Display], and [FromStr] for enums stored as text
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($name), other)),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendshipStatus {
    Pending,
    Accepted,
}

text_enum!(FriendshipStatus {
    Pending => "pending",
    Accepted => "accepted",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Follow,
    Like,
    Retweet,
    Reply,
    Mention,
    Message,
    FriendRequest,
    FriendAccepted,
    Call,
}

text_enum!(NotificationKind {
    Follow => "follow",
    Like => "like",
    Retweet => "retweet",
    Reply => "reply",
    Mention => "mention",
    Message => "message",
    FriendRequest => "friend_request",
    FriendAccepted => "friend_accepted",
    Call => "call",
});

/// initiating → ringing → active → ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Initiating,
    Ringing,
    Active,
    Ended,
}

text_enum!(CallStatus {
    Initiating => "initiating",
    Ringing => "ringing",
    Active => "active",
    Ended => "ended",
});

/// invited → connected → disconnected, or invited → declined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantStatus {
    Invited,
    Connected,
    Disconnected,
    Declined,
}

text_enum!(ParticipantStatus {
    Invited => "invited",
    Connected => "connected",
    Disconnected => "disconnected",
    Declined => "declined",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_enums() {
        assert_eq!(NotificationKind::FriendRequest.as_str(), "friend_request");
        assert_eq!(
            "friend_request".parse::<NotificationKind>(),
            Ok(NotificationKind::FriendRequest)
        );
        assert_eq!(CallStatus::Ringing.to_string(), "ringing");
        assert!("ringing ".parse::<CallStatus>().is_err());
    }
}
