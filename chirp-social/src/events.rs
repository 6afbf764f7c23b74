use crossbeam::channel::{Receiver, Sender};

use crate::{CallView, MessageData, NotificationData, PrimaryKey, TweetData};

pub type EventSender = Sender<SocialEvent>;
pub type EventReceiver = Receiver<SocialEvent>;

/// Events emitted by the social system
#[derive(Debug, Clone)]
pub enum SocialEvent {
    /// A user received a notification
    NotificationCreated { notification: NotificationData },
    /// A direct message was sent
    MessageSent { message: MessageData },
    /// A tweet, reply, or retweet was posted
    TweetCreated { tweet: TweetData },
    /// A tweet was deleted by its author
    TweetDeleted { tweet_id: PrimaryKey },
    /// A call or one of its participants changed state
    CallUpdated { call: CallView },
}

/// Who an event should be delivered to
#[derive(Debug, PartialEq, Eq)]
pub enum Audience {
    Everyone,
    Users(Vec<String>),
}

impl Audience {
    pub fn includes(&self, username: &str) -> bool {
        match self {
            Self::Everyone => true,
            Self::Users(users) => users.iter().any(|u| u == username),
        }
    }
}

impl SocialEvent {
    pub fn audience(&self) -> Audience {
        match self {
            Self::NotificationCreated { notification } => {
                Audience::Users(vec![notification.username.clone()])
            }
            Self::MessageSent { message } => {
                Audience::Users(vec![message.sender.clone(), message.recipient.clone()])
            }
            Self::TweetCreated { .. } | Self::TweetDeleted { .. } => Audience::Everyone,
            Self::CallUpdated { call } => Audience::Users(
                call.participants
                    .iter()
                    .map(|p| p.username.clone())
                    .collect(),
            ),
        }
    }
}
