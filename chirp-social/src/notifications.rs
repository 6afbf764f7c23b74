use serde::{Deserialize, Serialize};

use crate::{
    NotificationData, PrimaryKey, SocialContext, SocialError, SocialResult,
};

/// The default number of notifications returned in a listing
pub const NOTIFICATION_PAGE_SIZE: i64 = 50;

/// What a notification is about. Stored as a JSON object.
/// Older notifications may hold plain text, which becomes the message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationContent {
    pub message: String,
    /// The user that caused the notification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tweet_id: Option<PrimaryKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<PrimaryKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendship_id: Option<PrimaryKey>,
}

impl NotificationContent {
    pub fn new(actor: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            actor: Some(actor.to_string()),
            ..Default::default()
        }
    }

    pub fn with_tweet(mut self, tweet_id: PrimaryKey) -> Self {
        self.tweet_id = Some(tweet_id);
        self
    }

    pub fn with_call(mut self, call_id: PrimaryKey) -> Self {
        self.call_id = Some(call_id);
        self
    }

    pub fn with_friendship(mut self, friendship_id: PrimaryKey) -> Self {
        self.friendship_id = Some(friendship_id);
        self
    }

    /// Parses stored content, which is either a JSON object or plain text
    pub fn parse(content: &str) -> Self {
        let trimmed = content.trim();

        if trimmed.starts_with('{') {
            if let Ok(parsed) = serde_json::from_str::<Self>(trimmed) {
                return parsed;
            }
        }

        Self {
            message: content.to_string(),
            ..Default::default()
        }
    }

    pub fn to_content_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message.clone())
    }
}

/// A notification with its content parsed
#[derive(Debug, Clone)]
pub struct NotificationView {
    pub data: NotificationData,
    pub content: NotificationContent,
}

impl From<NotificationData> for NotificationView {
    fn from(data: NotificationData) -> Self {
        Self {
            content: NotificationContent::parse(&data.content),
            data,
        }
    }
}

pub struct Notifications {
    context: SocialContext,
}

impl Notifications {
    pub fn new(context: &SocialContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Newest first
    pub async fn list(
        &self,
        username: &str,
        unread_only: bool,
        limit: Option<i64>,
    ) -> SocialResult<Vec<NotificationView>> {
        let limit = limit.unwrap_or(NOTIFICATION_PAGE_SIZE).clamp(1, 200);

        let notifications = self
            .context
            .database
            .list_notifications(username, unread_only, limit)
            .await?;

        Ok(notifications.into_iter().map(Into::into).collect())
    }

    pub async fn unread_count(&self, username: &str) -> SocialResult<usize> {
        let unread = self
            .context
            .database
            .list_notifications(username, true, i64::MAX)
            .await?;

        Ok(unread.len())
    }

    /// Marks a notification as read. Only the owner may do this.
    pub async fn mark_read(&self, username: &str, notification_id: PrimaryKey) -> SocialResult<()> {
        let notification = self
            .context
            .database
            .notification_by_id(notification_id)
            .await?;

        if notification.username != username {
            return Err(SocialError::forbidden("Not your notification"));
        }

        self.context
            .database
            .mark_notification_read(notification_id)
            .await?;

        Ok(())
    }

    /// Returns how many notifications were marked
    pub async fn mark_all_read(&self, username: &str) -> SocialResult<u64> {
        Ok(self
            .context
            .database
            .mark_all_notifications_read(username)
            .await?)
    }
}
