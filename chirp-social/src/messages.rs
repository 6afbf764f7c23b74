use std::collections::HashSet;

use crate::{
    MessageData, NewMessage, NotificationContent, NotificationKind, SocialContext, SocialError,
    SocialEvent, SocialResult,
};

/// The latest message exchanged with another user
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub counterpart: String,
    pub last_message: MessageData,
}

#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub recipient: String,
    pub text: String,
    pub photo_url: Option<String>,
}

pub struct Messages {
    context: SocialContext,
}

impl Messages {
    pub fn new(context: &SocialContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn send(&self, sender: &str, draft: MessageDraft) -> SocialResult<MessageData> {
        if draft.recipient == sender {
            return Err(SocialError::invalid("You can't message yourself"));
        }

        let text = draft.text.trim().to_string();
        if text.is_empty() && draft.photo_url.is_none() {
            return Err(SocialError::invalid("A message needs text or a photo"));
        }

        self.context
            .database
            .user_by_username(&draft.recipient)
            .await?;

        let message = self
            .context
            .database
            .create_message(NewMessage {
                sender: sender.to_string(),
                recipient: draft.recipient,
                text,
                photo_url: draft.photo_url,
            })
            .await?;

        self.context.emit(SocialEvent::MessageSent {
            message: message.clone(),
        });

        self.context
            .notify_quietly(
                &message.recipient,
                NotificationKind::Message,
                NotificationContent::new(sender, format!("@{} sent you a message", sender)),
            )
            .await;

        Ok(message)
    }

    /// Every message between two users, oldest first
    pub async fn conversation(&self, username: &str, other: &str) -> SocialResult<Vec<MessageData>> {
        self.context.database.user_by_username(other).await?;

        Ok(self
            .context
            .database
            .list_messages_between(username, other)
            .await?)
    }

    /// One entry per user the user has exchanged messages with, most recent conversation first
    pub async fn inbox(&self, username: &str) -> SocialResult<Vec<ConversationSummary>> {
        let messages = self
            .context
            .database
            .list_messages_involving(username)
            .await?;

        let mut seen = HashSet::new();

        Ok(messages
            .into_iter()
            .filter_map(|message| {
                let counterpart = if message.sender == username {
                    message.recipient.clone()
                } else {
                    message.sender.clone()
                };

                seen.insert(counterpart.clone())
                    .then_some(ConversationSummary {
                        counterpart,
                        last_message: message,
                    })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestSocial;

    fn draft(recipient: &str, text: &str) -> MessageDraft {
        MessageDraft {
            recipient: recipient.to_string(),
            text: text.to_string(),
            photo_url: None,
        }
    }

    #[tokio::test]
    async fn test_send_rules() {
        let test = TestSocial::with_users(&["alice", "bob"]).await;
        let messages = &test.social.messages;

        assert!(matches!(
            messages.send("alice", draft("alice", "hi")).await,
            Err(SocialError::Invalid(_))
        ));
        assert!(matches!(
            messages.send("alice", draft("bob", "  ")).await,
            Err(SocialError::Invalid(_))
        ));
        assert!(messages.send("alice", draft("nobody", "hi")).await.is_err());

        let photo = MessageDraft {
            photo_url: Some("https://img.test/cat.png".to_string()),
            ..draft("bob", "")
        };
        assert!(messages.send("alice", photo).await.is_ok());

        let notifications = test
            .social
            .notifications
            .list("bob", true, None)
            .await
            .unwrap();
        assert_eq!(notifications[0].data.kind, NotificationKind::Message);
    }

    #[tokio::test]
    async fn test_conversation_and_inbox() {
        let test = TestSocial::with_users(&["alice", "bob", "carol"]).await;
        let messages = &test.social.messages;

        messages.send("alice", draft("bob", "one")).await.unwrap();
        messages.send("bob", draft("alice", "two")).await.unwrap();
        messages.send("carol", draft("alice", "three")).await.unwrap();

        let conversation = messages.conversation("alice", "bob").await.unwrap();
        let texts: Vec<_> = conversation.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two"]);

        let inbox = messages.inbox("alice").await.unwrap();
        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox[0].counterpart, "carol");
        assert_eq!(inbox[1].counterpart, "bob");
        assert_eq!(inbox[1].last_message.text, "two");
    }
}
