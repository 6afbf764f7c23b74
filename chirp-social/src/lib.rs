mod auth;
mod calls;
mod courses;
mod db;
mod errors;
mod events;
mod graph;
mod korn;
mod messages;
mod moderation;
mod notifications;
mod profiles;
mod transcription;
mod tweets;

#[cfg(test)]
mod testing;

use std::sync::Arc;

pub use auth::*;
pub use calls::*;
pub use courses::*;
pub use db::*;
pub use errors::*;
pub use events::*;
pub use graph::*;
pub use korn::*;
pub use messages::*;
pub use moderation::*;
pub use notifications::*;
pub use profiles::*;
pub use transcription::*;
pub use tweets::*;

use chirp_core::{
    ChatModel, Classifier, Config, CourseCatalog, RoomTokenIssuer, SpeechToText,
};
use chirp_impls::{CanvasClient, CloudflareAi, GeminiClassifier, LiveKitTokens};
use crossbeam::channel::unbounded;

pub type ArcedDatabase = Arc<dyn Database>;

/// The chirp social system, facilitating accounts, tweets, the social graph, calls, and the AI features.
pub struct Social {
    context: SocialContext,
    events: EventReceiver,

    pub auth: Auth,
    pub profiles: Profiles,
    pub graph: Graph,
    pub tweets: Tweets,
    pub messages: Messages,
    pub notifications: Notifications,
    pub calls: Calls,
    pub korn: Arc<Korn>,
    pub moderation: Moderation,
    pub transcription: Transcription,
    pub courses: Courses,
}

/// A type passed to the services of the social system, to access state and emit events.
#[derive(Clone)]
pub struct SocialContext {
    pub database: ArcedDatabase,
    pub integrations: Integrations,
    pub config: Arc<Config>,

    events: EventSender,
}

/// The third-party services chirp is configured to use.
/// Each one is optional, and features degrade when theirs is missing.
#[derive(Clone, Default)]
pub struct Integrations {
    pub chat: Option<Arc<dyn ChatModel>>,
    pub speech: Option<Arc<dyn SpeechToText>>,
    pub classifier: Option<Arc<dyn Classifier>>,
    pub courses: Option<Arc<dyn CourseCatalog>>,
    pub rooms: Option<Arc<dyn RoomTokenIssuer>>,
}

impl Integrations {
    /// Creates the vendor clients for every configured integration
    pub fn from_config(config: &Config) -> Self {
        let cloudflare = config
            .cloudflare
            .clone()
            .map(|c| Arc::new(CloudflareAi::new(c)));

        Self {
            chat: cloudflare.clone().map(|c| c as Arc<dyn ChatModel>),
            speech: cloudflare.map(|c| c as Arc<dyn SpeechToText>),
            classifier: config
                .gemini
                .clone()
                .map(|c| Arc::new(GeminiClassifier::new(c)) as Arc<dyn Classifier>),
            courses: config
                .canvas
                .clone()
                .map(|c| Arc::new(CanvasClient::new(c)) as Arc<dyn CourseCatalog>),
            rooms: config
                .livekit
                .clone()
                .map(|c| Arc::new(LiveKitTokens::new(c)) as Arc<dyn RoomTokenIssuer>),
        }
    }

    /// Which integrations are available, by name
    pub fn summary(&self) -> IntegrationSummary {
        IntegrationSummary {
            chat: self.chat.is_some(),
            speech: self.speech.is_some(),
            moderation: self.classifier.is_some(),
            canvas: self.courses.is_some(),
            livekit: self.rooms.is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrationSummary {
    pub chat: bool,
    pub speech: bool,
    pub moderation: bool,
    pub canvas: bool,
    pub livekit: bool,
}

impl Social {
    pub fn new(database: ArcedDatabase, integrations: Integrations, config: Config) -> Self {
        let (sender, receiver) = unbounded();

        let context = SocialContext {
            database,
            integrations,
            config: Arc::new(config),
            events: sender,
        };

        let korn = Arc::new(Korn::new(&context));

        Self {
            auth: Auth::new(&context),
            profiles: Profiles::new(&context),
            graph: Graph::new(&context),
            tweets: Tweets::new(&context, &korn),
            messages: Messages::new(&context),
            notifications: Notifications::new(&context),
            calls: Calls::new(&context),
            moderation: Moderation::new(&context),
            transcription: Transcription::new(&context),
            courses: Courses::new(&context),
            korn,
            events: receiver,
            context,
        }
    }

    /// Prepares state the services rely on, like the bot account
    pub async fn init(&self) -> std::result::Result<(), AuthError> {
        let korn = &self.context.config.korn;

        let bot = self
            .auth
            .bootstrap_profile(Identity {
                username: korn.bot_username.clone(),
                name: "Korn".to_string(),
                photo_url: None,
            })
            .await?;

        log::info!(
            "Using {} database, bot account is @{}",
            self.context.database.backend(),
            bot.username
        );

        if let Err(e) = self.context.database.clear_expired_sessions().await {
            log::warn!("Failed to clear expired sessions: {}", e);
        }

        Ok(())
    }

    /// Returns a receiver of every event emitted by the social system.
    /// Events are delivered to exactly one receiver, so there should only be one consumer.
    pub fn events(&self) -> EventReceiver {
        self.events.clone()
    }

    pub fn context(&self) -> &SocialContext {
        &self.context
    }
}

impl SocialContext {
    pub fn emit(&self, event: SocialEvent) {
        // Only fails if every receiver is gone, which happens on shutdown
        let _ = self.events.send(event);
    }

    /// Stores a notification for a user and emits it as an event
    pub async fn notify(
        &self,
        username: &str,
        kind: NotificationKind,
        content: NotificationContent,
    ) -> std::result::Result<NotificationData, DatabaseError> {
        let notification = self
            .database
            .create_notification(NewNotification {
                username: username.to_string(),
                kind,
                content: content.to_content_string(),
            })
            .await?;

        self.emit(SocialEvent::NotificationCreated {
            notification: notification.clone(),
        });

        Ok(notification)
    }

    /// Like [SocialContext::notify], but failures are only logged.
    /// Used for fan-out that shouldn't fail the action that caused it.
    pub async fn notify_quietly(
        &self,
        username: &str,
        kind: NotificationKind,
        content: NotificationContent,
    ) {
        if let Err(e) = self.notify(username, kind, content).await {
            log::warn!("Failed to notify {} about {}: {}", username, kind, e);
        }
    }

    pub fn bot_username(&self) -> &str {
        &self.config.korn.bot_username
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestSocial;

    #[tokio::test]
    async fn test_init_creates_bot_account() {
        let test = TestSocial::with_users(&["alice"]).await;
        test.social.init().await.unwrap();
        test.social.init().await.unwrap();

        let database = &test.social.context().database;
        let bot = database.user_by_username("korn").await.unwrap();
        assert_eq!(bot.name, "Korn");
    }

    #[tokio::test]
    async fn test_notify_stores_and_emits() {
        let test = TestSocial::with_users(&["alice"]).await;

        let notification = test
            .social
            .context()
            .notify(
                "alice",
                NotificationKind::Follow,
                NotificationContent::new("bob", "@bob followed you"),
            )
            .await
            .unwrap();

        assert_eq!(notification.username, "alice");
        assert!(matches!(
            test.drain_events().as_slice(),
            [SocialEvent::NotificationCreated { .. }]
        ));
    }
}
