use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};

use chirp_core::{truncate_chars, ChatRequest, MAX_TWEET_LENGTH};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use regex::Regex;
use thiserror::Error;

use crate::{
    DatabaseError, NewTweet, NotificationContent, NotificationKind, PrimaryKey, SocialContext,
    SocialEvent, TweetData,
};

const SYSTEM_PROMPT: &str = "You are Korn, a friendly and witty assistant living on a social network. \
Answer the user's post directly and helpfully. Keep it short enough to fit in a single post \
of at most 280 characters. Do not use hashtags and do not mention that you are an AI model.";

/// Used as the prompt when a mention has no other text
const GREETING_PROMPT: &str = "Someone mentioned you without saying anything else. Greet them briefly.";

const FALLBACK_REPLIES: [&str; 3] = [
    "Korn is thinking really hard about this one. Ask me again in a bit!",
    "My circuits are a little popped right now. Try me again later!",
    "Hmm, I couldn't come up with an answer this time. Give it another shot soon!",
];

const MAX_REPLY_TOKENS: u32 = 256;
const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum MentionError {
    #[error("Korn is disabled")]
    Disabled,
    #[error("Tweet doesn't mention Korn")]
    NotMentioned,
    #[error("Korn doesn't answer its own tweets")]
    OwnTweet,
    #[error("Tweet is already being answered")]
    InFlight,
    #[error("Korn already replied to this tweet")]
    AlreadyReplied,
    #[error("Korn is answering too many mentions, try again in a minute")]
    RateLimited,
    #[error("Message is empty")]
    EmptyMessage,
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Counts requests in fixed one-minute windows
pub struct RateLimiter {
    limit: u32,
    window: Mutex<Window>,
}

struct Window {
    started_at: Instant,
    count: u32,
}

impl RateLimiter {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            window: Mutex::new(Window {
                started_at: Instant::now(),
                count: 0,
            }),
        }
    }

    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut window = self.window.lock();

        if now.duration_since(window.started_at) >= WINDOW {
            window.started_at = now;
            window.count = 0;
        }

        if window.count >= self.limit {
            return false;
        }

        window.count += 1;
        true
    }

    pub fn remaining(&self) -> u32 {
        let window = self.window.lock();

        if window.started_at.elapsed() >= WINDOW {
            return self.limit;
        }

        self.limit.saturating_sub(window.count)
    }
}

/// What the status endpoint reports
#[derive(Debug, Clone)]
pub struct KornStatus {
    pub enabled: bool,
    /// Whether a chat model is available, otherwise fallback replies are used
    pub configured: bool,
    pub bot_username: String,
    pub in_flight: usize,
    pub remaining_this_minute: u32,
}

/// The @Korn bot, which answers tweets that mention it
pub struct Korn {
    context: SocialContext,
    mention: Regex,
    in_flight: Mutex<HashSet<PrimaryKey>>,
    limiter: RateLimiter,
}

/// Removes a tweet from the in-flight set when processing ends, however it ends
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<PrimaryKey>>,
    tweet_id: PrimaryKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.tweet_id);
    }
}

impl Korn {
    pub fn new(context: &SocialContext) -> Self {
        let korn = &context.config.korn;
        let pattern = format!(r"(?i)@{}\b", regex::escape(&korn.bot_username));

        Self {
            context: context.clone(),
            // An escaped username always forms a valid pattern
            mention: Regex::new(&pattern).expect("mention pattern is valid"),
            in_flight: Default::default(),
            limiter: RateLimiter::new(korn.rate_limit_per_minute),
        }
    }

    fn enabled(&self) -> bool {
        self.context.config.korn.enabled
    }

    pub fn is_mentioned(&self, text: &str) -> bool {
        self.mention.is_match(text)
    }

    /// Removes every mention of the bot and tidies up the whitespace left behind
    pub fn strip_mentions(&self, text: &str) -> String {
        self.mention
            .replace_all(text, "")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Answers the tweet in the background if it mentions the bot
    pub fn spawn_if_mentioned(self: &Arc<Self>, tweet: &TweetData) {
        if !self.enabled() || !self.is_mentioned(&tweet.text) {
            return;
        }

        let korn = self.clone();
        let tweet_id = tweet.id;

        tokio::spawn(async move {
            match korn.process(tweet_id).await {
                Ok(reply) => log::info!("Korn replied to tweet {} with {}", tweet_id, reply.id),
                Err(e) => log::warn!("Korn skipped tweet {}: {}", tweet_id, e),
            }
        });
    }

    /// Replies to a tweet that mentions the bot, returning the reply
    pub async fn process(&self, tweet_id: PrimaryKey) -> Result<TweetData, MentionError> {
        if !self.enabled() {
            return Err(MentionError::Disabled);
        }

        let database = &self.context.database;
        let bot = self.context.bot_username();
        let tweet = database.tweet_by_id(tweet_id).await?;

        if tweet.author == bot {
            return Err(MentionError::OwnTweet);
        }

        if !self.is_mentioned(&tweet.text) {
            return Err(MentionError::NotMentioned);
        }

        if !self.in_flight.lock().insert(tweet_id) {
            return Err(MentionError::InFlight);
        }

        let _guard = InFlightGuard {
            set: &self.in_flight,
            tweet_id,
        };

        let replies = database.list_replies(tweet_id).await?;
        if replies.iter().any(|r| r.author == bot) {
            return Err(MentionError::AlreadyReplied);
        }

        if !self.limiter.try_acquire() {
            log::warn!("Korn hit its rate limit, skipping tweet {}", tweet_id);
            return Err(MentionError::RateLimited);
        }

        let answer = self.answer(&tweet.text).await;
        let reply = database
            .create_tweet(NewTweet::reply(bot, &answer, None, tweet_id))
            .await?;

        self.context.emit(SocialEvent::TweetCreated {
            tweet: reply.clone(),
        });

        self.context
            .notify_quietly(
                &tweet.author,
                NotificationKind::Reply,
                NotificationContent::new(bot, format!("@{} replied to you", bot))
                    .with_tweet(reply.id),
            )
            .await;

        Ok(reply)
    }

    /// Answers a message directly, without posting anything
    pub async fn ask(&self, message: &str) -> Result<String, MentionError> {
        if message.trim().is_empty() {
            return Err(MentionError::EmptyMessage);
        }

        Ok(self.answer(message).await)
    }

    /// Produces the bot's answer to a text. Never fails, falling back to a canned reply.
    pub async fn answer(&self, text: &str) -> String {
        let Some(chat) = &self.context.integrations.chat else {
            log::warn!("No chat model configured, Korn uses a fallback reply");
            return fallback_reply();
        };

        let stripped = self.strip_mentions(text);
        let prompt = if stripped.is_empty() {
            GREETING_PROMPT.to_string()
        } else {
            stripped
        };

        let request = ChatRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: prompt,
            max_tokens: MAX_REPLY_TOKENS,
        };

        match chat.complete(request).await {
            Ok(response) if !response.trim().is_empty() => {
                truncate_chars(response.trim(), MAX_TWEET_LENGTH)
            }
            Ok(_) => {
                log::warn!("Chat model gave an empty answer, Korn uses a fallback reply");
                fallback_reply()
            }
            Err(e) => {
                log::warn!("Chat model failed, Korn uses a fallback reply: {}", e);
                fallback_reply()
            }
        }
    }

    pub fn status(&self) -> KornStatus {
        KornStatus {
            enabled: self.enabled(),
            configured: self.context.integrations.chat.is_some(),
            bot_username: self.context.bot_username().to_string(),
            in_flight: self.in_flight.lock().len(),
            remaining_this_minute: self.limiter.remaining(),
        }
    }
}

fn fallback_reply() -> String {
    FALLBACK_REPLIES
        .choose(&mut rand::thread_rng())
        .unwrap_or(&FALLBACK_REPLIES[0])
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chirp_core::{Config, KornConfig};

    use super::*;
    use crate::{
        testing::{FakeChat, TestSocial},
        Integrations,
    };

    fn config(rate_limit_per_minute: u32) -> Config {
        Config {
            korn: KornConfig {
                enabled: true,
                rate_limit_per_minute,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    async fn with_chat(chat: FakeChat, rate_limit: u32) -> (TestSocial, Arc<FakeChat>) {
        let chat = Arc::new(chat);
        let integrations = Integrations {
            chat: Some(chat.clone()),
            ..Default::default()
        };

        let test = TestSocial::build(config(rate_limit), integrations, &["alice", "korn"]).await;
        (test, chat)
    }

    async fn tweet(test: &TestSocial, text: &str) -> TweetData {
        test.social
            .context()
            .database
            .create_tweet(NewTweet::original("alice", text, None))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_mention_detection_and_stripping() {
        let (test, _) = with_chat(FakeChat::answering("hi"), 10).await;
        let korn = &test.social.korn;

        assert!(korn.is_mentioned("hey @Korn what's up"));
        assert!(korn.is_mentioned("@KORN"));
        assert!(!korn.is_mentioned("@kornflakes are great"));
        assert!(!korn.is_mentioned("korn without the at"));

        assert_eq!(korn.strip_mentions("@Korn  what is   rust? @korn"), "what is rust?");
    }

    #[tokio::test]
    async fn test_process_replies_once() {
        let (test, chat) = with_chat(FakeChat::answering("  Rust is a language.  "), 10).await;
        let korn = &test.social.korn;
        let mentioning = tweet(&test, "@Korn what is rust?").await;

        let reply = korn.process(mentioning.id).await.unwrap();
        assert_eq!(reply.author, "korn");
        assert_eq!(reply.text, "Rust is a language.");
        assert_eq!(reply.replied_to_id, Some(mentioning.id));
        assert_eq!(chat.requests.lock()[0].user, "what is rust?");

        assert!(matches!(
            korn.process(mentioning.id).await,
            Err(MentionError::AlreadyReplied)
        ));
        assert!(matches!(
            korn.process(reply.id).await,
            Err(MentionError::OwnTweet)
        ));

        let notifications = test
            .social
            .notifications
            .list("alice", false, None)
            .await
            .unwrap();
        assert_eq!(notifications[0].content.tweet_id, Some(reply.id));
    }

    #[tokio::test]
    async fn test_long_answers_are_truncated() {
        let (test, _) = with_chat(FakeChat::answering(&"word ".repeat(100)), 10).await;
        let mentioning = tweet(&test, "@korn talk a lot").await;

        let reply = test.social.korn.process(mentioning.id).await.unwrap();
        assert!(reply.text.chars().count() <= MAX_TWEET_LENGTH);
        assert!(reply.text.ends_with("..."));
    }

    #[tokio::test]
    async fn test_failures_fall_back() {
        let (test, _) = with_chat(FakeChat::failing(), 10).await;
        let mentioning = tweet(&test, "@korn hello").await;

        let reply = test.social.korn.process(mentioning.id).await.unwrap();
        assert!(FALLBACK_REPLIES.contains(&reply.text.as_str()));
    }

    #[tokio::test]
    async fn test_rate_limit() {
        let (test, _) = with_chat(FakeChat::answering("ok"), 1).await;
        let korn = &test.social.korn;

        let first = tweet(&test, "@korn one").await;
        let second = tweet(&test, "@korn two").await;

        korn.process(first.id).await.unwrap();
        assert!(matches!(
            korn.process(second.id).await,
            Err(MentionError::RateLimited)
        ));
        assert_eq!(korn.status().remaining_this_minute, 0);
        assert_eq!(korn.status().in_flight, 0);
    }

    #[tokio::test]
    async fn test_disabled() {
        let test = TestSocial::with_users(&["alice"]).await;
        let mentioning = tweet(&test, "@korn hi").await;

        assert!(matches!(
            test.social.korn.process(mentioning.id).await,
            Err(MentionError::Disabled)
        ));
        assert!(!test.social.korn.status().enabled);
    }

    #[test]
    fn test_rate_limiter_window_resets() {
        let limiter = RateLimiter::new(2);
        let start = Instant::now();

        assert!(limiter.try_acquire_at(start));
        assert!(limiter.try_acquire_at(start));
        assert!(!limiter.try_acquire_at(start + Duration::from_secs(59)));
        assert!(limiter.try_acquire_at(start + Duration::from_secs(61)));
    }
}
