use std::{collections::HashSet, sync::Arc};

use chirp_core::MAX_TWEET_LENGTH;
use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    DatabaseError, Korn, NewTweet, NotificationContent, NotificationKind, PrimaryKey,
    SocialContext, SocialError, SocialEvent, SocialResult, TweetData,
};

/// The default size of a page of tweets
pub const TWEET_PAGE_SIZE: i64 = 20;
const MAX_TWEET_PAGE_SIZE: i64 = 100;

lazy_static! {
    static ref MENTION_REGEX: Regex = Regex::new(r"\B@([A-Za-z0-9_]{1,30})\b").unwrap();
}

/// Usernames mentioned with @ in a text, in order of appearance, without duplicates
pub fn mentioned_usernames(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();

    MENTION_REGEX
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|u| seen.insert(u.to_lowercase()))
        .collect()
}

/// A tweet with its counts, as seen by a user
#[derive(Debug, Clone)]
pub struct TweetView {
    pub tweet: TweetData,
    pub like_count: usize,
    pub retweet_count: usize,
    pub reply_count: usize,
    /// Whether the viewer liked the tweet
    pub liked: bool,
    /// Whether the viewer retweeted the tweet
    pub retweeted: bool,
    /// The retweeted tweet, if this is a retweet and it still exists
    pub original: Option<TweetData>,
}

/// A tweet or reply to be posted
#[derive(Debug, Clone, Default)]
pub struct TweetDraft {
    pub text: String,
    pub photo_url: Option<String>,
    pub replied_to_id: Option<PrimaryKey>,
}

pub struct Tweets {
    context: SocialContext,
    korn: Arc<Korn>,
}

impl Tweets {
    pub fn new(context: &SocialContext, korn: &Arc<Korn>) -> Self {
        Self {
            context: context.clone(),
            korn: korn.clone(),
        }
    }

    /// Posts a tweet, or a reply if the draft refers to a parent
    pub async fn create(&self, author: &str, draft: TweetDraft) -> SocialResult<TweetView> {
        let text = draft.text.trim();
        let length = text.chars().count();

        if length == 0 {
            return Err(SocialError::invalid("A tweet can't be empty"));
        }

        if length > MAX_TWEET_LENGTH {
            return Err(SocialError::invalid(format!(
                "A tweet can be at most {} characters",
                MAX_TWEET_LENGTH
            )));
        }

        let parent = match draft.replied_to_id {
            Some(id) => Some(self.context.database.tweet_by_id(id).await?),
            None => None,
        };

        let new_tweet = match &parent {
            Some(parent) => NewTweet::reply(author, text, draft.photo_url, parent.id),
            None => NewTweet::original(author, text, draft.photo_url),
        };

        let tweet = self.context.database.create_tweet(new_tweet).await?;

        self.context.emit(SocialEvent::TweetCreated {
            tweet: tweet.clone(),
        });

        if let Some(parent) = &parent {
            if parent.author != author {
                self.context
                    .notify_quietly(
                        &parent.author,
                        NotificationKind::Reply,
                        NotificationContent::new(author, format!("@{} replied to you", author))
                            .with_tweet(tweet.id),
                    )
                    .await;
            }
        }

        self.notify_mentions(&tweet, parent.as_ref()).await;
        self.korn.spawn_if_mentioned(&tweet);

        self.view(tweet, Some(author)).await
    }

    async fn notify_mentions(&self, tweet: &TweetData, parent: Option<&TweetData>) {
        let bot = self.context.bot_username();

        for mention in mentioned_usernames(&tweet.text) {
            if mention.eq_ignore_ascii_case(bot) {
                continue;
            }

            let username = match self.context.database.user_by_mention(&mention).await {
                Ok(user) => user.username,
                Err(e) if e.is_not_found() => continue,
                Err(e) => {
                    log::warn!("Failed to look up mentioned user {}: {}", mention, e);
                    continue;
                }
            };

            let already_notified = parent.map(|p| p.author == username).unwrap_or(false);

            if username == tweet.author || already_notified {
                continue;
            }

            self.context
                .notify_quietly(
                    &username,
                    NotificationKind::Mention,
                    NotificationContent::new(
                        &tweet.author,
                        format!("@{} mentioned you", tweet.author),
                    )
                    .with_tweet(tweet.id),
                )
                .await;
        }
    }

    pub async fn get(&self, tweet_id: PrimaryKey, viewer: Option<&str>) -> SocialResult<TweetView> {
        let tweet = self.context.database.tweet_by_id(tweet_id).await?;
        self.view(tweet, viewer).await
    }

    /// Replies to a tweet, oldest first
    pub async fn replies(
        &self,
        tweet_id: PrimaryKey,
        viewer: Option<&str>,
    ) -> SocialResult<Vec<TweetView>> {
        self.context.database.tweet_by_id(tweet_id).await?;
        let replies = self.context.database.list_replies(tweet_id).await?;

        self.views(replies, viewer).await
    }

    /// Tweets posted by a user, newest first
    pub async fn by_user(
        &self,
        username: &str,
        viewer: Option<&str>,
        before: Option<PrimaryKey>,
        limit: Option<i64>,
    ) -> SocialResult<Vec<TweetView>> {
        self.context.database.user_by_username(username).await?;

        let tweets = self
            .context
            .database
            .list_tweets_by_authors(&[username.to_string()], before, page_size(limit))
            .await?;

        self.views(tweets, viewer).await
    }

    /// The user's own tweets and those of everyone they follow, newest first
    pub async fn timeline(
        &self,
        username: &str,
        before: Option<PrimaryKey>,
        limit: Option<i64>,
    ) -> SocialResult<Vec<TweetView>> {
        let mut authors = self.context.database.list_following(username).await?;
        authors.push(username.to_string());

        let tweets = self
            .context
            .database
            .list_tweets_by_authors(&authors, before, page_size(limit))
            .await?;

        self.views(tweets, Some(username)).await
    }

    pub async fn like(&self, username: &str, tweet_id: PrimaryKey) -> SocialResult<TweetView> {
        let tweet = self.context.database.tweet_by_id(tweet_id).await?;
        self.context.database.create_like(username, tweet_id).await?;

        if tweet.author != username {
            self.context
                .notify_quietly(
                    &tweet.author,
                    NotificationKind::Like,
                    NotificationContent::new(username, format!("@{} liked your tweet", username))
                        .with_tweet(tweet_id),
                )
                .await;
        }

        self.view(tweet, Some(username)).await
    }

    pub async fn unlike(&self, username: &str, tweet_id: PrimaryKey) -> SocialResult<TweetView> {
        let tweet = self.context.database.tweet_by_id(tweet_id).await?;
        self.context.database.delete_like(username, tweet_id).await?;

        self.view(tweet, Some(username)).await
    }

    /// Retweets a tweet. A user can retweet a tweet once, and retweets can't be retweeted.
    pub async fn retweet(&self, username: &str, tweet_id: PrimaryKey) -> SocialResult<TweetView> {
        let original = self.context.database.tweet_by_id(tweet_id).await?;

        if original.is_retweet {
            return Err(SocialError::invalid("Retweets can't be retweeted"));
        }

        if self.retweet_by(username, tweet_id).await?.is_some() {
            return Err(DatabaseError::conflict("retweet", "tweet_id", tweet_id).into());
        }

        let retweet = self
            .context
            .database
            .create_tweet(NewTweet::retweet(username, tweet_id))
            .await?;

        self.context.emit(SocialEvent::TweetCreated {
            tweet: retweet.clone(),
        });

        if original.author != username {
            self.context
                .notify_quietly(
                    &original.author,
                    NotificationKind::Retweet,
                    NotificationContent::new(
                        username,
                        format!("@{} retweeted your tweet", username),
                    )
                    .with_tweet(tweet_id),
                )
                .await;
        }

        self.view(retweet, Some(username)).await
    }

    /// Removes the user's retweet of a tweet
    pub async fn unretweet(&self, username: &str, tweet_id: PrimaryKey) -> SocialResult<()> {
        let retweet = self
            .retweet_by(username, tweet_id)
            .await?
            .ok_or(DatabaseError::not_found("retweet", "tweet_id"))?;

        self.remove(&retweet).await
    }

    /// Deletes a tweet along with its likes and retweets. Only the author can do this.
    pub async fn delete(&self, username: &str, tweet_id: PrimaryKey) -> SocialResult<()> {
        let tweet = self.context.database.tweet_by_id(tweet_id).await?;

        if tweet.author != username {
            return Err(SocialError::forbidden("You can only delete your own tweets"));
        }

        let database = &self.context.database;
        database.delete_likes_for_tweet(tweet_id).await?;

        for retweet in database.list_retweets(tweet_id).await? {
            self.remove(&retweet).await?;
        }

        self.remove(&tweet).await
    }

    /// Deletes a single tweet and its likes, one query after the other
    async fn remove(&self, tweet: &TweetData) -> SocialResult<()> {
        self.context.database.delete_likes_for_tweet(tweet.id).await?;
        self.context.database.delete_tweet(tweet.id).await?;

        self.context
            .emit(SocialEvent::TweetDeleted { tweet_id: tweet.id });

        Ok(())
    }

    async fn retweet_by(
        &self,
        username: &str,
        tweet_id: PrimaryKey,
    ) -> SocialResult<Option<TweetData>> {
        Ok(self
            .context
            .database
            .list_retweets(tweet_id)
            .await?
            .into_iter()
            .find(|t| t.author == username))
    }

    async fn views(
        &self,
        tweets: Vec<TweetData>,
        viewer: Option<&str>,
    ) -> SocialResult<Vec<TweetView>> {
        let mut views = Vec::with_capacity(tweets.len());

        for tweet in tweets {
            views.push(self.view(tweet, viewer).await?);
        }

        Ok(views)
    }

    async fn view(&self, tweet: TweetData, viewer: Option<&str>) -> SocialResult<TweetView> {
        let database = &self.context.database;

        let likers = database.list_likers(tweet.id).await?;
        let retweets = database.list_retweets(tweet.id).await?;
        let replies = database.list_replies(tweet.id).await?;

        let original = match tweet.retweet_of_id {
            Some(id) => match database.tweet_by_id(id).await {
                Ok(original) => Some(original),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e.into()),
            },
            None => None,
        };

        let is_viewer = |u: &str| viewer.map(|v| v == u).unwrap_or(false);

        Ok(TweetView {
            like_count: likers.len(),
            retweet_count: retweets.len(),
            reply_count: replies.len(),
            liked: likers.iter().any(|u| is_viewer(u.as_str())),
            retweeted: retweets.iter().any(|t| is_viewer(t.author.as_str())),
            original,
            tweet,
        })
    }
}

fn page_size(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(TWEET_PAGE_SIZE)
        .clamp(1, MAX_TWEET_PAGE_SIZE)
}
