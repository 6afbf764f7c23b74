use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::{
    CallData, CallNotificationData, CallStatus, Database, DatabaseError, FriendshipData,
    FriendshipStatus, MessageData, NewCall, NewCallNotification, NewCallParticipant,
    NewFriendship, NewMessage, NewNotification, NewSession, NewTweet, NewUser, NotificationData,
    ParticipantData, ParticipantStatus, PrimaryKey, Result, SessionData, TweetData, UpdatedUser,
    UserData,
};

/// Keeps everything in process memory.
/// Used when no database url is configured, and in tests.
#[derive(Default)]
pub struct MemoryDatabase {
    state: Mutex<State>,
    #[cfg(test)]
    lookup_failures: std::sync::atomic::AtomicU32,
    #[cfg(test)]
    create_races: std::sync::atomic::AtomicBool,
}

#[derive(Default)]
struct State {
    last_id: PrimaryKey,
    users: BTreeMap<String, UserData>,
    sessions: Vec<(PrimaryKey, NewSession)>,
    tweets: BTreeMap<PrimaryKey, TweetData>,
    likes: Vec<Edge>,
    follows: Vec<Edge>,
    friendships: BTreeMap<PrimaryKey, FriendshipData>,
    messages: Vec<MessageData>,
    notifications: BTreeMap<PrimaryKey, NotificationData>,
    calls: BTreeMap<PrimaryKey, CallData>,
    participants: Vec<ParticipantData>,
    call_notifications: Vec<CallNotificationData>,
}

/// A row in a join table
struct Edge {
    from: String,
    to: String,
    created_at: DateTime<Utc>,
}

impl State {
    fn next_id(&mut self) -> PrimaryKey {
        self.last_id += 1;
        self.last_id
    }

    fn user(&self, username: &str) -> Result<&UserData> {
        self.users
            .get(username)
            .ok_or(DatabaseError::not_found("user", "username"))
    }

    fn ensure_user(&self, username: &str) -> Result<()> {
        self.user(username).map(|_| ())
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next user lookups fail with an internal error
    #[cfg(test)]
    pub(crate) fn fail_next_lookups(&self, count: u32) {
        use std::sync::atomic::Ordering;
        self.lookup_failures.store(count, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn injected_failure(&self) -> Result<()> {
        use std::sync::atomic::Ordering;

        let remaining = self.lookup_failures.load(Ordering::SeqCst);
        if remaining == 0 {
            return Ok(());
        }

        self.lookup_failures.store(remaining - 1, Ordering::SeqCst);
        Err(DatabaseError::Internal("injected failure".into()))
    }

    #[cfg(not(test))]
    fn injected_failure(&self) -> Result<()> {
        Ok(())
    }

    /// Makes the next user creation lose a race: the row is stored, but a conflict is returned
    #[cfg(test)]
    pub(crate) fn race_next_create(&self) {
        use std::sync::atomic::Ordering;
        self.create_races.store(true, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn lost_race(&self) -> bool {
        use std::sync::atomic::Ordering;
        self.create_races.swap(false, Ordering::SeqCst)
    }

    #[cfg(not(test))]
    fn lost_race(&self) -> bool {
        false
    }
}

/// Newest first, with ties broken by id
fn newest_first<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> (DateTime<Utc>, PrimaryKey),
{
    items.sort_by_key(|i| std::cmp::Reverse(key(i)));
}

fn take(items: Vec<TweetData>, limit: i64) -> Vec<TweetData> {
    items.into_iter().take(limit.max(0) as usize).collect()
}

#[async_trait]
impl Database for MemoryDatabase {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        self.injected_failure()?;
        self.state.lock().user(username).cloned()
    }

    async fn user_by_mention(&self, username: &str) -> Result<UserData> {
        self.injected_failure()?;
        let state = self.state.lock();

        if let Some(user) = state.users.get(username) {
            return Ok(user.clone());
        }

        state
            .users
            .values()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned()
            .ok_or(DatabaseError::not_found("user", "username"))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        let mut state = self.state.lock();

        if state.users.contains_key(&new_user.username) {
            return Err(DatabaseError::conflict(
                "user",
                "username",
                &new_user.username,
            ));
        }

        let now = Utc::now();
        let user = UserData {
            username: new_user.username.clone(),
            password: new_user.password,
            name: new_user.name,
            description: None,
            location: None,
            website: None,
            photo_url: new_user.photo_url,
            header_url: None,
            is_premium: false,
            created_at: now,
            updated_at: now,
        };

        state.users.insert(new_user.username, user.clone());

        if self.lost_race() {
            return Err(DatabaseError::conflict("user", "username", &user.username));
        }

        Ok(user)
    }

    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData> {
        let mut state = self.state.lock();
        let user = state
            .users
            .get_mut(&updated_user.username)
            .ok_or(DatabaseError::not_found("user", "username"))?;

        if let Some(name) = updated_user.name {
            user.name = name;
        }

        user.description = updated_user.description.or(user.description.take());
        user.location = updated_user.location.or(user.location.take());
        user.website = updated_user.website.or(user.website.take());
        user.photo_url = updated_user.photo_url.or(user.photo_url.take());
        user.header_url = updated_user.header_url.or(user.header_url.take());
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    async fn search_users(&self, query: &str, limit: i64) -> Result<Vec<UserData>> {
        let needle = query.to_lowercase();
        let state = self.state.lock();

        Ok(state
            .users
            .values()
            .filter(|u| {
                u.username.to_lowercase().contains(&needle)
                    || u.name.to_lowercase().contains(&needle)
            })
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let state = self.state.lock();
        let (id, session) = state
            .sessions
            .iter()
            .find(|(_, s)| s.token == token)
            .ok_or(DatabaseError::not_found("session", "token"))?;

        Ok(SessionData {
            id: *id,
            token: session.token.clone(),
            expires_at: session.expires_at,
            user: state.user(&session.username)?.clone(),
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        let token = new_session.token.clone();

        {
            let mut state = self.state.lock();
            state.ensure_user(&new_session.username)?;

            if state.sessions.iter().any(|(_, s)| s.token == token) {
                return Err(DatabaseError::conflict("session", "token", &token));
            }

            let id = state.next_id();
            state.sessions.push((id, new_session));
        }

        self.session_by_token(&token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.sessions.len();
        state.sessions.retain(|(_, s)| s.token != token);

        if state.sessions.len() == before {
            return Err(DatabaseError::not_found("session", "token"));
        }

        Ok(())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        let now = Utc::now();
        self.state.lock().sessions.retain(|(_, s)| s.expires_at > now);
        Ok(())
    }

    async fn tweet_by_id(&self, tweet_id: PrimaryKey) -> Result<TweetData> {
        self.state
            .lock()
            .tweets
            .get(&tweet_id)
            .cloned()
            .ok_or(DatabaseError::not_found("tweet", "id"))
    }

    async fn create_tweet(&self, new_tweet: NewTweet) -> Result<TweetData> {
        let mut state = self.state.lock();
        state.ensure_user(&new_tweet.author)?;

        if let Some(original) = new_tweet.retweet_of_id {
            let duplicate = state.tweets.values().any(|t| {
                t.is_retweet && t.author == new_tweet.author && t.retweet_of_id == Some(original)
            });

            if duplicate {
                return Err(DatabaseError::conflict("retweet", "tweet_id", original));
            }
        }

        let id = state.next_id();
        let tweet = TweetData {
            id,
            is_reply: new_tweet.is_reply(),
            is_retweet: new_tweet.is_retweet(),
            text: new_tweet.text,
            photo_url: new_tweet.photo_url,
            author: new_tweet.author,
            replied_to_id: new_tweet.replied_to_id,
            retweet_of_id: new_tweet.retweet_of_id,
            created_at: Utc::now(),
        };

        state.tweets.insert(id, tweet.clone());
        Ok(tweet)
    }

    async fn delete_tweet(&self, tweet_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();

        state
            .tweets
            .remove(&tweet_id)
            .ok_or(DatabaseError::not_found("tweet", "id"))?;

        let id = tweet_id.to_string();
        state.likes.retain(|l| l.to != id);

        for tweet in state.tweets.values_mut() {
            if tweet.replied_to_id == Some(tweet_id) {
                tweet.is_reply = false;
                tweet.replied_to_id = None;
            }
            if tweet.retweet_of_id == Some(tweet_id) {
                tweet.is_retweet = false;
                tweet.retweet_of_id = None;
            }
        }

        Ok(())
    }

    async fn list_tweets_by_authors(
        &self,
        authors: &[String],
        before: Option<PrimaryKey>,
        limit: i64,
    ) -> Result<Vec<TweetData>> {
        let state = self.state.lock();
        let mut tweets: Vec<_> = state
            .tweets
            .values()
            .filter(|t| authors.contains(&t.author))
            .filter(|t| before.map(|b| t.id < b).unwrap_or(true))
            .cloned()
            .collect();

        newest_first(&mut tweets, |t| (t.created_at, t.id));
        Ok(take(tweets, limit))
    }

    async fn list_replies(&self, tweet_id: PrimaryKey) -> Result<Vec<TweetData>> {
        Ok(self
            .state
            .lock()
            .tweets
            .values()
            .filter(|t| t.replied_to_id == Some(tweet_id))
            .cloned()
            .collect())
    }

    async fn list_retweets(&self, tweet_id: PrimaryKey) -> Result<Vec<TweetData>> {
        Ok(self
            .state
            .lock()
            .tweets
            .values()
            .filter(|t| t.retweet_of_id == Some(tweet_id))
            .cloned()
            .collect())
    }

    async fn count_tweets_by_author(&self, author: &str) -> Result<i64> {
        Ok(self
            .state
            .lock()
            .tweets
            .values()
            .filter(|t| t.author == author)
            .count() as i64)
    }

    async fn create_like(&self, username: &str, tweet_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_user(username)?;

        if !state.tweets.contains_key(&tweet_id) {
            return Err(DatabaseError::not_found("tweet", "id"));
        }

        let id = tweet_id.to_string();
        if state.likes.iter().any(|l| l.from == username && l.to == id) {
            return Err(DatabaseError::conflict("like", "tweet_id", tweet_id));
        }

        state.likes.push(Edge {
            from: username.to_string(),
            to: id,
            created_at: Utc::now(),
        });

        Ok(())
    }

    async fn delete_like(&self, username: &str, tweet_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        let id = tweet_id.to_string();
        let before = state.likes.len();
        state.likes.retain(|l| !(l.from == username && l.to == id));

        if state.likes.len() == before {
            return Err(DatabaseError::not_found("like", "tweet_id"));
        }

        Ok(())
    }

    async fn list_likers(&self, tweet_id: PrimaryKey) -> Result<Vec<String>> {
        let id = tweet_id.to_string();

        Ok(self
            .state
            .lock()
            .likes
            .iter()
            .filter(|l| l.to == id)
            .map(|l| l.from.clone())
            .collect())
    }

    async fn delete_likes_for_tweet(&self, tweet_id: PrimaryKey) -> Result<()> {
        let id = tweet_id.to_string();
        self.state.lock().likes.retain(|l| l.to != id);
        Ok(())
    }

    async fn create_follow(&self, follower: &str, followee: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_user(follower)?;
        state.ensure_user(followee)?;

        if state
            .follows
            .iter()
            .any(|f| f.from == follower && f.to == followee)
        {
            return Err(DatabaseError::conflict("follow", "followee", followee));
        }

        state.follows.push(Edge {
            from: follower.to_string(),
            to: followee.to_string(),
            created_at: Utc::now(),
        });

        Ok(())
    }

    async fn delete_follow(&self, follower: &str, followee: &str) -> Result<()> {
        let mut state = self.state.lock();
        let before = state.follows.len();
        state
            .follows
            .retain(|f| !(f.from == follower && f.to == followee));

        if state.follows.len() == before {
            return Err(DatabaseError::not_found("follow", "followee"));
        }

        Ok(())
    }

    async fn list_followers(&self, username: &str) -> Result<Vec<String>> {
        let state = self.state.lock();
        let mut edges: Vec<_> = state.follows.iter().filter(|f| f.to == username).collect();
        edges.sort_by_key(|f| f.created_at);

        Ok(edges.into_iter().map(|f| f.from.clone()).collect())
    }

    async fn list_following(&self, username: &str) -> Result<Vec<String>> {
        let state = self.state.lock();
        let mut edges: Vec<_> = state
            .follows
            .iter()
            .filter(|f| f.from == username)
            .collect();
        edges.sort_by_key(|f| f.created_at);

        Ok(edges.into_iter().map(|f| f.to.clone()).collect())
    }

    async fn friendship_by_id(&self, friendship_id: PrimaryKey) -> Result<FriendshipData> {
        self.state
            .lock()
            .friendships
            .get(&friendship_id)
            .cloned()
            .ok_or(DatabaseError::not_found("friendship", "id"))
    }

    async fn friendship_by_pair(&self, user_a: &str, user_b: &str) -> Result<FriendshipData> {
        self.state
            .lock()
            .friendships
            .values()
            .find(|f| f.user_a == user_a && f.user_b == user_b)
            .cloned()
            .ok_or(DatabaseError::not_found("friendship", "pair"))
    }

    async fn create_friendship(&self, new_friendship: NewFriendship) -> Result<FriendshipData> {
        let mut state = self.state.lock();
        state.ensure_user(&new_friendship.user_a)?;
        state.ensure_user(&new_friendship.user_b)?;

        if state
            .friendships
            .values()
            .any(|f| f.user_a == new_friendship.user_a && f.user_b == new_friendship.user_b)
        {
            return Err(DatabaseError::conflict(
                "friendship",
                "pair",
                format!("{}/{}", new_friendship.user_a, new_friendship.user_b),
            ));
        }

        let id = state.next_id();
        let friendship = FriendshipData {
            id,
            user_a: new_friendship.user_a,
            user_b: new_friendship.user_b,
            requester: new_friendship.requester,
            status: FriendshipStatus::Pending,
            created_at: Utc::now(),
        };

        state.friendships.insert(id, friendship.clone());
        Ok(friendship)
    }

    async fn update_friendship_status(
        &self,
        friendship_id: PrimaryKey,
        status: FriendshipStatus,
    ) -> Result<FriendshipData> {
        let mut state = self.state.lock();
        let friendship = state
            .friendships
            .get_mut(&friendship_id)
            .ok_or(DatabaseError::not_found("friendship", "id"))?;

        friendship.status = status;
        Ok(friendship.clone())
    }

    async fn delete_friendship(&self, friendship_id: PrimaryKey) -> Result<()> {
        self.state
            .lock()
            .friendships
            .remove(&friendship_id)
            .map(|_| ())
            .ok_or(DatabaseError::not_found("friendship", "id"))
    }

    async fn list_friendships_as_a(&self, username: &str) -> Result<Vec<FriendshipData>> {
        Ok(self
            .state
            .lock()
            .friendships
            .values()
            .filter(|f| f.user_a == username)
            .cloned()
            .collect())
    }

    async fn list_friendships_as_b(&self, username: &str) -> Result<Vec<FriendshipData>> {
        Ok(self
            .state
            .lock()
            .friendships
            .values()
            .filter(|f| f.user_b == username)
            .cloned()
            .collect())
    }

    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData> {
        let mut state = self.state.lock();
        state.ensure_user(&new_message.sender)?;
        state.ensure_user(&new_message.recipient)?;

        let message = MessageData {
            id: state.next_id(),
            text: new_message.text,
            photo_url: new_message.photo_url,
            sender: new_message.sender,
            recipient: new_message.recipient,
            created_at: Utc::now(),
        };

        state.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages_between(&self, a: &str, b: &str) -> Result<Vec<MessageData>> {
        Ok(self
            .state
            .lock()
            .messages
            .iter()
            .filter(|m| {
                (m.sender == a && m.recipient == b) || (m.sender == b && m.recipient == a)
            })
            .cloned()
            .collect())
    }

    async fn list_messages_involving(&self, username: &str) -> Result<Vec<MessageData>> {
        let mut messages: Vec<_> = self
            .state
            .lock()
            .messages
            .iter()
            .filter(|m| m.sender == username || m.recipient == username)
            .cloned()
            .collect();

        newest_first(&mut messages, |m| (m.created_at, m.id));
        Ok(messages)
    }

    async fn create_notification(
        &self,
        new_notification: NewNotification,
    ) -> Result<NotificationData> {
        let mut state = self.state.lock();
        state.ensure_user(&new_notification.username)?;

        let id = state.next_id();
        let notification = NotificationData {
            id,
            username: new_notification.username,
            kind: new_notification.kind,
            content: new_notification.content,
            is_read: false,
            created_at: Utc::now(),
        };

        state.notifications.insert(id, notification.clone());
        Ok(notification)
    }

    async fn notification_by_id(&self, notification_id: PrimaryKey) -> Result<NotificationData> {
        self.state
            .lock()
            .notifications
            .get(&notification_id)
            .cloned()
            .ok_or(DatabaseError::not_found("notification", "id"))
    }

    async fn list_notifications(
        &self,
        username: &str,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<NotificationData>> {
        let mut notifications: Vec<_> = self
            .state
            .lock()
            .notifications
            .values()
            .filter(|n| n.username == username && (!unread_only || !n.is_read))
            .cloned()
            .collect();

        newest_first(&mut notifications, |n| (n.created_at, n.id));
        notifications.truncate(limit.max(0) as usize);

        Ok(notifications)
    }

    async fn mark_notification_read(&self, notification_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        let notification = state
            .notifications
            .get_mut(&notification_id)
            .ok_or(DatabaseError::not_found("notification", "id"))?;

        notification.is_read = true;
        Ok(())
    }

    async fn mark_all_notifications_read(&self, username: &str) -> Result<u64> {
        let mut state = self.state.lock();
        let mut marked = 0;

        for notification in state.notifications.values_mut() {
            if notification.username == username && !notification.is_read {
                notification.is_read = true;
                marked += 1;
            }
        }

        Ok(marked)
    }

    async fn create_call(&self, new_call: NewCall) -> Result<CallData> {
        let mut state = self.state.lock();
        state.ensure_user(&new_call.caller)?;

        if state
            .calls
            .values()
            .any(|c| c.room_name == new_call.room_name)
        {
            return Err(DatabaseError::conflict(
                "call",
                "room_name",
                &new_call.room_name,
            ));
        }

        let id = state.next_id();
        let call = CallData {
            id,
            room_name: new_call.room_name,
            caller: new_call.caller,
            status: CallStatus::Initiating,
            created_at: Utc::now(),
            ended_at: None,
        };

        state.calls.insert(id, call.clone());
        Ok(call)
    }

    async fn call_by_id(&self, call_id: PrimaryKey) -> Result<CallData> {
        self.state
            .lock()
            .calls
            .get(&call_id)
            .cloned()
            .ok_or(DatabaseError::not_found("call", "id"))
    }

    async fn update_call_status(
        &self,
        call_id: PrimaryKey,
        status: CallStatus,
        ended_at: Option<DateTime<Utc>>,
    ) -> Result<CallData> {
        let mut state = self.state.lock();
        let call = state
            .calls
            .get_mut(&call_id)
            .ok_or(DatabaseError::not_found("call", "id"))?;

        call.status = status;
        call.ended_at = ended_at.or(call.ended_at);

        Ok(call.clone())
    }

    async fn create_call_participant(
        &self,
        new_participant: NewCallParticipant,
    ) -> Result<ParticipantData> {
        let mut state = self.state.lock();
        state.ensure_user(&new_participant.username)?;

        if !state.calls.contains_key(&new_participant.call_id) {
            return Err(DatabaseError::not_found("call", "id"));
        }

        if state
            .participants
            .iter()
            .any(|p| p.call_id == new_participant.call_id && p.username == new_participant.username)
        {
            return Err(DatabaseError::conflict(
                "participant",
                "username",
                &new_participant.username,
            ));
        }

        let participant = ParticipantData {
            call_id: new_participant.call_id,
            username: new_participant.username,
            status: new_participant.status,
            updated_at: Utc::now(),
        };

        state.participants.push(participant.clone());
        Ok(participant)
    }

    async fn update_participant_status(
        &self,
        call_id: PrimaryKey,
        username: &str,
        status: ParticipantStatus,
    ) -> Result<ParticipantData> {
        let mut state = self.state.lock();
        let participant = state
            .participants
            .iter_mut()
            .find(|p| p.call_id == call_id && p.username == username)
            .ok_or(DatabaseError::not_found("participant", "username"))?;

        participant.status = status;
        participant.updated_at = Utc::now();

        Ok(participant.clone())
    }

    async fn list_call_participants(&self, call_id: PrimaryKey) -> Result<Vec<ParticipantData>> {
        let mut participants: Vec<_> = self
            .state
            .lock()
            .participants
            .iter()
            .filter(|p| p.call_id == call_id)
            .cloned()
            .collect();

        participants.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(participants)
    }

    async fn create_call_notification(
        &self,
        new_notification: NewCallNotification,
    ) -> Result<CallNotificationData> {
        let mut state = self.state.lock();
        state.ensure_user(&new_notification.username)?;

        let notification = CallNotificationData {
            id: state.next_id(),
            call_id: new_notification.call_id,
            username: new_notification.username,
            caller: new_notification.caller,
            created_at: Utc::now(),
        };

        state.call_notifications.push(notification.clone());
        Ok(notification)
    }

    async fn list_call_notifications(&self, username: &str) -> Result<Vec<CallNotificationData>> {
        let mut notifications: Vec<_> = self
            .state
            .lock()
            .call_notifications
            .iter()
            .filter(|n| n.username == username)
            .cloned()
            .collect();

        newest_first(&mut notifications, |n| (n.created_at, n.id));
        Ok(notifications)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    async fn database_with_users(usernames: &[&str]) -> MemoryDatabase {
        let database = MemoryDatabase::new();

        for username in usernames {
            database
                .create_user(NewUser {
                    username: username.to_string(),
                    password: "hash".to_string(),
                    name: username.to_uppercase(),
                    photo_url: None,
                })
                .await
                .unwrap();
        }

        database
    }

    #[tokio::test]
    async fn test_duplicate_user_conflicts() {
        let database = database_with_users(&["alice"]).await;

        let result = database
            .create_user(NewUser {
                username: "alice".to_string(),
                password: "other".to_string(),
                name: "Other".to_string(),
                photo_url: None,
            })
            .await;

        assert!(matches!(result, Err(DatabaseError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_second_retweet_conflicts() {
        let database = database_with_users(&["alice", "bob"]).await;

        let original = database
            .create_tweet(NewTweet::original("alice", "hello", None))
            .await
            .unwrap();
        database
            .create_tweet(NewTweet::retweet("bob", original.id))
            .await
            .unwrap();

        let again = database
            .create_tweet(NewTweet::retweet("bob", original.id))
            .await;
        assert!(matches!(again, Err(DatabaseError::Conflict { .. })));

        assert!(database
            .create_tweet(NewTweet::retweet("alice", original.id))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_deleting_tweet_detaches_references() {
        let database = database_with_users(&["alice", "bob"]).await;

        let original = database
            .create_tweet(NewTweet::original("alice", "hello", None))
            .await
            .unwrap();
        let reply = database
            .create_tweet(NewTweet::reply("bob", "hi", None, original.id))
            .await
            .unwrap();
        database.create_like("bob", original.id).await.unwrap();

        database.delete_tweet(original.id).await.unwrap();

        let reply = database.tweet_by_id(reply.id).await.unwrap();
        assert!(!reply.is_reply);
        assert_eq!(reply.replied_to_id, None);
        assert!(database.list_likers(original.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timeline_ordering_and_cursor() {
        let database = database_with_users(&["alice"]).await;

        let mut ids = vec![];
        for text in ["one", "two", "three"] {
            let tweet = database
                .create_tweet(NewTweet::original("alice", text, None))
                .await
                .unwrap();
            ids.push(tweet.id);
        }

        let authors = vec!["alice".to_string()];
        let page = database
            .list_tweets_by_authors(&authors, None, 2)
            .await
            .unwrap();
        assert_eq!(page.iter().map(|t| t.id).collect::<Vec<_>>(), vec![ids[2], ids[1]]);

        let next = database
            .list_tweets_by_authors(&authors, Some(ids[1]), 2)
            .await
            .unwrap();
        assert_eq!(next.iter().map(|t| t.id).collect::<Vec<_>>(), vec![ids[0]]);
    }

    #[tokio::test]
    async fn test_expired_sessions_are_cleared() {
        let database = database_with_users(&["alice"]).await;

        database
            .create_session(NewSession {
                token: "old".to_string(),
                username: "alice".to_string(),
                expires_at: Utc::now() - Duration::hours(1),
            })
            .await
            .unwrap();

        database.clear_expired_sessions().await.unwrap();
        assert!(database.session_by_token("old").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_mark_all_notifications_read() {
        let database = database_with_users(&["alice"]).await;

        for _ in 0..2 {
            database
                .create_notification(NewNotification {
                    username: "alice".to_string(),
                    kind: crate::NotificationKind::Follow,
                    content: "{}".to_string(),
                })
                .await
                .unwrap();
        }

        assert_eq!(database.mark_all_notifications_read("alice").await.unwrap(), 2);
        assert_eq!(database.mark_all_notifications_read("alice").await.unwrap(), 0);
        assert!(database
            .list_notifications("alice", true, 10)
            .await
            .unwrap()
            .is_empty());
    }
}
