use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::PgPoolOptions, query, query_as, query_scalar, Error as SqlxError, FromRow, PgPool,
};

use crate::{
    CallData, CallNotificationData, CallStatus, Database, DatabaseError, DatabaseResult,
    FriendshipData, FriendshipStatus, IntoDatabaseError, MessageData, NewCall,
    NewCallNotification, NewCallParticipant, NewFriendship, NewMessage, NewNotification,
    NewSession, NewTweet, NewUser, NotificationData, ParticipantData, ParticipantStatus,
    PrimaryKey, Result, SessionData, TweetData, UpdatedUser, UserData,
};

/// A postgres database implementation for chirp
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Connects and runs any pending migrations
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| e.any())?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: PrimaryKey,
    token: String,
    expires_at: DateTime<Utc>,
    #[sqlx(flatten)]
    user: UserData,
}

#[derive(FromRow)]
struct FriendshipRow {
    id: PrimaryKey,
    user_a: String,
    user_b: String,
    requester: String,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct NotificationRow {
    id: PrimaryKey,
    username: String,
    kind: String,
    content: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct CallRow {
    id: PrimaryKey,
    room_name: String,
    caller: String,
    status: String,
    created_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

#[derive(FromRow)]
struct ParticipantRow {
    call_id: PrimaryKey,
    username: String,
    status: String,
    updated_at: DateTime<Utc>,
}

fn parse_text<T>(value: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse().map_err(|e: String| DatabaseError::Internal(e.into()))
}

impl TryFrom<FriendshipRow> for FriendshipData {
    type Error = DatabaseError;

    fn try_from(row: FriendshipRow) -> Result<Self> {
        Ok(Self {
            status: parse_text(&row.status)?,
            id: row.id,
            user_a: row.user_a,
            user_b: row.user_b,
            requester: row.requester,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<NotificationRow> for NotificationData {
    type Error = DatabaseError;

    fn try_from(row: NotificationRow) -> Result<Self> {
        Ok(Self {
            kind: parse_text(&row.kind)?,
            id: row.id,
            username: row.username,
            content: row.content,
            is_read: row.is_read,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<CallRow> for CallData {
    type Error = DatabaseError;

    fn try_from(row: CallRow) -> Result<Self> {
        Ok(Self {
            status: parse_text(&row.status)?,
            id: row.id,
            room_name: row.room_name,
            caller: row.caller,
            created_at: row.created_at,
            ended_at: row.ended_at,
        })
    }
}

impl TryFrom<ParticipantRow> for ParticipantData {
    type Error = DatabaseError;

    fn try_from(row: ParticipantRow) -> Result<Self> {
        Ok(Self {
            status: parse_text(&row.status)?,
            call_id: row.call_id,
            username: row.username,
            updated_at: row.updated_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = DatabaseError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Escapes LIKE wildcards so user input is matched literally
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");

    format!("%{}%", escaped)
}

#[async_trait]
impl Database for PgDatabase {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn user_by_username(&self, username: &str) -> Result<UserData> {
        query_as::<_, UserData>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "username"))
    }

    async fn user_by_mention(&self, username: &str) -> Result<UserData> {
        query_as::<_, UserData>(
            "SELECT * FROM users
            WHERE lower(username) = lower($1)
            ORDER BY username = $1 DESC, username
            LIMIT 1",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("user", "username"))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        self.user_by_username(&new_user.username)
            .await
            .conflict_or_ok("user", "username", &new_user.username)?;

        query_as::<_, UserData>(
            "INSERT INTO users (username, password, name, photo_url) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(&new_user.username)
        .bind(&new_user.password)
        .bind(&new_user.name)
        .bind(&new_user.photo_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn update_user(&self, updated_user: UpdatedUser) -> Result<UserData> {
        let user = self.user_by_username(&updated_user.username).await?;

        query_as::<_, UserData>(
            "UPDATE users SET
                name = $1,
                description = $2,
                location = $3,
                website = $4,
                photo_url = $5,
                header_url = $6,
                updated_at = now()
            WHERE username = $7
            RETURNING *",
        )
        .bind(updated_user.name.unwrap_or(user.name))
        .bind(updated_user.description.or(user.description))
        .bind(updated_user.location.or(user.location))
        .bind(updated_user.website.or(user.website))
        .bind(updated_user.photo_url.or(user.photo_url))
        .bind(updated_user.header_url.or(user.header_url))
        .bind(&updated_user.username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn search_users(&self, search: &str, limit: i64) -> Result<Vec<UserData>> {
        query_as::<_, UserData>(
            "SELECT * FROM users
            WHERE username ILIKE $1 OR name ILIKE $1
            ORDER BY username
            LIMIT $2",
        )
        .bind(like_pattern(search))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let row = query_as::<_, SessionRow>(
            "SELECT
                sessions.id,
                sessions.token,
                sessions.expires_at,
                users.*
            FROM sessions
                INNER JOIN users ON sessions.username = users.username
            WHERE token = $1",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("session", "token"))?;

        Ok(SessionData {
            id: row.id,
            token: row.token,
            expires_at: row.expires_at,
            user: row.user,
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.session_by_token(&new_session.token)
            .await
            .conflict_or_ok("session", "token", &new_session.token)?;

        query("INSERT INTO sessions (token, username, expires_at) VALUES ($1, $2, $3)")
            .bind(&new_session.token)
            .bind(&new_session.username)
            .bind(new_session.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.session_by_token(&new_session.token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        let result = query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("session", "token"));
        }

        Ok(())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        query("DELETE FROM sessions WHERE now() > expires_at")
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn tweet_by_id(&self, tweet_id: PrimaryKey) -> Result<TweetData> {
        query_as::<_, TweetData>("SELECT * FROM tweets WHERE id = $1")
            .bind(tweet_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("tweet", "id"))
    }

    async fn create_tweet(&self, new_tweet: NewTweet) -> Result<TweetData> {
        let is_reply = new_tweet.is_reply();
        let is_retweet = new_tweet.is_retweet();
        let retweet_of_id = new_tweet.retweet_of_id;

        query_as::<_, TweetData>(
            "INSERT INTO tweets
                (text, photo_url, is_retweet, is_reply, author, replied_to_id, retweet_of_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *",
        )
        .bind(new_tweet.text)
        .bind(new_tweet.photo_url)
        .bind(is_retweet)
        .bind(is_reply)
        .bind(new_tweet.author)
        .bind(new_tweet.replied_to_id)
        .bind(new_tweet.retweet_of_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            SqlxError::Database(db) if db.is_unique_violation() => DatabaseError::conflict(
                "retweet",
                "tweet_id",
                retweet_of_id.unwrap_or_default(),
            ),
            e => e.any(),
        })
    }

    async fn delete_tweet(&self, tweet_id: PrimaryKey) -> Result<()> {
        // Replies and retweets outlive the tweet as standalone tweets
        query(
            "UPDATE tweets SET
                is_reply = is_reply AND replied_to_id IS DISTINCT FROM $1,
                is_retweet = is_retweet AND retweet_of_id IS DISTINCT FROM $1
            WHERE replied_to_id = $1 OR retweet_of_id = $1",
        )
        .bind(tweet_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        let result = query("DELETE FROM tweets WHERE id = $1")
            .bind(tweet_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("tweet", "id"));
        }

        Ok(())
    }

    async fn list_tweets_by_authors(
        &self,
        authors: &[String],
        before: Option<PrimaryKey>,
        limit: i64,
    ) -> Result<Vec<TweetData>> {
        query_as::<_, TweetData>(
            "SELECT * FROM tweets
            WHERE author = ANY($1) AND ($2::INTEGER IS NULL OR id < $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3",
        )
        .bind(authors)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn list_replies(&self, tweet_id: PrimaryKey) -> Result<Vec<TweetData>> {
        query_as::<_, TweetData>(
            "SELECT * FROM tweets WHERE replied_to_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(tweet_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn list_retweets(&self, tweet_id: PrimaryKey) -> Result<Vec<TweetData>> {
        query_as::<_, TweetData>(
            "SELECT * FROM tweets WHERE retweet_of_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(tweet_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn count_tweets_by_author(&self, author: &str) -> Result<i64> {
        query_scalar::<_, i64>("SELECT COUNT(*) FROM tweets WHERE author = $1")
            .bind(author)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.any())
    }

    async fn create_like(&self, username: &str, tweet_id: PrimaryKey) -> Result<()> {
        let result = query(
            "INSERT INTO user_likes (username, tweet_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(username)
        .bind(tweet_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::conflict("like", "tweet_id", tweet_id));
        }

        Ok(())
    }

    async fn delete_like(&self, username: &str, tweet_id: PrimaryKey) -> Result<()> {
        let result = query("DELETE FROM user_likes WHERE username = $1 AND tweet_id = $2")
            .bind(username)
            .bind(tweet_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("like", "tweet_id"));
        }

        Ok(())
    }

    async fn list_likers(&self, tweet_id: PrimaryKey) -> Result<Vec<String>> {
        query_scalar::<_, String>(
            "SELECT username FROM user_likes WHERE tweet_id = $1 ORDER BY created_at",
        )
        .bind(tweet_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn delete_likes_for_tweet(&self, tweet_id: PrimaryKey) -> Result<()> {
        query("DELETE FROM user_likes WHERE tweet_id = $1")
            .bind(tweet_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn create_follow(&self, follower: &str, followee: &str) -> Result<()> {
        let result = query(
            "INSERT INTO user_follows (follower, followee) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(follower)
        .bind(followee)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::conflict("follow", "followee", followee));
        }

        Ok(())
    }

    async fn delete_follow(&self, follower: &str, followee: &str) -> Result<()> {
        let result = query("DELETE FROM user_follows WHERE follower = $1 AND followee = $2")
            .bind(follower)
            .bind(followee)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("follow", "followee"));
        }

        Ok(())
    }

    async fn list_followers(&self, username: &str) -> Result<Vec<String>> {
        query_scalar::<_, String>(
            "SELECT follower FROM user_follows WHERE followee = $1 ORDER BY created_at",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn list_following(&self, username: &str) -> Result<Vec<String>> {
        query_scalar::<_, String>(
            "SELECT followee FROM user_follows WHERE follower = $1 ORDER BY created_at",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn friendship_by_id(&self, friendship_id: PrimaryKey) -> Result<FriendshipData> {
        query_as::<_, FriendshipRow>("SELECT * FROM friendships WHERE id = $1")
            .bind(friendship_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("friendship", "id"))?
            .try_into()
    }

    async fn friendship_by_pair(&self, user_a: &str, user_b: &str) -> Result<FriendshipData> {
        query_as::<_, FriendshipRow>("SELECT * FROM friendships WHERE user_a = $1 AND user_b = $2")
            .bind(user_a)
            .bind(user_b)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("friendship", "pair"))?
            .try_into()
    }

    async fn create_friendship(&self, new_friendship: NewFriendship) -> Result<FriendshipData> {
        self.friendship_by_pair(&new_friendship.user_a, &new_friendship.user_b)
            .await
            .conflict_or_ok(
                "friendship",
                "pair",
                &format!("{}/{}", new_friendship.user_a, new_friendship.user_b),
            )?;

        query_as::<_, FriendshipRow>(
            "INSERT INTO friendships (user_a, user_b, requester, status)
            VALUES ($1, $2, $3, $4)
            RETURNING *",
        )
        .bind(&new_friendship.user_a)
        .bind(&new_friendship.user_b)
        .bind(&new_friendship.requester)
        .bind(FriendshipStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?
        .try_into()
    }

    async fn update_friendship_status(
        &self,
        friendship_id: PrimaryKey,
        status: FriendshipStatus,
    ) -> Result<FriendshipData> {
        query_as::<_, FriendshipRow>("UPDATE friendships SET status = $1 WHERE id = $2 RETURNING *")
            .bind(status.as_str())
            .bind(friendship_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("friendship", "id"))?
            .try_into()
    }

    async fn delete_friendship(&self, friendship_id: PrimaryKey) -> Result<()> {
        let result = query("DELETE FROM friendships WHERE id = $1")
            .bind(friendship_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("friendship", "id"));
        }

        Ok(())
    }

    async fn list_friendships_as_a(&self, username: &str) -> Result<Vec<FriendshipData>> {
        let rows = query_as::<_, FriendshipRow>(
            "SELECT * FROM friendships WHERE user_a = $1 ORDER BY created_at",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        convert_all(rows)
    }

    async fn list_friendships_as_b(&self, username: &str) -> Result<Vec<FriendshipData>> {
        let rows = query_as::<_, FriendshipRow>(
            "SELECT * FROM friendships WHERE user_b = $1 ORDER BY created_at",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        convert_all(rows)
    }

    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData> {
        query_as::<_, MessageData>(
            "INSERT INTO messages (text, photo_url, sender, recipient)
            VALUES ($1, $2, $3, $4)
            RETURNING *",
        )
        .bind(new_message.text)
        .bind(new_message.photo_url)
        .bind(new_message.sender)
        .bind(new_message.recipient)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn list_messages_between(&self, a: &str, b: &str) -> Result<Vec<MessageData>> {
        query_as::<_, MessageData>(
            "SELECT * FROM messages
            WHERE (sender = $1 AND recipient = $2) OR (sender = $2 AND recipient = $1)
            ORDER BY created_at ASC, id ASC",
        )
        .bind(a)
        .bind(b)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn list_messages_involving(&self, username: &str) -> Result<Vec<MessageData>> {
        query_as::<_, MessageData>(
            "SELECT * FROM messages
            WHERE sender = $1 OR recipient = $1
            ORDER BY created_at DESC, id DESC",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn create_notification(
        &self,
        new_notification: NewNotification,
    ) -> Result<NotificationData> {
        query_as::<_, NotificationRow>(
            "INSERT INTO notifications (username, kind, content) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(new_notification.username)
        .bind(new_notification.kind.as_str())
        .bind(new_notification.content)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?
        .try_into()
    }

    async fn notification_by_id(&self, notification_id: PrimaryKey) -> Result<NotificationData> {
        query_as::<_, NotificationRow>("SELECT * FROM notifications WHERE id = $1")
            .bind(notification_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("notification", "id"))?
            .try_into()
    }

    async fn list_notifications(
        &self,
        username: &str,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<NotificationData>> {
        let rows = query_as::<_, NotificationRow>(
            "SELECT * FROM notifications
            WHERE username = $1 AND (NOT $2 OR is_read = FALSE)
            ORDER BY created_at DESC, id DESC
            LIMIT $3",
        )
        .bind(username)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        convert_all(rows)
    }

    async fn mark_notification_read(&self, notification_id: PrimaryKey) -> Result<()> {
        let result = query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
            .bind(notification_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("notification", "id"));
        }

        Ok(())
    }

    async fn mark_all_notifications_read(&self, username: &str) -> Result<u64> {
        query("UPDATE notifications SET is_read = TRUE WHERE username = $1 AND is_read = FALSE")
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|r| r.rows_affected())
    }

    async fn create_call(&self, new_call: NewCall) -> Result<CallData> {
        query_as::<_, CallRow>(
            "INSERT INTO video_calls (room_name, caller, status) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&new_call.room_name)
        .bind(&new_call.caller)
        .bind(CallStatus::Initiating.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            SqlxError::Database(db) if db.is_unique_violation() => {
                DatabaseError::conflict("call", "room_name", &new_call.room_name)
            }
            e => e.any(),
        })?
        .try_into()
    }

    async fn call_by_id(&self, call_id: PrimaryKey) -> Result<CallData> {
        query_as::<_, CallRow>("SELECT * FROM video_calls WHERE id = $1")
            .bind(call_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("call", "id"))?
            .try_into()
    }

    async fn update_call_status(
        &self,
        call_id: PrimaryKey,
        status: CallStatus,
        ended_at: Option<DateTime<Utc>>,
    ) -> Result<CallData> {
        query_as::<_, CallRow>(
            "UPDATE video_calls SET status = $1, ended_at = COALESCE($2, ended_at)
            WHERE id = $3
            RETURNING *",
        )
        .bind(status.as_str())
        .bind(ended_at)
        .bind(call_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("call", "id"))?
        .try_into()
    }

    async fn create_call_participant(
        &self,
        new_participant: NewCallParticipant,
    ) -> Result<ParticipantData> {
        query_as::<_, ParticipantRow>(
            "INSERT INTO call_participants (call_id, username, status)
            VALUES ($1, $2, $3)
            RETURNING *",
        )
        .bind(new_participant.call_id)
        .bind(&new_participant.username)
        .bind(new_participant.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            SqlxError::Database(db) if db.is_unique_violation() => {
                DatabaseError::conflict("participant", "username", &new_participant.username)
            }
            e => e.any(),
        })?
        .try_into()
    }

    async fn update_participant_status(
        &self,
        call_id: PrimaryKey,
        username: &str,
        status: ParticipantStatus,
    ) -> Result<ParticipantData> {
        query_as::<_, ParticipantRow>(
            "UPDATE call_participants SET status = $1, updated_at = now()
            WHERE call_id = $2 AND username = $3
            RETURNING *",
        )
        .bind(status.as_str())
        .bind(call_id)
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("participant", "username"))?
        .try_into()
    }

    async fn list_call_participants(&self, call_id: PrimaryKey) -> Result<Vec<ParticipantData>> {
        let rows = query_as::<_, ParticipantRow>(
            "SELECT * FROM call_participants WHERE call_id = $1 ORDER BY username",
        )
        .bind(call_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        convert_all(rows)
    }

    async fn create_call_notification(
        &self,
        new_notification: NewCallNotification,
    ) -> Result<CallNotificationData> {
        query_as::<_, CallNotificationData>(
            "INSERT INTO call_notifications (call_id, username, caller)
            VALUES ($1, $2, $3)
            RETURNING *",
        )
        .bind(new_notification.call_id)
        .bind(new_notification.username)
        .bind(new_notification.caller)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())
    }

    async fn list_call_notifications(&self, username: &str) -> Result<Vec<CallNotificationData>> {
        query_as::<_, CallNotificationData>(
            "SELECT * FROM call_notifications WHERE username = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ali"), "%ali%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_unknown_status_is_internal_error() {
        let row = CallRow {
            id: 1,
            room_name: "call-1".to_string(),
            caller: "alice".to_string(),
            status: "exploded".to_string(),
            created_at: Utc::now(),
            ended_at: None,
        };

        assert!(matches!(
            CallData::try_from(row),
            Err(DatabaseError::Internal(_))
        ));
    }
}
