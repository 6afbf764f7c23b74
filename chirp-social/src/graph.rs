use crate::{
    profiles::resolve_users, DatabaseError, FriendshipData, FriendshipStatus, NewFriendship,
    NotificationContent, NotificationKind, PrimaryKey, SocialContext, SocialError, SocialResult,
    UserData,
};

/// Follows and friendships between users
pub struct Graph {
    context: SocialContext,
}

/// Orders a pair of usernames the way friendships are stored
pub fn canonical_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl FriendshipData {
    /// The member of the pair that isn't `username`
    pub fn other(&self, username: &str) -> &str {
        if self.user_a == username {
            &self.user_b
        } else {
            &self.user_a
        }
    }

    pub fn involves(&self, username: &str) -> bool {
        self.user_a == username || self.user_b == username
    }
}

impl Graph {
    pub fn new(context: &SocialContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn follow(&self, follower: &str, followee: &str) -> SocialResult<()> {
        if follower == followee {
            return Err(SocialError::invalid("You can't follow yourself"));
        }

        self.context.database.user_by_username(followee).await?;
        self.context
            .database
            .create_follow(follower, followee)
            .await?;

        self.context
            .notify_quietly(
                followee,
                NotificationKind::Follow,
                NotificationContent::new(follower, format!("@{} followed you", follower)),
            )
            .await;

        Ok(())
    }

    pub async fn unfollow(&self, follower: &str, followee: &str) -> SocialResult<()> {
        Ok(self
            .context
            .database
            .delete_follow(follower, followee)
            .await?)
    }

    pub async fn followers(&self, username: &str) -> SocialResult<Vec<UserData>> {
        self.context.database.user_by_username(username).await?;
        let usernames = self.context.database.list_followers(username).await?;

        resolve_users(&self.context, &usernames).await
    }

    pub async fn following(&self, username: &str) -> SocialResult<Vec<UserData>> {
        self.context.database.user_by_username(username).await?;
        let usernames = self.context.database.list_following(username).await?;

        resolve_users(&self.context, &usernames).await
    }

    /// Sends a friend request to another user
    pub async fn request_friendship(
        &self,
        requester: &str,
        other: &str,
    ) -> SocialResult<FriendshipData> {
        if requester == other {
            return Err(SocialError::invalid("You can't befriend yourself"));
        }

        self.context.database.user_by_username(other).await?;

        let (user_a, user_b) = canonical_pair(requester, other);
        let friendship = self
            .context
            .database
            .create_friendship(NewFriendship {
                user_a: user_a.to_string(),
                user_b: user_b.to_string(),
                requester: requester.to_string(),
            })
            .await?;

        self.context
            .notify_quietly(
                other,
                NotificationKind::FriendRequest,
                NotificationContent::new(
                    requester,
                    format!("@{} sent you a friend request", requester),
                )
                .with_friendship(friendship.id),
            )
            .await;

        Ok(friendship)
    }

    /// Accepts a pending request. Only the side that didn't send it can accept.
    pub async fn accept_friendship(
        &self,
        username: &str,
        friendship_id: PrimaryKey,
    ) -> SocialResult<FriendshipData> {
        let friendship = self.context.database.friendship_by_id(friendship_id).await?;

        if !friendship.involves(username) || friendship.requester == username {
            return Err(SocialError::forbidden("You can't accept this request"));
        }

        if friendship.status == FriendshipStatus::Accepted {
            return Err(DatabaseError::conflict("friendship", "status", "accepted").into());
        }

        let friendship = self
            .context
            .database
            .update_friendship_status(friendship_id, FriendshipStatus::Accepted)
            .await?;

        self.context
            .notify_quietly(
                &friendship.requester,
                NotificationKind::FriendAccepted,
                NotificationContent::new(
                    username,
                    format!("@{} accepted your friend request", username),
                )
                .with_friendship(friendship.id),
            )
            .await;

        Ok(friendship)
    }

    /// Declines a pending request or ends a friendship. Either side can do this.
    pub async fn remove_friendship(
        &self,
        username: &str,
        friendship_id: PrimaryKey,
    ) -> SocialResult<()> {
        let friendship = self.context.database.friendship_by_id(friendship_id).await?;

        if !friendship.involves(username) {
            return Err(SocialError::forbidden("Not your friendship"));
        }

        Ok(self
            .context
            .database
            .delete_friendship(friendship_id)
            .await?)
    }

    /// Friendships are stored once per pair, so both sides have to be queried
    async fn friendships_of(&self, username: &str) -> SocialResult<Vec<FriendshipData>> {
        let mut friendships = self.context.database.list_friendships_as_a(username).await?;
        friendships.extend(self.context.database.list_friendships_as_b(username).await?);

        Ok(friendships)
    }

    /// Accepted friends of a user
    pub async fn friends(&self, username: &str) -> SocialResult<Vec<UserData>> {
        self.context.database.user_by_username(username).await?;

        let mut usernames: Vec<String> = self
            .friendships_of(username)
            .await?
            .into_iter()
            .filter(|f| f.status == FriendshipStatus::Accepted)
            .map(|f| f.other(username).to_string())
            .collect();

        usernames.sort();
        resolve_users(&self.context, &usernames).await
    }

    /// Requests other users have sent to this user, which are still waiting for an answer
    pub async fn pending_requests(&self, username: &str) -> SocialResult<Vec<FriendshipData>> {
        let mut pending: Vec<_> = self
            .friendships_of(username)
            .await?
            .into_iter()
            .filter(|f| f.status == FriendshipStatus::Pending && f.requester != username)
            .collect();

        pending.sort_by_key(|f| f.created_at);
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{testing::TestSocial, SocialEvent};

    #[test]
    fn test_canonical_pair() {
        assert_eq!(canonical_pair("bob", "alice"), ("alice", "bob"));
        assert_eq!(canonical_pair("alice", "bob"), ("alice", "bob"));
    }

    #[tokio::test]
    async fn test_follow_rules() {
        let test = TestSocial::with_users(&["alice", "bob"]).await;
        let graph = &test.social.graph;

        assert!(matches!(
            graph.follow("alice", "alice").await,
            Err(SocialError::Invalid(_))
        ));
        assert!(matches!(
            graph.follow("alice", "nobody").await,
            Err(SocialError::Database(DatabaseError::NotFound { .. }))
        ));

        graph.follow("alice", "bob").await.unwrap();
        assert!(matches!(
            graph.follow("alice", "bob").await,
            Err(SocialError::Database(DatabaseError::Conflict { .. }))
        ));

        let followers = graph.followers("bob").await.unwrap();
        assert_eq!(followers[0].username, "alice");

        let events = test.drain_events();
        assert!(matches!(
            &events[..],
            [SocialEvent::NotificationCreated { notification }] if notification.username == "bob"
        ));

        graph.unfollow("alice", "bob").await.unwrap();
        assert!(graph.following("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_friendship_lifecycle() {
        let test = TestSocial::with_users(&["alice", "bob"]).await;
        let graph = &test.social.graph;

        let request = graph.request_friendship("bob", "alice").await.unwrap();
        assert_eq!(request.user_a, "alice");
        assert_eq!(request.user_b, "bob");

        assert!(matches!(
            graph.request_friendship("alice", "bob").await,
            Err(SocialError::Database(DatabaseError::Conflict { .. }))
        ));

        assert_eq!(graph.pending_requests("alice").await.unwrap().len(), 1);
        assert!(graph.pending_requests("bob").await.unwrap().is_empty());

        assert!(matches!(
            graph.accept_friendship("bob", request.id).await,
            Err(SocialError::Forbidden(_))
        ));

        graph.accept_friendship("alice", request.id).await.unwrap();

        let friends = graph.friends("bob").await.unwrap();
        assert_eq!(friends.len(), 1);
        assert_eq!(friends[0].username, "alice");
        assert_eq!(graph.friends("alice").await.unwrap()[0].username, "bob");

        graph.remove_friendship("bob", request.id).await.unwrap();
        assert!(graph.friends("alice").await.unwrap().is_empty());
    }
}
