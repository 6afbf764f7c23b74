use crate::{SocialContext, SocialResult, UpdatedUser, UserData};

/// How many users a search returns at most
pub const SEARCH_LIMIT: i64 = 20;

/// A user with counts of their relations, as seen by another user
#[derive(Debug, Clone)]
pub struct ProfileView {
    pub user: UserData,
    pub followers_count: usize,
    pub following_count: usize,
    pub tweets_count: i64,
    /// Whether the viewer follows this user
    pub followed_by_viewer: bool,
}

pub struct Profiles {
    context: SocialContext,
}

impl Profiles {
    pub fn new(context: &SocialContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn get(&self, username: &str, viewer: Option<&str>) -> SocialResult<ProfileView> {
        let database = &self.context.database;

        let user = database.user_by_username(username).await?;
        let followers = database.list_followers(username).await?;
        let following = database.list_following(username).await?;
        let tweets_count = database.count_tweets_by_author(username).await?;

        Ok(ProfileView {
            followed_by_viewer: viewer
                .map(|v| followers.iter().any(|f| f == v))
                .unwrap_or(false),
            followers_count: followers.len(),
            following_count: following.len(),
            tweets_count,
            user,
        })
    }

    pub async fn update(&self, updated_user: UpdatedUser) -> SocialResult<UserData> {
        Ok(self.context.database.update_user(updated_user).await?)
    }

    /// Case-insensitive search over usernames and names
    pub async fn search(&self, query: &str) -> SocialResult<Vec<UserData>> {
        let query = query.trim();

        if query.is_empty() {
            return Ok(vec![]);
        }

        Ok(self
            .context
            .database
            .search_users(query, SEARCH_LIMIT)
            .await?)
    }
}

/// Looks up every username, skipping users that no longer exist
pub(crate) async fn resolve_users(
    context: &SocialContext,
    usernames: &[String],
) -> SocialResult<Vec<UserData>> {
    let mut users = Vec::with_capacity(usernames.len());

    for username in usernames {
        match context.database.user_by_username(username).await {
            Ok(user) => users.push(user),
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(users)
}

#[cfg(test)]
mod tests {
    use crate::{testing::TestSocial, NewTweet, UpdatedUser};

    #[tokio::test]
    async fn test_profile_counts() {
        let test = TestSocial::with_users(&["alice", "bob", "carol"]).await;
        let social = &test.social;

        social.graph.follow("bob", "alice").await.unwrap();
        social.graph.follow("carol", "alice").await.unwrap();
        social.graph.follow("alice", "bob").await.unwrap();
        social
            .context()
            .database
            .create_tweet(NewTweet::original("alice", "hi", None))
            .await
            .unwrap();

        let profile = social.profiles.get("alice", Some("bob")).await.unwrap();
        assert_eq!(profile.followers_count, 2);
        assert_eq!(profile.following_count, 1);
        assert_eq!(profile.tweets_count, 1);
        assert!(profile.followed_by_viewer);

        let anonymous = social.profiles.get("alice", None).await.unwrap();
        assert!(!anonymous.followed_by_viewer);
    }

    #[tokio::test]
    async fn test_update_keeps_unset_fields() {
        let test = TestSocial::with_users(&["alice"]).await;
        let profiles = &test.social.profiles;

        profiles
            .update(UpdatedUser {
                username: "alice".to_string(),
                location: Some("Oslo".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let user = profiles
            .update(UpdatedUser {
                username: "alice".to_string(),
                description: Some("hello".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(user.location.as_deref(), Some("Oslo"));
        assert_eq!(user.description.as_deref(), Some("hello"));
        assert_eq!(user.name, "ALICE");
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let test = TestSocial::with_users(&["alice", "alfred", "bob"]).await;
        let profiles = &test.social.profiles;

        let found = profiles.search("AL").await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(profiles.search("  ").await.unwrap().is_empty());
    }
}
