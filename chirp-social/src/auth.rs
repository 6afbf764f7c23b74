use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chirp_core::random_string;
use chrono::{Duration, Utc};
use rand::rngs::OsRng;
use std::time::Duration as StdDuration;
use thiserror::Error;

use crate::{DatabaseError, NewSession, NewUser, SessionData, SocialContext, UserData};

pub struct Auth {
    context: SocialContext,
    argon: Argon2<'static>,
    retry: RetryPolicy,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Username or password is incorrect
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
    #[error("HashError: {0}")]
    HashError(String),
}

/// How reading or creating a profile is retried
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Waited once after the first failure, twice after the second, and so on
    pub backoff: StdDuration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: StdDuration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> StdDuration {
        self.backoff * attempt
    }
}

/// An identity that was authenticated elsewhere, with its custom attributes
#[derive(Debug, Clone)]
pub struct Identity {
    pub username: String,
    pub name: String,
    pub photo_url: Option<String>,
}

impl Auth {
    const SESSION_DURATION_IN_DAYS: usize = 7;
    const TOKEN_LENGTH: usize = 32;

    pub fn new(context: &SocialContext) -> Self {
        Self {
            context: context.clone(),
            argon: Argon2::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Logs in a user, returning a new session
    pub async fn login(&self, credentials: Credentials) -> Result<SessionData, AuthError> {
        self.context
            .database
            .clear_expired_sessions()
            .await
            .map_err(AuthError::Db)?;

        let user = self
            .context
            .database
            .user_by_username(&credentials.username)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => AuthError::InvalidCredentials,
                err => AuthError::Db(err),
            })?;

        let stored_password = PasswordHash::parse(&user.password, Encoding::default())
            .map_err(|e| AuthError::HashError(e.to_string()))?;

        self.argon
            .verify_password(credentials.password.as_bytes(), &stored_password)
            .map_err(|_| AuthError::InvalidCredentials)?;

        let expires_at = Utc::now() + Duration::days(Self::SESSION_DURATION_IN_DAYS as i64);

        let new_session = NewSession {
            token: random_string(Self::TOKEN_LENGTH),
            username: user.username,
            expires_at,
        };

        self.context
            .database
            .create_session(new_session)
            .await
            .map_err(AuthError::Db)
    }

    /// Deletes the associated session, if it exists
    pub async fn logout(&self, token: &str) -> Result<(), DatabaseError> {
        self.context.database.delete_session_by_token(token).await
    }

    /// Creates a user with a password
    pub async fn register(&self, new_user: NewPlainUser) -> Result<UserData, AuthError> {
        let hashed_password = self.hash(&new_user.password)?;

        self.context
            .database
            .create_user(NewUser {
                username: new_user.username,
                password: hashed_password,
                name: new_user.name,
                photo_url: None,
            })
            .await
            .map_err(AuthError::Db)
    }

    /// Returns a session if it exists and hasn't expired
    pub async fn session(&self, token: &str) -> Result<SessionData, DatabaseError> {
        let session = self.context.database.session_by_token(token).await?;

        if session.expires_at <= Utc::now() {
            return Err(DatabaseError::not_found("session", "token"));
        }

        Ok(session)
    }

    /// Reads the profile of an identity, creating it on first sight.
    ///
    /// Internal errors are retried with a linear backoff.
    /// If another request creates the profile first, the profile is read again instead of failing.
    pub async fn bootstrap_profile(&self, identity: Identity) -> Result<UserData, AuthError> {
        let mut attempt = 1;

        loop {
            match self.read_or_create(&identity).await {
                Ok(user) => return Ok(user),
                Err(AuthError::Db(DatabaseError::Internal(e))) if attempt < self.retry.attempts => {
                    let delay = self.retry.delay_after(attempt);

                    log::warn!(
                        "Failed to bootstrap profile of {} (attempt {}), retrying in {:?}: {}",
                        identity.username,
                        attempt,
                        delay,
                        e
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn read_or_create(&self, identity: &Identity) -> Result<UserData, AuthError> {
        let database = &self.context.database;

        match database.user_by_username(&identity.username).await {
            Ok(user) => return Ok(user),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(AuthError::Db(e)),
        }

        // Externally authenticated users never log in with a password
        let unusable_password = self.hash(&random_string(Self::TOKEN_LENGTH))?;

        let created = database
            .create_user(NewUser {
                username: identity.username.clone(),
                password: unusable_password,
                name: identity.name.clone(),
                photo_url: identity.photo_url.clone(),
            })
            .await;

        match created {
            Ok(user) => {
                log::info!("Created profile for {}", user.username);
                Ok(user)
            }
            Err(DatabaseError::Conflict { .. }) => database
                .user_by_username(&identity.username)
                .await
                .map_err(AuthError::Db),
            Err(e) => Err(AuthError::Db(e)),
        }
    }

    fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::HashError(e.to_string()))
    }
}

#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug)]
pub struct NewPlainUser {
    pub username: String,
    pub password: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chirp_core::Config;

    use super::*;
    use crate::{testing::TestSocial, Database, Integrations, MemoryDatabase, Social};

    #[tokio::test]
    async fn test_register_then_login() {
        let test = TestSocial::with_users(&[]).await;
        let auth = &test.social.auth;

        auth.register(NewPlainUser {
            username: "alice".to_string(),
            password: "hunter22".to_string(),
            name: "Alice".to_string(),
        })
        .await
        .unwrap();

        let session = auth
            .login(Credentials {
                username: "alice".to_string(),
                password: "hunter22".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(session.token.len(), 32);
        assert_eq!(auth.session(&session.token).await.unwrap().user.username, "alice");

        let wrong = auth
            .login(Credentials {
                username: "alice".to_string(),
                password: "hunter23".to_string(),
            })
            .await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

        let unknown = auth
            .login(Credentials {
                username: "nobody".to_string(),
                password: "hunter22".to_string(),
            })
            .await;
        assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));

        auth.logout(&session.token).await.unwrap();
        assert!(auth.session(&session.token).await.is_err());
    }

    #[tokio::test]
    async fn test_bootstrap_reads_existing_profile() {
        let test = TestSocial::with_users(&["alice"]).await;

        let user = test
            .social
            .auth
            .bootstrap_profile(Identity {
                username: "alice".to_string(),
                name: "Someone Else".to_string(),
                photo_url: None,
            })
            .await
            .unwrap();

        assert_eq!(user.name, "ALICE");
    }

    fn flaky_social(failures: u32) -> Social {
        let database = MemoryDatabase::new();
        database.fail_next_lookups(failures);

        Social::new(Arc::new(database), Integrations::default(), Config::default())
    }

    fn instant_retry() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            backoff: StdDuration::ZERO,
        }
    }

    fn identity() -> Identity {
        Identity {
            username: "newcomer".to_string(),
            name: "New Comer".to_string(),
            photo_url: Some("https://img.test/a.png".to_string()),
        }
    }

    #[tokio::test]
    async fn test_bootstrap_reads_profile_created_concurrently() {
        let database = Arc::new(MemoryDatabase::new());
        database.race_next_create();

        let social = Social::new(database.clone(), Integrations::default(), Config::default());
        let user = social.auth.bootstrap_profile(identity()).await.unwrap();

        let stored = database.user_by_username("newcomer").await.unwrap();
        assert_eq!(user.name, "New Comer");
        assert_eq!(user.created_at, stored.created_at);
        assert_eq!(user.password, stored.password);
    }

    #[tokio::test]
    async fn test_bootstrap_retries_internal_errors() {
        let social = flaky_social(2);
        let auth = Auth::new(social.context()).with_retry(instant_retry());

        let user = auth.bootstrap_profile(identity()).await.unwrap();
        assert_eq!(user.photo_url.as_deref(), Some("https://img.test/a.png"));
    }

    #[tokio::test]
    async fn test_bootstrap_gives_up_after_attempts() {
        let social = flaky_social(3);
        let auth = Auth::new(social.context()).with_retry(instant_retry());

        let result = auth.bootstrap_profile(identity()).await;
        assert!(matches!(result, Err(AuthError::Db(DatabaseError::Internal(_)))));
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_after(1), StdDuration::from_secs(1));
        assert_eq!(policy.delay_after(2), StdDuration::from_secs(2));
    }
}
