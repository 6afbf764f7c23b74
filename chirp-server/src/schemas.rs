use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use chirp_social::PrimaryKey;
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::errors::ServerError;

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginSchema {
    #[validate(length(max = 30))]
    pub username: String,
    #[validate(length(max = 64))]
    pub password: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterSchema {
    #[validate(length(min = 2, max = 30))]
    pub username: String,
    #[validate(length(min = 8, max = 64))]
    pub password: String,
    #[validate(length(min = 1, max = 50))]
    pub name: String,
}

impl RegisterSchema {
    /// Usernames are used in mentions, so they are limited to what a mention can contain
    pub fn has_valid_username(&self) -> bool {
        self.username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    }
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateProfileSchema {
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
    #[validate(length(max = 160))]
    pub description: Option<String>,
    #[validate(length(max = 30))]
    pub location: Option<String>,
    #[validate(url(message = "Invalid website URL"))]
    pub website: Option<String>,
    #[validate(url(message = "Invalid photo URL"))]
    pub photo_url: Option<String>,
    #[validate(url(message = "Invalid header URL"))]
    pub header_url: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewTweetSchema {
    #[validate(length(max = 280))]
    pub text: String,
    #[validate(url(message = "Invalid photo URL"))]
    pub photo_url: Option<String>,
    /// Makes the tweet a reply
    pub replied_to_id: Option<PrimaryKey>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewFriendshipSchema {
    #[validate(length(min = 1, max = 30))]
    pub username: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewMessageSchema {
    #[validate(length(min = 1, max = 30))]
    pub recipient: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub text: String,
    #[validate(url(message = "Invalid photo URL"))]
    pub photo_url: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KornMentionSchema {
    pub tweet_id: PrimaryKey,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KornSimpleSchema {
    #[validate(length(max = 2000))]
    pub message: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationSchema {
    #[validate(length(max = 5000))]
    pub text: String,
}

#[derive(Debug, ToSchema, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum VideoCallActionSchema {
    /// Starts a call and rings the callees
    Initiate { callees: Vec<String> },
    Accept {
        #[serde(rename = "callId")]
        call_id: PrimaryKey,
    },
    Decline {
        #[serde(rename = "callId")]
        call_id: PrimaryKey,
    },
    /// Ends the call for everyone
    End {
        #[serde(rename = "callId")]
        call_id: PrimaryKey,
    },
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Matched against usernames and names
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    /// Only return tweets older than the tweet with this id
    pub before: Option<PrimaryKey>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LiveKitQuery {
    pub room: String,
    /// Must be the user of the session when given
    pub username: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TranscribeQuery {
    /// The recording session the audio belongs to
    pub sid: String,
    #[serde(default)]
    pub seq: u64,
    /// Sample rate of raw PCM bodies
    pub rate: Option<usize>,
    /// Channel count of raw PCM bodies
    pub channels: Option<usize>,
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|e| ServerError::bad_request(e.body_text()))?;

        extracted_json
            .0
            .validate()
            .map_err(|e| ServerError::bad_request(format!("Request body is invalid: {}", e)))?;

        Ok(Self(extracted_json.0))
    }
}
