//! Fakes and fixtures shared by the tests of this crate

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chirp_core::{
    AudioShape, ChatModel, ChatRequest, Classifier, Config, CourseCatalog, IntegrationError,
    IntegrationResult, ProxyResponse, RoomGrant, RoomTokenIssuer, SpeechToText, Transcript,
};
use parking_lot::Mutex;
use serde_json::Value;

use crate::{Database, Integrations, MemoryDatabase, NewUser, Social, SocialEvent};

pub struct TestSocial {
    pub social: Social,
}

impl TestSocial {
    pub async fn with_users(usernames: &[&str]) -> Self {
        Self::build(Config::default(), Integrations::default(), usernames).await
    }

    pub async fn build(config: Config, integrations: Integrations, usernames: &[&str]) -> Self {
        let database = Arc::new(MemoryDatabase::new());

        for username in usernames {
            database
                .create_user(NewUser {
                    username: username.to_string(),
                    password: "not a hash".to_string(),
                    name: username.to_uppercase(),
                    photo_url: None,
                })
                .await
                .unwrap();
        }

        Self {
            social: Social::new(database, integrations, config),
        }
    }

    pub fn drain_events(&self) -> Vec<SocialEvent> {
        self.social.events().try_iter().collect()
    }
}

/// Answers every prompt with the same text, or fails when there is none
#[derive(Default)]
pub struct FakeChat {
    pub reply: Option<String>,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl FakeChat {
    pub fn answering(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatModel for FakeChat {
    async fn complete(&self, request: ChatRequest) -> IntegrationResult<String> {
        self.requests.lock().push(request);

        self.reply.clone().ok_or(IntegrationError::Status {
            status: 500,
            body: "model unavailable".to_string(),
        })
    }
}

/// Only succeeds for one model and shape, recording every attempt
pub struct FakeSpeech {
    pub configured: String,
    pub accepts: Option<(String, AudioShape)>,
    pub attempts: Mutex<Vec<(String, AudioShape)>>,
}

impl FakeSpeech {
    pub fn new(configured: &str, accepts: Option<(&str, AudioShape)>) -> Self {
        Self {
            configured: configured.to_string(),
            accepts: accepts.map(|(m, s)| (m.to_string(), s)),
            attempts: Default::default(),
        }
    }
}

#[async_trait]
impl SpeechToText for FakeSpeech {
    fn configured_model(&self) -> &str {
        &self.configured
    }

    async fn transcribe(
        &self,
        model: &str,
        shape: AudioShape,
        _wav: &[u8],
    ) -> IntegrationResult<Transcript> {
        let attempt = (model.to_string(), shape);
        self.attempts.lock().push(attempt.clone());

        if self.accepts.as_ref() == Some(&attempt) {
            return Ok(Transcript {
                text: "ignored".to_string(),
                segments: vec!["hello".to_string(), "there".to_string()],
            });
        }

        Err(IntegrationError::Status {
            status: 400,
            body: format!("{} rejected the audio", model),
        })
    }
}

pub struct FakeClassifier {
    pub response: IntegrationResult<Value>,
}

#[async_trait]
impl Classifier for FakeClassifier {
    async fn classify(&self, _prompt: &str, _schema: &Value) -> IntegrationResult<Value> {
        match &self.response {
            Ok(value) => Ok(value.clone()),
            Err(e) => Err(IntegrationError::Request(e.to_string())),
        }
    }
}

/// Serves canned JSON by path
#[derive(Default)]
pub struct FakeCatalog {
    pub routes: HashMap<String, Value>,
    pub requests: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn route(mut self, path: &str, body: Value) -> Self {
        self.routes.insert(path.to_string(), body);
        self
    }
}

#[async_trait]
impl CourseCatalog for FakeCatalog {
    async fn get(&self, path: &str, _query: Option<&str>) -> IntegrationResult<ProxyResponse> {
        self.requests.lock().push(path.to_string());

        Ok(match self.routes.get(path) {
            Some(body) => ProxyResponse {
                status: 200,
                content_type: Some("application/json".to_string()),
                body: body.to_string().into_bytes(),
            },
            None => ProxyResponse {
                status: 404,
                content_type: None,
                body: b"not found".to_vec(),
            },
        })
    }
}

pub struct FakeRooms;

impl RoomTokenIssuer for FakeRooms {
    fn issue(&self, grant: &RoomGrant) -> IntegrationResult<String> {
        Ok(format!("token:{}:{}", grant.room, grant.identity))
    }

    fn server_url(&self) -> &str {
        "wss://rooms.test"
    }
}
