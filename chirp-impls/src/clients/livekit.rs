use chirp_core::{IntegrationError, IntegrationResult, LiveKitConfig, RoomGrant, RoomTokenIssuer};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

/// Issues LiveKit access tokens
pub struct LiveKitTokens {
    config: LiveKitConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    iss: String,
    sub: String,
    jti: String,
    nbf: i64,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    video: VideoGrant,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoGrant {
    room_join: bool,
    room: String,
    can_publish: bool,
    can_subscribe: bool,
}

impl LiveKitTokens {
    const TOKEN_TTL_IN_HOURS: i64 = 6;

    pub fn new(config: LiveKitConfig) -> Self {
        Self { config }
    }
}

impl RoomTokenIssuer for LiveKitTokens {
    fn issue(&self, grant: &RoomGrant) -> IntegrationResult<String> {
        let now = Utc::now();

        let claims = AccessClaims {
            iss: self.config.api_key.clone(),
            sub: grant.identity.clone(),
            jti: grant.identity.clone(),
            nbf: now.timestamp(),
            exp: (now + Duration::hours(Self::TOKEN_TTL_IN_HOURS)).timestamp(),
            name: grant.name.clone(),
            video: VideoGrant {
                room_join: true,
                room: grant.room.clone(),
                can_publish: grant.can_publish,
                can_subscribe: grant.can_subscribe,
            },
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.api_secret.as_bytes()),
        )
        .map_err(|e| IntegrationError::Token(e.to_string()))
    }

    fn server_url(&self) -> &str {
        &self.config.url
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    use super::*;

    #[test]
    fn test_token_claims() {
        let tokens = LiveKitTokens::new(LiveKitConfig {
            api_key: "APIkey".to_string(),
            api_secret: "secret".to_string(),
            url: "wss://example.livekit.cloud".to_string(),
        });

        let token = tokens
            .issue(&RoomGrant::participant("call-abc", "alice"))
            .unwrap();

        let decoded = decode::<AccessClaims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();

        let claims = decoded.claims;
        assert_eq!(claims.iss, "APIkey");
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.video.room, "call-abc");
        assert!(claims.video.room_join);
        assert!(claims.video.can_publish);
        assert!(claims.exp > claims.nbf);
        assert_eq!(tokens.server_url(), "wss://example.livekit.cloud");
    }
}
