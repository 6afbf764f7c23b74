use std::env;

use thiserror::Error;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

pub const DEFAULT_CHAT_MODEL: &str = "@cf/meta/llama-3.1-8b-instruct";
pub const DEFAULT_SPEECH_MODEL: &str = "@cf/openai/whisper-large-v3-turbo";
/// The model transcription falls back to when the configured one fails
pub const FALLBACK_SPEECH_MODEL: &str = "@cf/openai/whisper";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_CANVAS_BASE_URL: &str = "https://canvas.instructure.com/api/v1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a number, got \"{value}\"")]
    NotANumber { name: &'static str, value: String },
    #[error("{name} must be set when {other} is set")]
    Incomplete {
        name: &'static str,
        other: &'static str,
    },
}

/// The configuration of a chirp instance
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    /// When this is `None`, an in-memory store is used instead of postgres
    pub database_url: Option<String>,
    pub cloudflare: Option<CloudflareConfig>,
    pub gemini: Option<GeminiConfig>,
    pub canvas: Option<CanvasConfig>,
    pub livekit: Option<LiveKitConfig>,
    pub korn: KornConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Adds the Secure attribute to the session cookie
    pub secure_cookies: bool,
}

/// Cloudflare Workers AI, used for chat completion and speech-to-text
#[derive(Debug, Clone)]
pub struct CloudflareConfig {
    pub account_id: String,
    pub api_token: String,
    pub chat_model: String,
    pub speech_model: String,
}

/// Google Gemini, used for moderation
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct CanvasConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct LiveKitConfig {
    pub api_key: String,
    pub api_secret: String,
    /// The websocket url clients connect to
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct KornConfig {
    pub enabled: bool,
    /// The account the bot posts replies as
    pub bot_username: String,
    pub rate_limit_per_minute: u32,
}

impl Default for KornConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_username: "korn".to_string(),
            rate_limit_per_minute: 10,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            secure_cookies: false,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the configuration using the given lookup function.
    /// Empty values are treated as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match get("CHIRP_SERVER_PORT") {
            Some(value) => parse_number("CHIRP_SERVER_PORT", &value)?,
            None => DEFAULT_PORT,
        };

        let server = ServerConfig {
            port,
            secure_cookies: get("CHIRP_COOKIE_SECURE").map(is_truthy).unwrap_or(false),
        };

        let cloudflare = match (get("CLOUDFLARE_ACCOUNT_ID"), get("CLOUDFLARE_API_TOKEN")) {
            (Some(account_id), Some(api_token)) => Some(CloudflareConfig {
                account_id,
                api_token,
                chat_model: get("CLOUDFLARE_CHAT_MODEL")
                    .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
                speech_model: get("CLOUDFLARE_STT_MODEL")
                    .unwrap_or_else(|| DEFAULT_SPEECH_MODEL.to_string()),
            }),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    name: "CLOUDFLARE_API_TOKEN",
                    other: "CLOUDFLARE_ACCOUNT_ID",
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete {
                    name: "CLOUDFLARE_ACCOUNT_ID",
                    other: "CLOUDFLARE_API_TOKEN",
                })
            }
            (None, None) => None,
        };

        let gemini = get("GEMINI_API_KEY").map(|api_key| GeminiConfig {
            api_key,
            model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        });

        let canvas = get("CANVAS_API_KEY").map(|api_key| CanvasConfig {
            api_key,
            base_url: get("CANVAS_BASE_URL")
                .unwrap_or_else(|| DEFAULT_CANVAS_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        });

        let livekit = match (get("LIVEKIT_API_KEY"), get("LIVEKIT_API_SECRET")) {
            (Some(api_key), Some(api_secret)) => Some(LiveKitConfig {
                api_key,
                api_secret,
                url: get("LIVEKIT_URL").unwrap_or_default(),
            }),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    name: "LIVEKIT_API_SECRET",
                    other: "LIVEKIT_API_KEY",
                })
            }
            _ => None,
        };

        let defaults = KornConfig::default();
        let korn = KornConfig {
            enabled: get("KORN_AI_ENABLED").map(is_truthy).unwrap_or(false),
            bot_username: get("KORN_BOT_USERNAME").unwrap_or(defaults.bot_username),
            rate_limit_per_minute: match get("KORN_RATE_LIMIT_PER_MINUTE") {
                Some(value) => parse_number("KORN_RATE_LIMIT_PER_MINUTE", &value)?,
                None => defaults.rate_limit_per_minute,
            },
        };

        Ok(Self {
            server,
            database_url: get("DATABASE_URL"),
            cloudflare,
            gemini,
            canvas,
            livekit,
            korn,
        })
    }
}

fn is_truthy(value: String) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_number<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::NotANumber {
            name,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.server.port, DEFAULT_PORT);
        assert!(config.database_url.is_none());
        assert!(config.cloudflare.is_none());
        assert!(config.gemini.is_none());
        assert!(!config.korn.enabled);
        assert_eq!(config.korn.bot_username, "korn");
    }

    #[test]
    fn test_integrations_are_enabled_by_their_keys() {
        let config = config_from(&[
            ("CLOUDFLARE_ACCOUNT_ID", "acc"),
            ("CLOUDFLARE_API_TOKEN", "tok"),
            ("GEMINI_API_KEY", "g"),
            ("CANVAS_API_KEY", "c"),
            ("CANVAS_BASE_URL", "https://school.test/api/v1/"),
            ("KORN_AI_ENABLED", "TRUE"),
        ])
        .unwrap();

        let cloudflare = config.cloudflare.unwrap();
        assert_eq!(cloudflare.chat_model, DEFAULT_CHAT_MODEL);
        assert_eq!(cloudflare.speech_model, DEFAULT_SPEECH_MODEL);
        assert_eq!(config.gemini.unwrap().model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.canvas.unwrap().base_url, "https://school.test/api/v1");
        assert!(config.korn.enabled);
    }

    #[test]
    fn test_invalid_values() {
        assert_eq!(
            config_from(&[("CHIRP_SERVER_PORT", "http")]).unwrap_err(),
            ConfigError::NotANumber {
                name: "CHIRP_SERVER_PORT",
                value: "http".to_string()
            }
        );

        assert!(matches!(
            config_from(&[("CLOUDFLARE_ACCOUNT_ID", "acc")]),
            Err(ConfigError::Incomplete { .. })
        ));
    }

    #[test]
    fn test_empty_values_are_missing() {
        let config = config_from(&[("DATABASE_URL", "  "), ("GEMINI_API_KEY", "")]).unwrap();

        assert!(config.database_url.is_none());
        assert!(config.gemini.is_none());
    }
}
