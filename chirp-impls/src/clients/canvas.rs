use async_trait::async_trait;
use chirp_core::{CanvasConfig, CourseCatalog, IntegrationError, IntegrationResult, ProxyResponse};
use log::debug;
use reqwest::{header, Client};

use super::{parse_error, request_error};

/// A Canvas LMS REST API client
pub struct CanvasClient {
    client: Client,
    config: CanvasConfig,
}

impl CanvasClient {
    pub fn new(config: CanvasConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str, query: Option<&str>) -> IntegrationResult<String> {
        let path = sanitize_path(path)?;
        let mut url = format!("{}/{}", self.config.base_url, path);

        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }

        Ok(url)
    }
}

/// Encodings of `.`, `/`, `\` and `%`, which a server may decode into a traversal
const ENCODED_SEPARATORS: [&str; 4] = ["%2e", "%2f", "%5c", "%25"];

/// Rejects paths that could escape the API base
fn sanitize_path(path: &str) -> IntegrationResult<&str> {
    let path = path.trim_start_matches('/');
    let lowercase = path.to_ascii_lowercase();

    let escapes = path.split('/').any(|s| s == ".." || s == ".")
        || path.contains("://")
        || path.contains(['\\', '?', '#'])
        || ENCODED_SEPARATORS.iter().any(|e| lowercase.contains(e));

    if escapes {
        return Err(IntegrationError::Request(format!("invalid path: {path}")));
    }

    Ok(path)
}

#[async_trait]
impl CourseCatalog for CanvasClient {
    async fn get(&self, path: &str, query: Option<&str>) -> IntegrationResult<ProxyResponse> {
        let url = self.url(path, query)?;
        debug!("Forwarding GET {path} to canvas");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.api_key)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(parse_error)?.to_vec();

        Ok(ProxyResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> CanvasClient {
        CanvasClient::new(CanvasConfig {
            base_url: "https://school.test/api/v1".to_string(),
            api_key: "key".to_string(),
        })
    }

    #[test]
    fn test_url() {
        let client = client();

        assert_eq!(
            client.url("/courses/1/modules", Some("per_page=100")).unwrap(),
            "https://school.test/api/v1/courses/1/modules?per_page=100"
        );
        assert_eq!(
            client.url("courses", Some("")).unwrap(),
            "https://school.test/api/v1/courses"
        );
    }

    #[test]
    fn test_escaping_paths_are_rejected() {
        let client = client();

        assert!(client.url("../admin", None).is_err());
        assert!(client.url("courses/./1", None).is_err());
        assert!(client.url("http://evil.test/x", None).is_err());

        for path in [
            "..\\users",
            "courses\\..\\..\\admin",
            "%2e%2e/users",
            "%2E%2E/users",
            ".%2e/users",
            "courses/%2e%2e%2fadmin",
            "courses/..%5Cadmin",
            "courses/%252e%252e/admin",
            "courses/1?as_user_id=2",
            "courses/1#fragment",
        ] {
            assert!(client.url(path, None).is_err(), "{path} was accepted");
        }

        assert_eq!(
            client.url("/courses/1/assignments", Some("per_page=10")).unwrap(),
            "https://school.test/api/v1/courses/1/assignments?per_page=10"
        );
    }
}
