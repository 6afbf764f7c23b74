use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
    Json,
};
use chirp_social::{Credentials, NewPlainUser, SessionData, UserData};
use cookie::{time::Duration, Cookie, SameSite};

use crate::{
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{LoginSchema, RegisterSchema, ValidatedJson},
    serialized::{LoginResult, ToSerialized, User},
    Router,
};

pub const SESSION_COOKIE: &str = "chirp_session";
const SESSION_COOKIE_MAX_AGE: i64 = 60 * 60 * 24 * 7;

/// Wraps [SessionData] so [FromRequestParts] can be implemented for it
pub struct Session(pub SessionData);

impl Session {
    /// Returns the user of the session
    pub fn user(&self) -> UserData {
        self.0.user.clone()
    }

    pub fn username(&self) -> &str {
        &self.0.user.username
    }

    pub fn token(&self) -> &str {
        &self.0.token
    }
}

/// Reads the session token from the Authorization header, falling back to the session cookie
fn session_token(headers: &HeaderMap) -> ServerResult<Option<String>> {
    if let Some(authorization) = headers.get(header::AUTHORIZATION) {
        let value = authorization
            .to_str()
            .map_err(|_| ServerError::bad_request("Authorization must be Bearer"))?;

        let parts: Vec<_> = value.split_ascii_whitespace().collect();

        return match parts.as_slice() {
            ["Bearer", token] => Ok(Some(token.to_string())),
            _ => Err(ServerError::bad_request("Authorization must be Bearer")),
        };
    }

    let token = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(|c| c.ok())
        .find(|c| c.name() == SESSION_COOKIE)
        .map(|c| c.value_trimmed().to_string())
        .filter(|token| !token.is_empty());

    Ok(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    ServerContext: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let context = ServerContext::from_ref(state);

        let token = session_token(&parts.headers)?
            .ok_or(ServerError::Unauthorized("Missing authorization"))?;

        let session = context
            .social
            .auth
            .session(&token)
            .await
            .map_err(|_| ServerError::Unauthorized("Session does not exist"))?;

        Ok(Self(session))
    }
}

fn session_cookie(secure: bool, token: &str, max_age: i64) -> ServerResult<HeaderValue> {
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::seconds(max_age))
        .build();

    HeaderValue::from_str(&cookie.to_string())
        .map_err(|e| ServerError::Unknown(format!("Invalid session cookie: {}", e)))
}

fn secure_cookies(context: &ServerContext) -> bool {
    context.social.context().config.server.secure_cookies
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterSchema,
    responses(
        (status = 200, body = User),
        (status = 409, description = "Username is taken")
    )
)]
async fn register(
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<RegisterSchema>,
) -> ServerResult<Json<User>> {
    if !body.has_valid_username() {
        return Err(ServerError::bad_request(
            "Username can only contain letters, numbers, and underscores",
        ));
    }

    let user = context
        .social
        .auth
        .register(NewPlainUser {
            username: body.username,
            password: body.password,
            name: body.name,
        })
        .await?;

    Ok(Json(user.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginSchema,
    responses(
        (status = 200, body = LoginResult, description = "Also sets the session cookie"),
        (status = 401, description = "Invalid credentials")
    )
)]
async fn login(
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<LoginSchema>,
) -> ServerResult<impl IntoResponse> {
    let session = context
        .social
        .auth
        .login(Credentials {
            username: body.username,
            password: body.password,
        })
        .await?;

    let cookie = session_cookie(
        secure_cookies(&context),
        &session.token,
        SESSION_COOKIE_MAX_AGE,
    )?;
    let result: LoginResult = session.to_serialized();

    Ok((AppendHeaders([(header::SET_COOKIE, cookie)]), Json(result)))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Session was deleted and the cookie cleared")
    )
)]
async fn logout(session: Session, context: ServerContext) -> ServerResult<impl IntoResponse> {
    context.social.auth.logout(session.token()).await?;

    let cookie = session_cookie(secure_cookies(&context), "", 0)?;
    Ok(AppendHeaders([(header::SET_COOKIE, cookie)]))
}

#[utoipa::path(
    get,
    path = "/api/auth/user",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User),
        (status = 401, description = "Request refused because of missing authorization")
    )
)]
async fn user(session: Session) -> Json<User> {
    Json(session.user().to_serialized())
}

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/user", get(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_token_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers).unwrap(), None);

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; chirp_session=abc123"),
        );
        assert_eq!(session_token(&headers).unwrap().as_deref(), Some("abc123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(session_token(&headers).unwrap().as_deref(), Some("xyz"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert!(session_token(&headers).is_err());
    }

    #[test]
    fn test_session_cookie_parsing_edge_cases() {
        let token_from = |cookie: &'static str| {
            let mut headers = HeaderMap::new();
            headers.insert(header::COOKIE, HeaderValue::from_static(cookie));
            session_token(&headers).unwrap()
        };

        assert_eq!(token_from("chirp_session=\"abc123\"").as_deref(), Some("abc123"));
        assert_eq!(token_from(" chirp_session = abc123 ;theme=dark").as_deref(), Some("abc123"));
        assert_eq!(token_from("xchirp_session=abc123"), None);
        assert_eq!(token_from("chirp_session="), None);
        assert_eq!(token_from("garbage; chirp_session=abc123").as_deref(), Some("abc123"));
    }

    #[test]
    fn test_session_cookie_attributes() {
        let value = session_cookie(true, "abc123", 60).unwrap();
        let cookie = Cookie::parse(value.to_str().unwrap().to_string()).unwrap();

        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "abc123");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(60)));

        let cleared = session_cookie(false, "", 0).unwrap();
        let cleared = Cookie::parse(cleared.to_str().unwrap().to_string()).unwrap();
        assert_eq!(cleared.value(), "");
        assert_eq!(cleared.secure(), None);
        assert_eq!(cleared.max_age(), Some(Duration::ZERO));
    }
}
