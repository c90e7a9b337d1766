//! Owner resolution. One [`IdentityResolver`] is installed per deployment:
//! locally signed tokens, a shared session store, or a remote user center.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, header};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use timemgt_types::ObjectId;
use timemgt_types::api::{Claims, Envelope};

use crate::error::ApiError;

pub const TOKEN_ISSUER: &str = "timemgt";
pub const TOKEN_TTL_DAYS: i64 = 15;

/// Path on the user center that answers "who is this token".
pub const IS_LOGIN_PATH: &str = "/v1/is-login";

const LOGIN_AGAIN: &str = "authentication failed, please log in again";
const STORE_UNAVAILABLE: &str = "session store unavailable";

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve the caller's owner id from request headers.
    async fn resolve(&self, headers: &HeaderMap) -> Result<ObjectId, ApiError>;

    fn name(&self) -> &'static str;
}

fn bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
        .ok_or_else(|| ApiError::Unauthorized("unknown authorization type".into()))
}

// -- Local tokens --

/// HS256 tokens signed with a shared secret; `sub` is the owner id.
pub struct JwtAuth {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtAuth {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::default();
        validation.set_issuer(&[TOKEN_ISSUER]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn issue(&self, uid: ObjectId) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: uid,
            iss: TOKEN_ISSUER.to_string(),
            exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
        };

        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }
}

#[async_trait]
impl IdentityResolver for JwtAuth {
    async fn resolve(&self, headers: &HeaderMap) -> Result<ObjectId, ApiError> {
        let token = bearer_token(headers)?;
        let claims = self.verify(&token).map_err(|e| {
            debug!("Rejected token: {}", e);
            ApiError::Unauthorized(LOGIN_AGAIN.into())
        })?;
        Ok(claims.sub)
    }

    fn name(&self) -> &'static str {
        "jwt"
    }
}

// -- Shared session store --

/// Opaque bearer tokens looked up in Redis; the stored value is the owner id.
///
/// One auto-reconnecting connection is opened on first use and shared by
/// every request. Connecting and each lookup are bounded by `timeout`.
pub struct SessionAuth {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
    key_prefix: String,
    timeout: Duration,
}

impl SessionAuth {
    pub fn new(client: redis::Client, key_prefix: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            conn: OnceCell::new(),
            key_prefix: key_prefix.into(),
            timeout,
        }
    }

    fn key(&self, token: &str) -> String {
        format!("{}{}", self.key_prefix, token)
    }

    async fn connection(&self) -> Result<ConnectionManager, ApiError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                match tokio::time::timeout(self.timeout, ConnectionManager::new(self.client.clone()))
                    .await
                {
                    Ok(res) => res.map_err(|e| e.to_string()),
                    Err(_) => Err(format!("connect timed out after {:?}", self.timeout)),
                }
            })
            .await
            .map_err(|e| {
                warn!("Failed to get Redis connection: {}", e);
                ApiError::Unauthorized(STORE_UNAVAILABLE.into())
            })?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl IdentityResolver for SessionAuth {
    async fn resolve(&self, headers: &HeaderMap) -> Result<ObjectId, ApiError> {
        let token = bearer_token(headers)?;
        let mut conn = self.connection().await?;

        let value: Option<String> = tokio::time::timeout(self.timeout, conn.get(self.key(&token)))
            .await
            .map_err(|_| {
                warn!("Session lookup timed out after {:?}", self.timeout);
                ApiError::Unauthorized(STORE_UNAVAILABLE.into())
            })?
            .map_err(|e| {
                warn!("Session lookup failed: {}", e);
                ApiError::Unauthorized(STORE_UNAVAILABLE.into())
            })?;

        let value = value.ok_or_else(|| ApiError::Unauthorized(LOGIN_AGAIN.into()))?;
        value.parse().map_err(|_| {
            warn!("Session value '{}' is not an owner id", value);
            ApiError::Unauthorized(LOGIN_AGAIN.into())
        })
    }

    fn name(&self) -> &'static str {
        "session"
    }
}

// -- Remote user center --

/// Delegates to a user center that answers with the standard envelope,
/// `data` holding the owner id.
pub struct RemoteAuth {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteAuth {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), IS_LOGIN_PATH),
        })
    }
}

#[async_trait]
impl IdentityResolver for RemoteAuth {
    async fn resolve(&self, headers: &HeaderMap) -> Result<ObjectId, ApiError> {
        let auth = headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| ApiError::Unauthorized("unknown authorization type".into()))?;

        let answer: Envelope<String> = self
            .client
            .get(&self.endpoint)
            .header(header::AUTHORIZATION, auth.clone())
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| {
                warn!("User center request failed: {}", e);
                ApiError::Unauthorized("user center unavailable".into())
            })?
            .json()
            .await
            .map_err(|e| {
                warn!("User center sent an unreadable answer: {}", e);
                ApiError::Unauthorized("user center unavailable".into())
            })?;

        if !answer.ok {
            return Err(ApiError::Unauthorized(
                answer.err_msg.unwrap_or_else(|| LOGIN_AGAIN.into()),
            ));
        }

        answer
            .data
            .as_deref()
            .and_then(|uid| uid.parse().ok())
            .ok_or_else(|| ApiError::Unauthorized(LOGIN_AGAIN.into()))
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn jwt_round_trip_resolves_subject() {
        let auth = JwtAuth::new("test-secret");
        let uid = ObjectId::new();
        let token = auth.issue(uid).unwrap();

        assert_eq!(auth.resolve(&bearer(&token)).await.unwrap(), uid);
    }

    #[tokio::test]
    async fn jwt_rejects_foreign_signature_and_missing_header() {
        let token = JwtAuth::new("one").issue(ObjectId::new()).unwrap();
        let auth = JwtAuth::new("two");

        assert!(matches!(
            auth.resolve(&bearer(&token)).await,
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            auth.resolve(&HeaderMap::new()).await,
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn session_keys_are_prefixed() {
        let client = redis::Client::open("redis://127.0.0.1:6379").unwrap();
        let auth = SessionAuth::new(client, "session:", Duration::from_secs(1));
        assert_eq!(auth.key("abc"), "session:abc");
    }

    #[tokio::test]
    async fn unreachable_session_store_is_unauthorized() {
        // nothing listens on port 1
        let client = redis::Client::open("redis://127.0.0.1:1").unwrap();
        let auth = SessionAuth::new(client, "", Duration::from_millis(500));

        let started = std::time::Instant::now();
        match auth.resolve(&bearer("tok")).await {
            Err(ApiError::Unauthorized(msg)) => assert_eq!(msg, STORE_UNAVAILABLE),
            other => panic!("expected Unauthorized, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(auth.conn.get().is_none());
    }

    mod remote {
        use super::*;
        use axum::{Json, Router, routing::get};

        /// Serves `answer` on the is-login path and returns the base URL.
        async fn user_center(answer: Envelope<String>) -> String {
            let app = Router::new().route(
                IS_LOGIN_PATH,
                get(move |headers: HeaderMap| {
                    let answer = answer.clone();
                    async move {
                        if headers.get(header::AUTHORIZATION).is_none() {
                            return Json(Envelope::fail("no token"));
                        }
                        Json(answer)
                    }
                }),
            );
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{}", addr)
        }

        #[tokio::test]
        async fn accepted_token_yields_owner() {
            let uid = ObjectId::new();
            let base = user_center(Envelope::ok(uid.to_hex())).await;
            let auth = RemoteAuth::new(&base, Duration::from_secs(5)).unwrap();

            assert_eq!(auth.resolve(&bearer("tok")).await.unwrap(), uid);
        }

        #[tokio::test]
        async fn refusal_carries_remote_message() {
            let base = user_center(Envelope::fail("token expired")).await;
            let auth = RemoteAuth::new(&base, Duration::from_secs(5)).unwrap();

            match auth.resolve(&bearer("tok")).await {
                Err(ApiError::Unauthorized(msg)) => assert_eq!(msg, "token expired"),
                other => panic!("expected Unauthorized, got {:?}", other),
            }
        }
    }
}
