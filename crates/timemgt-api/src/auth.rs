use std::sync::Arc;
use std::time::Duration;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::SaltString,
};
use axum::{Extension, Json, body::Bytes, extract::State};
use rand_core::OsRng;
use tracing::{debug, error, info, warn};

use timemgt_db::Database;
use timemgt_parsup::{Params, ParamsPolicy, Rule, check_required};
use timemgt_types::ObjectId;
use timemgt_types::api::Envelope;
use timemgt_types::models::UserProfile;

use crate::convert;
use crate::error::ApiError;
use crate::identity::{IdentityResolver, JwtAuth};
use crate::middleware::Owner;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub resolver: Arc<dyn IdentityResolver>,
    /// Present only when this deployment issues its own tokens.
    pub jwt: Option<Arc<JwtAuth>>,
    pub policy: ParamsPolicy,
    pub db_timeout: Duration,
}

/// Run a storage call off the async runtime, bounded by `db_timeout`.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> timemgt_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let st = state.clone();
    let task = tokio::task::spawn_blocking(move || f(&st.db));

    match tokio::time::timeout(state.db_timeout, task).await {
        Ok(Ok(res)) => res.map_err(ApiError::from),
        Ok(Err(e)) => {
            error!("spawn_blocking join error: {}", e);
            Err(ApiError::Storage("storage operation failed".into()))
        }
        Err(_) => {
            warn!("Storage operation exceeded {:?}", state.db_timeout);
            Err(ApiError::Storage("storage operation timed out".into()))
        }
    }
}

/// Sanitize a request body and check its required fields.
pub(crate) fn read_params(
    state: &AppState,
    body: &[u8],
    rules: &[Rule<'_>],
) -> Result<Params, ApiError> {
    let params = state.policy.sanitize(body)?;
    check_required(&params, rules)?;
    Ok(params)
}

/// Argon2id hash with a fresh random salt, in PHC string form.
fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::Storage("could not store password".into())
        })?;
    Ok(hash.to_string())
}

/// Lower-case and drop every space.
fn normalize_email(email: &str) -> String {
    email.replace(' ', "").to_lowercase()
}

fn token_issuer(state: &AppState) -> Result<Arc<JwtAuth>, ApiError> {
    state
        .jwt
        .clone()
        .ok_or_else(|| ApiError::NotFound("local accounts are disabled".into()))
}

const REGISTER_RULES: &[Rule<'static>] = &[
    ("name", "name is required."),
    ("email", "email is required."),
    ("pwd", "password is required."),
];

const LOGIN_RULES: &[Rule<'static>] = &[
    ("email", "email is required."),
    ("pwd", "password is required."),
];

pub async fn register(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Envelope<String>>, ApiError> {
    let jwt = token_issuer(&state)?;
    let params = read_params(&state, &body, REGISTER_RULES)?;
    let name = params.text("name")?;
    let email = normalize_email(&params.text("email")?);
    let password = params.text("pwd")?;

    let password_hash = hash_password(&password)?;

    let user_id = ObjectId::new();
    let now = chrono::Utc::now();
    let stored_email = email.clone();
    blocking(&state, move |db| {
        db.create_user(user_id, &name, &stored_email, &password_hash, now)
    })
    .await?;

    info!("Registered user {} ({})", user_id, email);
    let token = issue(&jwt, user_id)?;
    Ok(Json(Envelope::ok(token)))
}

pub async fn login(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Envelope<String>>, ApiError> {
    let jwt = token_issuer(&state)?;
    let params = read_params(&state, &body, LOGIN_RULES)?;
    let email = normalize_email(&params.text("email")?);
    let password = params.text("pwd")?;

    let user = blocking(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or_else(|| ApiError::NotFound("no such user".into()))?;

    let parsed_hash = PasswordHash::new(&user.password).map_err(|e| {
        error!("Stored hash for {} is unreadable: {}", user.id, e);
        ApiError::Storage("stored credentials are corrupt".into())
    })?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| {
            debug!("Wrong password for {}", user.id);
            ApiError::ValidationFailed("email and password do not match".into())
        })?;

    let user_id: ObjectId = user.id.parse().map_err(|_| {
        error!("Corrupt user id '{}'", user.id);
        ApiError::Storage("stored user is corrupt".into())
    })?;

    let token = issue(&jwt, user_id)?;
    Ok(Json(Envelope::ok(token)))
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(Owner(uid)): Extension<Owner>,
) -> Result<Json<Envelope<UserProfile>>, ApiError> {
    let row = blocking(&state, move |db| db.get_user_by_id(uid))
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    let profile = convert::user(row)
        .ok_or_else(|| ApiError::Storage("stored user is corrupt".into()))?;
    Ok(Json(Envelope::ok(profile)))
}

fn issue(jwt: &JwtAuth, uid: ObjectId) -> Result<String, ApiError> {
    jwt.issue(uid).map_err(|e| {
        error!("Token signing failed: {}", e);
        ApiError::Storage("could not issue token".into())
    })
}
