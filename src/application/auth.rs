//! Accounts and cookie sessions.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::forms::{FormErrors, NON_FIELD};
use crate::application::repos::{
    CreateSessionParams, CreateUserParams, RepoError, SessionsRepo, UserRef, UsersRepo,
};
use crate::domain::entities::UserRecord;
use crate::domain::users::{validate_new_password, validate_username};

const SOURCE: &str = "quillpost::application::auth";
const MIN_SECRET_LEN: usize = 32;
const DUPLICATE_USERNAME: &str = "A user with that username already exists.";
const INVALID_LOGIN: &str = "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("form submission is invalid")]
    Validation(FormErrors),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Copy)]
pub struct AuthSettings {
    pub session_ttl: Duration,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
}

#[derive(Debug, Clone)]
pub struct SignupForm {
    pub username: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Clone)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// A freshly issued session. `token` is only ever shown to the client.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub user: UserRef,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UsersRepo>,
    sessions: Arc<dyn SessionsRepo>,
    hasher: Argon2<'static>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        sessions: Arc<dyn SessionsRepo>,
        settings: AuthSettings,
    ) -> Result<Self, AuthError> {
        let params = Params::new(
            settings.argon2_memory_kib,
            settings.argon2_iterations,
            1,
            None,
        )
        .map_err(|err| AuthError::Hashing(err.to_string()))?;

        Ok(Self {
            users,
            sessions,
            hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            session_ttl: settings.session_ttl,
        })
    }

    pub async fn signup(&self, form: SignupForm) -> Result<UserRecord, AuthError> {
        let mut errors = FormErrors::new();
        let username = errors.collect(validate_username(&form.username));
        errors.collect(validate_new_password(&form.password1, &form.password2));

        if let Some(name) = username.as_deref()
            && self.users.find_user_by_username(name).await?.is_some()
        {
            errors.add("username", DUPLICATE_USERNAME);
        }

        let Some(username) = username.filter(|_| errors.is_empty()) else {
            return Err(AuthError::Validation(errors));
        };

        let password_hash = self.hash_password(form.password1).await?;
        let user = match self
            .users
            .create_user(CreateUserParams {
                username,
                password_hash,
            })
            .await
        {
            Ok(user) => user,
            Err(RepoError::Duplicate { .. }) => {
                return Err(AuthError::Validation(FormErrors::single(
                    "username",
                    DUPLICATE_USERNAME,
                )));
            }
            Err(err) => return Err(err.into()),
        };

        info!(target = SOURCE, user_id = user.id, username = %user.username, "user signed up");
        Ok(user)
    }

    /// Check credentials. Every failure produces the same non-field message.
    pub async fn login(&self, form: LoginForm) -> Result<UserRecord, AuthError> {
        let username = form.username.trim();
        if username.is_empty() || form.password.is_empty() {
            let mut errors = FormErrors::new();
            if username.is_empty() {
                errors.add("username", "This field is required.");
            }
            if form.password.is_empty() {
                errors.add("password", "This field is required.");
            }
            return Err(AuthError::Validation(errors));
        }

        let invalid = || AuthError::Validation(FormErrors::single(NON_FIELD, INVALID_LOGIN));

        let Some(user) = self.users.find_user_by_username(username).await? else {
            return Err(invalid());
        };

        if !self
            .verify_password(form.password, user.password_hash.clone())
            .await?
        {
            warn!(target = SOURCE, username = %user.username, "login rejected");
            return Err(invalid());
        }

        Ok(user)
    }

    pub async fn open_session(&self, user: &UserRecord) -> Result<IssuedSession, AuthError> {
        let id = Uuid::new_v4();
        let secret = generate_secret();
        let expires_at = OffsetDateTime::now_utc() + self.session_ttl;

        self.sessions
            .create_session(CreateSessionParams {
                id,
                user_id: user.id,
                secret_hash: hash_secret(&secret),
                expires_at,
            })
            .await?;

        info!(target = SOURCE, user_id = user.id, session = %id, "session opened");
        Ok(IssuedSession {
            token: format!("{id}.{secret}"),
            user: UserRef::from(user),
            expires_at,
        })
    }

    /// Map a cookie token to its user. Malformed, unknown, expired and
    /// mismatched tokens all resolve to `None`.
    pub async fn resolve(&self, token: &str) -> Result<Option<UserRef>, AuthError> {
        let Some((id, secret)) = parse_token(token) else {
            return Ok(None);
        };
        let Some(session) = self.sessions.find_session(id).await? else {
            return Ok(None);
        };

        if session.expires_at <= OffsetDateTime::now_utc() {
            self.sessions.delete_session(id).await?;
            return Ok(None);
        }
        if session.secret_hash.ct_eq(&hash_secret(secret)).unwrap_u8() == 0 {
            return Ok(None);
        }

        let user = self.users.find_user_by_id(session.user_id).await?;
        Ok(user.as_ref().map(UserRef::from))
    }

    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        if let Some((id, _)) = parse_token(token) {
            self.sessions.delete_session(id).await?;
            info!(target = SOURCE, session = %id, "session closed");
        }
        Ok(())
    }

    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
                .map_err(|err| AuthError::Hashing(err.to_string()))?;
            hasher
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|err| AuthError::Hashing(err.to_string()))
        })
        .await
        .map_err(|err| AuthError::Hashing(err.to_string()))?
    }

    async fn verify_password(&self, password: String, stored: String) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || {
            let parsed =
                PasswordHash::new(&stored).map_err(|err| AuthError::Hashing(err.to_string()))?;
            Ok(hasher.verify_password(password.as_bytes(), &parsed).is_ok())
        })
        .await
        .map_err(|err| AuthError::Hashing(err.to_string()))?
    }
}

fn hash_secret(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn parse_token(token: &str) -> Option<(Uuid, &str)> {
    let (id, secret) = token.split_once('.')?;
    if secret.len() < MIN_SECRET_LEN {
        return None;
    }
    let id = Uuid::parse_str(id).ok()?;
    Some((id, secret))
}
