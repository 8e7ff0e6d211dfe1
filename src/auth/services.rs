use std::time::Duration;

use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::repo_types::{User, UserRole};
use crate::{
    config::JwtConfig,
    error::{AppError, AppResult},
    state::AppState,
    store::{Store, StoreError},
};

/// Type of JWT: access or refresh.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,       // user ID
    pub exp: usize,      // expiration time
    pub iat: usize,      // issued at
    pub iss: String,     // issuer
    pub aud: String,     // audience
    pub kind: TokenKind, // access or refresh
}

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs((cfg.ttl_minutes.max(0) as u64) * 60),
            refresh_ttl: Duration::from_secs((cfg.refresh_ttl_minutes.max(0) as u64) * 60),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::from(&state.config.jwt)
    }
}

impl JwtKeys {
    fn sign_with_kind(&self, user_id: Uuid, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, TokenKind::Access)
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, TokenKind::Refresh)
    }

    pub fn sign_pair(&self, user_id: Uuid) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.sign_access(user_id)?,
            refresh_token: self.sign_refresh(user_id)?,
        })
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Refresh {
            anyhow::bail!("not a refresh token");
        }
        Ok(claims)
    }
}

/// Authenticated caller, taken from a `Bearer` access token.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))?;

        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            AppError::Unauthorized("Invalid or expired token".into())
        })?;

        if claims.kind != TokenKind::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }

        Ok(AuthUser(claims.sub))
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: String,
    pub avatar: Option<String>,
    pub timezone: String,
}

fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }
    Ok(email)
}

fn email_taken(err: StoreError) -> AppError {
    match err {
        StoreError::UniqueViolation(_) => {
            AppError::AlreadyExists("Email already registered".into())
        }
        other => other.into(),
    }
}

#[instrument(skip_all)]
pub async fn register_user(store: &dyn Store, input: NewUser) -> AppResult<User> {
    let email = normalize_email(&input.email)?;
    if input.password.len() < 8 {
        warn!("password too short");
        return Err(AppError::validation("Password too short"));
    }
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name is required"));
    }
    let hash = hash_password(&input.password)?;

    let mut tx = store.begin().await?;
    if tx.find_user_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::AlreadyExists("Email already registered".into()));
    }
    let now = OffsetDateTime::now_utc();
    let user = User {
        id: Uuid::new_v4(),
        email,
        password_hash: hash,
        role: UserRole::User,
        name: name.to_string(),
        avatar: input.avatar,
        timezone: input.timezone,
        created_at: now,
        updated_at: now,
    };
    // a concurrent registration may win between the lookup and the insert
    tx.insert_user(&user).await.map_err(email_taken)?;
    tx.commit().await?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

#[instrument(skip_all)]
pub async fn authenticate(store: &dyn Store, email: &str, password: &str) -> AppResult<User> {
    let email = normalize_email(email)?;
    let mut tx = store.begin().await?;
    let Some(user) = tx.find_user_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    };
    tx.commit().await?;

    if !verify_password(password, &user.password_hash)? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }
    info!(user_id = %user.id, "user logged in");
    Ok(user)
}

/// Loads the token subject; a token for a deleted user is unauthorized.
#[instrument(skip_all, fields(%user_id))]
pub async fn current_user(store: &dyn Store, user_id: Uuid) -> AppResult<User> {
    let mut tx = store.begin().await?;
    let user = tx
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    tx.commit().await?;
    Ok(user)
}



#[cfg(test)]
mod account_tests {
    use super::*;
    use crate::store::MemoryStore;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            password: "long-enough-password".into(),
            name: "Ada".into(),
            avatar: None,
            timezone: "Europe/Berlin".into(),
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let store = MemoryStore::new();
        let user = register_user(&store, new_user(" Ada@Example.com ")).await.unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.timezone, "Europe/Berlin");

        let logged = authenticate(&store, "ada@example.com", "long-enough-password")
            .await
            .unwrap();
        assert_eq!(logged.id, user.id);

        let err = authenticate(&store, "ada@example.com", "wrong-password")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        register_user(&store, new_user("ada@example.com")).await.unwrap();
        let err = register_user(&store, new_user("ADA@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn weak_input_is_rejected() {
        let store = MemoryStore::new();
        let mut input = new_user("not-an-email");
        assert!(matches!(
            register_user(&store, input.clone()).await,
            Err(AppError::Validation(_))
        ));
        input.email = "ada@example.com".into();
        input.password = "short".into();
        assert!(matches!(
            register_user(&store, input).await,
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn unique_violation_maps_to_already_exists() {
        let err = email_taken(StoreError::UniqueViolation("users_email_key".into()));
        assert!(matches!(err, AppError::AlreadyExists(_)));
        let err = email_taken(StoreError::Corrupt("bad row".into()));
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations_of_one_email_admit_one() {
        let store = MemoryStore::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                register_user(&store, new_user("race@example.com")).await
            }));
        }
        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(err) => assert!(matches!(err, AppError::AlreadyExists(_))),
            }
        }
        assert_eq!(ok, 1);
    }
}
