//! Session state: the token pair and the identity derived from it.
//!
//! A `SessionManager` is an explicit context object. Build it with
//! [`SessionManager::init`] (or [`SessionManager::open`]) and hand it to
//! whatever issues requests; call [`SessionManager::dispose`] when done.
//! Network-bound operations (login, refresh, restore) live in `fedrl-client`;
//! this type only owns storage and claims.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::error::Result;
use crate::models::{TokenPair, UserData, UserSummary};
use crate::storage::{CookieJar, CookieOptions};
use crate::token;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
pub const USER_DATA_COOKIE: &str = "userData";

pub const ACCESS_TOKEN_DAYS: i64 = 1;
pub const REFRESH_TOKEN_DAYS: i64 = 7;
pub const USER_DATA_DAYS: i64 = 7;

#[derive(Debug)]
pub struct SessionManager {
    jar: CookieJar,
    user: Option<UserData>,
    loading: bool,
}

impl SessionManager {
    /// Bootstrap from an existing jar. The identity comes from the cached
    /// `userData` cookie, not from the tokens, so a stale identity can be
    /// shown until the next `set_auth_user`.
    pub fn init(jar: CookieJar) -> Self {
        let user = jar.get(USER_DATA_COOKIE).and_then(|raw| {
            serde_json::from_str::<UserData>(raw)
                .map_err(|e| warn!(error = %e, "Ignoring unreadable userData cookie"))
                .ok()
        });
        Self {
            jar,
            user,
            loading: false,
        }
    }

    /// `init` over a file-backed jar.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::init(CookieJar::open(path)?))
    }

    pub fn in_memory() -> Self {
        Self::init(CookieJar::in_memory())
    }

    /// Flush storage and release the session.
    pub fn dispose(mut self) -> Result<()> {
        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.jar.flush()
    }

    /// Persist a new token pair and re-derive the identity from the access
    /// token. Replaces any previous session.
    ///
    /// The access token is decoded before anything is written, so an
    /// undecodable token leaves the stored session untouched.
    pub fn set_auth_user(&mut self, access: &str, refresh: &str) -> Result<()> {
        let claims = token::decode_claims(access)?;

        self.jar.set(
            ACCESS_TOKEN_COOKIE,
            access,
            CookieOptions::secure_strict(ACCESS_TOKEN_DAYS),
        )?;
        self.jar.set(
            REFRESH_TOKEN_COOKIE,
            refresh,
            CookieOptions::secure_strict(REFRESH_TOKEN_DAYS),
        )?;

        info!(user_id = ?claims.user_id, "Session established");
        self.set_user(Some(claims))?;
        self.loading = false;
        Ok(())
    }

    /// Replace the cached identity; `None` removes the `userData` cookie.
    pub fn set_user(&mut self, user: Option<UserData>) -> Result<()> {
        match &user {
            Some(u) => {
                let raw = serde_json::to_string(u)?;
                self.jar
                    .set(USER_DATA_COOKIE, raw, CookieOptions::days(USER_DATA_DAYS))?;
            }
            None => self.jar.remove(USER_DATA_COOKIE)?,
        }
        self.user = user;
        Ok(())
    }

    /// Client-side logout: tokens and identity are dropped, the backend is
    /// not told.
    pub fn logout(&mut self) -> Result<()> {
        self.jar.remove(ACCESS_TOKEN_COOKIE)?;
        self.jar.remove(REFRESH_TOKEN_COOKIE)?;
        self.set_user(None)?;
        info!("Logged out");
        Ok(())
    }

    pub fn access_token(&self) -> Option<&str> {
        self.jar.get(ACCESS_TOKEN_COOKIE)
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.jar.get(REFRESH_TOKEN_COOKIE)
    }

    /// Both stored tokens, if both are present.
    pub fn token_pair(&self) -> Option<TokenPair> {
        Some(TokenPair {
            access: self.access_token()?.to_string(),
            refresh: self.refresh_token()?.to_string(),
        })
    }

    /// True when there is no usable access token.
    pub fn needs_refresh(&self) -> bool {
        match self.access_token() {
            Some(access) => token::is_access_token_expired(access),
            None => true,
        }
    }

    pub fn user(&self) -> Option<&UserData> {
        self.user.as_ref()
    }

    pub fn user_summary(&self) -> UserSummary {
        self.user.as_ref().map(UserData::summary).unwrap_or_default()
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn jar(&self) -> &CookieJar {
        &self.jar
    }
}
