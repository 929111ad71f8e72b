//! Login, registration and the refresh guard.
//!
//! Refresh is single-attempt: if exchanging the refresh token fails for any
//! reason the session is logged out and the error is returned. The session
//! lock is held across the exchange, so concurrent callers that all find an
//! expired token wait for one refresh instead of issuing their own.

use tracing::{info, warn};

use fedrl_core::models::{LoginRequest, RefreshRequest, RegisterRequest, RegisterResponse, TokenPair};
use fedrl_core::{token, FedrlError, Result, SessionManager};

use crate::{error_detail, http_error, read_json, ApiClient};

pub const LOGIN_PATH: &str = "accounts/login/";
pub const REGISTER_PATH: &str = "accounts/admin/register/";
pub const REFRESH_PATH: &str = "refresh/";

const LOGIN_FAILED: &str = "Invalid email or password";
const REGISTER_FAILED: &str = "Something went wrong";

impl ApiClient {
    /// Exchange credentials for a token pair and start a session with it.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair> {
        let response = self
            .http
            .post(self.config.endpoint(LOGIN_PATH))
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(http_error)?;

        if !response.status().is_success() {
            let detail = error_detail(response).await;
            return Err(FedrlError::InvalidCredentials(
                detail.unwrap_or_else(|| LOGIN_FAILED.to_string()),
            ));
        }

        let pair: TokenPair = response.json().await.map_err(http_error)?;
        self.session
            .lock()
            .await
            .set_auth_user(&pair.access, &pair.refresh)?;
        info!(email, "Login successful");
        Ok(pair)
    }

    /// Create an account, then log in with the same credentials. A failed
    /// follow-up login is logged but does not fail the registration.
    pub async fn register(
        &self,
        email: &str,
        full_name: &str,
        password: &str,
    ) -> Result<RegisterResponse> {
        let response = self
            .http
            .post(self.config.endpoint(REGISTER_PATH))
            .json(&RegisterRequest {
                email,
                full_name,
                password,
            })
            .send()
            .await
            .map_err(http_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = error_detail(response).await;
            return Err(FedrlError::Api {
                status: status.as_u16(),
                message: detail.unwrap_or_else(|| REGISTER_FAILED.to_string()),
            });
        }
        let created: RegisterResponse = response.json().await.map_err(http_error)?;
        info!(email, user_id = created.user.id, "Account created");

        if let Err(e) = self.login(email, password).await {
            warn!(error = %e, "Automatic login after registration failed");
        }
        Ok(created)
    }

    /// Exchange the stored refresh token for a new pair. Does not store the
    /// result.
    pub async fn refresh(&self) -> Result<TokenPair> {
        let refresh = self
            .session
            .lock()
            .await
            .refresh_token()
            .map(str::to_string)
            .ok_or(FedrlError::NoRefreshToken)?;
        self.exchange_refresh(&refresh).await
    }

    /// Access token to attach to the next request.
    ///
    /// A fresh token is returned unchanged. A missing or expired one is
    /// replaced through the refresh endpoint; when that fails the session is
    /// logged out. With no tokens at all the request goes out anonymous
    /// (`Ok(None)`).
    pub async fn ensure_fresh_session(&self) -> Result<Option<String>> {
        let mut session = self.session.lock().await;
        if !session.needs_refresh() {
            return Ok(session.access_token().map(str::to_string));
        }

        let Some(refresh) = session.refresh_token().map(str::to_string) else {
            if session.access_token().is_some() {
                return Err(expire(&mut session, FedrlError::NoRefreshToken));
            }
            return Ok(None);
        };

        let renewed = match self.exchange_refresh(&refresh).await {
            Ok(pair) => session.set_auth_user(&pair.access, &pair.refresh).map(|_| pair),
            Err(e) => Err(e),
        };
        match renewed {
            Ok(pair) => {
                info!("Access token refreshed");
                Ok(Some(pair.access))
            }
            Err(e) => Err(expire(&mut session, e)),
        }
    }

    /// Bring a stored session back to life at startup: an expired access token
    /// is refreshed (logging out on failure), a fresh one re-derives the
    /// identity. Without both tokens this does nothing.
    pub async fn restore_session(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        let Some(pair) = session.token_pair() else {
            return Ok(());
        };

        if !token::is_access_token_expired(&pair.access) {
            return session.set_auth_user(&pair.access, &pair.refresh);
        }

        let renewed = match self.exchange_refresh(&pair.refresh).await {
            Ok(new) => session.set_auth_user(&new.access, &new.refresh),
            Err(e) => Err(e),
        };
        renewed.map_err(|e| expire(&mut session, e))
    }

    /// Client-side logout.
    pub async fn logout(&self) -> Result<()> {
        self.session.lock().await.logout()
    }

    async fn exchange_refresh(&self, refresh: &str) -> Result<TokenPair> {
        let response = self
            .http
            .post(self.config.endpoint(REFRESH_PATH))
            .json(&RefreshRequest { refresh })
            .send()
            .await
            .map_err(http_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FedrlError::RefreshRejected(status.as_u16()));
        }
        read_json(response).await
    }
}

/// Log the session out after a failed refresh and hand back the cause.
fn expire(session: &mut SessionManager, cause: FedrlError) -> FedrlError {
    warn!(error = %cause, "Session refresh failed, logging out");
    if let Err(e) = session.logout() {
        warn!(error = %e, "Failed to clear session storage");
    }
    cause
}
