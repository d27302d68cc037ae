// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Authentication sessions.
//!
//! An [`AuthSession`] obtains at most one token per run through an
//! [`Authenticator`] and releases it exactly once, on every exit path.

use std::fmt;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::redirect::Policy;

use crate::config::LoginConfig;
use crate::error::{Error, Result};

/// Job credentials. Both fields empty means anonymous access.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

/// Opaque session credential, sent as the `Cookie` header.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Self {
        AuthToken(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(..)")
    }
}

/// Establishes and releases server-side sessions.
pub trait Authenticator {
    /// Log in; `None` means the remote needs no session token.
    fn authenticate(&self, credentials: &Credentials) -> Result<Option<AuthToken>>;

    /// Release a token obtained from [`Authenticator::authenticate`].
    fn release(&self, token: &AuthToken) -> Result<()>;
}

/// Authenticator for remotes that take credentials on every call.
pub struct NoSession;

impl Authenticator for NoSession {
    fn authenticate(&self, _credentials: &Credentials) -> Result<Option<AuthToken>> {
        Ok(None)
    }

    fn release(&self, _token: &AuthToken) -> Result<()> {
        Ok(())
    }
}

/// Joins the name=value part of each `Set-Cookie` header into one `Cookie` value.
pub fn cookie_header<'a>(set_cookies: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let pairs: Vec<&str> = set_cookies
        .into_iter()
        .filter_map(|c| c.split(';').next())
        .map(str::trim)
        .filter(|pair| pair.contains('='))
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

/// Form POST login keeping the returned session cookie as the token.
pub struct FormLogin {
    http: Client,
    login: LoginConfig,
}

impl FormLogin {
    pub fn new(login: &LoginConfig, timeout_secs: u64) -> Result<Self> {
        // Session cookies are usually set on the redirect response itself
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(Policy::none())
            .build()
            .map_err(|e| Error::Auth {
                reason: e.to_string(),
            })?;
        Ok(FormLogin {
            http,
            login: login.clone(),
        })
    }
}

impl Authenticator for FormLogin {
    fn authenticate(&self, credentials: &Credentials) -> Result<Option<AuthToken>> {
        let form = [
            (self.login.username_field.as_str(), credentials.username.as_str()),
            (self.login.password_field.as_str(), credentials.password.as_str()),
        ];
        let response = self
            .http
            .post(&self.login.url)
            .form(&form)
            .send()
            .map_err(|e| Error::Auth {
                reason: format!("login request failed: {e}"),
            })?;

        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            return Err(Error::Auth {
                reason: format!("login rejected with HTTP status {}", status.as_u16()),
            });
        }

        let cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok());
        let cookie = cookie_header(cookies).ok_or_else(|| Error::Auth {
            reason: "login response carried no session cookie".to_string(),
        })?;

        tracing::debug!(url = %self.login.url, "form login succeeded");
        Ok(Some(AuthToken::new(cookie)))
    }

    fn release(&self, token: &AuthToken) -> Result<()> {
        let Some(url) = &self.login.logout_url else {
            return Ok(());
        };
        let response = self
            .http
            .get(url)
            .header(COOKIE, token.as_str())
            .send()
            .map_err(|e| Error::Auth {
                reason: format!("logout request failed: {e}"),
            })?;
        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            return Err(Error::Auth {
                reason: format!("logout rejected with HTTP status {}", status.as_u16()),
            });
        }
        Ok(())
    }
}

/// One run's authentication scope.
///
/// Dropping the session closes it, so the token is released even when a
/// run unwinds through `?`.
pub struct AuthSession<'a> {
    authenticator: &'a dyn Authenticator,
    token: Option<AuthToken>,
    established: bool,
    closed: bool,
}

impl<'a> AuthSession<'a> {
    pub fn new(authenticator: &'a dyn Authenticator) -> Self {
        AuthSession {
            authenticator,
            token: None,
            established: false,
            closed: false,
        }
    }

    /// Obtain the session token. Repeated calls reuse the first result.
    ///
    /// Anonymous credentials never reach the authenticator and yield no token.
    pub fn authenticate(&mut self, credentials: &Credentials) -> Result<Option<&AuthToken>> {
        if self.closed {
            return Err(Error::Auth {
                reason: "session already closed".to_string(),
            });
        }
        if !self.established {
            if !credentials.is_anonymous() {
                self.token = self.authenticator.authenticate(credentials)?;
            }
            self.established = true;
        }
        Ok(self.token.as_ref())
    }

    /// Drop the current token and log in again.
    pub fn reauthenticate(&mut self, credentials: &Credentials) -> Result<Option<&AuthToken>> {
        if let Some(token) = self.token.take() {
            self.release(&token);
        }
        self.established = false;
        self.authenticate(credentials)
    }

    pub fn current_token(&self) -> Option<&AuthToken> {
        self.token.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the server-side session. Only the first call has an effect.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(token) = self.token.take() {
            self.release(&token);
        }
    }

    fn release(&self, token: &AuthToken) {
        if let Err(e) = self.authenticator.release(token) {
            tracing::warn!(error = %e, "failed to release remote session");
        }
    }
}

impl Drop for AuthSession<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
