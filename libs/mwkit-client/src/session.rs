//! Login state and the two-phase login flow.
//!
//! `Unauthenticated` -> `TokenAcquired` (login token fetched) ->
//! `Authenticated` (credentials accepted, edit token and groups fetched).
//! Any failure on the way returns the client to `Unauthenticated`.

use crate::client::WikiClient;
use crate::error::ApiError;
use crate::params::Params;
use crate::secret::Secret;
use serde_json::Value;

#[derive(Debug, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    /// Login token fetched, credentials not yet accepted. The token itself
    /// only lives for the duration of [`WikiClient::login`].
    TokenAcquired,
    Authenticated(Session),
}

#[derive(Debug, Clone)]
pub struct Session {
    username: String,
    csrf_token: Secret,
    bot: bool,
}

impl WikiClient {
    /// Log in with a bot password (`action=login`).
    ///
    /// On success the edit token and the user's groups are fetched; the
    /// client is a bot when the groups contain `bot`.
    ///
    /// # Errors
    /// `ApiError::Login` with the server's reason when the credentials are
    /// rejected; `ApiError::Format` if a token is missing from a response;
    /// transport errors otherwise. The client is logged out after any error.
    pub async fn login(&self, username: &str, password: &Secret) -> Result<(), ApiError> {
        match self.authenticate(username, password).await {
            Ok(session) => {
                tracing::info!(user = %session.username, bot = session.bot, "logged in");
                *self.auth.write() = AuthState::Authenticated(session);
                Ok(())
            }
            Err(e) => {
                *self.auth.write() = AuthState::Unauthenticated;
                Err(e)
            }
        }
    }

    async fn authenticate(&self, username: &str, password: &Secret) -> Result<Session, ApiError> {
        let response = self
            .query(Params::new().with("meta", "tokens").with("type", "login"))
            .await?;
        let login_token = string_at(&response, "/query/tokens/logintoken")
            .ok_or_else(|| ApiError::Format("login token missing from response".to_owned()))?;
        *self.auth.write() = AuthState::TokenAcquired;

        let params = Params::new()
            .with("action", "login")
            .with("lgname", username)
            .with("lgpassword", password.expose())
            .with("lgtoken", login_token);
        let response = self.transport.post(&params, None).await?;

        let result = string_at(&response, "/login/result").unwrap_or_default();
        if result != "Success" {
            let reason = login_failure_reason(&response, result);
            tracing::warn!(user = username, %reason, "login rejected");
            return Err(ApiError::Login { reason });
        }

        let response = self
            .query(
                Params::new()
                    .with("meta", ["tokens", "userinfo"])
                    .with("uiprop", "groups"),
            )
            .await?;
        let csrf_token = string_at(&response, "/query/tokens/csrftoken")
            .ok_or_else(|| ApiError::Format("edit token missing from response".to_owned()))?;
        let bot = response
            .pointer("/query/userinfo/groups")
            .and_then(Value::as_array)
            .is_some_and(|groups| groups.iter().any(|g| g.as_str() == Some("bot")));
        let name = string_at(&response, "/query/userinfo/name").unwrap_or(username);

        Ok(Session {
            username: name.to_owned(),
            csrf_token: Secret::new(csrf_token),
            bot,
        })
    }

    /// End the session: `action=logout` when logged in, then drop the login
    /// state and every session cookie.
    ///
    /// # Errors
    /// Transport or server errors from `action=logout`. Local state is
    /// cleared either way.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = match self.session() {
            Some(session) => {
                let params = Params::new()
                    .with("action", "logout")
                    .with("token", session.csrf_token.expose());
                self.transport.post(&params, None).await.map(drop)
            }
            None => Ok(()),
        };

        *self.auth.write() = AuthState::Unauthenticated;
        if let Some(jar) = self.http_client().cookies() {
            jar.clear();
        }
        tracing::info!("logged out");
        result
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        matches!(*self.auth.read(), AuthState::Authenticated(_))
    }

    /// Whether the logged-in user is in the `bot` group.
    #[must_use]
    pub fn is_bot(&self) -> bool {
        self.session().is_some_and(|s| s.bot)
    }

    /// Name of the logged-in user as reported by the wiki.
    #[must_use]
    pub fn username(&self) -> Option<String> {
        self.session().map(|s| s.username)
    }

    /// Snapshot of the session; never hold the lock across an `.await`.
    fn session(&self) -> Option<Session> {
        match &*self.auth.read() {
            AuthState::Authenticated(session) => Some(session.clone()),
            AuthState::Unauthenticated | AuthState::TokenAcquired => None,
        }
    }

    /// Edit token and bot flag for write actions.
    pub(crate) fn write_credentials(&self) -> Result<(Secret, bool), ApiError> {
        self.session()
            .map(|s| (s.csrf_token, s.bot))
            .ok_or(ApiError::LoginRequired)
    }
}

fn string_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

fn login_failure_reason(response: &Value, result: &str) -> String {
    match response.pointer("/login/reason") {
        Some(Value::String(reason)) => reason.clone(),
        Some(reason @ Value::Object(_)) => ["text", "info", "code"]
            .iter()
            .find_map(|key| reason.get(*key).and_then(Value::as_str))
            .map_or_else(|| reason.to_string(), str::to_owned),
        _ if result.is_empty() => "no login result in response".to_owned(),
        _ => result.to_owned(),
    }
}
