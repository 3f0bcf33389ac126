use crate::config::{ClientConfig, SitesConfig};
use crate::error::ApiError;
use crate::params::Params;
use crate::session::AuthState;
use crate::transport::ApiTransport;
use mwkit_http::HttpClient;
use parking_lot::RwLock;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Client for one wiki's action API.
///
/// Owns the HTTP session (cookies) and the login state. It is `Send + Sync`;
/// share it across tasks with `Arc<WikiClient>`.
///
/// ```ignore
/// use mwkit_client::{ClientConfig, EditOptions, PageRef, Secret, WikiClient};
///
/// let wiki = WikiClient::new(ClientConfig::new("https://test.wikipedia.org/w/api.php"))?;
/// wiki.login("ExampleBot@task", &Secret::from("bot-password")).await?;
/// let text = wiki.get_content(&PageRef::title("Sandbox"), true).await?;
/// wiki.append(&PageRef::title("Sandbox"), "\n* checked", &EditOptions::default()).await?;
/// ```
pub struct WikiClient {
    pub(crate) transport: ApiTransport,
    pub(crate) auth: RwLock<AuthState>,
}

impl WikiClient {
    /// # Errors
    /// Returns `ApiError::Http` if the HTTP client cannot be built (TLS
    /// initialisation, invalid proxy or user agent).
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = config.http_client()?;
        Ok(Self::with_http_client(http, config.endpoint))
    }

    /// Use an existing HTTP client. Cookies must be enabled on it for login
    /// to work.
    #[must_use]
    pub fn with_http_client(http: HttpClient, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        if http.cookies().is_none() {
            tracing::warn!(%endpoint, "HTTP client has no cookie jar; login will not persist");
        }
        Self {
            transport: ApiTransport::new(http, endpoint),
            auth: RwLock::new(AuthState::Unauthenticated),
        }
    }

    /// Build a client for `site` from a site file, optionally logging in.
    ///
    /// # Errors
    /// `ApiError::Config` for an unreadable file or unknown site; login
    /// errors when `login` is set. Logging in without configured
    /// credentials is `MissingParameter`.
    pub async fn connect_with_config(
        path: impl AsRef<Path>,
        site: &str,
        login: bool,
    ) -> Result<Self, ApiError> {
        let sites = SitesConfig::load(path)?;
        let site_config = sites.site(site)?;
        let client = Self::new(ClientConfig::for_site(site_config))?;
        tracing::info!(site, endpoint = %site_config.endpoint, "connected to wiki");

        if login {
            let (username, password) = site_config
                .credentials()
                .ok_or(ApiError::MissingParameter("username and password"))?;
            client.login(username, password).await?;
        }
        Ok(client)
    }

    /// [`connect_with_config`](Self::connect_with_config) followed by login.
    ///
    /// # Errors
    /// See [`connect_with_config`](Self::connect_with_config).
    pub async fn login_with_config(path: impl AsRef<Path>, site: &str) -> Result<Self, ApiError> {
        Self::connect_with_config(path, site, true).await
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    /// The underlying HTTP client; clones share its cookie jar.
    #[must_use]
    pub fn http_client(&self) -> &HttpClient {
        self.transport.http()
    }

    /// Raw GET with `format=json`; `timeout` overrides the per-attempt default.
    ///
    /// # Errors
    /// Transport failures, HTTP error statuses, malformed JSON and
    /// server-reported errors.
    pub async fn get(&self, params: &Params, timeout: Option<Duration>) -> Result<Value, ApiError> {
        self.transport.get(params, timeout).await
    }

    /// Raw POST with `format=json`; `timeout` overrides the per-attempt default.
    ///
    /// # Errors
    /// Transport failures, HTTP error statuses, malformed JSON and
    /// server-reported errors.
    pub async fn post(
        &self,
        params: &Params,
        timeout: Option<Duration>,
    ) -> Result<Value, ApiError> {
        self.transport.post(params, timeout).await
    }
}

impl std::fmt::Debug for WikiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WikiClient")
            .field("endpoint", &self.endpoint())
            .field("auth", &*self.auth.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WikiClient>();
    }

    #[tokio::test]
    async fn test_new_starts_unauthenticated() {
        let client = WikiClient::new(ClientConfig::new("https://wiki.example.org/w/api.php")).unwrap();
        assert!(!client.is_logged_in());
        assert!(!client.is_bot());
        assert_eq!(client.username(), None);
        assert_eq!(client.endpoint(), "https://wiki.example.org/w/api.php");
    }

    #[tokio::test]
    async fn test_debug_omits_tokens() {
        let client = WikiClient::new(ClientConfig::new("https://wiki.example.org/w/api.php")).unwrap();
        let rendered = format!("{client:?}");
        assert!(rendered.contains("wiki.example.org"));
        assert!(rendered.contains("Unauthenticated"));
    }
}
