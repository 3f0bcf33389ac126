//! Client and site configuration.
//!
//! A site file maps a site key to its endpoint and credentials. Both the
//! compact list form and a mapping form are accepted:
//!
//! ```yaml
//! enwiki: ["https://en.wikipedia.org/w/api.php", "ExampleBot@task", "bot-password"]
//! testwiki:
//!   endpoint: https://test.wikipedia.org/w/api.php
//!   username: ExampleBot@task
//!   password: bot-password
//!   proxy: http://127.0.0.1:3128
//! localwiki:
//!   endpoint: http://localhost:8080/w/api.php
//!   allow_insecure_http: true
//! ```
//!
//! JSON and single-quoted flow mappings are valid YAML, so existing
//! `{'site': ['url', 'user', 'pass']}` files load unchanged.

use crate::error::ApiError;
use crate::secret::Secret;
use figment::Figment;
use figment::providers::{Format, Yaml};
use mwkit_http::{HttpClient, ProxyConfig, RetryConfig, TransportSecurity};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Default `User-Agent` sent to the wiki.
pub const DEFAULT_USER_AGENT: &str = concat!("mwkit/", env!("CARGO_PKG_VERSION"));

/// Settings for one [`WikiClient`](crate::WikiClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Absolute URL of `api.php`
    pub endpoint: String,

    /// Proxy for both `http` and `https` destinations
    pub proxy: Option<String>,

    pub user_agent: String,

    /// Default per-attempt timeout (default: 30 seconds)
    pub request_timeout: Duration,

    /// Retry policy for the transport (`None` disables retries). The default
    /// retries attempt timeouts and, for GET, connection failures; HTTP
    /// error statuses are never retried.
    pub retry: Option<RetryConfig>,

    /// Accept a plain `http://` endpoint (local test wikis only)
    pub allow_insecure_http: bool,
}

impl ClientConfig {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            proxy: None,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            request_timeout: Duration::from_secs(30),
            retry: Some(RetryConfig::default()),
            allow_insecure_http: false,
        }
    }

    /// Configuration for a site loaded from a [`SitesConfig`].
    #[must_use]
    pub fn for_site(site: &SiteConfig) -> Self {
        Self {
            proxy: site.proxy.clone(),
            allow_insecure_http: site.allow_insecure_http,
            ..Self::new(site.endpoint.clone())
        }
    }

    pub(crate) fn http_client(&self) -> Result<HttpClient, ApiError> {
        let mut builder = HttpClient::builder()
            .timeout(self.request_timeout)
            .user_agent(self.user_agent.clone())
            .retry(self.retry.clone())
            .cookies(true);

        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(ProxyConfig::new(proxy.clone()));
        }
        if self.allow_insecure_http {
            tracing::warn!(
                target: "mwkit_client::security",
                endpoint = %self.endpoint,
                "plain HTTP allowed for the wiki endpoint"
            );
            builder = builder.transport(TransportSecurity::AllowInsecureHttp);
        }

        Ok(builder.build()?)
    }
}

/// Endpoint and credentials for one site.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawSite")]
pub struct SiteConfig {
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<Secret>,
    pub proxy: Option<String>,
    /// Accept a plain `http://` endpoint
    pub allow_insecure_http: bool,
}

impl SiteConfig {
    /// Username and password, when both are configured.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &Secret)> {
        Some((self.username.as_deref()?, self.password.as_ref()?))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSite {
    Listed(String, String, Secret),
    Detailed {
        endpoint: String,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<Secret>,
        #[serde(default)]
        proxy: Option<String>,
        #[serde(default)]
        allow_insecure_http: bool,
    },
}

impl From<RawSite> for SiteConfig {
    fn from(raw: RawSite) -> Self {
        match raw {
            RawSite::Listed(endpoint, username, password) => SiteConfig {
                endpoint,
                username: Some(username),
                password: Some(password),
                proxy: None,
                allow_insecure_http: false,
            },
            RawSite::Detailed {
                endpoint,
                username,
                password,
                proxy,
                allow_insecure_http,
            } => SiteConfig {
                endpoint,
                username,
                password,
                proxy,
                allow_insecure_http,
            },
        }
    }
}

/// Site registry keyed by site name.
#[derive(Debug, Clone, Default)]
pub struct SitesConfig {
    sites: BTreeMap<String, SiteConfig>,
}

impl SitesConfig {
    /// Load a site file.
    ///
    /// # Errors
    /// Returns `ApiError::Config` if the file is missing or malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        // The YAML provider treats a missing file as empty.
        if !path.is_file() {
            return Err(ApiError::Config(format!(
                "site configuration '{}' not found",
                path.display()
            )));
        }
        Self::extract(&Figment::new().merge(Yaml::file(path)))
    }

    /// Parse site definitions from a YAML (or JSON) string.
    ///
    /// # Errors
    /// Returns `ApiError::Config` if the text is malformed.
    pub fn from_yaml_str(text: &str) -> Result<Self, ApiError> {
        Self::extract(&Figment::new().merge(Yaml::string(text)))
    }

    fn extract(figment: &Figment) -> Result<Self, ApiError> {
        let sites = figment
            .extract::<BTreeMap<String, SiteConfig>>()
            .map_err(|e| ApiError::Config(e.to_string()))?;
        tracing::debug!(count = sites.len(), "loaded site configuration");
        Ok(Self { sites })
    }

    /// Look up a site by name.
    ///
    /// # Errors
    /// Returns `ApiError::Config` for an unknown site.
    pub fn site(&self, name: &str) -> Result<&SiteConfig, ApiError> {
        self.sites
            .get(name)
            .ok_or_else(|| ApiError::Config(format!("unknown site '{name}'")))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sites.keys().map(String::as_str)
    }
}
