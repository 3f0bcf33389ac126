#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP transport for `mwkit`.
//!
//! A hyper-based client tuned for talking to a single API endpoint:
//! - TLS via rustls (HTTPS only unless plain HTTP is explicitly allowed)
//! - optional HTTP `CONNECT` proxy for every destination
//! - per-client cookie jar and `User-Agent` injection
//! - per-attempt timeouts, overridable per request
//! - retries with exponential backoff and an optional total deadline
//! - transparent gzip/brotli/deflate decompression with body size limits
//! - charset-aware text decoding
//!
//! ```ignore
//! use mwkit_http::HttpClient;
//!
//! let client = HttpClient::builder()
//!     .user_agent("wikibot/0.1 (ops@example.org)")
//!     .build()?;
//!
//! let data: serde_json::Value = client
//!     .get("https://en.wikipedia.org/w/api.php")
//!     .query(&[("action", "query"), ("meta", "siteinfo"), ("format", "json")])
//!     .send()
//!     .await?
//!     .json()
//!     .await?;
//! ```

mod builder;
mod client;
mod config;
mod cookie;
mod error;
mod layers;
mod request;
mod response;
mod tls;

pub use builder::HttpClientBuilder;
pub use client::HttpClient;
pub use config::{
    DEFAULT_MAX_BODY_SIZE, DEFAULT_USER_AGENT, ExponentialBackoff, HttpClientConfig, ProxyConfig,
    RetryConfig, RetryTrigger, TlsRootConfig, TransportSecurity, is_idempotent_method,
};
pub use cookie::CookieJar;
pub use error::{HttpError, InvalidUriKind};
pub use layers::{
    AttemptTimeout, AttemptTimeoutLayer, AttemptTimeoutService, RetryLayer, RetryService,
    SessionLayer, SessionService, calculate_backoff,
};
pub use request::RequestBuilder;
pub use response::{ERROR_BODY_PREVIEW_LIMIT, HttpResponse, ResponseBody, decode_text};
