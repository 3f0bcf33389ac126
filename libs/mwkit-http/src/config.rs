use std::collections::HashSet;
use std::time::Duration;

/// Default User-Agent string for HTTP requests
pub const DEFAULT_USER_AGENT: &str = concat!("mwkit-http/", env!("CARGO_PKG_VERSION"));

/// Default maximum response body size (32 MiB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 32 * 1024 * 1024;

/// Conditions that trigger a retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RetryTrigger {
    /// Transport-level errors (connection refused, DNS failure, reset, etc.)
    TransportError,
    /// A single attempt exceeded its timeout
    Timeout,
    /// Specific HTTP status code
    Status(u16),
    /// Error that is never retryable (e.g., `DeadlineExceeded`, `ServiceClosed`)
    NonRetryable,
}

impl RetryTrigger {
    /// HTTP 429 Too Many Requests
    pub const TOO_MANY_REQUESTS: Self = Self::Status(429);
    /// HTTP 502 Bad Gateway
    pub const BAD_GATEWAY: Self = Self::Status(502);
    /// HTTP 503 Service Unavailable (also used by `maxlag` throttling)
    pub const SERVICE_UNAVAILABLE: Self = Self::Status(503);
    /// HTTP 504 Gateway Timeout
    pub const GATEWAY_TIMEOUT: Self = Self::Status(504);
}

/// Check if HTTP method is idempotent (safe to retry) per RFC 9110.
#[must_use]
pub fn is_idempotent_method(method: &http::Method) -> bool {
    matches!(
        *method,
        http::Method::GET
            | http::Method::HEAD
            | http::Method::PUT
            | http::Method::DELETE
            | http::Method::OPTIONS
            | http::Method::TRACE
    )
}

/// Exponential backoff configuration for retries
///
/// Computes delay as: `min(initial * multiplier^attempt, max)` with optional jitter.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Initial backoff duration (default: 200ms)
    pub initial: Duration,

    /// Maximum backoff duration (default: 10s)
    pub max: Duration,

    /// Backoff multiplier for exponential growth (default: 2.0)
    pub multiplier: f64,

    /// Add a random 0-25% to each delay (default: true)
    pub jitter: bool,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(200),
            max: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl ExponentialBackoff {
    /// Create backoff with custom initial and max durations
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            ..Default::default()
        }
    }

    /// No delay between attempts
    #[must_use]
    pub fn none() -> Self {
        Self {
            initial: Duration::ZERO,
            max: Duration::ZERO,
            multiplier: 1.0,
            jitter: false,
        }
    }

    /// Fast backoff for tests (1ms initial, 20ms max, no jitter)
    #[must_use]
    pub fn fast() -> Self {
        Self {
            initial: Duration::from_millis(1),
            max: Duration::from_millis(20),
            multiplier: 2.0,
            jitter: false,
        }
    }
}

/// Retry policy with exponential backoff
///
/// - `always_retry`: triggers retried for every HTTP method
/// - `idempotent_retry`: triggers retried only for idempotent methods
///
/// The default policy retries attempt timeouts for every method, because a
/// slow wiki mirror is the common case and every write carries its own
/// edit-conflict guard. HTTP error statuses are returned to the caller
/// unretried; [`RetryConfig::with_status_retries`] opts into retrying
/// 429 and gateway errors. Use [`RetryConfig::persistent`] to keep retrying
/// timeouts for as long as the caller is willing to wait.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt (default: 5).
    /// Total attempts = 1 + `max_retries`.
    pub max_retries: usize,

    /// Backoff strategy
    pub backoff: ExponentialBackoff,

    /// Default: `[Timeout]`
    pub always_retry: HashSet<RetryTrigger>,

    /// Default: `[TransportError]`
    pub idempotent_retry: HashSet<RetryTrigger>,

    /// Ignore `Retry-After` and always use the backoff policy (default: false)
    pub ignore_retry_after: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: ExponentialBackoff::default(),
            always_retry: HashSet::from([RetryTrigger::Timeout]),
            idempotent_retry: HashSet::from([RetryTrigger::TransportError]),
            ignore_retry_after: false,
        }
    }
}

impl RetryConfig {
    /// Config with no retries
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Default policy plus HTTP 429 for every method and 502/503/504 for
    /// idempotent methods, honouring `Retry-After`.
    #[must_use]
    pub fn with_status_retries() -> Self {
        let mut config = Self::default();
        config.always_retry.insert(RetryTrigger::TOO_MANY_REQUESTS);
        config.idempotent_retry.extend([
            RetryTrigger::BAD_GATEWAY,
            RetryTrigger::SERVICE_UNAVAILABLE,
            RetryTrigger::GATEWAY_TIMEOUT,
        ]);
        config
    }

    /// Retry timeouts without limit and without delay.
    ///
    /// Pair with [`HttpClientConfig::total_timeout`] to keep latency bounded.
    #[must_use]
    pub fn persistent() -> Self {
        Self {
            max_retries: usize::MAX,
            backoff: ExponentialBackoff::none(),
            always_retry: HashSet::from([RetryTrigger::Timeout]),
            idempotent_retry: HashSet::new(),
            ignore_retry_after: false,
        }
    }

    /// Check if the given trigger should cause a retry for the given HTTP method
    #[must_use]
    pub fn should_retry(&self, trigger: RetryTrigger, method: &http::Method) -> bool {
        if self.always_retry.contains(&trigger) {
            return true;
        }
        self.idempotent_retry.contains(&trigger) && is_idempotent_method(method)
    }
}

/// TLS root certificate configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    WebPki,
    /// Use OS native root certificate store
    Native,
}

/// Transport security configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    /// Require TLS for all connections (HTTPS only)
    #[default]
    TlsOnly,
    /// Allow plain HTTP (local mock servers only)
    AllowInsecureHttp,
}

/// Outbound proxy.
///
/// The same proxy is used for `http` and `https` destinations; connections are
/// opened through an HTTP `CONNECT` tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy URL, e.g. `http://127.0.0.1:8080`
    pub url: String,
}

impl ProxyConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Overall HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Default per-attempt timeout (default: 30 seconds).
    ///
    /// Individual requests can override it with
    /// [`RequestBuilder::timeout`](crate::RequestBuilder::timeout).
    pub request_timeout: Duration,

    /// Deadline spanning all retry attempts (default: None)
    pub total_timeout: Option<Duration>,

    /// Maximum response body size in bytes
    pub max_body_size: usize,

    /// User-Agent header value
    pub user_agent: String,

    /// Retry policy (`None` disables the retry layer)
    pub retry: Option<RetryConfig>,

    /// Transport security mode (default: `TlsOnly`)
    pub transport: TransportSecurity,

    /// TLS root certificate strategy (default: `WebPki`)
    pub tls_roots: TlsRootConfig,

    /// Optional outbound proxy
    pub proxy: Option<ProxyConfig>,

    /// Keep a cookie jar for the lifetime of the client (default: true)
    pub cookies: bool,

    /// Buffer capacity of the request queue in front of the service stack
    pub buffer_capacity: usize,

    /// Idle connection timeout (default: 90 seconds)
    pub pool_idle_timeout: Option<Duration>,

    /// Maximum idle connections per host (default: 4)
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            total_timeout: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            retry: Some(RetryConfig::default()),
            transport: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::default(),
            proxy: None,
            cookies: true,
            buffer_capacity: 64,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 4,
        }
    }
}

impl HttpClientConfig {
    /// Minimal configuration: no retry, no cookies, short timeout
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_body_size: 1024 * 1024,
            retry: None,
            cookies: false,
            buffer_capacity: 16,
            pool_idle_timeout: Some(Duration::from_secs(30)),
            pool_max_idle_per_host: 1,
            ..Default::default()
        }
    }

    /// Configuration for tests against local mock servers (allows insecure HTTP)
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            retry: None,
            transport: TransportSecurity::AllowInsecureHttp,
            pool_idle_timeout: Some(Duration::from_secs(10)),
            ..Default::default()
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_default_retries_timeouts_for_post() {
        let config = RetryConfig::default();
        assert!(config.should_retry(RetryTrigger::Timeout, &http::Method::POST));
        assert!(config.should_retry(RetryTrigger::Timeout, &http::Method::GET));
    }

    #[test]
    fn test_default_never_retries_statuses() {
        let config = RetryConfig::default();
        for trigger in [
            RetryTrigger::TOO_MANY_REQUESTS,
            RetryTrigger::BAD_GATEWAY,
            RetryTrigger::SERVICE_UNAVAILABLE,
            RetryTrigger::GATEWAY_TIMEOUT,
        ] {
            assert!(!config.should_retry(trigger, &http::Method::GET));
            assert!(!config.should_retry(trigger, &http::Method::POST));
        }
        assert!(config.should_retry(RetryTrigger::TransportError, &http::Method::GET));
        assert!(!config.should_retry(RetryTrigger::TransportError, &http::Method::POST));
    }

    #[test]
    fn test_status_retries_opt_in() {
        let config = RetryConfig::with_status_retries();
        assert!(config.should_retry(RetryTrigger::TOO_MANY_REQUESTS, &http::Method::POST));
        assert!(config.should_retry(RetryTrigger::SERVICE_UNAVAILABLE, &http::Method::GET));
        assert!(!config.should_retry(RetryTrigger::SERVICE_UNAVAILABLE, &http::Method::POST));
        assert!(config.should_retry(RetryTrigger::Timeout, &http::Method::POST));
    }

    #[test]
    fn test_non_retryable_never_retried() {
        let config = RetryConfig::default();
        assert!(!config.should_retry(RetryTrigger::NonRetryable, &http::Method::GET));
        assert!(!config.should_retry(RetryTrigger::Status(404), &http::Method::GET));
    }

    #[test]
    fn test_persistent_policy() {
        let config = RetryConfig::persistent();
        assert_eq!(config.max_retries, usize::MAX);
        assert_eq!(config.backoff.initial, Duration::ZERO);
        assert!(config.should_retry(RetryTrigger::Timeout, &http::Method::POST));
        assert!(!config.should_retry(RetryTrigger::TransportError, &http::Method::GET));
    }

    #[test]
    fn test_idempotent_methods() {
        assert!(is_idempotent_method(&http::Method::GET));
        assert!(is_idempotent_method(&http::Method::PUT));
        assert!(!is_idempotent_method(&http::Method::POST));
        assert!(!is_idempotent_method(&http::Method::PATCH));
    }

    #[test]
    fn test_presets() {
        let config = HttpClientConfig::default();
        assert_eq!(config.transport, TransportSecurity::TlsOnly);
        assert!(config.cookies);
        assert!(config.proxy.is_none());

        let config = HttpClientConfig::for_testing();
        assert_eq!(config.transport, TransportSecurity::AllowInsecureHttp);
        assert!(config.retry.is_none());
        assert!(config.cookies);

        let config = HttpClientConfig::minimal();
        assert!(!config.cookies);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }
}
