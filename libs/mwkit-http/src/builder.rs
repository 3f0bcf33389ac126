use crate::config::{HttpClientConfig, ProxyConfig, RetryConfig, TlsRootConfig, TransportSecurity};
use crate::cookie::CookieJar;
use crate::error::HttpError;
use crate::layers::{AttemptTimeoutLayer, RetryLayer, SessionLayer};
use crate::response::ResponseBody;
use crate::tls;
use bytes::Bytes;
use http::Response;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::proxy::Tunnel;
use hyper_util::client::legacy::connect::{Connect, HttpConnector};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::time::Duration;
use tower::buffer::Buffer;
use tower::util::BoxCloneService;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;

/// Type-erased service between composition steps in [`HttpClientBuilder::build`].
type InnerService =
    BoxCloneService<http::Request<Full<Bytes>>, http::Response<ResponseBody>, HttpError>;

/// Builder for an [`HttpClient`](crate::HttpClient).
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: HttpClientConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(config: HttpClientConfig) -> Self {
        Self { config }
    }

    /// Default per-attempt timeout. Each retry gets its own timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Deadline spanning every attempt and backoff delay.
    ///
    /// Exceeding it fails the request with `HttpError::DeadlineExceeded`.
    #[must_use]
    pub fn total_timeout(mut self, timeout: Duration) -> Self {
        self.config.total_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: Option<RetryConfig>) -> Self {
        self.config.retry = retry;
        self
    }

    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: TransportSecurity) -> Self {
        self.config.transport = transport;
        self
    }

    #[must_use]
    pub fn tls_roots(mut self, roots: TlsRootConfig) -> Self {
        self.config.tls_roots = roots;
        self
    }

    /// Allow plain HTTP connections (local mock servers only).
    ///
    /// Only available in debug builds or with the `allow-insecure-http` feature.
    #[must_use]
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    pub fn allow_insecure_http(mut self) -> Self {
        tracing::warn!(
            target: "mwkit_http::security",
            "allow_insecure_http() called - HTTP traffic will NOT be encrypted"
        );
        self.config.transport = TransportSecurity::AllowInsecureHttp;
        self
    }

    /// Route every connection through an HTTP `CONNECT` proxy.
    #[must_use]
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.proxy = Some(proxy);
        self
    }

    /// Enable or disable the session cookie jar.
    #[must_use]
    pub fn cookies(mut self, enabled: bool) -> Self {
        self.config.cookies = enabled;
        self
    }

    /// Queue size in front of the service stack. Clamped to at least 1.
    #[must_use]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    #[must_use]
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Build the client and its middleware stack.
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails, the proxy URL is unusable
    /// or the user agent is not a valid header value.
    pub fn build(self) -> Result<crate::HttpClient, HttpError> {
        if self.config.transport == TransportSecurity::AllowInsecureHttp {
            tracing::warn!(
                "insecure HTTP enabled (TransportSecurity::AllowInsecureHttp); \
                 use only for testing with mock servers"
            );
        }

        let jar = self.config.cookies.then(CookieJar::new);
        let session = SessionLayer::try_new(&self.config.user_agent, jar.clone())?;

        // Request flow (outer to inner):
        //   Buffer -> Retry -> AttemptTimeout -> Session -> Decompression -> hyper
        //
        // send() returns Ok(Response) for every HTTP status; Err only for
        // transport, timeout and TLS failures.
        let mut service = self.base_service(session)?;

        if let Some(retry_config) = &self.config.retry {
            let layer =
                RetryLayer::with_total_timeout(retry_config.clone(), self.config.total_timeout);
            service = ServiceBuilder::new()
                .layer(layer)
                .service(service)
                .boxed_clone();
        }

        let buffered: crate::client::BufferedService =
            Buffer::new(service, self.config.buffer_capacity.max(1));

        Ok(crate::HttpClient {
            service: buffered,
            max_body_size: self.config.max_body_size,
            transport_security: self.config.transport,
            cookies: jar,
        })
    }

    fn base_service(&self, session: SessionLayer) -> Result<InnerService, HttpError> {
        let tls_config = tls::client_config(self.config.tls_roots)?;
        let https = HttpsConnectorBuilder::new().with_tls_config(tls_config);
        let https = if self.config.transport == TransportSecurity::AllowInsecureHttp {
            https.https_or_http()
        } else {
            https.https_only()
        }
        .enable_all_versions();

        let mut client_builder = Client::builder(TokioExecutor::new());
        // pool_timer is required for pool_idle_timeout to take effect
        client_builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(self.config.pool_max_idle_per_host);
        if let Some(idle) = self.config.pool_idle_timeout {
            client_builder.pool_idle_timeout(idle);
        }

        let timeout = AttemptTimeoutLayer::new(self.config.request_timeout);
        Ok(match &self.config.proxy {
            None => layered(client_builder.build(https.build()), session, timeout),
            Some(proxy) => {
                let tunnel = Tunnel::new(parse_proxy_uri(proxy)?, HttpConnector::new());
                tracing::debug!(proxy = %proxy.url, "routing connections through proxy");
                layered(
                    client_builder.build(https.wrap_connector(tunnel)),
                    session,
                    timeout,
                )
            }
        })
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap a hyper client with the per-attempt layers and erase its type.
fn layered<C>(
    client: Client<C, Full<Bytes>>,
    session: SessionLayer,
    timeout: AttemptTimeoutLayer,
) -> InnerService
where
    C: Connect + Clone + Send + Sync + 'static,
{
    let service = ServiceBuilder::new()
        .layer(session)
        .layer(DecompressionLayer::new())
        .service(client)
        .map_response(map_decompression_response)
        .map_err(HttpError::from);

    ServiceBuilder::new()
        .layer(timeout)
        .service(service)
        .boxed_clone()
}

fn parse_proxy_uri(proxy: &ProxyConfig) -> Result<http::Uri, HttpError> {
    let invalid = |reason: String| HttpError::InvalidProxy {
        url: proxy.url.clone(),
        reason,
    };
    let uri: http::Uri = proxy.url.parse().map_err(|e| invalid(format!("{e}")))?;
    if uri.scheme_str() != Some("http") {
        return Err(invalid("only http:// proxies are supported".to_owned()));
    }
    if uri.authority().is_none() {
        return Err(invalid("missing host".to_owned()));
    }
    Ok(uri)
}

/// Box the decompressed body into [`ResponseBody`].
fn map_decompression_response<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: hyper::body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, body.map_err(Into::into).boxed())
}
