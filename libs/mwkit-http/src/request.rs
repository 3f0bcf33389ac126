use crate::client::{BufferedService, map_buffer_error};
use crate::config::TransportSecurity;
use crate::error::{HttpError, InvalidUriKind};
use crate::layers::AttemptTimeout;
use crate::response::HttpResponse;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::Request;
use http_body_util::Full;
use serde::Serialize;
use std::time::Duration;
use tower::{Service, ServiceExt};

/// Fluent request builder returned by [`HttpClient::get`](crate::HttpClient::get)
/// and [`HttpClient::post`](crate::HttpClient::post).
///
/// Builder errors are deferred and surface from [`send`](Self::send).
///
/// ```ignore
/// let resp = client
///     .post("https://en.wikipedia.org/w/api.php")
///     .query(&[("format", "json")])
///     .form(&[("action", "edit"), ("title", "Sandbox")])
///     .timeout(Duration::from_millis(500))
///     .send()
///     .await?;
/// ```
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    service: BufferedService,
    max_body_size: usize,
    method: http::Method,
    url: String,
    headers: Vec<(HeaderName, HeaderValue)>,
    form: Option<Bytes>,
    timeout: Option<Duration>,
    error: Option<HttpError>,
    transport_security: TransportSecurity,
}

impl RequestBuilder {
    pub(crate) fn new(
        service: BufferedService,
        max_body_size: usize,
        method: http::Method,
        url: String,
        transport_security: TransportSecurity,
    ) -> Self {
        Self {
            service,
            max_body_size,
            method,
            url,
            headers: Vec::new(),
            form: None,
            timeout: None,
            error: None,
            transport_security,
        }
    }

    /// Append URL-encoded pairs to the query string.
    pub fn query<T: Serialize + ?Sized>(mut self, pairs: &T) -> Self {
        if self.error.is_some() {
            return self;
        }
        match serde_urlencoded::to_string(pairs) {
            Ok(encoded) if encoded.is_empty() => {}
            Ok(encoded) => {
                let sep = if self.url.contains('?') { '&' } else { '?' };
                self.url.push(sep);
                self.url.push_str(&encoded);
            }
            Err(e) => self.error = Some(e.into()),
        }
        self
    }

    /// Set a form URL-encoded body.
    pub fn form<T: Serialize + ?Sized>(mut self, fields: &T) -> Self {
        if self.error.is_some() {
            return self;
        }
        match serde_urlencoded::to_string(fields) {
            Ok(encoded) => self.form = Some(Bytes::from(encoded)),
            Err(e) => self.error = Some(e.into()),
        }
        self
    }

    pub fn header(mut self, name: HeaderName, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        match HeaderValue::try_from(value) {
            Ok(value) => self.headers.push((name, value)),
            Err(e) => self.error = Some(e.into()),
        }
        self
    }

    /// Per-attempt timeout for this request, replacing the client default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn validate_url(&self) -> Result<http::Uri, HttpError> {
        let uri: http::Uri =
            self.url
                .parse()
                .map_err(|e: http::uri::InvalidUri| HttpError::InvalidUri {
                    url: self.url.clone(),
                    kind: InvalidUriKind::ParseError,
                    reason: e.to_string(),
                })?;

        if uri.authority().is_none() {
            return Err(HttpError::InvalidUri {
                url: self.url.clone(),
                kind: InvalidUriKind::MissingAuthority,
                reason: "missing host/authority".to_owned(),
            });
        }

        match uri.scheme_str() {
            Some("https") => Ok(uri),
            Some("http") => match self.transport_security {
                TransportSecurity::AllowInsecureHttp => Ok(uri),
                TransportSecurity::TlsOnly => Err(HttpError::InvalidScheme {
                    scheme: "http".to_owned(),
                    reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
                }),
            },
            Some(scheme) => Err(HttpError::InvalidScheme {
                scheme: scheme.to_owned(),
                reason: "only http:// and https:// schemes are supported".to_owned(),
            }),
            None => Err(HttpError::InvalidUri {
                url: self.url.clone(),
                kind: InvalidUriKind::MissingScheme,
                reason: "missing scheme".to_owned(),
            }),
        }
    }

    /// Send the request.
    ///
    /// Every HTTP status comes back as `Ok`; use the response readers to turn
    /// non-2xx into `HttpError::HttpStatus`.
    ///
    /// # Errors
    /// Returns `HttpError` for builder, URL, transport, timeout or TLS failures.
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        let uri = self.validate_url()?;

        let mut builder = Request::builder().method(self.method).uri(uri);
        let has_content_type = self
            .headers
            .iter()
            .any(|(name, _)| name == http::header::CONTENT_TYPE);
        if self.form.is_some() && !has_content_type {
            builder = builder.header(
                http::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            );
        }
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.extension(AttemptTimeout(timeout));
        }
        let request = builder.body(Full::new(self.form.unwrap_or_default()))?;

        let service = self.service.ready().await.map_err(map_buffer_error)?;
        let inner = service.call(request).await.map_err(map_buffer_error)?;

        Ok(HttpResponse {
            inner,
            max_body_size: self.max_body_size,
        })
    }
}
