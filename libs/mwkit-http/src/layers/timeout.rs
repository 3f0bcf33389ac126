use crate::error::HttpError;
use http::Request;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service};

/// Request extension overriding the per-attempt timeout for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptTimeout(pub Duration);

/// Bounds each attempt with `tokio::time::timeout`.
///
/// Requests carrying an [`AttemptTimeout`] extension use that value instead
/// of the layer default.
#[derive(Debug, Clone, Copy)]
pub struct AttemptTimeoutLayer {
    default: Duration,
}

impl AttemptTimeoutLayer {
    #[must_use]
    pub fn new(default: Duration) -> Self {
        Self { default }
    }
}

impl<S> Layer<S> for AttemptTimeoutLayer {
    type Service = AttemptTimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AttemptTimeoutService {
            inner,
            default: self.default,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttemptTimeoutService<S> {
    inner: S,
    default: Duration,
}

impl<S, ReqBody> Service<Request<ReqBody>> for AttemptTimeoutService<S>
where
    S: Service<Request<ReqBody>, Error = HttpError>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = HttpError;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, HttpError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let limit = req
            .extensions()
            .get::<AttemptTimeout>()
            .map_or(self.default, |t| t.0);
        let fut = self.inner.call(req);

        Box::pin(async move {
            match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(HttpError::Timeout(limit)),
            }
        })
    }
}
