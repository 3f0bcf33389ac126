use crate::config::{ExponentialBackoff, RetryConfig, RetryTrigger};
use crate::error::HttpError;
use crate::response::{ResponseBody, parse_retry_after};
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use rand::Rng;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::Instant;
use tower::{Layer, Service, ServiceExt};

/// Tower layer that re-sends failed attempts according to a [`RetryConfig`].
///
/// Sits outside the per-attempt timeout layer, so every attempt gets a fresh
/// timeout while `total_timeout` bounds the whole sequence.
#[derive(Clone)]
pub struct RetryLayer {
    config: RetryConfig,
    total_timeout: Option<Duration>,
}

impl RetryLayer {
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            total_timeout: None,
        }
    }

    /// Retry layer with a deadline spanning every attempt and backoff delay.
    #[must_use]
    pub fn with_total_timeout(config: RetryConfig, total_timeout: Option<Duration>) -> Self {
        Self {
            config,
            total_timeout,
        }
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService {
            inner,
            config: self.config.clone(),
            total_timeout: self.total_timeout,
        }
    }
}

/// Retries on `Err(HttpError)` and on retryable status codes.
///
/// Once retries are exhausted the last response is returned as `Ok`, whatever
/// its status; only transport-level failures surface as `Err`.
#[derive(Clone)]
pub struct RetryService<S> {
    inner: S,
    config: RetryConfig,
    total_timeout: Option<Duration>,
}

impl<S> Service<Request<Full<Bytes>>> for RetryService<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<ResponseBody>, Error = HttpError>
        + Clone
        + Send
        + 'static,
    S::Future: Send,
{
    type Response = S::Response;
    type Error = HttpError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
        // Consume the instance that was poll_ready'd.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let config = self.config.clone();
        let deadline = self.total_timeout.map(|t| (Instant::now() + t, t));

        // Extensions are cloned with the parts, so a per-request attempt
        // timeout applies to every retry.
        let (parts, body) = req.into_parts();

        Box::pin(async move {
            let method = parts.method.clone();
            let host = parts
                .uri
                .authority()
                .map_or_else(|| "unknown".to_owned(), ToString::to_string);

            let mut attempt = 0usize;
            loop {
                if let Some((at, total)) = deadline
                    && Instant::now() >= at
                {
                    return Err(HttpError::DeadlineExceeded(total));
                }

                let req = Request::from_parts(parts.clone(), body.clone());

                let mut svc = inner.clone();
                svc.ready().await?;
                let outcome = svc.call(req).await;

                let exhausted = attempt >= config.max_retries;
                let (trigger, retry_after) = match &outcome {
                    Ok(resp) => (
                        RetryTrigger::Status(resp.status().as_u16()),
                        parse_retry_after(resp.headers()),
                    ),
                    Err(err) => (retry_trigger(err), None),
                };

                if exhausted || !config.should_retry(trigger, &method) {
                    return outcome;
                }

                let mut delay = match retry_after {
                    Some(d) if !config.ignore_retry_after => d,
                    _ => calculate_backoff(&config.backoff, attempt),
                };
                if let Some((at, total)) = deadline {
                    let remaining = at.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(HttpError::DeadlineExceeded(total));
                    }
                    delay = delay.min(remaining);
                }

                match &outcome {
                    Ok(resp) => tracing::debug!(
                        retry = attempt + 1,
                        status = resp.status().as_u16(),
                        method = %method,
                        host = %host,
                        backoff_ms = delay.as_millis(),
                        "retrying request after status code"
                    ),
                    Err(err) => tracing::debug!(
                        retry = attempt + 1,
                        error = %err,
                        method = %method,
                        host = %host,
                        backoff_ms = delay.as_millis(),
                        "retrying request after error"
                    ),
                }
                drop(outcome);

                tokio::time::sleep(delay).await;
                attempt = attempt.saturating_add(1);
            }
        })
    }
}

fn retry_trigger(err: &HttpError) -> RetryTrigger {
    match err {
        HttpError::Transport(_) => RetryTrigger::TransportError,
        HttpError::Timeout(_) => RetryTrigger::Timeout,
        _ => RetryTrigger::NonRetryable,
    }
}

/// Backoff delay before retry number `attempt + 1`.
///
/// Non-finite or negative inputs fall back to safe values instead of panicking.
pub fn calculate_backoff(backoff: &ExponentialBackoff, attempt: usize) -> Duration {
    const MAX_BACKOFF_SECS: f64 = 86_400.0;

    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let multiplier = if backoff.multiplier.is_finite() && backoff.multiplier >= 0.0 {
        backoff.multiplier
    } else {
        1.0
    };
    let max_secs = backoff.max.as_secs_f64().min(MAX_BACKOFF_SECS);

    let raw = backoff.initial.as_secs_f64() * multiplier.powi(exponent);
    let secs = if raw.is_finite() {
        raw.clamp(0.0, max_secs)
    } else {
        max_secs
    };
    let mut delay = Duration::from_secs_f64(secs);

    if backoff.jitter {
        let factor = rand::rng().random_range(0.0..=0.25);
        delay += delay.mul_f64(factor);
    }

    delay.min(Duration::from_secs_f64(max_secs))
}
