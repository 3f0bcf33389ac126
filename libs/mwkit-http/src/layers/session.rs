use crate::cookie::CookieJar;
use crate::error::HttpError;
use http::{HeaderValue, Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Adds the headers that identify the client session: `User-Agent` and,
/// when a jar is attached, `Cookie`. `Set-Cookie` on responses feeds the jar.
#[derive(Clone)]
pub struct SessionLayer {
    user_agent: HeaderValue,
    jar: Option<CookieJar>,
}

impl SessionLayer {
    /// # Errors
    /// Returns `HttpError::InvalidHeaderValue` if the user agent is not a valid header value
    pub fn try_new(user_agent: impl AsRef<str>, jar: Option<CookieJar>) -> Result<Self, HttpError> {
        let user_agent = HeaderValue::from_str(user_agent.as_ref())?;
        Ok(Self { user_agent, jar })
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionService {
            inner,
            user_agent: self.user_agent.clone(),
            jar: self.jar.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SessionService<S> {
    inner: S,
    user_agent: HeaderValue,
    jar: Option<CookieJar>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for SessionService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<S::Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let headers = req.headers_mut();
        if !headers.contains_key(http::header::USER_AGENT) {
            headers.insert(http::header::USER_AGENT, self.user_agent.clone());
        }
        if let Some(jar) = &self.jar
            && let Some(cookie) = jar.header_value()
        {
            headers.insert(http::header::COOKIE, cookie);
        }

        let jar = self.jar.clone();
        let fut = self.inner.call(req);
        Box::pin(async move {
            let resp = fut.await?;
            if let Some(jar) = jar {
                jar.store_from_headers(resp.headers());
            }
            Ok(resp)
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, Method, StatusCode};
    use http_body_util::Full;
    use std::sync::Arc;
    use tower::ServiceExt;

    type Seen = Arc<parking_lot::Mutex<Vec<HeaderMap>>>;

    /// Records request headers and answers with the given `Set-Cookie` values.
    #[derive(Clone)]
    struct Echo {
        seen: Seen,
        set_cookie: Vec<&'static str>,
    }

    impl Service<Request<Full<Bytes>>> for Echo {
        type Response = Response<Full<Bytes>>;
        type Error = HttpError;
        type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
            self.seen.lock().push(req.headers().clone());
            let mut resp = Response::builder().status(StatusCode::OK);
            for c in &self.set_cookie {
                resp = resp.header(http::header::SET_COOKIE, *c);
            }
            std::future::ready(Ok(resp.body(Full::new(Bytes::new())).unwrap()))
        }
    }

    fn request() -> Request<Full<Bytes>> {
        Request::builder()
            .method(Method::GET)
            .uri("https://wiki.example.org/w/api.php")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_user_agent_added_unless_present() {
        let seen = Seen::default();
        let echo = Echo {
            seen: seen.clone(),
            set_cookie: vec![],
        };
        let layer = SessionLayer::try_new("wikibot/1.0", None).unwrap();

        layer.layer(echo.clone()).oneshot(request()).await.unwrap();

        let mut custom = request();
        custom
            .headers_mut()
            .insert(http::header::USER_AGENT, HeaderValue::from_static("other/2.0"));
        layer.layer(echo).oneshot(custom).await.unwrap();

        let seen = seen.lock();
        assert_eq!(seen[0][http::header::USER_AGENT], "wikibot/1.0");
        assert_eq!(seen[1][http::header::USER_AGENT], "other/2.0");
    }

    #[tokio::test]
    async fn test_cookies_captured_and_replayed() {
        let seen = Seen::default();
        let jar = CookieJar::new();
        let layer = SessionLayer::try_new("wikibot/1.0", Some(jar.clone())).unwrap();

        let first = Echo {
            seen: seen.clone(),
            set_cookie: vec!["wiki_session=s1; path=/; HttpOnly"],
        };
        layer.layer(first).oneshot(request()).await.unwrap();
        assert_eq!(jar.get("wiki_session").as_deref(), Some("s1"));

        let second = Echo {
            seen: seen.clone(),
            set_cookie: vec![],
        };
        layer.layer(second).oneshot(request()).await.unwrap();

        let seen = seen.lock();
        assert!(seen[0].get(http::header::COOKIE).is_none());
        assert_eq!(seen[1][http::header::COOKIE], "wiki_session=s1");
    }

    #[tokio::test]
    async fn test_without_jar_no_cookie_header() {
        let seen = Seen::default();
        let echo = Echo {
            seen: seen.clone(),
            set_cookie: vec!["a=1"],
        };
        let layer = SessionLayer::try_new("wikibot/1.0", None).unwrap();
        layer.layer(echo.clone()).oneshot(request()).await.unwrap();
        layer.layer(echo).oneshot(request()).await.unwrap();

        assert!(seen.lock().iter().all(|h| h.get(http::header::COOKIE).is_none()));
    }

    #[test]
    fn test_invalid_user_agent() {
        assert!(SessionLayer::try_new("bad\x00agent", None).is_err());
    }
}
