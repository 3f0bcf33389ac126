use crate::error::HttpError;
use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use std::time::{Duration, SystemTime};

/// Largest error body kept in `HttpError::HttpStatus::body_preview`.
pub const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Boxed response body after decompression.
pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// Parse `Retry-After` as delta-seconds or an HTTP-date.
///
/// Returns `None` when missing, unparsable, negative or already in the past.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(http::header::RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<i64>() {
        return u64::try_from(seconds).ok().map(Duration::from_secs);
    }

    httpdate::parse_http_date(value)
        .ok()?
        .duration_since(SystemTime::now())
        .ok()
}

/// Character set declared by a `Content-Type` header, lower-cased.
fn declared_charset(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(http::header::CONTENT_TYPE)?.to_str().ok()?;
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_ascii_lowercase())
    })
}

/// Decode a body according to its declared charset.
///
/// UTF-8 is assumed when nothing is declared. A leading UTF-8 byte order mark
/// is dropped. Latin-1 is decoded byte-for-byte; any other charset is decoded
/// as lossy UTF-8 with a warning.
pub fn decode_text(bytes: &[u8], charset: Option<&str>) -> String {
    match charset {
        None | Some("utf-8" | "utf8") => {}
        Some("iso-8859-1" | "latin1" | "latin-1" | "us-ascii") => {
            return bytes.iter().map(|&b| char::from(b)).collect();
        }
        Some(other) => {
            tracing::warn!(charset = other, "unsupported charset; decoding as UTF-8");
        }
    }
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// HTTP response with size-limited body readers.
#[derive(Debug)]
pub struct HttpResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) max_body_size: usize,
}

impl HttpResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    #[must_use]
    pub fn into_inner(self) -> Response<ResponseBody> {
        self.inner
    }

    /// Body as bytes, without a status check.
    ///
    /// # Errors
    /// Returns `HttpError::BodyTooLarge` if the body exceeds the size limit.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        read_body_limited(self.inner, self.max_body_size).await
    }

    /// Body as bytes; non-2xx statuses become `HttpError::HttpStatus`.
    ///
    /// # Errors
    /// Returns `HttpError::HttpStatus` or `HttpError::BodyTooLarge`.
    pub async fn checked_bytes(self) -> Result<Bytes, HttpError> {
        checked_body(self.inner, self.max_body_size).await
    }

    /// Decode the body as text using the declared charset, then parse JSON.
    ///
    /// # Errors
    /// Returns `HttpError::HttpStatus`, `HttpError::BodyTooLarge` or `HttpError::Json`.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, HttpError> {
        let text = self.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Body decoded as text using the declared charset.
    ///
    /// # Errors
    /// Returns `HttpError::HttpStatus` or `HttpError::BodyTooLarge`.
    pub async fn text(self) -> Result<String, HttpError> {
        let charset = declared_charset(self.inner.headers());
        let bytes = checked_body(self.inner, self.max_body_size).await?;
        Ok(decode_text(&bytes, charset.as_deref()))
    }
}

async fn checked_body(
    response: Response<ResponseBody>,
    max_body_size: usize,
) -> Result<Bytes, HttpError> {
    let status = response.status();
    if status.is_success() {
        return read_body_limited(response, max_body_size).await;
    }

    let content_type = response
        .headers()
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let retry_after = parse_retry_after(response.headers());

    // An oversized error body must not hide the status.
    let preview_limit = max_body_size.min(ERROR_BODY_PREVIEW_LIMIT);
    let body_preview = match read_body_limited(response, preview_limit).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(HttpError::BodyTooLarge { .. }) => "<body too large for preview>".to_owned(),
        Err(e) => return Err(e),
    };

    Err(HttpError::HttpStatus {
        status,
        body_preview,
        content_type,
        retry_after,
    })
}

/// Collect the (decompressed) body, failing once it grows past `limit`.
async fn read_body_limited(
    response: Response<ResponseBody>,
    limit: usize,
) -> Result<Bytes, HttpError> {
    let mut body = std::pin::pin!(response.into_body());
    let mut collected = Vec::new();

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(HttpError::Transport)?;
        if let Some(chunk) = frame.data_ref() {
            let actual = collected.len() + chunk.len();
            if actual > limit {
                return Err(HttpError::BodyTooLarge { limit, actual });
            }
            collected.extend_from_slice(chunk);
        }
    }

    Ok(Bytes::from(collected))
}
