//! In-memory cookie jar scoped to one client instance.
//!
//! The jar only ever talks to a single API endpoint, so cookies are keyed by
//! name alone; `Domain` and `Path` attributes are ignored. Expiry via
//! `Max-Age` or `Expires` removes the cookie.

use http::header::{HeaderMap, HeaderValue, SET_COOKIE};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

/// Shared cookie store. Cloning shares the same underlying jar.
#[derive(Clone, Default)]
pub struct CookieJar {
    inner: Arc<Mutex<BTreeMap<String, String>>>,
}

impl std::fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Cookie values are session credentials; only names are shown.
        let names: Vec<String> = self.inner.lock().keys().cloned().collect();
        f.debug_struct("CookieJar").field("names", &names).finish()
    }
}

impl CookieJar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every `Set-Cookie` header of a response.
    pub fn store_from_headers(&self, headers: &HeaderMap) {
        let mut jar = self.inner.lock();
        for value in headers.get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else {
                tracing::debug!("ignoring non-ASCII Set-Cookie header");
                continue;
            };
            match parse_set_cookie(raw) {
                Some(SetCookie::Store(name, value)) => {
                    jar.insert(name, value);
                }
                Some(SetCookie::Remove(name)) => {
                    jar.remove(&name);
                }
                None => tracing::debug!("ignoring malformed Set-Cookie header"),
            }
        }
    }

    /// Value for an outgoing `Cookie` header, or `None` when the jar is empty.
    #[must_use]
    pub fn header_value(&self) -> Option<HeaderValue> {
        let jar = self.inner.lock();
        if jar.is_empty() {
            return None;
        }
        let joined = jar
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&joined).ok()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        self.inner.lock().get(name).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Drop every stored cookie.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SetCookie {
    Store(String, String),
    Remove(String),
}

fn parse_set_cookie(raw: &str) -> Option<SetCookie> {
    let mut parts = raw.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"');

    for attr in parts {
        let (key, attr_value) = attr.split_once('=').unwrap_or((attr, ""));
        let key = key.trim();
        let attr_value = attr_value.trim();
        if key.eq_ignore_ascii_case("max-age") {
            if attr_value.parse::<i64>().is_ok_and(|secs| secs <= 0) {
                return Some(SetCookie::Remove(name.to_owned()));
            }
        } else if key.eq_ignore_ascii_case("expires")
            && httpdate::parse_http_date(attr_value).is_ok_and(|at| at <= SystemTime::now())
        {
            return Some(SetCookie::Remove(name.to_owned()));
        }
    }

    Some(SetCookie::Store(name.to_owned(), value.to_owned()))
}
