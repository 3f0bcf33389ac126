use crate::page::PageRef;
use mwkit_http::HttpError;
use thiserror::Error;

/// Errors returned by [`WikiClient`](crate::WikiClient) operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ApiError {
    /// Error reported by the wiki in a top-level `error` object or a failed
    /// edit result
    #[error("API error {code}: {info}")]
    Api { code: String, info: String },

    /// The page does not exist (`missingtitle`, or `missing` in a query)
    #[error("Page not found: {page}")]
    PageNotFound { page: PageRef },

    /// The title is not valid (`invalidtitle`, or `invalid` in a query)
    #[error("Invalid page name: {page}")]
    PageName { page: PageRef },

    /// Response did not have the expected shape
    #[error("Unexpected response format: {0}")]
    Format(String),

    /// A write was attempted without an edit token
    #[error("Not logged in")]
    LoginRequired,

    /// The wiki rejected the credentials
    #[error("Login failed: {reason}")]
    Login { reason: String },

    /// A required identifier was not supplied
    #[error("Missing parameter: {0}")]
    MissingParameter(&'static str),

    /// Mutually exclusive identifiers were supplied together
    #[error("Conflicting parameters: {0}")]
    ParamMix(String),

    /// Site configuration could not be read or does not name the site
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure: timeout after retries, HTTP error status,
    /// malformed JSON or TLS
    #[error(transparent)]
    Http(#[from] HttpError),
}

impl ApiError {
    /// Server-style error code, where one exists.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Api { code, .. } => Some(code),
            ApiError::PageNotFound { .. } => Some("missingtitle"),
            ApiError::PageName { .. } => Some("invalidtitle"),
            ApiError::ParamMix(_) => Some("invalidparammix"),
            _ => None,
        }
    }

    /// Build the error for a server `{code, info}` pair, mapping the page
    /// codes to their typed variants.
    pub(crate) fn from_server(code: String, info: String, page: &PageRef) -> Self {
        match code.as_str() {
            "missingtitle" => ApiError::PageNotFound { page: page.clone() },
            "invalidtitle" => ApiError::PageName { page: page.clone() },
            _ => ApiError::Api { code, info },
        }
    }

    /// Re-map a generic server error raised while operating on `page`.
    pub(crate) fn for_page(self, page: &PageRef) -> Self {
        match self {
            ApiError::Api { code, info } => ApiError::from_server(code, info, page),
            other => other,
        }
    }
}
