#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Client for the MediaWiki action API.
//!
//! [`WikiClient`] wraps one `api.php` endpoint and keeps the session:
//! cookies, the edit token and whether the account is a bot.
//!
//! - reads: [`get_content`](WikiClient::get_content), raw
//!   [`query`](WikiClient::query) and [`query_continued`](WikiClient::query_continued)
//! - writes: [`edit`](WikiClient::edit) and its shorthands, and
//!   [`move_page`](WikiClient::move_page); every edit carries the base
//!   revision timestamp so conflicting edits fail instead of overwriting
//! - listings: category members, backlinks, file usage, user contributions
//!   and search, following continuation by default
//!
//! Server error codes surface as [`ApiError`]; transport failures (after the
//! retry policy of [`ClientConfig::retry`]) as [`ApiError::Http`].
//!
//! ```ignore
//! use mwkit_client::{CategoryMembersOptions, PageRef, WikiClient};
//!
//! let wiki = WikiClient::login_with_config("sites.yaml", "enwiki").await?;
//! let members = wiki
//!     .list_category_members(&PageRef::title("Living people"), &CategoryMembersOptions::default())
//!     .await?;
//! ```

mod client;
mod config;
mod content;
mod error;
mod page;
mod params;
mod query;
mod secret;
mod session;
mod transport;
mod traversal;

pub use client::WikiClient;
pub use config::{ClientConfig, DEFAULT_USER_AGENT, SiteConfig, SitesConfig};
pub use content::{
    DEFAULT_WRITE_TIMEOUT, EditDirective, EditOptions, EditResult, MoveOptions, MoveResult,
};
pub use error::ApiError;
pub use page::PageRef;
pub use params::{ParamValue, Params};
pub use secret::Secret;
pub use traversal::{
    BacklinksOptions, CategoryMembersOptions, ContribsOptions, ContribsTarget, Direction,
    FileUsageOptions, Limit, SearchOptions, normalize_category,
};

pub use mwkit_http::{HttpError, RetryConfig};
