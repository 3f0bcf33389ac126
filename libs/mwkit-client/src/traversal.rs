//! Listings built on continued queries: category members, backlinks, file
//! usage, user contributions and search.
//!
//! Each options struct names the well-known parameters and carries `extra`
//! for anything else; `extra` is applied first, so the named fields win.

use crate::client::WikiClient;
use crate::error::ApiError;
use crate::page::PageRef;
use crate::params::{ParamValue, Params};
use crate::query::{PageOrder, list_records, query_pages};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

// Category prefixes in English, Chinese (simplified/traditional) and the
// `cat:` shorthand, with or without the link brackets.
#[allow(clippy::expect_used)] // constant pattern
static CATEGORY_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("(?i)^(?:\\[\\[)?(?:category|\u{5206}[\u{7c7b}\u{985e}]|cat):")
        .expect("category prefix pattern is valid")
});

/// Page size of a listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Limit {
    /// The largest page the server allows for this user
    #[default]
    Max,
    Count(u32),
}

impl From<Limit> for ParamValue {
    fn from(limit: Limit) -> Self {
        match limit {
            Limit::Max => ParamValue::Text("max".to_owned()),
            Limit::Count(n) => ParamValue::Int(i64::from(n)),
        }
    }
}

/// `list=categorymembers`
#[derive(Debug, Clone)]
pub struct CategoryMembersOptions {
    /// `cmprop`, e.g. `ids`, `title`, `sortkey`, `timestamp`
    pub props: Vec<String>,
    pub namespaces: Vec<i32>,
    /// `cmtype`: `page`, `subcat`, `file`
    pub types: Vec<String>,
    pub limit: Limit,
    /// Follow continuation until the listing is complete (default: true)
    pub recursive: bool,
    pub extra: Params,
}

impl Default for CategoryMembersOptions {
    fn default() -> Self {
        Self {
            props: Vec::new(),
            namespaces: Vec::new(),
            types: Vec::new(),
            limit: Limit::Max,
            recursive: true,
            extra: Params::new(),
        }
    }
}

/// `list=backlinks`
#[derive(Debug, Clone)]
pub struct BacklinksOptions {
    pub namespaces: Vec<i32>,
    pub limit: Limit,
    pub recursive: bool,
    pub extra: Params,
}

impl Default for BacklinksOptions {
    fn default() -> Self {
        Self {
            namespaces: Vec::new(),
            limit: Limit::Max,
            recursive: true,
            extra: Params::new(),
        }
    }
}

/// `prop=fileusage`
#[derive(Debug, Clone)]
pub struct FileUsageOptions {
    /// `fuprop`: `pageid`, `title`, `redirect`
    pub props: Vec<String>,
    pub namespaces: Vec<i32>,
    /// `fushow`: `redirect`, `!redirect`
    pub show: Vec<String>,
    pub limit: Limit,
    pub recursive: bool,
    pub extra: Params,
}

impl Default for FileUsageOptions {
    fn default() -> Self {
        Self {
            props: Vec::new(),
            namespaces: Vec::new(),
            show: Vec::new(),
            limit: Limit::Max,
            recursive: true,
            extra: Params::new(),
        }
    }
}

/// Enumeration direction of `list=usercontribs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Newest first (server default)
    Older,
    /// Oldest first
    Newer,
}

impl Direction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Older => "older",
            Direction::Newer => "newer",
        }
    }
}

/// Whose contributions to list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContribsTarget {
    Users(Vec<String>),
    UserIds(Vec<u64>),
    /// All users whose name starts with the prefix
    Prefix(String),
}

impl ContribsTarget {
    #[must_use]
    pub fn user(name: impl Into<String>) -> Self {
        ContribsTarget::Users(vec![name.into()])
    }

    /// Build a target from optional inputs; exactly one must be given.
    /// Empty lists and strings count as not given.
    ///
    /// # Errors
    /// `MissingParameter` when none is given, `ParamMix` when several are.
    pub fn from_parts(
        users: Option<Vec<String>>,
        userids: Option<Vec<u64>>,
        prefix: Option<String>,
    ) -> Result<Self, ApiError> {
        let users = users.filter(|u| !u.is_empty());
        let userids = userids.filter(|u| !u.is_empty());
        let prefix = prefix.filter(|p| !p.is_empty());

        match (users, userids, prefix) {
            (Some(users), None, None) => Ok(ContribsTarget::Users(users)),
            (None, Some(ids), None) => Ok(ContribsTarget::UserIds(ids)),
            (None, None, Some(prefix)) => Ok(ContribsTarget::Prefix(prefix)),
            (None, None, None) => Err(ApiError::MissingParameter(
                "user, userid or userprefix",
            )),
            _ => Err(ApiError::ParamMix(
                "only one of user, userid and userprefix may be given".to_owned(),
            )),
        }
    }

    fn apply_to(&self, params: &mut Params) {
        params.remove("ucuser");
        params.remove("ucuserids");
        params.remove("ucuserprefix");
        match self {
            ContribsTarget::Users(users) => params.set_list("ucuser", users),
            ContribsTarget::UserIds(ids) => params.set_list("ucuserids", ids),
            ContribsTarget::Prefix(prefix) => params.set("ucuserprefix", prefix),
        };
    }
}

/// `list=usercontribs`
#[derive(Debug, Clone)]
pub struct ContribsOptions {
    /// `ucstart`: timestamp to start enumerating from
    pub start: Option<String>,
    /// `ucend`: timestamp to stop at
    pub end: Option<String>,
    pub direction: Option<Direction>,
    pub namespaces: Vec<i32>,
    /// `ucprop`, e.g. `ids`, `title`, `timestamp`, `comment`, `size`
    pub props: Vec<String>,
    /// `ucshow`, e.g. `!minor`, `new`, `top`
    pub show: Vec<String>,
    pub limit: Limit,
    pub recursive: bool,
    pub extra: Params,
}

impl Default for ContribsOptions {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            direction: None,
            namespaces: Vec::new(),
            props: Vec::new(),
            show: Vec::new(),
            limit: Limit::Max,
            recursive: true,
            extra: Params::new(),
        }
    }
}

/// `list=search`
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub namespaces: Vec<i32>,
    /// `srwhat`: `title`, `text`, `nearmatch`
    pub what: Option<String>,
    /// `srinfo`: `totalhits`, `suggestion`, `rewrittenquery`
    pub info: Vec<String>,
    /// `srprop`, e.g. `size`, `wordcount`, `timestamp`, `snippet`
    pub props: Vec<String>,
    pub limit: Limit,
    pub recursive: bool,
    pub extra: Params,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            namespaces: Vec::new(),
            what: None,
            info: Vec::new(),
            props: Vec::new(),
            limit: Limit::Max,
            recursive: true,
            extra: Params::new(),
        }
    }
}

/// Prefix a bare category name with `Category:`.
///
/// Names that already carry a category prefix (`Category:`, `cat:` or the
/// Chinese equivalents, optionally inside `[[`) are returned unchanged.
#[must_use]
pub fn normalize_category(name: &str) -> String {
    if CATEGORY_PREFIX.is_match(name) {
        name.to_owned()
    } else {
        format!("Category:{name}")
    }
}

impl WikiClient {
    /// Members of a category.
    ///
    /// # Errors
    /// Transport and server errors.
    pub async fn list_category_members(
        &self,
        category: &PageRef,
        options: &CategoryMembersOptions,
    ) -> Result<Vec<Value>, ApiError> {
        let category = match category {
            PageRef::Title(title) => PageRef::Title(normalize_category(title)),
            id @ PageRef::Id(_) => id.clone(),
        };

        let mut params = options.extra.clone();
        params.set("list", "categorymembers").set("cmlimit", options.limit);
        category.apply_to(&mut params, "cmtitle", "cmpageid");
        params
            .set_list("cmprop", &options.props)
            .set_list("cmnamespace", &options.namespaces)
            .set_list("cmtype", &options.types);

        self.collect_records(params, options.recursive, PageOrder::Forward, |r| {
            list_records(r, "categorymembers")
        })
        .await
        .map_err(|e| e.for_page(&category))
    }

    /// Pages linking to `page`.
    ///
    /// # Errors
    /// Transport and server errors.
    pub async fn what_links_here(
        &self,
        page: &PageRef,
        options: &BacklinksOptions,
    ) -> Result<Vec<Value>, ApiError> {
        let mut params = options.extra.clone();
        params.set("list", "backlinks").set("bllimit", options.limit);
        page.apply_to(&mut params, "bltitle", "blpageid");
        params.set_list("blnamespace", &options.namespaces);

        self.collect_records(params, options.recursive, PageOrder::Forward, |r| {
            list_records(r, "backlinks")
        })
        .await
        .map_err(|e| e.for_page(page))
    }

    /// Pages using a file. The `fileusage` entries of every returned page
    /// are concatenated.
    ///
    /// # Errors
    /// Transport and server errors; `Format` for an unexpected page shape.
    pub async fn file_usage(
        &self,
        file: &PageRef,
        options: &FileUsageOptions,
    ) -> Result<Vec<Value>, ApiError> {
        let mut params = options.extra.clone();
        params.set("prop", "fileusage").set("fulimit", options.limit);
        file.apply_to(&mut params, "titles", "pageids");
        params
            .set_list("fuprop", &options.props)
            .set_list("funamespace", &options.namespaces)
            .set_list("fushow", &options.show);

        self.collect_records(params, options.recursive, PageOrder::Forward, file_usage_records)
            .await
            .map_err(|e| e.for_page(file))
    }

    /// Contributions of one or more users.
    ///
    /// With [`Direction::Newer`] pages are concatenated last-fetched first.
    ///
    /// # Errors
    /// Transport and server errors.
    pub async fn list_contribs(
        &self,
        target: &ContribsTarget,
        options: &ContribsOptions,
    ) -> Result<Vec<Value>, ApiError> {
        let mut params = options.extra.clone();
        params.set("list", "usercontribs").set("uclimit", options.limit);
        target.apply_to(&mut params);
        params
            .set_opt("ucstart", options.start.as_deref())
            .set_opt("ucend", options.end.as_deref())
            .set_opt("ucdir", options.direction.map(Direction::as_str))
            .set_list("ucnamespace", &options.namespaces)
            .set_list("ucprop", &options.props)
            .set_list("ucshow", &options.show);

        let order = match params.get("ucdir") {
            Some(ParamValue::Text(dir)) if dir == Direction::Newer.as_str() => PageOrder::Reverse,
            _ => PageOrder::Forward,
        };
        self.collect_records(params, options.recursive, order, |r| {
            list_records(r, "usercontribs")
        })
        .await
    }

    /// Full-text search.
    ///
    /// # Errors
    /// `MissingParameter` for an empty query; transport and server errors.
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Value>, ApiError> {
        if query.is_empty() {
            return Err(ApiError::MissingParameter("srsearch"));
        }
        let mut params = options.extra.clone();
        params
            .set("list", "search")
            .set("srlimit", options.limit)
            .set("srsearch", query)
            .set_opt("srwhat", options.what.as_deref())
            .set_list("srnamespace", &options.namespaces)
            .set_list("srinfo", &options.info)
            .set_list("srprop", &options.props);

        self.collect_records(params, options.recursive, PageOrder::Forward, |r| {
            list_records(r, "search")
        })
        .await
    }
}

fn file_usage_records(response: &Value) -> Result<Vec<Value>, ApiError> {
    if response.get("query").is_none() {
        return Ok(Vec::new());
    }
    let mut records = Vec::new();
    for page in query_pages(response)? {
        match page.get("fileusage") {
            None => {}
            Some(Value::Array(usage)) => records.extend(usage.iter().cloned()),
            Some(other) => {
                return Err(ApiError::Format(format!(
                    "fileusage is not a list: {other}"
                )));
            }
        }
    }
    Ok(records)
}
