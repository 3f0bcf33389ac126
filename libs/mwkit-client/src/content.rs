//! Page content: read, edit and move.

use crate::client::WikiClient;
use crate::error::ApiError;
use crate::page::PageRef;
use crate::params::Params;
use crate::query::{has_flag, query_pages};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Per-attempt timeout of edit and move requests.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(500);

const ABUSE_FILTER_WARNING: &str = "abusefilter-warning";

/// Keys owned by [`EditDirective`] and the conflict guard; never taken from
/// `EditOptions::extra`.
const RESERVED_EDIT_KEYS: [&str; 7] = [
    "text",
    "appendtext",
    "prependtext",
    "section",
    "sectiontitle",
    "basetimestamp",
    "starttimestamp",
];

/// What an edit does to the page text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditDirective {
    /// Replace the whole page
    Replace { text: String },
    Append { text: String },
    Prepend { text: String },
    /// Add a section at the end (`section=new`)
    NewSection { title: String, text: String },
    /// Replace the lead section (`section=0`)
    ReplaceTop { text: String },
}

impl EditDirective {
    fn apply_to(&self, params: &mut Params) {
        match self {
            EditDirective::Replace { text } => {
                params.set("text", text);
            }
            EditDirective::Append { text } => {
                params.set("appendtext", text);
            }
            EditDirective::Prepend { text } => {
                params.set("prependtext", text);
            }
            EditDirective::NewSection { title, text } => {
                params
                    .set("section", "new")
                    .set("sectiontitle", title)
                    .set("text", text);
            }
            EditDirective::ReplaceTop { text } => {
                params.set("section", 0).set("text", text);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct EditOptions {
    pub summary: Option<String>,
    pub minor: bool,
    pub tags: Vec<String>,
    /// Resubmit once when the first attempt trips an abuse filter warning
    pub suppress_abuse_filter: bool,
    /// Per-attempt timeout of the edit POST
    pub timeout: Duration,
    /// Extra `action=edit` parameters; the fields above take precedence
    pub extra: Params,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            summary: None,
            minor: false,
            tags: Vec::new(),
            suppress_abuse_filter: false,
            timeout: DEFAULT_WRITE_TIMEOUT,
            extra: Params::new(),
        }
    }
}

impl EditOptions {
    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

/// The `edit` object of a successful edit. Unlisted fields are kept in
/// `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditResult {
    pub result: String,
    #[serde(default)]
    pub pageid: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub contentmodel: Option<String>,
    #[serde(default, rename = "oldrevid")]
    pub old_revid: Option<u64>,
    #[serde(default, rename = "newrevid")]
    pub new_revid: Option<u64>,
    #[serde(default, rename = "newtimestamp")]
    pub new_timestamp: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EditResult {
    /// The submitted text matched the current revision.
    #[must_use]
    pub fn is_no_change(&self) -> bool {
        self.extra.get("nochange").is_some_and(|v| *v != Value::Bool(false))
    }

    /// The edit created the page.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.extra.get("new").is_some_and(|v| *v != Value::Bool(false))
    }
}

#[derive(Debug, Clone)]
pub struct MoveOptions {
    pub reason: Option<String>,
    /// Move the talk page too (default: true)
    pub move_talk: bool,
    /// Move subpages too (default: true)
    pub move_subpages: bool,
    /// Leave a redirect behind (default: false)
    pub create_redirect: bool,
    pub tags: Vec<String>,
    pub timeout: Duration,
    pub extra: Params,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self {
            reason: None,
            move_talk: true,
            move_subpages: true,
            create_redirect: false,
            tags: Vec::new(),
            timeout: DEFAULT_WRITE_TIMEOUT,
            extra: Params::new(),
        }
    }
}

/// The `move` object of a successful move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveResult {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default, rename = "talkfrom")]
    pub talk_from: Option<String>,
    #[serde(default, rename = "talkto")]
    pub talk_to: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MoveResult {
    #[must_use]
    pub fn redirect_created(&self) -> bool {
        self.extra
            .get("redirectcreated")
            .is_some_and(|v| *v != Value::Bool(false))
    }
}

impl WikiClient {
    /// Current wikitext of a page.
    ///
    /// Returns `None` when the page has no revision and is neither missing
    /// nor invalid.
    ///
    /// # Errors
    /// `PageNotFound`, `PageName`, or `Format` when a revision carries no
    /// content.
    pub async fn get_content(
        &self,
        page: &PageRef,
        redirects: bool,
    ) -> Result<Option<String>, ApiError> {
        let mut params = Params::new()
            .with("prop", "revisions")
            .with("rvprop", "content")
            .with("rvslots", "*")
            .with("redirects", redirects)
            .with("converttitles", true);
        page.apply_to(&mut params, "titles", "pageids");

        let response = self.query(params).await.map_err(|e| e.for_page(page))?;
        let info = first_page(&response)?;

        if let Some(revision) = info.pointer("/revisions/0") {
            return revision_text(revision)
                .map(|text| Some(text.to_owned()))
                .ok_or_else(|| ApiError::Format("revision has no content".to_owned()));
        }
        check_page_flags(info, page)?;
        Ok(None)
    }

    /// Edit a page.
    ///
    /// The current revision timestamp is sent as `basetimestamp` so a
    /// concurrent edit is reported as a conflict instead of overwritten.
    ///
    /// # Errors
    /// `LoginRequired` without a network call when not logged in;
    /// `PageNotFound` / `PageName` for the matching server codes; `Api` for
    /// any other failure, including a second abuse filter warning.
    pub async fn edit(
        &self,
        page: &PageRef,
        directive: &EditDirective,
        options: &EditOptions,
    ) -> Result<EditResult, ApiError> {
        let (token, bot) = self.write_credentials()?;
        let base_timestamp = self.base_timestamp(page).await?;

        let mut params = options.extra.clone();
        for key in RESERVED_EDIT_KEYS {
            params.remove(key);
        }
        params
            .set_opt("summary", options.summary.as_deref())
            .set("minor", options.minor)
            .set_list("tags", &options.tags);
        directive.apply_to(&mut params);
        params.set("action", "edit");
        page.apply_to(&mut params, "title", "pageid");
        params
            .set("bot", bot)
            .set_opt("basetimestamp", base_timestamp)
            .set(
                "starttimestamp",
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            )
            .set("token", token.expose());

        let mut resubmitted = false;
        loop {
            let outcome = self
                .transport
                .post(&params, Some(options.timeout))
                .await
                .and_then(|response| edit_outcome(&response))
                .map_err(|e| e.for_page(page));

            match outcome {
                Ok(result) => {
                    tracing::info!(
                        page = %page,
                        revid = ?result.new_revid,
                        no_change = result.is_no_change(),
                        "page edited"
                    );
                    return Ok(result);
                }
                Err(ApiError::Api { code, .. })
                    if code == ABUSE_FILTER_WARNING
                        && options.suppress_abuse_filter
                        && !resubmitted =>
                {
                    tracing::warn!(page = %page, "abuse filter warning; resubmitting edit");
                    resubmitted = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Replace the whole page text.
    ///
    /// # Errors
    /// See [`edit`](Self::edit).
    pub async fn replace(
        &self,
        page: &PageRef,
        text: &str,
        options: &EditOptions,
    ) -> Result<EditResult, ApiError> {
        let directive = EditDirective::Replace {
            text: text.to_owned(),
        };
        self.edit(page, &directive, options).await
    }

    /// # Errors
    /// See [`edit`](Self::edit).
    pub async fn append(
        &self,
        page: &PageRef,
        text: &str,
        options: &EditOptions,
    ) -> Result<EditResult, ApiError> {
        let directive = EditDirective::Append {
            text: text.to_owned(),
        };
        self.edit(page, &directive, options).await
    }

    /// # Errors
    /// See [`edit`](Self::edit).
    pub async fn prepend(
        &self,
        page: &PageRef,
        text: &str,
        options: &EditOptions,
    ) -> Result<EditResult, ApiError> {
        let directive = EditDirective::Prepend {
            text: text.to_owned(),
        };
        self.edit(page, &directive, options).await
    }

    /// Add a new section with the given heading.
    ///
    /// # Errors
    /// See [`edit`](Self::edit).
    pub async fn add_section(
        &self,
        page: &PageRef,
        title: &str,
        text: &str,
        options: &EditOptions,
    ) -> Result<EditResult, ApiError> {
        let directive = EditDirective::NewSection {
            title: title.to_owned(),
            text: text.to_owned(),
        };
        self.edit(page, &directive, options).await
    }

    /// Replace the lead section, before the first heading.
    ///
    /// # Errors
    /// See [`edit`](Self::edit).
    pub async fn replace_top(
        &self,
        page: &PageRef,
        text: &str,
        options: &EditOptions,
    ) -> Result<EditResult, ApiError> {
        let directive = EditDirective::ReplaceTop {
            text: text.to_owned(),
        };
        self.edit(page, &directive, options).await
    }

    /// Move (rename) a page.
    ///
    /// # Errors
    /// `LoginRequired` when not logged in and `MissingParameter` for an
    /// empty destination, both before any request; otherwise the same
    /// mapping as [`edit`](Self::edit).
    pub async fn move_page(
        &self,
        from: &PageRef,
        to: &str,
        options: &MoveOptions,
    ) -> Result<MoveResult, ApiError> {
        let (token, _) = self.write_credentials()?;
        if to.is_empty() {
            return Err(ApiError::MissingParameter("to"));
        }

        let mut params = options.extra.clone();
        params.set("action", "move");
        from.apply_to(&mut params, "from", "fromid");
        params
            .set("to", to)
            .set_opt("reason", options.reason.as_deref())
            .set("movetalk", options.move_talk)
            .set("movesubpages", options.move_subpages)
            .set("noredirect", !options.create_redirect)
            .set_list("tags", &options.tags)
            .set("token", token.expose());

        let response = self
            .transport
            .post(&params, Some(options.timeout))
            .await
            .map_err(|e| e.for_page(from))?;
        let moved = response
            .get("move")
            .cloned()
            .ok_or_else(|| ApiError::Format("response has no move result".to_owned()))?;
        let result: MoveResult =
            serde_json::from_value(moved).map_err(|e| ApiError::Format(e.to_string()))?;

        tracing::info!(from = %result.from, to = %result.to, "page moved");
        Ok(result)
    }

    /// Timestamp of the page's current revision, `None` for a new page.
    async fn base_timestamp(&self, page: &PageRef) -> Result<Option<String>, ApiError> {
        let mut params = Params::new()
            .with("prop", "revisions")
            .with("rvprop", "timestamp")
            .with("rvslots", "*");
        page.apply_to(&mut params, "titles", "pageids");

        let response = self.query(params).await.map_err(|e| e.for_page(page))?;
        let info = first_page(&response)?;
        if has_flag(info, "invalid") {
            return Err(ApiError::PageName { page: page.clone() });
        }
        Ok(info
            .pointer("/revisions/0/timestamp")
            .and_then(Value::as_str)
            .map(str::to_owned))
    }
}

fn first_page(response: &Value) -> Result<&Value, ApiError> {
    query_pages(response)?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::Format("query.pages is empty".to_owned()))
}

fn check_page_flags(info: &Value, page: &PageRef) -> Result<(), ApiError> {
    if has_flag(info, "missing") {
        return Err(ApiError::PageNotFound { page: page.clone() });
    }
    if has_flag(info, "invalid") {
        return Err(ApiError::PageName { page: page.clone() });
    }
    Ok(())
}

/// Revision text from the slot shape or the legacy flat shape.
fn revision_text(revision: &Value) -> Option<&str> {
    let main = revision.pointer("/slots/main").unwrap_or(revision);
    ["*", "content"]
        .iter()
        .find_map(|key| main.get(*key).and_then(Value::as_str))
}

fn edit_outcome(response: &Value) -> Result<EditResult, ApiError> {
    let edit = response
        .get("edit")
        .ok_or_else(|| ApiError::Format("response has no edit result".to_owned()))?;
    let result = edit.get("result").and_then(Value::as_str).unwrap_or_default();

    match result {
        "Success" => {
            serde_json::from_value(edit.clone()).map_err(|e| ApiError::Format(e.to_string()))
        }
        "" => Err(ApiError::Format("edit result missing".to_owned())),
        other => {
            let code = edit
                .get("code")
                .and_then(Value::as_str)
                .map_or_else(|| other.to_lowercase(), str::to_owned);
            let info = ["info", "warning"]
                .iter()
                .find_map(|key| edit.get(*key).and_then(Value::as_str))
                .map_or_else(|| edit.to_string(), str::to_owned);
            Err(ApiError::Api { code, info })
        }
    }
}
