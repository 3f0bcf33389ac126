//! `action=query` and continuation.
//!
//! A listing is fetched by resubmitting the original parameters with every
//! field of the server's `continue` object merged in, until a response comes
//! back without `continue`.

use crate::client::WikiClient;
use crate::error::ApiError;
use crate::params::Params;
use serde_json::{Map, Value};

/// Order in which fetched pages are concatenated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageOrder {
    /// First fetched page first
    #[default]
    Forward,
    /// Last fetched page first; records inside a page keep their order
    Reverse,
}

impl WikiClient {
    /// GET with `action=query`.
    ///
    /// # Errors
    /// Transport failures and server-reported errors.
    pub async fn query(&self, mut params: Params) -> Result<Value, ApiError> {
        params.set("action", "query");
        self.transport.get(&params, None).await
    }

    /// Every response of a continued query, in fetch order.
    ///
    /// Only the first response is fetched when `recursive` is false.
    ///
    /// # Errors
    /// The first failing request's error; pages fetched before it are dropped.
    /// A server that repeats the same `continue` object is a `Format` error.
    pub async fn query_continued(
        &self,
        params: Params,
        recursive: bool,
    ) -> Result<Vec<Value>, ApiError> {
        let mut responses = Vec::new();
        let mut request = params;
        let mut previous: Option<Map<String, Value>> = None;
        loop {
            let response = self.query(request.clone()).await?;
            let cont = response.get("continue").and_then(Value::as_object).cloned();
            responses.push(response);

            match cont {
                Some(cont) if recursive => {
                    if previous.as_ref() == Some(&cont) {
                        return Err(ApiError::Format(
                            "query continuation did not advance".to_owned(),
                        ));
                    }
                    tracing::debug!(page = responses.len(), "following query continuation");
                    request.merge_continue(&cont);
                    previous = Some(cont);
                }
                _ => break,
            }
        }
        Ok(responses)
    }

    /// Fetch all pages and concatenate the records `extract` pulls out of
    /// each response.
    pub(crate) async fn collect_records<F>(
        &self,
        params: Params,
        recursive: bool,
        order: PageOrder,
        extract: F,
    ) -> Result<Vec<Value>, ApiError>
    where
        F: Fn(&Value) -> Result<Vec<Value>, ApiError>,
    {
        let responses = self.query_continued(params, recursive).await?;
        let mut pages = responses
            .iter()
            .map(&extract)
            .collect::<Result<Vec<_>, _>>()?;
        if order == PageOrder::Reverse {
            pages.reverse();
        }
        Ok(pages.into_iter().flatten().collect())
    }
}

/// Records of `query.<list>`; a response without `query` has none.
pub fn list_records(response: &Value, list: &str) -> Result<Vec<Value>, ApiError> {
    let Some(query) = response.get("query") else {
        return Ok(Vec::new());
    };
    match query.get(list) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(other) => Err(ApiError::Format(format!(
            "query.{list} is not a list: {other}"
        ))),
    }
}

/// Page objects of `query.pages`, either the legacy id-keyed map or the
/// `formatversion=2` array.
pub fn query_pages(response: &Value) -> Result<Vec<&Value>, ApiError> {
    match response.pointer("/query/pages") {
        Some(Value::Object(pages)) => Ok(pages.values().collect()),
        Some(Value::Array(pages)) => Ok(pages.iter().collect()),
        Some(other) => Err(ApiError::Format(format!(
            "query.pages has unexpected shape: {other}"
        ))),
        None => Err(ApiError::Format("response has no query.pages".to_owned())),
    }
}

/// Boolean page flag: present (`""` in legacy output) and not `false`.
pub fn has_flag(page: &Value, flag: &str) -> bool {
    page.get(flag).is_some_and(|v| *v != Value::Bool(false))
}
