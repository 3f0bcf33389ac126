use crate::error::ApiError;
use crate::params::{ParamValue, Params};
use mwkit_http::{HttpClient, HttpError, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

/// GET/POST against a single `api.php` endpoint.
///
/// Every request carries `format=json`. Responses are checked for a
/// top-level `error` (returned as [`ApiError::Api`]) and `warnings` (logged).
#[derive(Clone)]
pub struct ApiTransport {
    http: HttpClient,
    endpoint: String,
}

impl ApiTransport {
    pub(crate) fn new(http: HttpClient, endpoint: String) -> Self {
        Self { http, endpoint }
    }

    pub(crate) fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(crate) fn http(&self) -> &HttpClient {
        &self.http
    }

    pub(crate) async fn get(
        &self,
        params: &Params,
        timeout: Option<Duration>,
    ) -> Result<Value, ApiError> {
        let request = self.http.get(&self.endpoint).query(&wire_pairs(params));
        self.send("GET", params, request, timeout).await
    }

    pub(crate) async fn post(
        &self,
        params: &Params,
        timeout: Option<Duration>,
    ) -> Result<Value, ApiError> {
        let request = self.http.post(&self.endpoint).form(&wire_pairs(params));
        self.send("POST", params, request, timeout).await
    }

    async fn send(
        &self,
        method: &'static str,
        params: &Params,
        mut request: RequestBuilder,
        timeout: Option<Duration>,
    ) -> Result<Value, ApiError> {
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let action = params.get("action").and_then(ParamValue::to_wire);
        tracing::debug!(method, action = action.as_deref(), "wiki API request");

        let result = request.send().await?.json::<Value>().await;
        if let Err(HttpError::HttpStatus {
            status,
            body_preview,
            ..
        }) = &result
        {
            tracing::warn!(
                %status,
                endpoint = %self.endpoint,
                body = %body_preview,
                "wiki API returned an HTTP error"
            );
        }
        let value = result?;
        check_response(&value)?;
        Ok(value)
    }
}

fn wire_pairs(params: &Params) -> Vec<(String, String)> {
    let mut pairs = params.to_pairs();
    pairs.retain(|(key, _)| key != "format");
    pairs.push(("format".to_owned(), "json".to_owned()));
    pairs
}

/// Log `warnings` and turn a top-level `error` into `ApiError::Api`.
pub fn check_response(value: &Value) -> Result<(), ApiError> {
    if let Some(warnings) = value.get("warnings").and_then(Value::as_object) {
        for (module, warning) in warnings {
            tracing::warn!(module = %module, warning = %message_text(warning), "wiki API warning");
        }
    }

    if let Some(error) = value.get("error") {
        return Err(server_error(error));
    }
    // errorformat=plaintext/wikitext/html
    if let Some(error) = value
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first())
    {
        return Err(server_error(error));
    }
    Ok(())
}

pub fn server_error(error: &Value) -> ApiError {
    let code = error
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_owned();
    let info = ["info", "text", "*"]
        .iter()
        .find_map(|key| error.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_owned();
    ApiError::Api { code, info }
}

fn message_text(warning: &Value) -> String {
    match warning {
        Value::String(text) => text.clone(),
        Value::Object(map) => ["*", "warnings", "text"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map_or_else(|| warning.to_string(), str::to_owned),
        other => other.to_string(),
    }
}
