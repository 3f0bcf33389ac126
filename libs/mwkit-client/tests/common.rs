#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(dead_code)]

use httpmock::Mock;
use httpmock::prelude::*;
use mwkit_client::{ClientConfig, Secret, WikiClient};
use serde_json::{Value, json};

pub const API_PATH: &str = "/w/api.php";

pub const LOGIN_TOKEN: &str = "2d1d3d2cbb1a+\\";
pub const CSRF_TOKEN: &str = "9ed1499d99c0c34c73faa07157b3b6075b427365+\\";
/// `CSRF_TOKEN` as it appears in a form body.
pub const CSRF_TOKEN_FORM: &str = "token=9ed1499d99c0c34c73faa07157b3b6075b427365%2B%5C";

pub const SESSION_COOKIE: &str = "testwiki_session=k3v0n1";

/// Client for the mock wiki: plain HTTP, no retries.
pub fn client(server: &MockServer) -> WikiClient {
    let mut config = ClientConfig::new(server.url(API_PATH));
    config.allow_insecure_http = true;
    config.retry = None;
    WikiClient::new(config).unwrap()
}

pub struct LoginMocks<'a> {
    pub token: Mock<'a>,
    pub login: Mock<'a>,
    pub userinfo: Mock<'a>,
}

/// Mock the three requests of a successful login. The final request must
/// carry the session cookie set by `action=login`.
pub fn mock_login<'a>(server: &'a MockServer, groups: &[&str]) -> LoginMocks<'a> {
    let token = server.mock(|when, then| {
        when.method(GET)
            .path(API_PATH)
            .query_param("action", "query")
            .query_param("meta", "tokens")
            .query_param("type", "login")
            .query_param("format", "json");
        then.status(200).json_body(json!({
            "batchcomplete": "",
            "query": {"tokens": {"logintoken": LOGIN_TOKEN}}
        }));
    });
    let login = server.mock(|when, then| {
        when.method(POST)
            .path(API_PATH)
            .body_includes("action=login")
            .body_includes("lgname=ExampleBot%40task")
            .body_includes("lgpassword=bot-password")
            .body_includes("lgtoken=2d1d3d2cbb1a%2B%5C");
        then.status(200)
            .header("set-cookie", "testwiki_session=k3v0n1; path=/; secure; HttpOnly")
            .json_body(json!({
                "login": {"result": "Success", "lguserid": 7, "lgusername": "ExampleBot"}
            }));
    });
    let userinfo = server.mock(|when, then| {
        when.method(GET)
            .path(API_PATH)
            .query_param("meta", "tokens|userinfo")
            .query_param("uiprop", "groups")
            .header("cookie", SESSION_COOKIE);
        then.status(200).json_body(json!({
            "batchcomplete": "",
            "query": {
                "tokens": {"csrftoken": CSRF_TOKEN},
                "userinfo": {"id": 7, "name": "ExampleBot", "groups": groups}
            }
        }));
    });
    LoginMocks {
        token,
        login,
        userinfo,
    }
}

pub async fn logged_in_client(server: &MockServer, groups: &[&str]) -> WikiClient {
    mock_login(server, groups);
    let client = client(server);
    client
        .login("ExampleBot@task", &Secret::from("bot-password"))
        .await
        .unwrap();
    client
}

/// Legacy (`formatversion=1`) single-page query response.
pub fn pages_response(page: &Value) -> Value {
    let id = page
        .get("pageid")
        .map_or_else(|| "-1".to_owned(), ToString::to_string);
    json!({"batchcomplete": "", "query": {"pages": {id: page}}})
}
