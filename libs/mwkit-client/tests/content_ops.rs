#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Reading, editing and moving pages against a mock `api.php`.

mod common;

use common::{
    API_PATH, CSRF_TOKEN_FORM, SESSION_COOKIE, client, logged_in_client, pages_response,
};
use httpmock::prelude::*;
use mwkit_client::{ApiError, EditDirective, EditOptions, MoveOptions, PageRef, Params};
use serde_json::json;
use std::time::Duration;

const BASE_TIMESTAMP: &str = "2024-01-01T00:00:00Z";

fn mock_base_timestamp<'a>(server: &'a MockServer, title: &str) -> httpmock::Mock<'a> {
    server.mock(|when, then| {
        when.method(GET)
            .path(API_PATH)
            .query_param("rvprop", "timestamp")
            .query_param("titles", title);
        then.status(200).json_body(pages_response(&json!({
            "pageid": 1234,
            "ns": 0,
            "title": title,
            "revisions": [{"timestamp": BASE_TIMESTAMP}]
        })));
    })
}

fn edit_success(title: &str) -> serde_json::Value {
    json!({"edit": {
        "result": "Success",
        "pageid": 1234,
        "title": title,
        "contentmodel": "wikitext",
        "oldrevid": 100,
        "newrevid": 101,
        "newtimestamp": "2024-01-02T10:00:00Z"
    }})
}

#[tokio::test]
async fn get_content_reads_slot_and_legacy_shapes() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path(API_PATH)
            .query_param("prop", "revisions")
            .query_param("rvprop", "content")
            .query_param("rvslots", "*")
            .query_param("titles", "Slots");
        then.status(200).json_body(pages_response(&json!({
            "pageid": 1,
            "title": "Slots",
            "revisions": [{"slots": {"main": {"contentmodel": "wikitext", "*": "Hello '''world'''"}}}]
        })));
    });
    server.mock(|when, then| {
        when.method(GET).path(API_PATH).query_param("titles", "Legacy");
        then.status(200).json_body(pages_response(&json!({
            "pageid": 2,
            "title": "Legacy",
            "revisions": [{"contentformat": "text/x-wiki", "*": "Hello '''world'''"}]
        })));
    });

    let wiki = client(&server);
    let slots = wiki.get_content(&PageRef::title("Slots"), false).await.unwrap();
    let legacy = wiki.get_content(&PageRef::title("Legacy"), false).await.unwrap();
    assert_eq!(slots.as_deref(), Some("Hello '''world'''"));
    assert_eq!(slots, legacy);
}

#[tokio::test]
async fn get_content_by_id_follows_redirects() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path(API_PATH)
            .query_param("pageids", "736")
            .query_param("redirects", "1");
        then.status(200).json_body(json!({
            "query": {
                "redirects": [{"from": "Old name", "to": "New name"}],
                "pages": [{"pageid": 736, "title": "New name", "revisions": [{"slots": {"main": {"content": "target"}}}]}]
            }
        }));
    });

    let text = client(&server)
        .get_content(&PageRef::id(736), true)
        .await
        .unwrap();
    mock.assert();
    assert_eq!(text.as_deref(), Some("target"));
}

#[tokio::test]
async fn get_content_missing_and_invalid_pages() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path(API_PATH).query_param("titles", "No such page");
        then.status(200).json_body(pages_response(&json!({
            "ns": 0, "title": "No such page", "missing": ""
        })));
    });
    server.mock(|when, then| {
        when.method(GET).path(API_PATH).query_param("titles", "Bad|title");
        then.status(200).json_body(pages_response(&json!({
            "title": "Bad|title", "invalidreason": "The requested page title contains invalid characters: \"|\".", "invalid": ""
        })));
    });

    let wiki = client(&server);
    let missing = wiki
        .get_content(&PageRef::title("No such page"), false)
        .await
        .unwrap_err();
    assert!(
        matches!(missing, ApiError::PageNotFound { ref page } if *page == PageRef::title("No such page"))
    );
    assert_eq!(missing.code(), Some("missingtitle"));

    let invalid = wiki
        .get_content(&PageRef::title("Bad|title"), false)
        .await
        .unwrap_err();
    assert!(matches!(invalid, ApiError::PageName { .. }));
}

#[tokio::test]
async fn writes_require_login_and_send_nothing() {
    let server = MockServer::start();
    let any = server.mock(|when, then| {
        when.path(API_PATH);
        then.status(200).json_body(json!({}));
    });

    let wiki = client(&server);
    let page = PageRef::title("Sandbox");
    let err = wiki
        .append(&page, "text", &EditOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::LoginRequired));

    let err = wiki
        .move_page(&page, "Sandbox 2", &MoveOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::LoginRequired));
    assert_eq!(any.calls(), 0);
}

#[tokio::test]
async fn edit_sends_base_timestamp_token_and_options() {
    let server = MockServer::start();
    let wiki = logged_in_client(&server, &["user", "bot"]).await;
    let base = mock_base_timestamp(&server, "Sandbox");
    let edit = server.mock(|when, then| {
        when.method(POST)
            .path(API_PATH)
            .body_includes("action=edit")
            .body_includes("title=Sandbox")
            .body_includes("text=New+text")
            .body_includes("summary=bot+run")
            .body_includes("tags=tag-a%7Ctag-b")
            .body_includes("minor=1")
            .body_includes("bot=1")
            .body_includes("basetimestamp=2024-01-01T00%3A00%3A00Z")
            .body_includes("starttimestamp=")
            .body_includes(CSRF_TOKEN_FORM)
            .body_includes("format=json");
        then.status(200).json_body(edit_success("Sandbox"));
    });

    let options = EditOptions {
        minor: true,
        tags: vec!["tag-a".to_owned(), "tag-b".to_owned()],
        ..EditOptions::default().summary("bot run")
    };
    let result = wiki
        .replace(&PageRef::title("Sandbox"), "New text", &options)
        .await
        .unwrap();

    base.assert();
    edit.assert();
    assert_eq!(result.result, "Success");
    assert_eq!(result.old_revid, Some(100));
    assert_eq!(result.new_revid, Some(101));
    assert!(!result.is_no_change());
}

#[tokio::test]
async fn edit_of_new_page_has_no_base_timestamp() {
    let server = MockServer::start();
    let wiki = logged_in_client(&server, &["user"]).await;
    server.mock(|when, then| {
        when.method(GET).path(API_PATH).query_param("rvprop", "timestamp");
        then.status(200).json_body(pages_response(&json!({
            "ns": 0, "title": "Fresh page", "missing": ""
        })));
    });
    let edit = server.mock(|when, then| {
        when.method(POST)
            .path(API_PATH)
            .body_includes("action=edit")
            .body_includes("appendtext=first+line")
            .body_excludes("basetimestamp")
            .body_excludes("bot=");
        then.status(200).json_body(json!({"edit": {
            "result": "Success", "pageid": 99, "title": "Fresh page", "new": "", "newrevid": 5
        }}));
    });

    let result = wiki
        .append(&PageRef::title("Fresh page"), "first line", &EditOptions::default())
        .await
        .unwrap();
    edit.assert();
    assert!(result.is_new());
}

#[tokio::test]
async fn section_directives_set_section_fields() {
    let server = MockServer::start();
    let wiki = logged_in_client(&server, &["user"]).await;
    mock_base_timestamp(&server, "Talk:Sandbox");
    let new_section = server.mock(|when, then| {
        when.method(POST)
            .path(API_PATH)
            .body_includes("section=new")
            .body_includes("sectiontitle=Report")
            .body_includes("text=All+done");
        then.status(200).json_body(edit_success("Talk:Sandbox"));
    });
    let top = server.mock(|when, then| {
        when.method(POST)
            .path(API_PATH)
            .body_includes("section=0")
            .body_includes("text=Lead");
        then.status(200).json_body(edit_success("Talk:Sandbox"));
    });

    let page = PageRef::title("Talk:Sandbox");
    wiki.add_section(&page, "Report", "All done", &EditOptions::default())
        .await
        .unwrap();
    wiki.replace_top(&page, "Lead", &EditOptions::default())
        .await
        .unwrap();
    new_section.assert();
    top.assert();
}

#[tokio::test]
async fn abuse_filter_warning_is_resubmitted_once_when_suppressed() {
    let server = MockServer::start();
    let wiki = logged_in_client(&server, &["user"]).await;
    mock_base_timestamp(&server, "Sandbox");
    let edit = server.mock(|when, then| {
        when.method(POST).path(API_PATH).body_includes("action=edit");
        then.status(200).json_body(json!({"edit": {
            "result": "Failure",
            "code": "abusefilter-warning",
            "info": "Hit AbuseFilter: Large deletion",
            "warning": "This action has been automatically identified as harmful."
        }}));
    });

    let options = EditOptions {
        suppress_abuse_filter: true,
        ..EditOptions::default()
    };
    let err = wiki
        .replace(&PageRef::title("Sandbox"), "", &options)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("abusefilter-warning"));
    assert_eq!(edit.calls(), 2);
}

#[tokio::test]
async fn abuse_filter_warning_then_success_returns_second_outcome() {
    let server = MockServer::start();
    let wiki = logged_in_client(&server, &["user"]).await;
    mock_base_timestamp(&server, "Sandbox");
    // The warning response sets a marker cookie, so only the resubmission
    // carries both cookies.
    let warned = server.mock(|when, then| {
        when.method(POST)
            .path(API_PATH)
            .body_includes("action=edit")
            .header("cookie", SESSION_COOKIE);
        then.status(200)
            .header("set-cookie", "abusefilter_warned=1; path=/")
            .json_body(json!({"edit": {
                "result": "Failure",
                "code": "abusefilter-warning",
                "info": "Hit AbuseFilter: Large deletion"
            }}));
    });
    let accepted = server.mock(|when, then| {
        when.method(POST)
            .path(API_PATH)
            .body_includes("action=edit")
            .header("cookie", format!("abusefilter_warned=1; {SESSION_COOKIE}"));
        then.status(200).json_body(edit_success("Sandbox"));
    });

    let options = EditOptions {
        suppress_abuse_filter: true,
        ..EditOptions::default()
    };
    let result = wiki
        .replace(&PageRef::title("Sandbox"), "", &options)
        .await
        .unwrap();

    assert_eq!(warned.calls(), 1);
    assert_eq!(accepted.calls(), 1);
    assert_eq!(result.result, "Success");
    assert_eq!(result.new_revid, Some(101));
}

#[tokio::test]
async fn edit_extra_cannot_override_directive_or_conflict_guard() {
    let server = MockServer::start();
    let wiki = logged_in_client(&server, &["user"]).await;
    server.mock(|when, then| {
        when.method(GET).path(API_PATH).query_param("rvprop", "timestamp");
        then.status(200).json_body(pages_response(&json!({
            "ns": 0, "title": "Fresh page", "missing": ""
        })));
    });
    let edit = server.mock(|when, then| {
        when.method(POST)
            .path(API_PATH)
            .body_includes("action=edit")
            .body_includes("appendtext=new+line")
            .body_includes("nocreate=1")
            .body_excludes("basetimestamp")
            .body_excludes("prependtext")
            .body_excludes("section")
            .body_excludes("&text=");
        then.status(200).json_body(edit_success("Fresh page"));
    });

    let options = EditOptions {
        extra: Params::new()
            .with("basetimestamp", "2020-01-01T00:00:00Z")
            .with("prependtext", "stale")
            .with("text", "stale")
            .with("section", 2)
            .with("nocreate", true),
        ..EditOptions::default()
    };
    wiki.append(&PageRef::title("Fresh page"), "new line", &options)
        .await
        .unwrap();
    edit.assert();
}

#[tokio::test]
async fn abuse_filter_warning_without_suppression_fails_at_once() {
    let server = MockServer::start();
    let wiki = logged_in_client(&server, &["user"]).await;
    mock_base_timestamp(&server, "Sandbox");
    let edit = server.mock(|when, then| {
        when.method(POST).path(API_PATH).body_includes("action=edit");
        then.status(200).json_body(json!({"edit": {
            "result": "Failure", "code": "abusefilter-warning", "info": "Hit AbuseFilter"
        }}));
    });

    let err = wiki
        .replace(&PageRef::title("Sandbox"), "", &EditOptions::default())
        .await
        .unwrap_err();
    match err {
        ApiError::Api { code, info } => {
            assert_eq!(code, "abusefilter-warning");
            assert_eq!(info, "Hit AbuseFilter");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
    assert_eq!(edit.calls(), 1);
}

#[tokio::test]
async fn edit_server_errors_map_to_page_errors() {
    let server = MockServer::start();
    let wiki = logged_in_client(&server, &["user"]).await;
    mock_base_timestamp(&server, "Gone");
    server.mock(|when, then| {
        when.method(POST).path(API_PATH).body_includes("action=edit");
        then.status(200).json_body(json!({
            "error": {"code": "missingtitle", "info": "The page you specified doesn't exist."}
        }));
    });

    let options = EditOptions {
        extra: Params::new().with("nocreate", true),
        ..EditOptions::default()
    };
    let err = wiki
        .append(&PageRef::title("Gone"), "x", &options)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::PageNotFound { .. }));
}

#[tokio::test]
async fn edit_conflict_is_an_api_error() {
    let server = MockServer::start();
    let wiki = logged_in_client(&server, &["user"]).await;
    mock_base_timestamp(&server, "Busy");
    server.mock(|when, then| {
        when.method(POST).path(API_PATH).body_includes("action=edit");
        then.status(200).json_body(json!({
            "error": {"code": "editconflict", "info": "Edit conflict."}
        }));
    });

    let err = wiki
        .replace(&PageRef::title("Busy"), "mine", &EditOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("editconflict"));
}

#[tokio::test]
async fn edit_timeout_is_reported() {
    let server = MockServer::start();
    let wiki = logged_in_client(&server, &["user"]).await;
    mock_base_timestamp(&server, "Slow");
    server.mock(|when, then| {
        when.method(POST).path(API_PATH).body_includes("action=edit");
        then.status(200)
            .json_body(edit_success("Slow"))
            .delay(Duration::from_millis(500));
    });

    let options = EditOptions {
        timeout: Duration::from_millis(50),
        ..EditOptions::default()
    };
    let err = wiki
        .replace(&PageRef::title("Slow"), "text", &options)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Http(ref e) if e.is_timeout()));
}

#[tokio::test]
async fn explicit_directive_by_page_id() {
    let server = MockServer::start();
    let wiki = logged_in_client(&server, &["user"]).await;
    server.mock(|when, then| {
        when.method(GET).path(API_PATH).query_param("pageids", "1234");
        then.status(200).json_body(pages_response(&json!({
            "pageid": 1234, "title": "Sandbox", "revisions": [{"timestamp": BASE_TIMESTAMP}]
        })));
    });
    let edit = server.mock(|when, then| {
        when.method(POST)
            .path(API_PATH)
            .body_includes("pageid=1234")
            .body_includes("prependtext=Top")
            .body_excludes("title=");
        then.status(200).json_body(edit_success("Sandbox"));
    });

    let directive = EditDirective::Prepend {
        text: "Top".to_owned(),
    };
    wiki.edit(&PageRef::id(1234), &directive, &EditOptions::default())
        .await
        .unwrap();
    edit.assert();
}

#[tokio::test]
async fn move_sends_flags_and_parses_result() {
    let server = MockServer::start();
    let wiki = logged_in_client(&server, &["user"]).await;
    let moved = server.mock(|when, then| {
        when.method(POST)
            .path(API_PATH)
            .body_includes("action=move")
            .body_includes("from=Sandbox")
            .body_includes("to=Sandbox+%28old%29")
            .body_includes("reason=archive")
            .body_includes("movetalk=1")
            .body_includes("movesubpages=1")
            .body_includes("noredirect=1")
            .body_includes(CSRF_TOKEN_FORM);
        then.status(200).json_body(json!({"move": {
            "from": "Sandbox",
            "to": "Sandbox (old)",
            "reason": "archive",
            "talkfrom": "Talk:Sandbox",
            "talkto": "Talk:Sandbox (old)"
        }}));
    });

    let options = MoveOptions {
        reason: Some("archive".to_owned()),
        ..MoveOptions::default()
    };
    let result = wiki
        .move_page(&PageRef::title("Sandbox"), "Sandbox (old)", &options)
        .await
        .unwrap();

    moved.assert();
    assert_eq!(result.to, "Sandbox (old)");
    assert_eq!(result.talk_to.as_deref(), Some("Talk:Sandbox (old)"));
    assert!(!result.redirect_created());
}

#[tokio::test]
async fn move_with_redirect_omits_noredirect() {
    let server = MockServer::start();
    let wiki = logged_in_client(&server, &["user"]).await;
    let moved = server.mock(|when, then| {
        when.method(POST)
            .path(API_PATH)
            .body_includes("action=move")
            .body_includes("fromid=42")
            .body_excludes("noredirect")
            .body_excludes("movetalk");
        then.status(200).json_body(json!({"move": {
            "from": "A", "to": "B", "redirectcreated": ""
        }}));
    });

    let options = MoveOptions {
        create_redirect: true,
        move_talk: false,
        ..MoveOptions::default()
    };
    let result = wiki
        .move_page(&PageRef::id(42), "B", &options)
        .await
        .unwrap();
    moved.assert();
    assert!(result.redirect_created());
}

#[tokio::test]
async fn move_rejects_empty_destination_and_maps_errors() {
    let server = MockServer::start();
    let wiki = logged_in_client(&server, &["user"]).await;
    server.mock(|when, then| {
        when.method(POST).path(API_PATH).body_includes("action=move");
        then.status(200).json_body(json!({
            "error": {"code": "articleexists", "info": "A page of that name already exists."}
        }));
    });

    let err = wiki
        .move_page(&PageRef::title("A"), "", &MoveOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::MissingParameter("to")));

    let err = wiki
        .move_page(&PageRef::title("A"), "B", &MoveOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Api { ref code, .. } if code == "articleexists"));
}
