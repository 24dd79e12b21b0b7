//! Integration tests for CSRF issuance and verification

use palisade_core::{Error, HandlerFn, HttpRequest, HttpResponse, MiddlewareChain, handler_fn};
use palisade_csrf::*;
use palisade_session::{MemorySessionStore, SessionConfig, SessionMiddleware, SessionRequestExt};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Two routes sharing one session store: plain pages and protected actions.
struct App {
    pages: MiddlewareChain,
    actions: MiddlewareChain,
}

impl App {
    fn new(config: CsrfConfig) -> Self {
        let store = Arc::new(MemorySessionStore::default());
        let config = Arc::new(config);

        let mut pages = MiddlewareChain::new();
        pages.use_middleware(
            SessionMiddleware::new(store.clone(), SessionConfig::default()).unwrap(),
        );
        pages.use_middleware(CsrfMiddleware::from_shared(config.clone()));

        let mut actions = pages.clone();
        actions.use_middleware(CsrfValidator::new());

        Self { pages, actions }
    }

    fn standard() -> Self {
        Self::new(
            CsrfConfig::new()
                .with_secret("s1")
                .with_set_cookie(true)
                .with_set_header(true),
        )
    }
}

/// Minimal cookie jar.
#[derive(Default)]
struct Browser {
    jar: BTreeMap<String, String>,
}

impl Browser {
    fn request(&self, method: &str, path: &str) -> HttpRequest {
        let req = HttpRequest::new(method, path);
        if self.jar.is_empty() {
            return req;
        }
        let header = self
            .jar
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        req.with_header("Cookie", &header).unwrap()
    }

    fn absorb(&mut self, response: &HttpResponse) {
        for set_cookie in response.set_cookies() {
            let pair = set_cookie.split(';').next().unwrap();
            let (name, value) = pair.split_once('=').unwrap();
            if value.is_empty() {
                self.jar.remove(name);
            } else {
                self.jar.insert(name.to_string(), value.to_string());
            }
        }
    }

    async fn send(&mut self, chain: &MiddlewareChain, req: HttpRequest, handler: HandlerFn) -> HttpResponse {
        let response = chain.apply(req, handler).await.unwrap();
        self.absorb(&response);
        response
    }

    fn csrf_cookie(&self) -> Option<&str> {
        self.jar.get("_csrf").map(String::as_str)
    }
}

fn ok() -> HandlerFn {
    handler_fn(|_req| async { Ok(HttpResponse::ok().with_text("done")) })
}

fn login(uid: &'static str) -> HandlerFn {
    handler_fn(move |req: HttpRequest| async move {
        if let Some(session) = req.session() {
            session.set("uid", uid)?;
        }
        Ok(HttpResponse::ok())
    })
}

fn csrf_cookie_writes(response: &HttpResponse) -> Vec<&str> {
    response
        .set_cookies()
        .into_iter()
        .filter(|c| c.starts_with("_csrf="))
        .collect()
}

#[tokio::test]
async fn test_first_request_issues_token() {
    let app = App::standard();
    let mut browser = Browser::default();

    let response = browser.send(&app.pages, browser.request("GET", "/"), ok()).await;

    let expected = derive_token(b"s1", "0", ACTION_POST);
    assert_eq!(browser.csrf_cookie(), Some(expected.as_str()));
    assert_eq!(response.header("X-CSRFToken"), Some(expected.as_str()));

    let written = csrf_cookie_writes(&response);
    assert_eq!(written.len(), 1);
    assert!(written[0].contains("Path=/"));
    assert!(written[0].contains("Expires="));
}

#[tokio::test]
async fn test_unchanged_identity_reuses_token() {
    let app = App::standard();
    let mut browser = Browser::default();

    let first = browser.send(&app.pages, browser.request("GET", "/"), ok()).await;
    let second = browser.send(&app.pages, browser.request("GET", "/"), ok()).await;

    assert!(csrf_cookie_writes(&second).is_empty());
    assert_eq!(first.header("X-CSRFToken"), second.header("X-CSRFToken"));
}

#[tokio::test]
async fn test_identity_change_rotates_token() {
    let app = App::standard();
    let mut browser = Browser::default();

    browser.send(&app.pages, browser.request("GET", "/"), ok()).await;
    let anonymous = browser.csrf_cookie().unwrap().to_string();

    browser
        .send(&app.pages, browser.request("POST", "/login"), login("42"))
        .await;
    let response = browser.send(&app.pages, browser.request("GET", "/"), ok()).await;

    let rotated = browser.csrf_cookie().unwrap().to_string();
    assert_ne!(rotated, anonymous);
    assert_eq!(rotated, derive_token(b"s1", "42", ACTION_POST));
    assert_eq!(csrf_cookie_writes(&response).len(), 1);

    // The pre-login token no longer passes
    let req = browser
        .request("POST", "/transfer")
        .with_header("X-CSRFToken", &anonymous)
        .unwrap();
    let rejected = browser.send(&app.actions, req, ok()).await;
    assert_eq!(rejected.status, 400);
}

#[tokio::test]
async fn test_valid_header_token_is_forwarded() {
    let app = App::standard();
    let mut browser = Browser::default();
    browser.send(&app.pages, browser.request("GET", "/"), ok()).await;

    let token = browser.csrf_cookie().unwrap().to_string();
    let req = browser
        .request("POST", "/transfer")
        .with_header("X-CSRFToken", &token)
        .unwrap();
    let response = browser.send(&app.actions, req, ok()).await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body_text(), "done");
}

#[tokio::test]
async fn test_valid_form_token_is_forwarded() {
    let app = App::standard();
    let mut browser = Browser::default();
    browser.send(&app.pages, browser.request("GET", "/"), ok()).await;

    let token = browser.csrf_cookie().unwrap().to_string();
    let req = browser
        .request("POST", "/transfer")
        .with_form(&[("amount", "10"), ("_csrf", &token)])
        .unwrap();
    let response = browser.send(&app.actions, req, ok()).await;

    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_invalid_header_token_is_rejected_and_cookie_cleared() {
    let app = App::standard();
    let mut browser = Browser::default();
    browser.send(&app.pages, browser.request("GET", "/"), ok()).await;

    let req = browser
        .request("POST", "/transfer")
        .with_header("X-CSRFToken", "forged")
        .unwrap();
    let response = browser.send(&app.actions, req, ok()).await;

    assert_eq!(response.status, 400);
    assert_eq!(response.body_text(), "Invalid csrf token.");
    assert_eq!(csrf_cookie_writes(&response), vec!["_csrf=; Path=/"]);
    assert_eq!(browser.csrf_cookie(), None);
}

#[tokio::test]
async fn test_missing_token_is_rejected_without_touching_cookie() {
    let app = App::standard();
    let mut browser = Browser::default();
    browser.send(&app.pages, browser.request("GET", "/"), ok()).await;
    let before = browser.csrf_cookie().map(str::to_string);

    let response = browser
        .send(&app.actions, browser.request("POST", "/transfer"), ok())
        .await;

    assert_eq!(response.status, 400);
    assert_eq!(response.body_text(), "Bad Request: no CSRF token present");
    assert!(csrf_cookie_writes(&response).is_empty());
    assert_eq!(browser.csrf_cookie().map(str::to_string), before);
}

#[tokio::test]
async fn test_header_takes_priority_over_form_field() {
    let app = App::standard();
    let mut browser = Browser::default();
    browser.send(&app.pages, browser.request("GET", "/"), ok()).await;

    let token = browser.csrf_cookie().unwrap().to_string();
    let req = browser
        .request("POST", "/transfer")
        .with_header("X-CSRFToken", "forged")
        .unwrap()
        .with_form(&[("_csrf", &token)])
        .unwrap();
    let response = browser.send(&app.actions, req, ok()).await;

    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn test_end_to_end_known_identity() {
    let app = App::standard();
    let mut browser = Browser::default();

    browser
        .send(&app.pages, browser.request("POST", "/login"), login("42"))
        .await;
    browser.send(&app.pages, browser.request("GET", "/"), ok()).await;

    let token = derive_token(b"s1", "42", ACTION_POST);
    assert_eq!(browser.csrf_cookie(), Some(token.as_str()));

    let req = browser
        .request("POST", "/transfer")
        .with_header("X-CSRFToken", &token)
        .unwrap();
    assert_eq!(browser.send(&app.actions, req, ok()).await.status, 200);

    let req = browser
        .request("POST", "/transfer")
        .with_header("X-CSRFToken", &format!("{}-tampered", token))
        .unwrap();
    assert_eq!(browser.send(&app.actions, req, ok()).await.status, 400);
}

#[tokio::test]
async fn test_handlers_see_token_and_form_field() {
    let app = App::standard();
    let browser = Browser::default();

    let handler = handler_fn(|req: HttpRequest| async move {
        let html = req.csrf_token_html().unwrap_or_default();
        Ok(HttpResponse::ok().with_text(html))
    });
    let response = app
        .pages
        .apply(browser.request("GET", "/form"), handler)
        .await
        .unwrap();

    let token = derive_token(b"s1", "0", ACTION_POST);
    assert_eq!(
        response.body_text(),
        format!(r#"<input type="hidden" name="_csrf" value="{}">"#, token)
    );
}

#[tokio::test]
async fn test_origin_header_skips_issuance() {
    let app = App::new(
        CsrfConfig::new()
            .with_secret("s1")
            .with_set_cookie(true)
            .with_set_header(true)
            .with_skip_on_origin_header(true),
    );

    let handler = handler_fn(|req: HttpRequest| async move {
        assert!(req.csrf_context().is_none());
        Ok(HttpResponse::ok())
    });
    let req = HttpRequest::new("GET", "/api")
        .with_header("Origin", "https://partner.example")
        .unwrap();
    let response = app.pages.apply(req, handler).await.unwrap();

    assert!(csrf_cookie_writes(&response).is_empty());
    assert!(response.header("X-CSRFToken").is_none());
}

#[tokio::test]
async fn test_origin_request_on_protected_route_is_client_error() {
    let app = App::new(
        CsrfConfig::new()
            .with_secret("s1")
            .with_skip_on_origin_header(true),
    );

    // A token that would verify for the anonymous identity
    let token = derive_token(b"s1", "0", ACTION_POST);
    let req = HttpRequest::new("POST", "/transfer")
        .with_header("Origin", "https://evil.example")
        .unwrap()
        .with_header("X-CSRFToken", &token)
        .unwrap();
    let response = app.actions.apply(req, ok()).await.unwrap();

    assert_eq!(response.status, 400);
    assert_eq!(response.body_text(), "Invalid csrf token.");
}

#[tokio::test]
async fn test_origin_header_ignored_unless_configured() {
    let app = App::standard();
    let req = HttpRequest::new("GET", "/")
        .with_header("Origin", "https://partner.example")
        .unwrap();
    let response = app.pages.apply(req, ok()).await.unwrap();

    assert_eq!(csrf_cookie_writes(&response).len(), 1);
}

#[tokio::test]
async fn test_custom_failure_handler() {
    let app = App::new(
        CsrfConfig::new()
            .with_secret("s1")
            .with_failure_handler(|response| {
                response.status = 403;
                response.set_text("go away");
            }),
    );

    let req = HttpRequest::new("POST", "/transfer")
        .with_header("X-CSRFToken", "forged")
        .unwrap();
    let response = app.actions.apply(req, ok()).await.unwrap();

    assert_eq!(response.status, 403);
    assert_eq!(response.body_text(), "go away");
}

#[tokio::test]
async fn test_unreadable_identity_is_a_server_error() {
    let app = App::standard();
    let mut browser = Browser::default();

    let corrupt = handler_fn(|req: HttpRequest| async move {
        if let Some(session) = req.session() {
            session.set("uid", vec![4, 2])?;
        }
        Ok(HttpResponse::ok())
    });
    browser
        .send(&app.pages, browser.request("POST", "/login"), corrupt)
        .await;

    let result = app.pages.apply(browser.request("GET", "/"), ok()).await;
    assert!(matches!(result, Err(Error::Internal(_))));
}

#[tokio::test]
async fn test_missing_session_middleware_is_a_server_error() {
    let mut chain = MiddlewareChain::new();
    chain.use_middleware(CsrfMiddleware::new(CsrfConfig::new()));

    let result = chain.apply(HttpRequest::new("GET", "/"), ok()).await;
    assert!(matches!(result, Err(Error::Internal(_))));
}
