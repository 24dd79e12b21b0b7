//! Per-request CSRF context published by the issuance middleware.

use crate::config::CsrfConfig;
use crate::token::{ACTION_POST, verify_token};
use crate::validate::{CandidateSources, CsrfProtection};
use palisade_core::{Cookie, HttpRequest, HttpResponse};
use std::sync::Arc;
use tracing::warn;

/// The token issued for the current request and what it was bound to.
#[derive(Debug, Clone)]
pub struct CsrfContext {
    token: String,
    identity: String,
    config: Arc<CsrfConfig>,
}

impl CsrfContext {
    pub fn new(token: impl Into<String>, identity: impl Into<String>, config: Arc<CsrfConfig>) -> Self {
        Self {
            token: token.into(),
            identity: identity.into(),
            config,
        }
    }

    /// Raw token value.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Identity the token is bound to (`"0"` for anonymous sessions).
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }

    /// Hidden form input carrying the token, ready to embed in a template.
    pub fn token_html(&self) -> String {
        format!(
            r#"<input type="hidden" name="{}" value="{}">"#,
            escape_html(&self.config.form_field_name),
            escape_html(&self.token)
        )
    }
}

impl CsrfProtection for CsrfContext {
    fn candidate_sources(&self) -> CandidateSources<'_> {
        CandidateSources {
            header: &self.config.header_name,
            form_field: &self.config.form_field_name,
        }
    }

    fn verify(&self, token: &str) -> bool {
        verify_token(
            token,
            self.config.secret.as_bytes(),
            &self.identity,
            ACTION_POST,
        )
    }

    fn on_failure(&self, response: &mut HttpResponse) {
        let clear = Cookie::removal(&self.config.cookie_name, &self.config.cookie_path);
        if let Err(e) = response.set_cookie(&clear) {
            warn!(error = %e, cookie = %self.config.cookie_name, "Could not clear CSRF cookie");
        }
        (self.config.on_failure)(response);
    }
}

/// Left in place of a [`CsrfContext`] when issuance was skipped for a request
/// carrying an `Origin` header.
#[derive(Debug, Clone)]
pub(crate) struct IssuanceSkipped {
    pub(crate) config: Arc<CsrfConfig>,
}

/// CSRF accessors on [`HttpRequest`].
pub trait CsrfRequestExt {
    fn set_csrf_context(&mut self, context: CsrfContext);

    /// Context installed by [`CsrfMiddleware`](crate::CsrfMiddleware), if any.
    fn csrf_context(&self) -> Option<&CsrfContext>;

    fn csrf_token(&self) -> Option<&str> {
        self.csrf_context().map(CsrfContext::token)
    }

    fn csrf_token_html(&self) -> Option<String> {
        self.csrf_context().map(CsrfContext::token_html)
    }
}

impl CsrfRequestExt for HttpRequest {
    fn set_csrf_context(&mut self, context: CsrfContext) {
        self.extensions.insert(context);
    }

    fn csrf_context(&self) -> Option<&CsrfContext> {
        self.extensions.get::<CsrfContext>()
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::derive_token;

    fn context(identity: &str) -> CsrfContext {
        let config = Arc::new(CsrfConfig::new().with_secret("s1"));
        let token = derive_token(b"s1", identity, ACTION_POST);
        CsrfContext::new(token, identity, config)
    }

    #[test]
    fn test_token_html() {
        let ctx = context("42");
        assert_eq!(
            ctx.token_html(),
            format!(r#"<input type="hidden" name="_csrf" value="{}">"#, ctx.token())
        );
    }

    #[test]
    fn test_token_html_uses_configured_field_and_escapes() {
        let config = Arc::new(CsrfConfig::new().with_form_field_name("x\"y"));
        let ctx = CsrfContext::new("a<b>&", "0", config);
        assert_eq!(
            ctx.token_html(),
            r#"<input type="hidden" name="x&quot;y" value="a&lt;b&gt;&amp;">"#
        );
    }

    #[test]
    fn test_verify_is_bound_to_identity() {
        let ctx = context("42");
        assert!(ctx.verify(ctx.token()));
        assert!(!ctx.verify(&derive_token(b"s1", "0", ACTION_POST)));
        assert!(!ctx.verify(""));
    }

    #[test]
    fn test_candidate_sources() {
        let ctx = context("0");
        let sources = ctx.candidate_sources();
        assert_eq!(sources.header, "X-CSRFToken");
        assert_eq!(sources.form_field, "_csrf");
    }

    #[test]
    fn test_on_failure_clears_cookie_then_runs_handler() {
        let ctx = context("42");
        let mut response = HttpResponse::ok();
        ctx.on_failure(&mut response);

        assert_eq!(response.status, 400);
        assert_eq!(response.body_text(), "Invalid csrf token.");
        assert_eq!(response.set_cookies(), vec!["_csrf=; Path=/"]);
    }

    #[test]
    fn test_request_accessors() {
        let mut req = HttpRequest::new("GET", "/");
        assert!(req.csrf_token().is_none());

        let ctx = context("42");
        let expected = ctx.token().to_string();
        req.set_csrf_context(ctx);

        assert_eq!(req.csrf_token(), Some(expected.as_str()));
        assert!(req.csrf_token_html().unwrap().contains(&expected));
    }
}
