//! Verification middleware.

use crate::context::{CsrfRequestExt, IssuanceSkipped};
use crate::error::CsrfError;
use async_trait::async_trait;
use palisade_core::{Error, HttpRequest, HttpResponse, Middleware, Next};
use tracing::{debug, error, warn};

/// Where a request may carry its token, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateSources<'a> {
    pub header: &'a str,
    pub form_field: &'a str,
}

/// What the verification path needs from a token provider.
pub trait CsrfProtection: Send + Sync {
    /// Request locations to read a candidate token from.
    fn candidate_sources(&self) -> CandidateSources<'_>;

    /// Whether `token` is valid for the current request.
    fn verify(&self, token: &str) -> bool;

    /// Turn `response` into the rejection for an invalid token.
    fn on_failure(&self, response: &mut HttpResponse);
}

/// Gate `req` on a valid token, forwarding it to `next` only on success.
///
/// The header is checked first; the form field is consulted only when the
/// header is absent or empty. An invalid token is handed to
/// [`CsrfProtection::on_failure`]. A request carrying no token at all gets a
/// plain 400 and no cookie changes.
pub async fn validate(
    req: HttpRequest,
    protection: &dyn CsrfProtection,
    next: Next,
) -> Result<HttpResponse, Error> {
    let sources = protection.candidate_sources();

    let candidate = match req.header(sources.header).filter(|v| !v.is_empty()) {
        Some(token) => Some(token.to_string()),
        None => req.form_value(sources.form_field).filter(|v| !v.is_empty()),
    };

    let Some(token) = candidate else {
        debug!(path = %req.path, "Rejecting request without CSRF token");
        return Ok(Error::from(CsrfError::MissingToken).into_response());
    };

    if !protection.verify(&token) {
        warn!(method = %req.method, path = %req.path, "Rejecting request with invalid CSRF token");
        let mut response = HttpResponse::bad_request();
        protection.on_failure(&mut response);
        return Ok(response);
    }

    debug!(path = %req.path, "CSRF token verified");
    next(req).await
}

/// Middleware running [`validate`] against the context published by
/// [`CsrfMiddleware`](crate::CsrfMiddleware).
///
/// Install it on routes that change state. Requests for which issuance was
/// skipped (see [`CsrfConfig::skip_on_origin_header`](crate::CsrfConfig))
/// have nothing to verify against and are rejected through the configured
/// failure handler. Requests reaching it with no `CsrfMiddleware` in front
/// are refused with an internal error.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsrfValidator;

impl CsrfValidator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for CsrfValidator {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        if let Some(skipped) = req.extensions.get::<IssuanceSkipped>() {
            warn!(
                method = %req.method,
                path = %req.path,
                "Rejecting request that bypassed CSRF issuance"
            );
            let mut response = HttpResponse::bad_request();
            (skipped.config.on_failure)(&mut response);
            return Ok(response);
        }

        let Some(context) = req.csrf_context().cloned() else {
            error!(path = %req.path, "CsrfValidator reached without a CSRF context");
            return Err(CsrfError::MissingContext.into());
        };

        validate(req, &context, next).await
    }
}
