//! Issuance middleware.

use crate::config::CsrfConfig;
use crate::context::{CsrfContext, CsrfRequestExt, IssuanceSkipped};
use crate::error::CsrfError;
use crate::token::{ACTION_POST, derive_token, verify_token};
use async_trait::async_trait;
use palisade_core::{Cookie, Error, HttpRequest, HttpResponse, Middleware, Next};
use palisade_session::{SessionHandle, SessionRequestExt};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, warn};

/// Binds a CSRF token to every request.
///
/// The token is derived from the configured secret and the session identity
/// (`"0"` when the session has none). It is reused while the identity stays
/// the same and the client presents a cookie that still verifies; otherwise a
/// new one is issued. The result is published as a [`CsrfContext`] for
/// handlers, templates and [`CsrfValidator`](crate::CsrfValidator), and
/// optionally sent back in a cookie and a response header.
///
/// Must run after `SessionMiddleware`.
///
/// # Examples
///
/// ```
/// use palisade_core::MiddlewareChain;
/// use palisade_csrf::{CsrfConfig, CsrfMiddleware, CsrfValidator};
/// use palisade_session::{MemorySessionStore, SessionConfig, SessionMiddleware};
/// use std::sync::Arc;
///
/// let store = Arc::new(MemorySessionStore::default());
/// let mut chain = MiddlewareChain::new();
/// chain.use_middleware(SessionMiddleware::new(store, SessionConfig::default()).unwrap());
/// chain.use_middleware(CsrfMiddleware::new(
///     CsrfConfig::new().with_secret("change-me").with_set_cookie(true),
/// ));
/// chain.use_middleware(CsrfValidator::new());
/// assert_eq!(chain.len(), 3);
/// ```
pub struct CsrfMiddleware {
    config: Arc<CsrfConfig>,
}

/// Outcome of the issuance decision for one request.
struct Issued {
    token: String,
    identity: String,
    cookie: Option<Cookie>,
}

impl CsrfMiddleware {
    pub fn new(config: CsrfConfig) -> Self {
        Self::from_shared(Arc::new(config))
    }

    /// Use a configuration shared with other components.
    pub fn from_shared(config: Arc<CsrfConfig>) -> Self {
        if config.is_secret_degraded() {
            warn!("CSRF secret was generated without secure randomness; tokens may be forgeable");
        }
        Self { config }
    }

    pub fn config(&self) -> &Arc<CsrfConfig> {
        &self.config
    }

    fn issue(&self, req: &HttpRequest, session: &SessionHandle) -> Result<Issued, CsrfError> {
        let config = &self.config;
        let identity = session
            .get_string(&config.session_key)?
            .unwrap_or_else(|| "0".to_string());

        let previous_key = config.previous_identity_key();
        let previous = session.get_string(&previous_key)?;

        let reusable = if previous.as_deref() == Some(identity.as_str()) {
            req.cookie(&config.cookie_name)
                .filter(|token| !token.is_empty())
                .filter(|token| {
                    verify_token(token, config.secret.as_bytes(), &identity, ACTION_POST)
                })
        } else {
            debug!(identity = %identity, "Session identity changed, rotating CSRF token");
            session.set(&previous_key, identity.as_str())?;
            None
        };

        if let Some(token) = reusable {
            debug!(identity = %identity, "Reusing CSRF token from cookie");
            return Ok(Issued {
                token,
                identity,
                cookie: None,
            });
        }

        let token = derive_token(config.secret.as_bytes(), &identity, ACTION_POST);
        debug!(identity = %identity, "Issued CSRF token");

        let cookie = config.set_cookie.then(|| self.token_cookie(&token));
        Ok(Issued {
            token,
            identity,
            cookie,
        })
    }

    fn token_cookie(&self, token: &str) -> Cookie {
        let config = &self.config;
        let cookie = Cookie::new(&config.cookie_name, token)
            .with_path(&config.cookie_path)
            .with_domain(config.cookie_domain.clone())
            .with_secure(config.cookie_secure)
            .with_http_only(config.cookie_http_only)
            .with_same_site(config.cookie_same_site);

        match SystemTime::now().checked_add(config.cookie_ttl) {
            Some(expires) => cookie.with_expires(expires),
            None => cookie,
        }
    }
}

#[async_trait]
impl Middleware for CsrfMiddleware {
    async fn handle(&self, mut req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        if self.config.skip_on_origin_header
            && req.header("Origin").is_some_and(|origin| !origin.is_empty())
        {
            debug!(path = %req.path, "Origin header present, skipping CSRF issuance");
            req.extensions.insert(IssuanceSkipped {
                config: self.config.clone(),
            });
            return next(req).await;
        }

        let Some(session) = req.session().cloned() else {
            error!(path = %req.path, "CsrfMiddleware reached without a session");
            return Err(CsrfError::MissingSession.into());
        };

        let issued = self.issue(&req, &session).map_err(|e| {
            error!(error = %e, "CSRF issuance failed");
            Error::from(e)
        })?;

        let token = issued.token.clone();
        req.set_csrf_context(CsrfContext::new(
            issued.token,
            issued.identity,
            self.config.clone(),
        ));

        let mut response = next(req).await?;

        if let Some(cookie) = issued.cookie {
            response.set_cookie(&cookie)?;
        }
        if self.config.set_header {
            response.append_header(&self.config.header_name, &token)?;
        }

        Ok(response)
    }
}
