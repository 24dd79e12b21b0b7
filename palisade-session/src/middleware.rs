//! Session loading and persistence around the request chain.

use crate::config::SessionConfig;
use crate::error::SessionResult;
use crate::handle::SessionHandle;
use crate::traits::SessionStore;
use async_trait::async_trait;
use palisade_core::{Cookie, Error, HttpRequest, HttpResponse, Middleware, Next};
use std::sync::Arc;
use tracing::{debug, error};

/// Binds a session to each request.
///
/// The session named by the session cookie is loaded from the store; when the
/// cookie is missing or names an unknown or expired session a new one is
/// created. A [`SessionHandle`] is placed into the request extensions for the
/// rest of the chain. After the chain returns the session is saved if it is
/// new or was modified, and new sessions get their cookie set on the response.
///
/// Store failures are surfaced as [`Error::Internal`]; they are never treated
/// as "no session".
pub struct SessionMiddleware {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl SessionMiddleware {
    /// Create the middleware, rejecting an invalid configuration.
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> SessionResult<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    async fn load(&self, req: &HttpRequest) -> Result<SessionHandle, Error> {
        if let Some(id) = req.cookie(&self.config.cookie_name).filter(|id| !id.is_empty()) {
            match self.store.get(&id).await {
                Ok(Some(mut session)) => {
                    session.touch();
                    return Ok(SessionHandle::new(session, false));
                }
                Ok(None) => debug!("Session cookie names no live session, starting a new one"),
                Err(e) => {
                    error!(error = %e, "Session store read failed");
                    return Err(e.into());
                }
            }
        }

        let session = self.store.create(None).await.map_err(|e| {
            error!(error = %e, "Session store create failed");
            Error::from(e)
        })?;
        Ok(SessionHandle::new(session, true))
    }

    fn session_cookie(&self, id: String) -> Cookie {
        Cookie::new(&self.config.cookie_name, id)
            .with_path(&self.config.cookie_path)
            .with_domain(self.config.cookie_domain.clone())
            .with_secure(self.config.cookie_secure)
            .with_http_only(self.config.cookie_http_only)
    }
}

#[async_trait]
impl Middleware for SessionMiddleware {
    async fn handle(&self, mut req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        let handle = self.load(&req).await?;
        req.extensions.insert(handle.clone());

        let mut response = next(req).await?;

        if handle.is_new() || handle.is_modified() {
            self.store.save(&handle.snapshot()).await.map_err(|e| {
                error!(error = %e, "Session store save failed");
                Error::from(e)
            })?;
        }

        if handle.is_new() {
            response.set_cookie(&self.session_cookie(handle.id()))?;
        }

        Ok(response)
    }
}
