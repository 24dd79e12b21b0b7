//! Session storage for Palisade.
//!
//! Sessions hold small per-user key/value state on the server, addressed by a
//! random ID carried in a cookie. CSRF protection keys its tokens to the
//! identity stored here.
//!
//! # Components
//!
//! - [`Session`] - the stored record (JSON values, expiry timestamps)
//! - [`SessionStore`] - storage backend trait, with [`MemorySessionStore`]
//! - [`SessionMiddleware`] - loads/creates the session for each request and
//!   saves it afterwards
//! - [`SessionHandle`] - the per-request `get`/`set` view handlers use
//!
//! # Example
//!
//! ```
//! use palisade_core::{HttpRequest, HttpResponse, MiddlewareChain, handler_fn};
//! use palisade_session::*;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemorySessionStore::default());
//! let mut chain = MiddlewareChain::new();
//! chain.use_middleware(SessionMiddleware::new(store.clone(), SessionConfig::default()).unwrap());
//!
//! let handler = handler_fn(|req: HttpRequest| async move {
//!     if let Some(session) = req.session() {
//!         session.set("uid", "42")?;
//!     }
//!     Ok(HttpResponse::ok())
//! });
//!
//! let response = chain.apply(HttpRequest::new("GET", "/login"), handler).await.unwrap();
//! assert_eq!(response.set_cookies().len(), 1);
//! assert_eq!(store.count().await.unwrap(), 1);
//! # });
//! ```

pub mod config;
pub mod error;
pub mod handle;
pub mod memory;
pub mod middleware;
pub mod traits;

pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use handle::{SessionHandle, SessionRequestExt};
pub use memory::MemorySessionStore;
pub use middleware::SessionMiddleware;
pub use traits::{Session, SessionStore, generate_session_id};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::SessionConfig;
    pub use crate::error::{SessionError, SessionResult};
    pub use crate::handle::{SessionHandle, SessionRequestExt};
    pub use crate::memory::MemorySessionStore;
    pub use crate::middleware::SessionMiddleware;
    pub use crate::traits::{Session, SessionStore};
}
