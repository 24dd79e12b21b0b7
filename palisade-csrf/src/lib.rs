//! # Palisade CSRF Protection
//!
//! Session-bound Cross-Site Request Forgery protection.
//!
//! ## Features
//!
//! - **Stateless tokens** - HMAC-SHA256 of the session identity, recomputed
//!   on every check instead of stored
//! - **Identity rotation** - a new token is issued whenever the session
//!   identity changes (e.g. on login)
//! - **Cookie / header / form transport** - all names configurable
//! - **Template helper** - a ready-made hidden `<input>` for forms
//!
//! Two middleware cooperate: [`CsrfMiddleware`] issues a token for every
//! request and publishes it as a [`CsrfContext`]; [`CsrfValidator`] guards
//! state-changing routes by checking the token a request presents in the
//! configured header or form field.
//!
//! ## Quick Start
//!
//! ```rust
//! use palisade_core::{HttpRequest, HttpResponse, MiddlewareChain, handler_fn};
//! use palisade_csrf::*;
//! use palisade_session::{MemorySessionStore, SessionConfig, SessionMiddleware};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemorySessionStore::default());
//! let mut chain = MiddlewareChain::new();
//! chain.use_middleware(SessionMiddleware::new(store, SessionConfig::default()).unwrap());
//! chain.use_middleware(CsrfMiddleware::new(CsrfConfig::new().with_secret("s1")));
//!
//! let form = handler_fn(|req: HttpRequest| async move {
//!     let field = req.csrf_token_html().unwrap_or_default();
//!     Ok(HttpResponse::ok().with_text(format!("<form method=\"post\">{}</form>", field)))
//! });
//!
//! let response = chain.apply(HttpRequest::new("GET", "/form"), form).await.unwrap();
//! assert!(response.body_text().contains(&derive_token(b"s1", "0", ACTION_POST)));
//! # });
//! ```
//!
//! ## Token Authority
//!
//! ```rust
//! use palisade_csrf::{ACTION_POST, derive_token, verify_token};
//!
//! let token = derive_token(b"s1", "42", ACTION_POST);
//! assert!(verify_token(&token, b"s1", "42", ACTION_POST));
//! assert!(!verify_token(&format!("{}-tampered", token), b"s1", "42", ACTION_POST));
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod middleware;
pub mod token;
pub mod validate;

pub use config::{CsrfConfig, CsrfSettings, FailureHandler, SecretSource, default_failure_handler};
pub use context::{CsrfContext, CsrfRequestExt};
pub use error::{CsrfError, Result};
pub use middleware::CsrfMiddleware;
pub use token::{
    ACTION_POST, EntropySource, RandomString, derive_token, random_string, verify_token,
};
pub use validate::{CandidateSources, CsrfProtection, CsrfValidator, validate};
