// Palisade - session-bound CSRF protection for Rust HTTP services
//
// This crate bundles the Palisade HTTP primitives, sessions and the CSRF
// issuance/verification middleware behind one dependency.

// Re-export core functionality
pub use palisade_core::*;

// Re-export optional crates
#[cfg(feature = "session")]
pub use palisade_session;

#[cfg(feature = "csrf")]
pub use palisade_csrf;

/// Commonly used types for wiring up CSRF protection.
pub mod prelude {
    pub use palisade_core::{
        Cookie, Error, HandlerFn, HttpRequest, HttpResponse, Middleware, MiddlewareChain, Next,
        SameSite, handler_fn,
        logging::{LogConfig, LogFormat, LogLevel},
    };

    #[cfg(feature = "session")]
    pub use palisade_session::prelude::*;

    #[cfg(feature = "csrf")]
    pub use palisade_csrf::{
        ACTION_POST, CsrfConfig, CsrfContext, CsrfError, CsrfMiddleware, CsrfProtection,
        CsrfRequestExt, CsrfSettings, CsrfValidator, derive_token, verify_token,
    };
}
