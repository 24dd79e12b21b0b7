// Core library for the Palisade HTTP middleware stack
// This module contains the request/response model, request-scoped context,
// cookie transport and the middleware chain the other Palisade crates plug into.

pub mod cookie;
pub mod error;
pub mod extensions;
pub mod form;
pub mod http;
pub mod logging;
pub mod middleware;

// Re-export commonly used types
pub use cookie::{Cookie, SameSite, parse_cookie_header};
pub use error::*;
pub use extensions::Extensions;
pub use form::*;
pub use self::http::{HttpRequest, HttpResponse};
pub use middleware::{BoxFuture, HandlerFn, Middleware, MiddlewareChain, Next, handler_fn};
