//! Per-request access to the current session.

use crate::error::SessionResult;
use crate::traits::Session;
use palisade_core::HttpRequest;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared view of the session bound to one request.
///
/// [`SessionMiddleware`](crate::SessionMiddleware) inserts a handle into the
/// request extensions before the rest of the chain runs and persists the
/// session afterwards if anything was written through the handle. Clones
/// refer to the same session.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    session: Mutex<Session>,
    modified: AtomicBool,
    is_new: bool,
}

impl SessionHandle {
    pub fn new(session: Session, is_new: bool) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                session: Mutex::new(session),
                modified: AtomicBool::new(false),
                is_new,
            }),
        }
    }

    /// The session ID.
    pub fn id(&self) -> String {
        self.inner.session.lock().id.clone()
    }

    /// Whether the session was created for this request.
    pub fn is_new(&self) -> bool {
        self.inner.is_new
    }

    /// Whether anything was written through this handle.
    pub fn is_modified(&self) -> bool {
        self.inner.modified.load(Ordering::Acquire)
    }

    /// Read a value as a string. See [`Session::get_string`].
    pub fn get_string(&self, key: &str) -> SessionResult<Option<String>> {
        self.inner.session.lock().get_string(key)
    }

    /// Read a typed value. See [`Session::get`].
    pub fn get<T: for<'de> serde::Deserialize<'de>>(&self, key: &str) -> SessionResult<Option<T>> {
        self.inner.session.lock().get(key)
    }

    /// Write a value; the session is saved when the request completes.
    pub fn set<T: Serialize>(&self, key: &str, value: T) -> SessionResult<()> {
        self.inner.session.lock().set(key, value)?;
        self.inner.modified.store(true, Ordering::Release);
        Ok(())
    }

    /// Remove a value, returning whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.inner.session.lock().remove(key).is_some();
        if removed {
            self.inner.modified.store(true, Ordering::Release);
        }
        removed
    }

    /// Copy of the current session state.
    pub fn snapshot(&self) -> Session {
        self.inner.session.lock().clone()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id())
            .field("is_new", &self.is_new())
            .field("modified", &self.is_modified())
            .finish()
    }
}

/// Session access on [`HttpRequest`].
pub trait SessionRequestExt {
    /// The session handle installed by the session middleware, if any.
    fn session(&self) -> Option<&SessionHandle>;
}

impl SessionRequestExt for HttpRequest {
    fn session(&self) -> Option<&SessionHandle> {
        self.extensions.get::<SessionHandle>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn handle() -> SessionHandle {
        SessionHandle::new(Session::new("s1", Duration::from_secs(60)), false)
    }

    #[test]
    fn test_reads_do_not_mark_modified() {
        let handle = handle();
        assert_eq!(handle.get_string("uid").unwrap(), None);
        assert!(!handle.is_modified());
    }

    #[test]
    fn test_writes_are_shared_between_clones() {
        let handle = handle();
        let clone = handle.clone();
        clone.set("uid", "42").unwrap();

        assert!(handle.is_modified());
        assert_eq!(handle.get_string("uid").unwrap(), Some("42".to_string()));
        assert_eq!(handle.snapshot().get_string("uid").unwrap(), Some("42".to_string()));
    }

    #[test]
    fn test_remove_missing_key_is_not_a_modification() {
        let handle = handle();
        assert!(!handle.remove("missing"));
        assert!(!handle.is_modified());

        handle.set("uid", 1).unwrap();
        assert!(handle.remove("uid"));
    }

    #[test]
    fn test_request_extension_lookup() {
        let mut req = HttpRequest::new("GET", "/");
        assert!(req.session().is_none());

        req.extensions.insert(handle());
        assert_eq!(req.session().map(|s| s.id()), Some("s1".to_string()));
    }
}
