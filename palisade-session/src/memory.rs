//! In-process session storage.

use crate::config::SessionConfig;
use crate::error::SessionResult;
use crate::traits::{Session, SessionStore, generate_session_id};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Session store keeping every session in process memory.
///
/// Suitable for single-instance deployments and tests. Sessions are lost on
/// restart and are not shared between processes.
///
/// Expired sessions are swept on write, at most once per
/// [`SessionConfig::sweep_interval`], so the map stays bounded without an
/// external [`cleanup_expired`](SessionStore::cleanup_expired) schedule.
///
/// # Examples
///
/// ```
/// use palisade_session::{MemorySessionStore, SessionConfig, SessionStore};
///
/// # tokio_test::block_on(async {
/// let store = MemorySessionStore::new(SessionConfig::default())?;
///
/// let mut session = store.create(None).await?;
/// session.set("uid", "42")?;
/// store.save(&session).await?;
///
/// let loaded = store.get(&session.id).await?.unwrap();
/// assert_eq!(loaded.get_string("uid")?, Some("42".to_string()));
/// # Ok::<(), palisade_session::SessionError>(())
/// # });
/// ```
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    config: SessionConfig,
    last_sweep: Mutex<Instant>,
}

impl MemorySessionStore {
    /// Create a store, rejecting an invalid configuration.
    pub fn new(config: SessionConfig) -> SessionResult<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn session_key(&self, session_id: &str) -> String {
        self.config.session_key(session_id)
    }

    /// Claim the next sweep if the interval has elapsed.
    fn sweep_due(&self) -> bool {
        let mut last = self.last_sweep.lock();
        if last.elapsed() < self.config.sweep_interval() {
            return false;
        }
        *last = Instant::now();
        true
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        // The default configuration always validates.
        Self::with_valid_config(SessionConfig::default())
    }
}

fn sweep(sessions: &mut HashMap<String, Session>) -> usize {
    let before = sessions.len();
    sessions.retain(|_, session| !session.is_expired());
    before - sessions.len()
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, ttl: Option<Duration>) -> SessionResult<Session> {
        let ttl = self.config.effective_ttl(ttl);
        let session = Session::new(generate_session_id(), ttl);
        self.save(&session).await?;
        debug!(session_id = %session.id, ttl_secs = ttl.as_secs(), "Session created");
        Ok(session)
    }

    async fn get(&self, session_id: &str) -> SessionResult<Option<Session>> {
        let key = self.session_key(session_id);

        let expired = match self.sessions.read().get(&key) {
            Some(session) if !session.is_expired() => return Ok(Some(session.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.sessions.write().remove(&key);
            debug!(session_id, "Expired session evicted on read");
        }
        Ok(None)
    }

    async fn save(&self, session: &Session) -> SessionResult<()> {
        let key = self.session_key(&session.id);
        let mut sessions = self.sessions.write();
        sessions.insert(key, session.clone());

        if self.sweep_due() {
            let removed = sweep(&mut sessions);
            if removed > 0 {
                debug!(removed, remaining = sessions.len(), "Swept expired sessions");
            }
        }
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> SessionResult<()> {
        let key = self.session_key(session_id);
        self.sessions.write().remove(&key);
        Ok(())
    }

    async fn count(&self) -> SessionResult<usize> {
        Ok(self.sessions.read().len())
    }

    async fn cleanup_expired(&self) -> SessionResult<usize> {
        let removed = sweep(&mut self.sessions.write());
        *self.last_sweep.lock() = Instant::now();
        Ok(removed)
    }
}
