//! Session configuration.

use crate::error::{SessionError, SessionResult};
use std::time::Duration;

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Session namespace/prefix
    pub namespace: String,
    /// Default session TTL
    pub default_ttl: Duration,
    /// Maximum session TTL (for security)
    pub max_ttl: Duration,
    /// Minimum time between sweeps of expired sessions by in-process stores
    pub cleanup_interval: Duration,
    /// Name of the cookie carrying the session ID
    pub cookie_name: String,
    /// Cookie path
    pub cookie_path: String,
    /// Cookie domain (host-only when `None`)
    pub cookie_domain: Option<String>,
    /// Set the Secure flag on the session cookie
    pub cookie_secure: bool,
    /// Set the HttpOnly flag on the session cookie
    pub cookie_http_only: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            namespace: "session".to_string(),
            default_ttl: Duration::from_secs(3600), // 1 hour
            max_ttl: Duration::from_secs(86400 * 7), // 7 days
            cleanup_interval: Duration::from_secs(60),
            cookie_name: "session_id".to_string(),
            cookie_path: "/".to_string(),
            cookie_domain: None,
            cookie_secure: false,
            cookie_http_only: true,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session namespace/prefix.
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    /// Set the default session TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the maximum session TTL.
    pub fn with_max_ttl(mut self, ttl: Duration) -> Self {
        self.max_ttl = ttl;
        self
    }

    /// Set how often expired sessions are swept.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Set the session cookie name.
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn with_cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie_path = path.into();
        self
    }

    pub fn with_cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie_domain = Some(domain.into());
        self
    }

    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    pub fn with_cookie_http_only(mut self, http_only: bool) -> Self {
        self.cookie_http_only = http_only;
        self
    }

    /// Check the configuration for values no store can work with.
    pub fn validate(&self) -> SessionResult<()> {
        if self.cookie_name.is_empty() {
            return Err(SessionError::Config("cookie name must not be empty".into()));
        }
        if self.default_ttl.is_zero() {
            return Err(SessionError::Config("default TTL must be positive".into()));
        }
        if self.default_ttl > self.max_ttl {
            return Err(SessionError::Config(
                "default TTL exceeds maximum TTL".into(),
            ));
        }
        if self.cleanup_interval.is_zero() {
            return Err(SessionError::Config(
                "cleanup interval must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Interval between expiry sweeps; never longer than the default TTL.
    pub fn sweep_interval(&self) -> Duration {
        self.cleanup_interval.min(self.default_ttl)
    }

    /// Clamp a requested TTL to the configured maximum.
    pub fn effective_ttl(&self, ttl: Option<Duration>) -> Duration {
        ttl.unwrap_or(self.default_ttl).min(self.max_ttl)
    }

    /// Build the session key with namespace.
    pub fn session_key(&self, session_id: &str) -> String {
        format!("{}:{}", self.namespace, session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cookie_name, "session_id");
        assert_eq!(config.session_key("abc"), "session:abc");
    }

    #[test]
    fn test_effective_ttl_is_clamped() {
        let config = SessionConfig::new().with_max_ttl(Duration::from_secs(60));
        assert_eq!(
            config.effective_ttl(Some(Duration::from_secs(600))),
            Duration::from_secs(60)
        );
        assert_eq!(
            config.effective_ttl(Some(Duration::from_secs(30))),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_invalid_configs() {
        assert!(SessionConfig::new().with_cookie_name("").validate().is_err());
        assert!(
            SessionConfig::new()
                .with_default_ttl(Duration::from_secs(10))
                .with_max_ttl(Duration::from_secs(5))
                .validate()
                .is_err()
        );
        assert!(
            SessionConfig::new()
                .with_default_ttl(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            SessionConfig::new()
                .with_cleanup_interval(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_sweep_interval_follows_short_ttls() {
        let config = SessionConfig::new().with_default_ttl(Duration::from_secs(5));
        assert_eq!(config.sweep_interval(), Duration::from_secs(5));
        assert_eq!(SessionConfig::new().sweep_interval(), Duration::from_secs(60));
    }
}
