use crate::token::{EntropySource, random_string};
use palisade_core::{HttpResponse, SameSite};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Length of a generated secret.
pub const GENERATED_SECRET_LEN: usize = 32;

/// Prefix for environment variables read by [`CsrfConfig::from_env`].
pub const ENV_PREFIX: &str = "PALISADE_CSRF_";

/// Writes the rejection response for a token that failed verification.
///
/// Receives the response under construction, which may already carry headers
/// such as the cookie-clearing `Set-Cookie`.
pub type FailureHandler = Arc<dyn Fn(&mut HttpResponse) + Send + Sync>;

/// Default failure handler: 400 with a fixed plaintext message.
pub fn default_failure_handler() -> FailureHandler {
    Arc::new(|response: &mut HttpResponse| {
        response.status = 400;
        response.set_text("Invalid csrf token.");
    })
}

/// How the signing secret was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    /// Supplied by configuration.
    Configured,
    /// Generated at startup.
    Generated(EntropySource),
}

/// CSRF protection configuration.
///
/// Built once at startup and shared read-only (behind an `Arc`) by the
/// issuance and verification middleware.
#[derive(Clone)]
pub struct CsrfConfig {
    /// Secret used along with the user identity to derive tokens
    pub secret: String,
    pub secret_source: SecretSource,

    /// Header used to send and receive the token
    pub header_name: String,

    /// Form field used to receive the token
    pub form_field_name: String,

    /// Cookie name for the token
    pub cookie_name: String,

    /// Cookie path
    pub cookie_path: String,

    /// Cookie domain (host-only when `None`)
    pub cookie_domain: Option<String>,

    /// Cookie HttpOnly flag
    pub cookie_http_only: bool,

    /// Cookie Secure flag (HTTPS only)
    pub cookie_secure: bool,

    /// Cookie SameSite attribute, omitted when `None`
    pub cookie_same_site: Option<SameSite>,

    /// Lifetime of an issued token cookie
    pub cookie_ttl: Duration,

    /// Session key holding the user identity
    pub session_key: String,

    /// Send the token in a response header
    pub set_header: bool,

    /// Send newly issued tokens in a cookie
    pub set_cookie: bool,

    /// Requests carrying a non-empty `Origin` header skip issuance entirely
    pub skip_on_origin_header: bool,

    /// Response writer for failed verification
    pub on_failure: FailureHandler,
}

impl CsrfConfig {
    /// Configuration with defaults and a freshly generated secret.
    pub fn new() -> Self {
        let generated = random_string(GENERATED_SECRET_LEN);

        Self {
            secret: generated.value,
            secret_source: SecretSource::Generated(generated.source),
            header_name: "X-CSRFToken".to_string(),
            form_field_name: "_csrf".to_string(),
            cookie_name: "_csrf".to_string(),
            cookie_path: "/".to_string(),
            cookie_domain: None,
            cookie_http_only: false,
            cookie_secure: false,
            cookie_same_site: None,
            cookie_ttl: Duration::from_secs(86400), // 1 day
            session_key: "uid".to_string(),
            set_header: false,
            set_cookie: false,
            skip_on_origin_header: false,
            on_failure: default_failure_handler(),
        }
    }

    /// Load configuration from `PALISADE_CSRF_*` environment variables.
    ///
    /// Unset, empty or unparsable values fall back to defaults.
    pub fn from_env() -> Self {
        CsrfSettings::from_lookup(|key| env::var(format!("{}{}", ENV_PREFIX, key)).ok())
            .into_config()
    }

    /// Session key remembering the identity seen on the previous request.
    pub fn previous_identity_key(&self) -> String {
        format!("_old_{}", self.session_key)
    }

    /// Whether the secret is predictable because secure randomness was unavailable.
    pub fn is_secret_degraded(&self) -> bool {
        self.secret_source == SecretSource::Generated(EntropySource::Degraded)
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secret = secret;
            self.secret_source = SecretSource::Configured;
        }
        self
    }

    pub fn with_header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    pub fn with_form_field_name(mut self, name: impl Into<String>) -> Self {
        self.form_field_name = name.into();
        self
    }

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

    pub fn with_cookie_http_only(mut self, http_only: bool) -> Self {
        self.cookie_http_only = http_only;
        self
    }

    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    pub fn with_cookie_same_site(mut self, same_site: SameSite) -> Self {
        self.cookie_same_site = Some(same_site);
        self
    }

    pub fn with_cookie_ttl(mut self, ttl: Duration) -> Self {
        self.cookie_ttl = ttl;
        self
    }

    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = key.into();
        self
    }

    pub fn with_set_header(mut self, enabled: bool) -> Self {
        self.set_header = enabled;
        self
    }

    pub fn with_set_cookie(mut self, enabled: bool) -> Self {
        self.set_cookie = enabled;
        self
    }

    pub fn with_skip_on_origin_header(mut self, enabled: bool) -> Self {
        self.skip_on_origin_header = enabled;
        self
    }

    pub fn with_failure_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut HttpResponse) + Send + Sync + 'static,
    {
        self.on_failure = Arc::new(handler);
        self
    }
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CsrfConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfConfig")
            .field("secret", &"<redacted>")
            .field("secret_source", &self.secret_source)
            .field("header_name", &self.header_name)
            .field("form_field_name", &self.form_field_name)
            .field("cookie_name", &self.cookie_name)
            .field("cookie_path", &self.cookie_path)
            .field("cookie_domain", &self.cookie_domain)
            .field("cookie_http_only", &self.cookie_http_only)
            .field("cookie_secure", &self.cookie_secure)
            .field("cookie_same_site", &self.cookie_same_site)
            .field("cookie_ttl", &self.cookie_ttl)
            .field("session_key", &self.session_key)
            .field("set_header", &self.set_header)
            .field("set_cookie", &self.set_cookie)
            .field("skip_on_origin_header", &self.skip_on_origin_header)
            .finish_non_exhaustive()
    }
}

/// Serializable CSRF options, as loaded from a config file or environment.
///
/// Every field is optional; missing and empty values take the
/// [`CsrfConfig`] defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CsrfSettings {
    pub secret: Option<String>,
    pub header_name: Option<String>,
    pub form_field_name: Option<String>,
    pub cookie_name: Option<String>,
    pub cookie_path: Option<String>,
    pub cookie_domain: Option<String>,
    pub cookie_http_only: Option<bool>,
    pub cookie_secure: Option<bool>,
    pub cookie_same_site: Option<String>,
    pub cookie_ttl_secs: Option<u64>,
    pub session_key: Option<String>,
    pub set_header: Option<bool>,
    pub set_cookie: Option<bool>,
    #[serde(alias = "reject_on_origin_header")]
    pub skip_on_origin_header: Option<bool>,
}

impl CsrfSettings {
    /// Build settings from a key lookup, e.g. the process environment.
    ///
    /// Keys are the upper-case field names (`SECRET`, `COOKIE_NAME`, ...).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let flag = |key: &str| text(key).and_then(|v| parse_bool(&v));

        Self {
            secret: text("SECRET"),
            header_name: text("HEADER_NAME"),
            form_field_name: text("FORM_FIELD_NAME"),
            cookie_name: text("COOKIE_NAME"),
            cookie_path: text("COOKIE_PATH"),
            cookie_domain: text("COOKIE_DOMAIN"),
            cookie_http_only: flag("COOKIE_HTTP_ONLY"),
            cookie_secure: flag("COOKIE_SECURE"),
            cookie_same_site: text("COOKIE_SAME_SITE"),
            cookie_ttl_secs: text("COOKIE_TTL_SECS").and_then(|v| v.parse().ok()),
            session_key: text("SESSION_KEY"),
            set_header: flag("SET_HEADER"),
            set_cookie: flag("SET_COOKIE"),
            skip_on_origin_header: flag("SKIP_ON_ORIGIN_HEADER")
                .or_else(|| flag("REJECT_ON_ORIGIN_HEADER")),
        }
    }

    /// Apply these settings over the defaults.
    pub fn into_config(self) -> CsrfConfig {
        fn set(target: &mut String, value: Option<String>) {
            if let Some(v) = value.filter(|v| !v.is_empty()) {
                *target = v;
            }
        }

        let mut config = CsrfConfig::new();
        if let Some(secret) = self.secret {
            config = config.with_secret(secret);
        }
        set(&mut config.header_name, self.header_name);
        set(&mut config.form_field_name, self.form_field_name);
        set(&mut config.cookie_name, self.cookie_name);
        set(&mut config.cookie_path, self.cookie_path);
        set(&mut config.session_key, self.session_key);

        config.cookie_domain = self.cookie_domain.filter(|d| !d.is_empty());
        config.cookie_same_site = self.cookie_same_site.as_deref().and_then(SameSite::parse);
        if let Some(secs) = self.cookie_ttl_secs.filter(|s| *s > 0) {
            config.cookie_ttl = Duration::from_secs(secs);
        }
        config.cookie_http_only = self.cookie_http_only.unwrap_or(config.cookie_http_only);
        config.cookie_secure = self.cookie_secure.unwrap_or(config.cookie_secure);
        config.set_header = self.set_header.unwrap_or(config.set_header);
        config.set_cookie = self.set_cookie.unwrap_or(config.set_cookie);
        config.skip_on_origin_header = self
            .skip_on_origin_header
            .unwrap_or(config.skip_on_origin_header);
        config
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
