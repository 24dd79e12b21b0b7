// HTTP request and response types

use crate::cookie::{Cookie, parse_cookie_header};
use crate::extensions::Extensions;
use crate::form::parse_form_pairs;
use crate::Error;
use http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use std::collections::HashMap;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// HTTP request wrapper
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub query_params: HashMap<String, String>,
    /// Request-scoped values published by middleware for downstream handlers.
    pub extensions: Extensions,
}

impl HttpRequest {
    /// Create a request. A query string in `path` is split off into `query_params`.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        let (path, query_params) = match path.split_once('?') {
            Some((path, query)) => (
                path.to_string(),
                parse_form_pairs(query.as_bytes())
                    .map(|pairs| pairs.into_iter().collect())
                    .unwrap_or_default(),
            ),
            None => (path, HashMap::new()),
        };

        Self {
            method: method.into(),
            path,
            query_params,
            ..Default::default()
        }
    }

    /// Append a header, keeping any existing values under the same name.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, Error> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.headers.append(name, value);
        Ok(self)
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a urlencoded body and the matching content type.
    pub fn with_form(mut self, pairs: &[(&str, &str)]) -> Result<Self, Error> {
        self.body = serde_urlencoded::to_string(pairs)
            .map_err(|e| Error::Serialization(e.to_string()))?
            .into_bytes();
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(FORM_URLENCODED));
        Ok(self)
    }

    /// First value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Look a cookie up across every `Cookie` header. First match wins.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(parse_cookie_header)
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    }

    /// Get a query parameter by name
    pub fn query(&self, name: &str) -> Option<&String> {
        self.query_params.get(name)
    }

    /// Look up a form value.
    ///
    /// The urlencoded body is consulted first (only when the request declares
    /// that content type), then the query string. A body that fails to parse
    /// is treated as carrying no fields.
    pub fn form_value(&self, name: &str) -> Option<String> {
        if self.is_form_urlencoded() {
            let from_body = parse_form_pairs(&self.body)
                .ok()
                .and_then(|pairs| pairs.into_iter().find(|(key, _)| key == name))
                .map(|(_, value)| value);
            if from_body.is_some() {
                return from_body;
            }
        }

        self.query_params.get(name).cloned()
    }

    fn is_form_urlencoded(&self) -> bool {
        self.header(CONTENT_TYPE.as_str())
            .map(|ct| {
                ct.split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .eq_ignore_ascii_case(FORM_URLENCODED)
            })
            .unwrap_or(false)
    }
}

/// HTTP response wrapper
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn bad_request() -> Self {
        Self::new(400)
    }

    pub fn internal_server_error() -> Self {
        Self::new(500)
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Set a plaintext body.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    /// Set a JSON body.
    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, Error> {
        self.body = serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    /// Replace the body with plaintext, updating the content type.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.body = text.into().into_bytes();
        self.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
    }

    /// Add a header value without replacing existing ones.
    pub fn append_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.headers.append(name, value);
        Ok(())
    }

    /// First value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Append a `Set-Cookie` header for `cookie`.
    pub fn set_cookie(&mut self, cookie: &Cookie) -> Result<(), Error> {
        let value = HeaderValue::from_str(&cookie.to_header_value())?;
        self.headers.append(SET_COOKIE, value);
        Ok(())
    }

    /// Every `Set-Cookie` value on the response.
    pub fn set_cookies(&self) -> Vec<&str> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
