//! URL-encoded form parsing

use crate::Error;
use serde::de::DeserializeOwned;

/// Parse URL-encoded form data into a typed value
pub fn parse_form<T: DeserializeOwned>(body: &[u8]) -> Result<T, Error> {
    serde_urlencoded::from_bytes(body)
        .map_err(|e| Error::BadRequest(format!("Failed to parse form data: {}", e)))
}

/// Parse URL-encoded form data into ordered `(name, value)` pairs.
///
/// Repeated names are kept, in the order they appear.
pub fn parse_form_pairs(body: &[u8]) -> Result<Vec<(String, String)>, Error> {
    parse_form(body)
}
