//! Token authority.
//!
//! Tokens are a keyed hash of the user identity and the action class they
//! protect. Derivation is deterministic, so verification recomputes the
//! expected token instead of remembering issued ones.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Action class for state-changing requests. The only class currently issued.
pub const ACTION_POST: &str = "POST";

/// Versioned prefix mixed into every MAC so tokens cannot be confused with
/// other HMACs computed under the same secret.
const DOMAIN_TAG: &[u8] = b"palisade-csrf/v1";

const ALPHANUM: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Largest multiple of the alphabet size that fits in a byte; bytes at or
/// above it are discarded so every symbol is equally likely.
const REJECTION_BOUND: u8 = (256 / ALPHANUM.len() * ALPHANUM.len()) as u8;

/// Derive the token for `(secret, identity, action)`.
///
/// Each variable-length field is prefixed with its length, so
/// `("ab", "c")` and `("a", "bc")` can never produce the same MAC input.
/// The result is URL-safe base64 without padding, which is also safe inside
/// cookies, headers and HTML attributes.
pub fn derive_token(secret: &[u8], identity: &str, action: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(DOMAIN_TAG);
    update_field(&mut mac, identity.as_bytes());
    update_field(&mut mac, action.as_bytes());
    URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
}

fn update_field(mac: &mut HmacSha256, field: &[u8]) {
    mac.update(&(field.len() as u64).to_be_bytes());
    mac.update(field);
}

/// Check `candidate` against the token derived from the same inputs.
///
/// The comparison runs in constant time with respect to the token contents.
pub fn verify_token(candidate: &str, secret: &[u8], identity: &str, action: &str) -> bool {
    let expected = derive_token(secret, identity, action);
    candidate.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Where the bytes of a [`RandomString`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropySource {
    /// The operating system CSPRNG.
    Os,
    /// A time-seeded PRNG, used only when the OS source failed. Values from
    /// this source are guessable and must not be relied on as secrets.
    Degraded,
}

/// Random alphanumeric string, tagged with its entropy source.
#[derive(Clone, PartialEq, Eq)]
pub struct RandomString {
    pub value: String,
    pub source: EntropySource,
}

impl RandomString {
    pub fn is_degraded(&self) -> bool {
        self.source == EntropySource::Degraded
    }
}

impl std::fmt::Debug for RandomString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomString")
            .field("len", &self.value.len())
            .field("source", &self.source)
            .finish()
    }
}

/// Generate `n` alphanumeric characters from the OS random source.
///
/// Falls back to a time-seeded PRNG if the OS source fails, logging a
/// warning and marking the result [`EntropySource::Degraded`].
pub fn random_string(n: usize) -> RandomString {
    random_string_with(&mut OsRng, n)
}

pub(crate) fn random_string_with<R: RngCore>(rng: &mut R, n: usize) -> RandomString {
    match fill_alphanumeric(rng, n) {
        Ok(value) => RandomString {
            value,
            source: EntropySource::Os,
        },
        Err(e) => {
            warn!(
                error = %e,
                "Secure random source unavailable; falling back to a time-seeded generator. \
                 Generated secrets are predictable, configure an explicit secret"
            );
            let mut fallback = StdRng::seed_from_u64(clock_seed());
            let value = fill_alphanumeric(&mut fallback, n)
                .unwrap_or_else(|_| unreachable_fallback(&mut fallback, n));
            RandomString {
                value,
                source: EntropySource::Degraded,
            }
        }
    }
}

fn fill_alphanumeric<R: RngCore>(rng: &mut R, n: usize) -> Result<String, rand::Error> {
    let mut out = String::with_capacity(n);
    let mut buf = vec![0u8; n.max(16)];
    while out.len() < n {
        rng.try_fill_bytes(&mut buf)?;
        for &b in buf.iter().filter(|&&b| b < REJECTION_BOUND) {
            if out.len() == n {
                break;
            }
            out.push(ALPHANUM[b as usize % ALPHANUM.len()] as char);
        }
    }
    Ok(out)
}

// StdRng::try_fill_bytes never fails.
fn unreachable_fallback(rng: &mut StdRng, n: usize) -> String {
    (0..n)
        .map(|_| ALPHANUM[rng.next_u32() as usize % ALPHANUM.len()] as char)
        .collect()
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenRng;

    impl RngCore for BrokenRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }

        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new(std::io::Error::other("entropy source offline")))
        }
    }

    #[test]
    fn test_derive_is_deterministic() {
        let a = derive_token(b"s1", "42", ACTION_POST);
        let b = derive_token(b"s1", "42", ACTION_POST);
        assert_eq!(a, b);
    }

    #[test]
    fn test_token_shape() {
        let token = derive_token(b"s1", "42", ACTION_POST);
        // 32-byte MAC, unpadded base64
        assert_eq!(token.len(), 43);
        assert!(
            token
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        );
    }

    #[test]
    fn test_verify_round_trip() {
        let token = derive_token(b"s1", "42", ACTION_POST);
        assert!(verify_token(&token, b"s1", "42", ACTION_POST));
    }

    #[test]
    fn test_each_input_changes_the_token() {
        let base = derive_token(b"s1", "42", ACTION_POST);
        assert_ne!(base, derive_token(b"s2", "42", ACTION_POST));
        assert_ne!(base, derive_token(b"s1", "43", ACTION_POST));
        assert_ne!(base, derive_token(b"s1", "42", "DELETE"));
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        assert_ne!(
            derive_token(b"s1", "ab", "c"),
            derive_token(b"s1", "a", "bc")
        );
        assert_ne!(derive_token(b"s1", "", "POST"), derive_token(b"s1", "POST", ""));
    }

    #[test]
    fn test_verify_rejects_mismatches() {
        let token = derive_token(b"s1", "42", ACTION_POST);
        assert!(!verify_token(&token, b"s2", "42", ACTION_POST));
        assert!(!verify_token(&token, b"s1", "0", ACTION_POST));
        assert!(!verify_token(&token, b"s1", "42", "PUT"));
        assert!(!verify_token(&format!("{}-tampered", token), b"s1", "42", ACTION_POST));
        assert!(!verify_token(&token[..token.len() - 1], b"s1", "42", ACTION_POST));
        assert!(!verify_token("", b"s1", "42", ACTION_POST));
    }

    #[test]
    fn test_random_string_from_os() {
        let s = random_string(32);
        assert_eq!(s.value.len(), 32);
        assert_eq!(s.source, EntropySource::Os);
        assert!(s.value.bytes().all(|b| b.is_ascii_alphanumeric()));
        assert_ne!(random_string(32).value, s.value);
    }

    #[test]
    fn test_random_string_falls_back_when_source_fails() {
        let s = random_string_with(&mut BrokenRng, 24);
        assert!(s.is_degraded());
        assert_eq!(s.value.len(), 24);
        assert!(s.value.bytes().all(|b| b.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_random_string_zero_length() {
        assert_eq!(random_string(0).value, "");
    }

    #[test]
    fn test_debug_hides_value() {
        let s = random_string(16);
        assert!(!format!("{:?}", s).contains(&s.value));
    }
}
