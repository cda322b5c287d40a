//! Connection-level auth gate.

use std::borrow::Cow;
use std::fmt;

use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

/// Decides whether an inbound connection may reach the dispatcher.
pub trait AuthGate: Send + Sync + fmt::Debug {
    /// Returns `true` to let the request through.
    fn authorize(&self, parts: &Parts) -> bool;
}

/// Lets every request through.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AuthGate for AllowAll {
    fn authorize(&self, _parts: &Parts) -> bool {
        true
    }
}

/// Requires a shared secret, either as `Authorization: Bearer <token>` or
/// as a `token=<token>` query parameter (browsers cannot set headers on a
/// WebSocket handshake).
#[derive(Clone)]
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    /// Creates a gate accepting `token`.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    fn header_matches(&self, parts: &Parts) -> bool {
        parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|presented| self.matches(presented.trim()))
    }

    fn query_matches(&self, parts: &Parts) -> bool {
        parts.uri.query().is_some_and(|query| {
            query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .filter(|(key, _)| *key == "token")
                .filter_map(|(_, value)| decode_query_value(value))
                .any(|presented| self.matches(&presented))
        })
    }

    fn matches(&self, presented: &str) -> bool {
        constant_time_eq(presented.as_bytes(), self.token.as_bytes())
    }
}

/// Form-decodes one query value (`+` is a space, `%XX` an escaped byte).
fn decode_query_value(value: &str) -> Option<String> {
    urlencoding::decode(&value.replace('+', " "))
        .ok()
        .map(Cow::into_owned)
}

/// Compares two secrets without an early exit on the first differing byte.
/// Only the length is revealed through timing.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0_u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken").finish_non_exhaustive()
    }
}

impl AuthGate for BearerToken {
    fn authorize(&self, parts: &Parts) -> bool {
        self.header_matches(parts) || self.query_matches(parts)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(uri: &str, auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        let Ok(request) = builder.body(()) else {
            panic!("invalid request");
        };
        request.into_parts().0
    }

    #[test]
    fn allow_all_allows() {
        assert!(AllowAll.authorize(&parts("/", None)));
    }

    #[test]
    fn bearer_header_is_checked() {
        let gate = BearerToken::new("s3cret");
        assert!(gate.authorize(&parts("/", Some("Bearer s3cret"))));
        assert!(!gate.authorize(&parts("/", Some("Bearer wrong"))));
        assert!(!gate.authorize(&parts("/", Some("Basic s3cret"))));
        assert!(!gate.authorize(&parts("/", None)));
    }

    #[test]
    fn query_token_is_checked() {
        let gate = BearerToken::new("s3cret");
        assert!(gate.authorize(&parts("/ws?x=1&token=s3cret", None)));
        assert!(!gate.authorize(&parts("/ws?token=nope", None)));
        assert!(!gate.authorize(&parts("/ws?tokens=s3cret", None)));
    }

    #[test]
    fn query_token_is_percent_decoded() {
        let gate = BearerToken::new("a+b&c%d e");
        assert!(gate.authorize(&parts("/?token=a%2Bb%26c%25d+e", None)));
        assert!(gate.authorize(&parts("/?token=a%2Bb%26c%25d%20e", None)));
        assert!(!gate.authorize(&parts("/?token=a+b&c%25d+e", None)));
        assert!(!gate.authorize(&parts("/?token=a%2Bb", None)));
    }

    #[test]
    fn token_comparison_checks_every_byte() {
        assert!(constant_time_eq(b"s3cret", b"s3cret"));
        assert!(!constant_time_eq(b"s3cret", b"s3creT"));
        assert!(!constant_time_eq(b"s3cret", b"s3cre"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn debug_hides_token() {
        let rendered = format!("{:?}", BearerToken::new("s3cret"));
        assert!(!rendered.contains("s3cret"));
    }
}
