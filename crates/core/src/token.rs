//! Access token inspection
//!
//! Access tokens are JWTs issued by the auth server. The client never verifies
//! signatures; it only reads the payload to decide whether a token is still
//! worth sending (`exp`) and who the session belongs to (identity claims).
//!
//! Expiry uses the same unit on both sides: `exp` is seconds since the epoch
//! and is compared against the current time in (fractional) seconds. A token
//! is valid only while `exp` is strictly greater than now. There is no skew
//! margin, so a token one millisecond from expiry is still sent.

use crate::clock::{Clock, SystemClock};
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::Indifferent)
    .with_decode_allow_trailing_bits(true);

/// JWT segments are base64url, but some servers pad or use the standard alphabet
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);

/// Why a token payload could not be read
#[derive(Debug, Error)]
pub enum TokenDecodeError {
    #[error("token does not have three dot-separated segments")]
    Segments,

    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result of inspecting a stored access token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// No token stored (or an empty one)
    Missing,
    /// The payload could not be decoded
    Malformed,
    /// Decoded, but `exp` is absent, not a number, or not in the future
    Expired,
    /// Decoded and `exp` is strictly in the future
    Valid,
}

impl TokenStatus {
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Decode the payload segment of a JWT into JSON
fn decode_payload(token: &str) -> Result<Value, TokenDecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(TokenDecodeError::Segments);
    };

    let bytes = URL_SAFE_LENIENT
        .decode(payload)
        .or_else(|_| STANDARD_LENIENT.decode(payload))?;

    Ok(serde_json::from_slice(&bytes)?)
}

/// Inspect a token against an explicit "now" in seconds since the epoch
pub fn inspect_token_at(token: Option<&str>, now_secs: f64) -> TokenStatus {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return TokenStatus::Missing;
    };

    match decode_payload(token) {
        Ok(payload) => match payload.get("exp").and_then(Value::as_f64) {
            Some(exp) if exp > now_secs => TokenStatus::Valid,
            _ => TokenStatus::Expired,
        },
        Err(error) => {
            tracing::debug!(%error, "stored access token could not be decoded");
            TokenStatus::Malformed
        }
    }
}

/// Inspect a token using the given clock
pub fn inspect_token(token: Option<&str>, clock: &dyn Clock) -> TokenStatus {
    inspect_token_at(token, clock.now_secs())
}

/// Whether a token is present, decodable and not yet expired.
///
/// Never panics and never errors: anything unreadable is simply not valid.
pub fn is_token_valid(token: Option<&str>) -> bool {
    inspect_token(token, &SystemClock).is_valid()
}

/// Identity carried in the access token payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionClaims {
    /// `nameid`, falling back to `sub`
    pub user_id: Option<String>,
    /// `unique_name`, falling back to `name`
    pub username: Option<String>,
    /// `role` or `roles`, normalized to a list
    pub roles: Vec<String>,
    /// `ClubId`
    pub club_id: Option<String>,
    pub exp: Option<i64>,
}

impl SessionClaims {
    /// Read the claims from a token without verifying its signature
    pub fn decode(token: &str) -> Result<Self, TokenDecodeError> {
        decode_payload(token).map(|payload| Self::from_payload(&payload))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_payload(payload: &Value) -> Self {
        let roles = ["role", "roles"]
            .iter()
            .find_map(|key| payload.get(key).filter(|v| !v.is_null()))
            .map(|value| match value {
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
                other => scalar_to_string(other).into_iter().collect(),
            })
            .unwrap_or_default();

        Self {
            user_id: first_string(payload, &["nameid", "sub"]),
            username: first_string(payload, &["unique_name", "name"]),
            roles,
            club_id: payload.get("ClubId").and_then(scalar_to_string),
            exp: payload.get("exp").and_then(|exp| {
                exp.as_i64()
                    .or_else(|| exp.as_f64().map(|secs| secs.floor() as i64))
            }),
        }
    }

    /// The first role, which the dashboard treats as the user's role
    pub fn primary_role(&self) -> Option<&str> {
        self.roles.first().map(String::as_str)
    }
}

fn first_string(payload: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| payload.get(key).and_then(scalar_to_string))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use serde_json::json;

    const HEADER: &str = "eyJhbGciOiJIUzI1NiJ9";
    const NOW: i64 = 1_700_000_000;

    fn make_token(payload: &Value) -> String {
        let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{HEADER}.{payload}.sig")
    }

    #[test]
    fn test_future_exp_is_valid() {
        let clock = FixedClock::from_secs(NOW);
        for offset in [1, 10, 3600, 86_400 * 365] {
            let token = make_token(&json!({ "exp": NOW + offset }));
            assert_eq!(inspect_token(Some(&token), &clock), TokenStatus::Valid);
        }
    }

    #[test]
    fn test_past_or_equal_exp_is_expired() {
        let clock = FixedClock::from_secs(NOW);
        for offset in [0, -1, -10, -86_400] {
            let token = make_token(&json!({ "exp": NOW + offset }));
            assert_eq!(inspect_token(Some(&token), &clock), TokenStatus::Expired);
        }
    }

    #[test]
    fn test_exp_compared_in_seconds_not_millis() {
        // exp one second ahead must stay valid while the clock is 500ms in
        let token = make_token(&json!({ "exp": NOW + 1 }));
        assert!(inspect_token(Some(&token), &FixedClock(NOW * 1000 + 500)).is_valid());

        // exp expressed in milliseconds would be far in the future, still valid
        let token = make_token(&json!({ "exp": (NOW - 10) * 1000 }));
        assert!(inspect_token(Some(&token), &FixedClock::from_secs(NOW)).is_valid());

        // the fraction matters: exp == now + 0.25s is valid at now, expired at now + 0.25
        let token = make_token(&json!({ "exp": 1_700_000_000.25 }));
        assert!(inspect_token_at(Some(&token), 1_700_000_000.0).is_valid());
        assert!(!inspect_token_at(Some(&token), 1_700_000_000.25).is_valid());
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(inspect_token_at(None, 0.0), TokenStatus::Missing);
        assert_eq!(inspect_token_at(Some(""), 0.0), TokenStatus::Missing);
        assert!(!is_token_valid(None));
    }

    #[test]
    fn test_malformed_tokens_fail_closed() {
        let now = 0.0;
        let cases = [
            "not-a-jwt",
            "only.two",
            "a.b.c.d",
            "eyJhbGciOiJIUzI1NiJ9.!!!not-base64!!!.sig",
            // base64 of `{"exp":` (truncated JSON)
            "eyJhbGciOiJIUzI1NiJ9.eyJleHAiOg.sig",
        ];
        for token in cases {
            assert_eq!(
                inspect_token_at(Some(token), now),
                TokenStatus::Malformed,
                "token {token:?}"
            );
            assert!(!is_token_valid(Some(token)));
        }
    }

    #[test]
    fn test_payload_without_numeric_exp_is_expired() {
        let cases = [
            json!({ "sub": "42" }),
            json!({ "exp": "tomorrow" }),
            // numeric strings are not coerced
            json!({ "exp": "99999999999" }),
            json!({ "exp": null }),
            json!([1, 2, 3]),
            json!(5),
        ];
        for payload in cases {
            let token = make_token(&payload);
            assert_eq!(inspect_token_at(Some(&token), 0.0), TokenStatus::Expired);
        }
    }

    #[test]
    fn test_standard_alphabet_with_padding_is_accepted() {
        let payload = STANDARD.encode(json!({ "exp": NOW + 60, "name": "é?>" }).to_string());
        let token = format!("{HEADER}.{payload}.sig");
        assert!(inspect_token(Some(&token), &FixedClock::from_secs(NOW)).is_valid());
    }

    #[test]
    fn test_is_token_valid_uses_wall_clock() {
        let now = chrono::Utc::now().timestamp();
        assert!(is_token_valid(Some(&make_token(&json!({ "exp": now + 60 })))));
        assert!(!is_token_valid(Some(&make_token(&json!({ "exp": now - 10 })))));
    }

    #[test]
    fn test_claims_from_dotnet_style_payload() {
        let token = make_token(&json!({
            "nameid": "17",
            "sub": "ignored",
            "unique_name": "awa.diop",
            "role": ["President", "Member"],
            "ClubId": 3,
            "exp": NOW,
        }));

        let claims = SessionClaims::decode(&token).unwrap();
        assert_eq!(claims.user_id.as_deref(), Some("17"));
        assert_eq!(claims.username.as_deref(), Some("awa.diop"));
        assert_eq!(claims.roles, vec!["President", "Member"]);
        assert_eq!(claims.primary_role(), Some("President"));
        assert_eq!(claims.club_id.as_deref(), Some("3"));
        assert_eq!(claims.exp, Some(NOW));
    }

    #[test]
    fn test_claims_fallbacks() {
        let token = make_token(&json!({
            "sub": "user-9",
            "name": "Moussa",
            "roles": "Secretary",
        }));

        let claims = SessionClaims::decode(&token).unwrap();
        assert_eq!(claims.user_id.as_deref(), Some("user-9"));
        assert_eq!(claims.username.as_deref(), Some("Moussa"));
        assert_eq!(claims.roles, vec!["Secretary"]);
        assert_eq!(claims.club_id, None);
        assert_eq!(claims.exp, None);
    }

    #[test]
    fn test_claims_without_roles() {
        let claims = SessionClaims::decode(&make_token(&json!({}))).unwrap();
        assert!(claims.roles.is_empty());
        assert_eq!(claims.primary_role(), None);
    }

    #[test]
    fn test_claims_decode_error() {
        assert!(matches!(
            SessionClaims::decode("garbage"),
            Err(TokenDecodeError::Segments)
        ));
    }
}
