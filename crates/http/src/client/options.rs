//! Per-request options

use super::error::ClientError;
use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Method, headers and body of a request sent through the gateway
///
/// The body is kept as bytes so the exact same request can be sent again
/// after a token refresh. The gateway never serializes bodies itself.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Defaults to `GET`
    pub method: Method,
    /// Sent verbatim, except `Authorization` which the gateway overwrites
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Overrides the gateway-wide timeout for this request
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    /// Add a header, replacing any previous value for the same name
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add a header from strings
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidHeader`] if the name or value is not a
    /// legal HTTP header
    pub fn try_header(self, name: &str, value: &str) -> Result<Self, ClientError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ClientError::InvalidHeader(format!("{name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ClientError::InvalidHeader(format!("{name}: {e}")))?;
        Ok(self.header(name, value))
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body, setting `Content-Type` unless the
    /// caller already chose one
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Serialization`] if `value` cannot be serialized
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, ClientError> {
        self.body = Some(Bytes::from(serde_json::to_vec(value)?));
        self.headers
            .entry(CONTENT_TYPE)
            .or_insert_with(|| HeaderValue::from_static("application/json"));
        Ok(self)
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Abort the request when `token` is cancelled
    #[must_use]
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::AUTHORIZATION;
    use serde_json::json;

    #[test]
    fn test_default_is_get_without_body() {
        let options = RequestOptions::default();
        assert_eq!(options.method, Method::GET);
        assert!(options.headers.is_empty());
        assert!(options.body.is_none());
        assert!(options.timeout.is_none());
    }

    #[test]
    fn test_json_sets_content_type_once() {
        let options = RequestOptions::post()
            .try_header("content-type", "application/vnd.club+json")
            .unwrap()
            .json(&json!({ "name": "Dakar Almadies" }))
            .unwrap();

        assert_eq!(
            options.headers.get(CONTENT_TYPE).unwrap(),
            "application/vnd.club+json"
        );
        assert_eq!(
            options.body.as_deref(),
            Some(br#"{"name":"Dakar Almadies"}"#.as_slice())
        );
    }

    #[test]
    fn test_try_header_rejects_invalid_values() {
        assert!(matches!(
            RequestOptions::get().try_header("bad header", "x"),
            Err(ClientError::InvalidHeader(_))
        ));
        assert!(matches!(
            RequestOptions::get().try_header("x-ok", "line\nbreak"),
            Err(ClientError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_header_replaces_previous_value() {
        let options = RequestOptions::get()
            .header(AUTHORIZATION, HeaderValue::from_static("Bearer a"))
            .header(AUTHORIZATION, HeaderValue::from_static("Bearer b"));
        assert_eq!(options.headers.get_all(AUTHORIZATION).iter().count(), 1);
        assert_eq!(options.headers.get(AUTHORIZATION).unwrap(), "Bearer b");
    }
}
