#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rotary_gate_core::{MemoryTokenStore, REFRESH_TOKEN_KEY, TOKEN_KEY, TokenStore};
use rotary_gate_http::{AuthGateway, ClientError, FnObserver, SessionExpiredReason};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

pub const JWT_HEADER: &str = "eyJhbGciOiJIUzI1NiJ9";

/// Build an unsigned JWT carrying `payload`
pub fn jwt(payload: &Value) -> String {
    format!("{JWT_HEADER}.{}.sig", URL_SAFE_NO_PAD.encode(payload.to_string()))
}

/// A JWT whose `exp` is `offset_secs` from now
pub fn token_expiring_in(offset_secs: i64) -> String {
    jwt(&json!({ "exp": chrono::Utc::now().timestamp() + offset_secs }))
}

pub fn store_with(token: Option<&str>, refresh_token: Option<&str>) -> Arc<MemoryTokenStore> {
    let mut entries = Vec::new();
    if let Some(token) = token {
        entries.push((TOKEN_KEY, token));
    }
    if let Some(refresh_token) = refresh_token {
        entries.push((REFRESH_TOKEN_KEY, refresh_token));
    }
    Arc::new(MemoryTokenStore::with_entries(entries))
}

pub fn build_gateway(base_url: &str, store: Arc<MemoryTokenStore>) -> AuthGateway {
    AuthGateway::builder()
        .base_url(base_url)
        .store(store)
        .build()
        .unwrap()
}

pub async fn stored(store: &MemoryTokenStore, key: &str) -> Option<String> {
    store.get(key).await.unwrap()
}

pub fn assert_session_expired(result: Result<reqwest::Response, ClientError>) -> SessionExpiredReason {
    match result {
        Err(ClientError::SessionExpired(reason)) => reason,
        Err(other) => panic!("expected session expiry, got error {other:?}"),
        Ok(response) => panic!("expected session expiry, got status {}", response.status()),
    }
}

/// Observer that records every teardown it is told about
pub fn recording_observer() -> (
    Arc<FnObserver<impl Fn(&SessionExpiredReason, &str) + Send + Sync>>,
    Arc<Mutex<Vec<(SessionExpiredReason, String)>>>,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let observer = FnObserver::new(move |reason: &SessionExpiredReason, redirect: &str| {
        sink.lock()
            .unwrap()
            .push((reason.clone(), redirect.to_string()));
    });
    (Arc::new(observer), seen)
}
